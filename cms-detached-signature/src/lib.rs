// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Detached Cryptographic Message Syntax (RFC 5652) signatures in Pure Rust

This crate produces and verifies *detached* CMS `SignedData` structures: the
signed bytes live elsewhere (typically a byte range of a host document) and
only their digest is covered by the signature.

Functionality includes:

* Building a detached `SignedData` over arbitrary bytes with an RSA or
  ECDSA P-256 key, embedding the signer's certificate chain, emitted as
  canonical DER within a fixed size budget ([SignatureBuilder]).
* Requesting RFC 3161 time-stamp tokens over HTTP and embedding them as
  the `id-aa-signatureTimeStampToken` unsigned attribute
  ([TimestampClient], [augment::add_timestamp]).
* Verifying existing signatures, matching each signer to an embedded
  certificate and extracting identity fields such as the signer's name and
  fiscal code ([verify::verify]).

Before signing or verifying, install the cryptographic provider once with
[provider::install_default].

# IMPORTANT SECURITY LIMITATIONS

**Verification only answers *did certificate X sign content Y*.** It does not
validate certificate chains, check revocation (CRL/OCSP) or decide whether a
signer should be trusted. Callers needing those guarantees must perform
that validation themselves.

# Technical Notes

RFC 5652 uses BER for serialization, and tools such as OpenSSL emit
indefinite-length BER. Everything emitted by this crate is transcoded to
DER by [der::to_der] so signatures have a single canonical form. You can
inspect output with:

   $ openssl cms -cmsout -print -inform DER -in <filename>
   $ openssl asn1parse -inform DER -in <filename>
*/

pub mod asn1;
pub mod augment;
pub mod callback;
pub mod der;
pub mod error;
pub mod identity;
pub mod output;
pub mod provider;
pub mod signing;
#[cfg(test)]
mod testutil;
pub mod time_stamp_protocol;
pub mod verify;

pub use {
    bcder::Oid,
    bytes::Bytes,
    error::{ErrorKind, SignatureError},
    identity::SigningIdentity,
    signing::{SignatureBuilder, SigningSettings},
    time_stamp_protocol::{
        TimeStampProvider, TimestampClient, TimestampClientSettings, TimestampToken,
    },
    verify::{
        extract_fiscal_code, verify, verify_detached, verify_stream, StreamSummary,
        VerificationReport, VerificationResult,
    },
};

use {
    crate::{
        asn1::{
            rfc3161::OID_TIME_STAMP_TOKEN,
            rfc5652::{
                CertificateChoices, SignerIdentifier, OID_CONTENT_TYPE, OID_MESSAGE_DIGEST,
                OID_SIGNING_TIME,
            },
        },
        error::Result,
    },
    bcder::{Captured, Integer, OctetString},
    std::{
        collections::HashSet,
        fmt::{Debug, Formatter},
        ops::Deref,
    },
    x509_certificate::{
        asn1time::Time, certificate::certificate_is_subset_of, rfc3280::Name,
        CapturedX509Certificate, DigestAlgorithm, SignatureAlgorithm,
    },
};

/// OID of the X.509 subject key identifier extension.
///
/// 2.5.29.14
const OID_SUBJECT_KEY_IDENTIFIER: bcder::ConstOid = bcder::Oid(&[85, 29, 14]);

/// Represents a CMS SignedData structure.
///
/// This is the high-level type representing a CMS signature of some data.
/// It contains a description of what was signed, the cryptographic signature
/// of what was signed, and likely the X.509 certificate chain for the
/// signing key.
///
/// This is a high-level data structure that ultimately gets (de)serialized
/// from/to ASN.1. It exists to facilitate common interactions with the
/// low-level ASN.1 without exposing the complexity of ASN.1.
#[derive(Clone)]
pub struct SignedData {
    /// Content digest algorithms used.
    digest_algorithms: HashSet<DigestAlgorithm>,

    /// Content that was signed.
    ///
    /// Detached signatures carry no content. Time-stamp tokens carry
    /// their `TSTInfo` here.
    signed_content: Option<Vec<u8>>,

    /// X.509 certificates embedded within the data structure.
    ///
    /// Choices other than X.509 certificates are not retained.
    certificates: Vec<CapturedX509Certificate>,

    /// Describes content signatures.
    signers: Vec<SignerInfo>,
}

impl Debug for SignedData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("SignedData");
        s.field("digest_algorithms", &self.digest_algorithms);
        s.field(
            "signed_content",
            &format_args!("{:?}", self.signed_content.as_ref().map(hex::encode)),
        );
        s.field(
            "certificates",
            &self
                .certificates
                .iter()
                .map(|cert| cert.subject_common_name())
                .collect::<Vec<_>>(),
        );
        s.field("signers", &self.signers);
        s.finish()
    }
}

impl SignedData {
    /// Construct an instance by parsing BER data.
    pub fn parse_ber(data: &[u8]) -> Result<Self> {
        let raw = crate::asn1::rfc5652::SignedData::decode_ber(data)
            .map_err(|e| SignatureError::Parsing(format!("malformed SignedData: {}", e)))?;

        Self::try_from(&raw)
    }

    pub fn digest_algorithms(&self) -> impl Iterator<Item = &DigestAlgorithm> {
        self.digest_algorithms.iter()
    }

    /// Obtain encapsulated content that was signed.
    ///
    /// This is the defined `encapContentInfo eContent` value.
    pub fn signed_content(&self) -> Option<&[u8]> {
        self.signed_content.as_deref()
    }

    pub fn certificates(&self) -> impl Iterator<Item = &CapturedX509Certificate> {
        self.certificates.iter()
    }

    /// Obtain signing information attached to this instance.
    ///
    /// Each iterated value represents an entity that cryptographically signed
    /// the content. Use these objects to validate the signed data.
    pub fn signers(&self) -> impl Iterator<Item = &SignerInfo> {
        self.signers.iter()
    }
}

/// Convert the certificate choices of a `SignedData` to X.509 certificates.
///
/// Choices that aren't X.509 certificates are skipped.
pub(crate) fn parse_certificates(
    raw: &crate::asn1::rfc5652::SignedData,
) -> Vec<Result<CapturedX509Certificate>> {
    raw.certificates
        .iter()
        .flat_map(|certs| certs.iter())
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(cert) => Some(
                CapturedX509Certificate::from_ber(cert.as_slice().to_vec()).map_err(|e| {
                    SignatureError::Parsing(format!("malformed embedded certificate: {}", e))
                }),
            ),
            CertificateChoices::Other(_) => None,
        })
        .collect()
}

impl TryFrom<&crate::asn1::rfc5652::SignedData> for SignedData {
    type Error = SignatureError;

    fn try_from(raw: &crate::asn1::rfc5652::SignedData) -> Result<Self> {
        let digest_algorithms = raw
            .digest_algorithms
            .iter()
            .map(|alg| {
                DigestAlgorithm::try_from(alg).map_err(|e| SignatureError::Parsing(e.to_string()))
            })
            .collect::<Result<HashSet<_>>>()?;

        let signed_content = raw
            .content_info
            .content
            .as_ref()
            .map(|content| content.to_bytes().to_vec());

        let certificates = parse_certificates(raw)
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let signers = raw
            .signer_infos
            .iter()
            .map(SignerInfo::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            digest_algorithms,
            signed_content,
            certificates,
            signers,
        })
    }
}

/// Represents a CMS SignerInfo structure.
///
/// This is a high-level interface to the SignerInfo ASN.1 type. It supports
/// performing common operations against that type.
///
/// Instances of this type are logically equivalent to a single
/// signed assertion within a `SignedData` payload. There can be multiple
/// signers per `SignedData`, which is why this type exists on its own.
#[derive(Clone)]
pub struct SignerInfo {
    /// Identifies the signing certificate.
    sid: SignerIdentifier,

    /// The algorithm used for digesting signed content.
    digest_algorithm: DigestAlgorithm,

    /// Algorithm used for signing the digest.
    signature_algorithm: SignatureAlgorithm,

    /// The cryptographic signature.
    signature: Vec<u8>,

    /// Parsed signed attributes.
    signed_attributes: Option<SignedAttributes>,

    /// Raw data constituting SignedAttributes that needs to be digested.
    digested_signed_attributes_data: Option<Vec<u8>>,

    /// Parsed unsigned attributes.
    unsigned_attributes: Option<UnsignedAttributes>,
}

impl Debug for SignerInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("SignerInfo");
        s.field("sid", &self.sid);
        s.field("digest_algorithm", &self.digest_algorithm);
        s.field("signature_algorithm", &self.signature_algorithm);
        s.field(
            "signature",
            &format_args!("{}", hex::encode(&self.signature)),
        );
        s.field("signed_attributes", &self.signed_attributes);
        s.field(
            "digested_signed_attributes_data",
            &format_args!(
                "{:?}",
                self.digested_signed_attributes_data
                    .as_ref()
                    .map(hex::encode)
            ),
        );
        s.field("unsigned_attributes", &self.unsigned_attributes);
        s.finish()
    }
}

impl SignerInfo {
    /// Obtain the signing X.509 certificate's issuer name and its serial number.
    ///
    /// Returns `None` when the signer is identified by subject key identifier.
    pub fn certificate_issuer_and_serial(&self) -> Option<(&Name, &Integer)> {
        match &self.sid {
            SignerIdentifier::IssuerAndSerialNumber(v) => Some((&v.issuer, &v.serial_number)),
            SignerIdentifier::SubjectKeyIdentifier(_) => None,
        }
    }

    /// Obtain the subject key identifier of the signing certificate, if used as the SID.
    pub fn subject_key_identifier(&self) -> Option<Vec<u8>> {
        match &self.sid {
            SignerIdentifier::IssuerAndSerialNumber(_) => None,
            SignerIdentifier::SubjectKeyIdentifier(v) => Some(v.to_bytes().to_vec()),
        }
    }

    /// Obtain the message digest algorithm used by this signer.
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }

    /// Obtain the cryptographic signing algorithm used by this signer.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signature_algorithm
    }

    /// Obtain the raw bytes constituting the cryptographic signature.
    ///
    /// This is the signature that should be verified.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Obtain the `SignedAttributes` attached to this instance.
    pub fn signed_attributes(&self) -> Option<&SignedAttributes> {
        self.signed_attributes.as_ref()
    }

    /// Obtain the `UnsignedAttributes` attached to this instance.
    pub fn unsigned_attributes(&self) -> Option<&UnsignedAttributes> {
        self.unsigned_attributes.as_ref()
    }

    /// Locate the certificate this signer refers to.
    ///
    /// Issuer and serial identifiers are matched with
    /// [certificate_is_subset_of], which tolerates candidate certificates
    /// carrying extra name attributes. Subject key identifiers are matched
    /// against the certificate's subject key identifier extension.
    pub fn find_certificate<'a>(
        &self,
        mut certs: impl Iterator<Item = &'a CapturedX509Certificate>,
    ) -> Option<&'a CapturedX509Certificate> {
        match &self.sid {
            SignerIdentifier::IssuerAndSerialNumber(v) => certs.find(|cert| {
                certificate_is_subset_of(
                    &v.serial_number,
                    &v.issuer,
                    cert.serial_number_asn1(),
                    cert.issuer_name(),
                )
            }),
            SignerIdentifier::SubjectKeyIdentifier(ski) => {
                let wanted = ski.to_bytes();

                certs.find(|cert| {
                    certificate_subject_key_identifier(cert).as_deref() == Some(wanted.as_ref())
                })
            }
        }
    }

    /// Verifies the signature defined by this signer given a [SignedData] instance.
    ///
    /// This function will perform cryptographic verification that the signature
    /// contained within this `SignerInfo` instance is valid for the content that
    /// was signed. The content that was signed is the encapsulated content from
    /// the `SignedData` instance (its `.signed_data()` value) combined with
    /// the `SignedAttributes` attached to this instance.
    ///
    /// # IMPORTANT SECURITY LIMITATIONS
    ///
    /// This method only performs signature verification. It:
    ///
    /// * DOES NOT verify the digest hash embedded within `SignedAttributes` (if present).
    /// * DOES NOT validate the signing certificate in any way.
    /// * DOES NOT validate that the cryptography used is appropriate.
    /// * DOES NOT verify the time stamp token, if present.
    ///
    /// See the crate's documentation for more on the security implications.
    pub fn verify_signature_with_signed_data(&self, signed_data: &SignedData) -> Result<()> {
        let cert = self
            .find_certificate(signed_data.certificates())
            .ok_or_else(|| SignatureError::Crypto("signing certificate not found".into()))?;

        self.verify_signature_with_certificate(
            cert,
            &self.signed_content(signed_data.signed_content()),
        )
    }

    /// Verify the signature against the public key of an explicit certificate.
    ///
    /// `signed_content` is the message the signature was made over. See
    /// [Self::signed_content()] for how it is derived.
    pub fn verify_signature_with_certificate(
        &self,
        cert: &CapturedX509Certificate,
        signed_content: &[u8],
    ) -> Result<()> {
        let key_algorithm = cert.key_algorithm().ok_or_else(|| {
            SignatureError::Crypto(format!(
                "unknown certificate key algorithm: {}",
                cert.key_algorithm_oid()
            ))
        })?;

        provider::current()?.verify_signature(
            key_algorithm,
            self.signature_algorithm,
            &cert.public_key_data(),
            signed_content,
            &self.signature,
        )
    }

    /// Verifies the digest stored in signed attributes matches that of content in a `SignedData`.
    ///
    /// If signed attributes are present on this instance, they must contain
    /// a `message-digest` attribute defining the digest of data that was
    /// signed. The digested data comes from the encapsulated content
    /// within `SignedData` (`SignedData.signed_content()`).
    ///
    /// # IMPORTANT SECURITY LIMITATIONS
    ///
    /// This method only performs message digest verification. It:
    ///
    /// * DOES NOT verify the signature over the signed data or anything about
    ///   the signer.
    /// * DOES NOT validate that the digest algorithm is strong/appropriate.
    /// * DOES NOT compare the digests in a manner that is immune to timing
    ///   side-channels.
    ///
    /// See the crate's documentation for more on the security implications.
    pub fn verify_message_digest_with_signed_data(&self, signed_data: &SignedData) -> Result<()> {
        self.verify_message_digest_with_content(signed_data.signed_content().unwrap_or_default())
    }

    /// Verifies the message digest stored in signed attributes using explicit content.
    ///
    /// Detached signatures don't carry their content, so the caller supplies
    /// it. The security limitations from
    /// [SignerInfo::verify_message_digest_with_signed_data] apply to this
    /// function as well.
    pub fn verify_message_digest_with_content(&self, data: &[u8]) -> Result<()> {
        let signed_attributes = self
            .signed_attributes()
            .ok_or_else(|| SignatureError::Crypto("no signed attributes".into()))?;

        let wanted_digest: &[u8] = signed_attributes.message_digest.as_ref();
        let got_digest = self.compute_digest(Some(data));

        // Susceptible to timing side-channel but we don't care per function
        // documentation.
        if wanted_digest == got_digest.as_slice() {
            Ok(())
        } else {
            Err(SignatureError::Crypto(
                "message digest does not match content".into(),
            ))
        }
    }

    /// Decode the time-stamp token attached as an unsigned attribute.
    ///
    /// Returns `Ok(None)` if there is no time-stamp token and `Err` if the
    /// token cannot be parsed.
    pub fn time_stamp_token(&self) -> Result<Option<TimestampToken>> {
        match self
            .unsigned_attributes
            .as_ref()
            .and_then(|attrs| attrs.time_stamp_token.as_ref())
        {
            Some(token) => Ok(Some(TimestampToken::from_ber(token.as_slice())?)),
            None => Ok(None),
        }
    }

    /// Verify the time-stamp token in this instance.
    ///
    /// The token must be cryptographically valid on its own and its message
    /// imprint must be the digest of this signer's signature value.
    ///
    /// Returns `Ok(None)` if there is no time-stamp token and `Ok(Some(()))` if
    /// there is and the token validates. `Err` occurs on any parse or verification
    /// error.
    pub fn verify_time_stamp_token(&self) -> Result<Option<()>> {
        let token = if let Some(token) = self.time_stamp_token()? {
            token
        } else {
            return Ok(None);
        };

        token.verify_signature()?;
        token.verify_imprint(&self.signature)?;

        Ok(Some(()))
    }

    /// Obtain the raw bytes of content that were digested and signed.
    ///
    /// The returned value is the message that was signed and whose signature
    /// of which needs to be verified.
    ///
    /// The optional content argument is the `encapContentInfo eContent`
    /// field, typically the value of `SignedData.signed_content()`.
    pub fn signed_content(&self, content: Option<&[u8]>) -> Vec<u8> {
        // Per RFC 5652 Section 5.4:
        //
        //    The result of the message digest calculation process depends on
        //    whether the signedAttrs field is present.  When the field is absent,
        //    the result is just the message digest of the content as described
        //    above.  When the field is present, however, the result is the message
        //    digest of the complete DER encoding of the SignedAttrs value
        //    contained in the signedAttrs field.

        if let Some(signed_attributes_data) = &self.digested_signed_attributes_data {
            signed_attributes_data.clone()
        } else if let Some(content) = content {
            content.to_vec()
        } else {
            vec![]
        }
    }

    /// Obtain the raw bytes constituting `SignerInfo.signedAttrs` as encoded for signatures.
    ///
    /// This should always be `Some` if the instance was constructed from an ASN.1
    /// value that had signed attributes.
    pub fn signed_attributes_data(&self) -> Option<&[u8]> {
        self.digested_signed_attributes_data.as_deref()
    }

    /// Compute a message digest using the configured algorithm.
    pub fn compute_digest(&self, content: Option<&[u8]>) -> Vec<u8> {
        self.digest_algorithm
            .digest_data(content.unwrap_or_default())
    }
}

/// Obtain the value of a certificate's subject key identifier extension.
pub(crate) fn certificate_subject_key_identifier(cert: &CapturedX509Certificate) -> Option<Vec<u8>> {
    cert.iter_extensions()
        .find(|ext| ext.id == OID_SUBJECT_KEY_IDENTIFIER)
        .and_then(|ext| {
            // extnValue wraps a DER KeyIdentifier OCTET STRING.
            bcder::decode::Constructed::decode(ext.value.to_bytes(), bcder::Mode::Der, |cons| {
                OctetString::take_from(cons)
            })
            .ok()
        })
        .map(|ski| ski.to_bytes().to_vec())
}

fn single_attribute_value<'a>(
    attributes: &'a [crate::asn1::rfc5652::Attribute],
    oid: bcder::ConstOid,
    name: &str,
) -> Result<Option<&'a Captured>> {
    match attributes.iter().find(|attr| attr.typ == oid) {
        Some(attr) => match attr.values.as_slice() {
            [value] => Ok(Some(value.deref())),
            _ => Err(SignatureError::Parsing(format!(
                "{} attribute must have exactly 1 value",
                name
            ))),
        },
        None => Ok(None),
    }
}

impl TryFrom<&crate::asn1::rfc5652::SignerInfo> for SignerInfo {
    type Error = SignatureError;

    fn try_from(signer_info: &crate::asn1::rfc5652::SignerInfo) -> Result<Self> {
        let digest_algorithm = DigestAlgorithm::try_from(&signer_info.digest_algorithm)
            .map_err(|e| SignatureError::Parsing(e.to_string()))?;

        // The "signature" algorithm can also be a key algorithm identifier. So we
        // attempt to resolve using the more robust mechanism.
        let signature_algorithm = SignatureAlgorithm::from_oid_and_digest_algorithm(
            &signer_info.signature_algorithm.algorithm,
            digest_algorithm,
        )
        .map_err(|e| SignatureError::Parsing(e.to_string()))?;

        let signature = signer_info.signature.to_bytes().to_vec();

        let signed_attributes = if let Some(attributes) = &signer_info.signed_attributes {
            // Content type attribute MUST be present.
            let content_type =
                single_attribute_value(attributes, OID_CONTENT_TYPE, "content-type")?
                    .ok_or_else(|| {
                        SignatureError::Parsing("content-type attribute missing".into())
                    })?
                    .clone()
                    .decode(|cons| Oid::take_from(cons))
                    .map_err(|e| {
                        SignatureError::Parsing(format!("malformed content-type: {}", e))
                    })?;

            // Message digest attribute MUST be present.
            let message_digest =
                single_attribute_value(attributes, OID_MESSAGE_DIGEST, "message-digest")?
                    .ok_or_else(|| {
                        SignatureError::Parsing("message-digest attribute missing".into())
                    })?
                    .clone()
                    .decode(|cons| OctetString::take_from(cons))
                    .map_err(|e| {
                        SignatureError::Parsing(format!("malformed message-digest: {}", e))
                    })?
                    .to_bytes()
                    .to_vec();

            // Signing time is optional, but common. So we pull it out for convenience.
            let signing_time = single_attribute_value(attributes, OID_SIGNING_TIME, "signing-time")?
                .map(|value| {
                    value
                        .clone()
                        .decode(|cons| Time::take_from(cons))
                        .map(chrono::DateTime::<chrono::Utc>::from)
                        .map_err(|e| {
                            SignatureError::Parsing(format!("malformed signing-time: {}", e))
                        })
                })
                .transpose()?;

            Some(SignedAttributes {
                content_type,
                message_digest,
                signing_time,
                raw: attributes.clone(),
            })
        } else {
            None
        };

        let digested_signed_attributes_data = signer_info.signed_attributes_digested_content()?;

        let unsigned_attributes = if let Some(attributes) = &signer_info.unsigned_attributes {
            let time_stamp_token =
                single_attribute_value(attributes, OID_TIME_STAMP_TOKEN, "time-stamp token")?
                    .cloned();

            Some(UnsignedAttributes { time_stamp_token })
        } else {
            None
        };

        Ok(SignerInfo {
            sid: signer_info.sid.clone(),
            digest_algorithm,
            signature_algorithm,
            signature,
            signed_attributes,
            digested_signed_attributes_data,
            unsigned_attributes,
        })
    }
}

/// Represents the contents of a CMS SignedAttributes structure.
///
/// This is a high-level interface to the SignedAttributes ASN.1 type.
#[derive(Clone)]
pub struct SignedAttributes {
    /// The content type of the value being signed.
    ///
    /// This is often `OID_ID_DATA`.
    content_type: Oid,

    /// Holds the digest of the content that was signed.
    message_digest: Vec<u8>,

    /// The time the signature was created.
    signing_time: Option<chrono::DateTime<chrono::Utc>>,

    /// The raw ASN.1 signed attributes.
    raw: crate::asn1::rfc5652::SignedAttributes,
}

impl SignedAttributes {
    pub fn content_type(&self) -> &Oid {
        &self.content_type
    }

    pub fn message_digest(&self) -> &[u8] {
        &self.message_digest
    }

    pub fn signing_time(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        self.signing_time.as_ref()
    }

    pub fn attributes(&self) -> &crate::asn1::rfc5652::SignedAttributes {
        &self.raw
    }
}

impl Debug for SignedAttributes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("SignedAttributes");
        s.field("content_type", &format_args!("{}", self.content_type));
        s.field(
            "message_digest",
            &format_args!("{}", hex::encode(&self.message_digest)),
        );
        s.field("signing_time", &self.signing_time);
        s.finish()
    }
}

#[derive(Clone)]
pub struct UnsignedAttributes {
    /// Time-Stamp Token from a Time-Stamp Protocol server.
    ///
    /// Held as the encoded `ContentInfo` and decoded on demand, so a broken
    /// token never prevents verifying the signature it is attached to.
    time_stamp_token: Option<Captured>,
}

impl Debug for UnsignedAttributes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("UnsignedAttributes");
        s.field(
            "time_stamp_token",
            &format_args!(
                "{:?}",
                self.time_stamp_token
                    .as_ref()
                    .map(|token| hex::encode(token.as_slice()))
            ),
        );
        s.finish()
    }
}

impl UnsignedAttributes {
    pub fn has_time_stamp_token(&self) -> bool {
        self.time_stamp_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{asn1::rfc5652::OID_ID_DATA, testutil::*},
    };

    #[test]
    fn parse_openssl_signature() {
        crate::provider::install_default();

        let signed_data = SignedData::parse_ber(OPENSSL_DETACHED_DER).unwrap();

        assert!(signed_data.signed_content().is_none());
        assert_eq!(signed_data.certificates().count(), 2);
        assert_eq!(
            signed_data.digest_algorithms().collect::<Vec<_>>(),
            vec![&DigestAlgorithm::Sha256]
        );

        let signers = signed_data.signers().collect::<Vec<_>>();
        assert_eq!(signers.len(), 1);

        let signer = signers[0];
        assert_eq!(signer.signature_algorithm(), SignatureAlgorithm::RsaSha256);
        assert_eq!(
            signer.signed_attributes().unwrap().content_type(),
            &OID_ID_DATA
        );
        assert!(signer.signed_attributes().unwrap().signing_time().is_some());

        let (_, serial) = signer.certificate_issuer_and_serial().unwrap();
        assert_eq!(serial, &Integer::from(4097u32));

        let cert = signer.find_certificate(signed_data.certificates()).unwrap();
        assert_eq!(cert.subject_common_name().as_deref(), Some("Mario Rossi"));

        signer.verify_signature_with_signed_data(&signed_data).unwrap();
        signer
            .verify_message_digest_with_content(HELLO_CYPHER)
            .unwrap();
        assert!(signer
            .verify_message_digest_with_content(b"hello cypher!")
            .is_err());

        // Detached, so there is nothing to check the digest against.
        assert!(signer
            .verify_message_digest_with_signed_data(&signed_data)
            .is_err());
        assert!(signer.time_stamp_token().unwrap().is_none());
    }

    #[test]
    fn subject_key_identifier_lookup() {
        let cert = rossi_cert();
        let ski = certificate_subject_key_identifier(&cert).unwrap();
        assert_eq!(ski.len(), 20);

        assert!(certificate_subject_key_identifier(&ca_cert()).is_some());
    }
}
