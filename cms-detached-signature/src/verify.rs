// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Verification of existing signatures.

Verification is best-effort per signer. Each `SignerInfo` is matched to a
certificate embedded in the structure and checked on its own, so a signer
that cannot be matched or verified never prevents reporting on its
siblings. Only input that is not a `SignedData` at all is an error.

# IMPORTANT SECURITY LIMITATIONS

Certificates are only used as carriers of public keys and identity fields.
Their chains, validity periods and revocation status are not checked.
*/

use {
    crate::{
        asn1::rfc5652::{
            CertificateSet, SignerInfos, OID_ID_SIGNED_DATA,
        },
        error::{Result, SignatureError},
        parse_certificates, provider, SignerInfo,
    },
    bcder::{
        decode::{Constructed, DecodeError, Source},
        ConstOid, Mode, Oid, Tag,
    },
    bytes::Bytes,
    chrono::{DateTime, Utc},
    log::{debug, warn},
    std::{collections::BTreeMap, io::Read},
    x509_certificate::CapturedX509Certificate,
};

/// Given name (GN) attribute of X.520 names.
///
/// 2.5.4.42
const OID_GIVEN_NAME: ConstOid = Oid(&[85, 4, 42]);

/// Surname (SN) attribute of X.520 names.
///
/// 2.5.4.4
const OID_SURNAME: ConstOid = Oid(&[85, 4, 4]);

/// Serial number attribute of X.520 names.
///
/// Qualified certificates carry the holder's fiscal code here.
///
/// 2.5.4.5
const OID_SERIAL_NUMBER: ConstOid = Oid(&[85, 4, 5]);

/// The outcome of verifying a single signer.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VerificationResult {
    /// Whether the signature verified against the matched certificate.
    pub verified: bool,
    /// Common name of the signing certificate's subject.
    pub full_name: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    /// Fiscal code derived from the subject's serial number attribute.
    pub fiscal_code: Option<String>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    /// Content digest recorded in the signed attributes.
    pub message_digest: Option<Vec<u8>>,
    /// Time recorded in the `signing-time` signed attribute.
    pub signing_time: Option<DateTime<Utc>>,
    /// Generation time of an attached time-stamp token.
    pub timestamp: Option<DateTime<Utc>>,
    /// Whether the attached time-stamp token verified and stamps this signature.
    pub timestamp_verified: bool,
}

/// Verification results keyed by signer position.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VerificationReport(BTreeMap<usize, VerificationResult>);

impl VerificationReport {
    /// Number of signers whose signature verified.
    pub fn verified_count(&self) -> usize {
        self.0.values().filter(|result| result.verified).count()
    }

    pub fn total_signers(&self) -> usize {
        self.0.len()
    }

    /// Obtain the result of the signer at `index`.
    pub fn get(&self, index: usize) -> Option<&VerificationResult> {
        self.0.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &VerificationResult)> {
        self.0.iter()
    }

    /// Flatten into `signer<index>.<field>` properties.
    ///
    /// Absent fields produce no property. Times are RFC 3339 and digests
    /// are hex.
    pub fn to_properties(&self) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();

        for (index, result) in &self.0 {
            let mut set = |field: &str, value: String| {
                properties.insert(format!("signer{}.{}", index, field), value);
            };

            set("verified", result.verified.to_string());

            for (field, value) in [
                ("full_name", &result.full_name),
                ("given_name", &result.given_name),
                ("surname", &result.surname),
                ("fiscal_code", &result.fiscal_code),
            ] {
                if let Some(value) = value {
                    set(field, value.clone());
                }
            }

            for (field, value) in [
                ("not_before", &result.not_before),
                ("not_after", &result.not_after),
                ("signing_time", &result.signing_time),
                ("timestamp", &result.timestamp),
            ] {
                if let Some(value) = value {
                    set(field, value.to_rfc3339());
                }
            }

            if let Some(digest) = &result.message_digest {
                set("message_digest", hex::encode(digest));
            }

            if result.timestamp.is_some() {
                set("timestamp_verified", result.timestamp_verified.to_string());
            }
        }

        properties
    }
}

/// Aggregate counts produced by [verify_stream].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StreamSummary {
    pub verified_count: usize,
    pub total_signers: usize,
}

/// Derive a fiscal code from a certificate serial number attribute.
///
/// Values look like `TINIT-RSSMRA80A01H501U` or `CF:RSSMRA80A01H501U`. The
/// code follows the first `:`, else the first `-`. Without a separator,
/// a 3 character prefix is dropped from values longer than that.
pub fn extract_fiscal_code(value: &str) -> String {
    let code = if let Some((_, code)) = value.split_once(':') {
        code
    } else if let Some((_, code)) = value.split_once('-') {
        code
    } else if let Some((offset, _)) = value.char_indices().nth(3) {
        &value[offset..]
    } else {
        value
    };

    code.trim().to_uppercase()
}

fn decode_input(data: &[u8], decode_base64: bool) -> Result<Vec<u8>> {
    if decode_base64 {
        let text = data
            .iter()
            .filter(|b| !b.is_ascii_whitespace())
            .copied()
            .collect::<Vec<_>>();

        base64::decode(text)
            .map_err(|e| SignatureError::Parsing(format!("invalid base64 signature: {}", e)))
    } else {
        Ok(data.to_vec())
    }
}

fn parse_signed_data(data: &[u8]) -> Result<crate::asn1::rfc5652::SignedData> {
    crate::asn1::rfc5652::SignedData::decode_ber(data)
        .map_err(|e| SignatureError::Parsing(format!("malformed SignedData: {}", e)))
}

fn embedded_certificates(raw: &crate::asn1::rfc5652::SignedData) -> Vec<CapturedX509Certificate> {
    parse_certificates(raw)
        .into_iter()
        .filter_map(|cert| match cert {
            Ok(cert) => Some(cert),
            Err(e) => {
                warn!("ignoring embedded certificate: {}", e);
                None
            }
        })
        .collect()
}

/// Verify one signer, checking the content digest when content is given.
fn verify_signer(
    index: usize,
    signer: &SignerInfo,
    certificates: &[CapturedX509Certificate],
    content: Option<&[u8]>,
) -> VerificationResult {
    let mut result = VerificationResult::default();

    if let Some(attributes) = signer.signed_attributes() {
        result.message_digest = Some(attributes.message_digest().to_vec());
        result.signing_time = attributes.signing_time().copied();
    }

    match signer.time_stamp_token() {
        Ok(Some(token)) => {
            result.timestamp = Some(token.gen_time());
            result.timestamp_verified = match signer.verify_time_stamp_token() {
                Ok(verified) => verified.is_some(),
                Err(e) => {
                    warn!("signer {}: time-stamp token does not verify: {}", index, e);
                    false
                }
            };
        }
        Ok(None) => {}
        Err(e) => warn!("signer {}: unreadable time-stamp token: {}", index, e),
    }

    let cert = if let Some(cert) = signer.find_certificate(certificates.iter()) {
        cert
    } else {
        warn!("signer {}: no embedded certificate matches", index);
        return result;
    };

    let verified = signer
        .verify_signature_with_certificate(cert, &signer.signed_content(content))
        .and_then(|_| match content {
            Some(content) => signer.verify_message_digest_with_content(content),
            None => Ok(()),
        });

    if let Err(e) = &verified {
        warn!("signer {}: {}", index, e);
    }
    result.verified = verified.is_ok();

    let subject = cert.subject_name();
    let attribute = |oid: ConstOid| {
        subject
            .find_first_attribute_string(Oid(Bytes::copy_from_slice(oid.as_ref())))
            .ok()
            .flatten()
    };

    result.full_name = cert.subject_common_name();
    result.given_name = attribute(OID_GIVEN_NAME);
    result.surname = attribute(OID_SURNAME);
    result.fiscal_code = attribute(OID_SERIAL_NUMBER).map(|value| extract_fiscal_code(&value));
    result.not_before = Some(cert.validity_not_before());
    result.not_after = Some(cert.validity_not_after());

    result
}

fn verify_all(data: &[u8], content: Option<&[u8]>, decode_base64: bool) -> Result<VerificationReport> {
    provider::current()?;

    let data = decode_input(data, decode_base64)?;
    let raw = parse_signed_data(&data)?;
    let certificates = embedded_certificates(&raw);

    let results = raw
        .signer_infos
        .iter()
        .enumerate()
        .map(|(index, signer)| {
            let result = match SignerInfo::try_from(signer) {
                Ok(signer) => verify_signer(index, &signer, &certificates, content),
                Err(e) => {
                    warn!("signer {}: malformed SignerInfo: {}", index, e);
                    VerificationResult::default()
                }
            };

            (index, result)
        })
        .collect::<BTreeMap<_, _>>();

    let report = VerificationReport(results);
    debug!(
        "verified {} of {} signer(s)",
        report.verified_count(),
        report.total_signers()
    );

    Ok(report)
}

/// Verify every signer of an encoded `SignedData`.
///
/// `data` is a BER or DER `ContentInfo`, or its base64 encoding when
/// `decode_base64` is set. Only signatures are checked: detached content is
/// not available to compare digests against. Use [verify_detached] for that.
pub fn verify(data: &[u8], decode_base64: bool) -> Result<VerificationReport> {
    verify_all(data, None, decode_base64)
}

/// Verify every signer of a detached signature over `content`.
///
/// In addition to [verify], each signer's `message-digest` attribute must
/// match the digest of `content`.
pub fn verify_detached(
    data: &[u8],
    content: &[u8],
    decode_base64: bool,
) -> Result<VerificationReport> {
    verify_all(data, Some(content), decode_base64)
}

/// Skip every value left in `cons`.
///
/// Unlike [Constructed::skip_all] this stops cleanly at the end-of-contents
/// marker of an indefinite length value.
fn skip_remaining<S: Source>(cons: &mut Constructed<S>) -> Result<(), DecodeError<S::Error>> {
    while cons.skip_opt(|_, _, _| Ok(()))?.is_some() {}

    Ok(())
}

/// The parts of a `SignedData` retained by [verify_stream].
struct StreamedSignedData {
    certificates: Option<CertificateSet>,
    signer_infos: SignerInfos,
}

impl StreamedSignedData {
    fn decode<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let oid = Oid::take_from(cons)?;

            if oid != OID_ID_SIGNED_DATA {
                return Err(cons.content_err("expected signed data OID"));
            }

            cons.take_constructed_if(Tag::CTX_0, |cons| {
                cons.take_sequence(|cons| {
                    // version and digestAlgorithms
                    cons.skip_one()?;
                    cons.skip_one()?;

                    cons.take_sequence(|cons| {
                        Oid::take_from(cons)?;
                        // Drain any encapsulated content without keeping it.
                        cons.take_opt_constructed_if(Tag::CTX_0, skip_remaining)?;

                        Ok(())
                    })?;

                    let certificates = cons
                        .take_opt_constructed_if(Tag::CTX_0, |cons| CertificateSet::take_from(cons))?;
                    cons.take_opt_constructed_if(Tag::CTX_1, skip_remaining)?;
                    let signer_infos = SignerInfos::take_from(cons)?;

                    Ok(Self {
                        certificates,
                        signer_infos,
                    })
                })
            })
        })
    }
}

/// Verify a signature read from a stream, reporting aggregate counts.
///
/// The structure is walked once. Encapsulated content is skipped rather than
/// copied and no identity fields are extracted. The encoded input itself is
/// still read into memory before decoding.
pub fn verify_stream(mut reader: impl Read, decode_base64: bool) -> Result<StreamSummary> {
    let provider = provider::current()?;

    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    let data = decode_input(&data, decode_base64)?;

    let streamed = Constructed::decode(data.as_slice(), Mode::Ber, |cons| {
        StreamedSignedData::decode(cons)
    })
    .map_err(|e| SignatureError::Parsing(format!("malformed SignedData: {}", e)))?;

    let certificates = streamed
        .certificates
        .iter()
        .flat_map(|certs| certs.iter())
        .filter_map(|choice| match choice {
            crate::asn1::rfc5652::CertificateChoices::Certificate(cert) => {
                CapturedX509Certificate::from_ber(cert.as_slice().to_vec()).ok()
            }
            crate::asn1::rfc5652::CertificateChoices::Other(_) => None,
        })
        .collect::<Vec<_>>();

    let mut summary = StreamSummary {
        verified_count: 0,
        total_signers: streamed.signer_infos.len(),
    };

    for signer in streamed.signer_infos.iter() {
        let verified = SignerInfo::try_from(signer).and_then(|signer| {
            let cert = signer
                .find_certificate(certificates.iter())
                .ok_or_else(|| SignatureError::Crypto("signing certificate not found".into()))?;

            signer.verify_signature_with_certificate(cert, &signer.signed_content(None))
        });

        if verified.is_ok() {
            summary.verified_count += 1;
        }
    }

    debug!(
        "{} stream verification: {} of {} signer(s)",
        provider.name(),
        summary.verified_count,
        summary.total_signers
    );

    Ok(summary)
}
