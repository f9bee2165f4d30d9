// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Functionality for producing detached signatures. */

use {
    crate::{
        asn1::rfc5652::{
            Attribute, AttributeValue, CertificateChoices, CertificateSet, CmsVersion,
            DigestAlgorithmIdentifiers, EncapsulatedContentInfo, IssuerAndSerialNumber,
            SignatureValue, SignedAttributes, SignedData, SignerIdentifier, SignerInfo,
            SignerInfos, OID_CONTENT_TYPE, OID_ID_DATA, OID_MESSAGE_DIGEST, OID_SIGNING_TIME,
        },
        augment, der,
        error::{Result, SignatureError},
        identity::SigningIdentity,
        provider,
        time_stamp_protocol::{TimeStampProvider, TimestampClient, TimestampClientSettings},
    },
    bcder::{
        encode::{PrimitiveContent, Values},
        Captured, ConstOid, Mode, OctetString, Oid,
    },
    bytes::Bytes,
    chrono::{DateTime, Utc},
    log::{debug, info},
    reqwest::IntoUrl,
    std::sync::Arc,
    x509_certificate::{asn1time::UtcTime, DigestAlgorithm},
};

/// Settings controlling signature generation.
#[derive(Clone)]
pub struct SigningSettings {
    signature_size: usize,
    signing_time: Option<DateTime<Utc>>,
    time_stamp_provider: Option<Arc<dyn TimeStampProvider>>,
}

impl Default for SigningSettings {
    fn default() -> Self {
        Self {
            signature_size: Self::DEFAULT_SIGNATURE_SIZE,
            signing_time: None,
            time_stamp_provider: None,
        }
    }
}

impl std::fmt::Debug for SigningSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSettings")
            .field("signature_size", &self.signature_size)
            .field("signing_time", &self.signing_time)
            .field("time_stamp_provider", &self.time_stamp_provider.is_some())
            .finish()
    }
}

impl SigningSettings {
    /// Bytes reserved for a signature unless configured otherwise.
    pub const DEFAULT_SIGNATURE_SIZE: usize = 16_000;

    /// Maximum size in bytes of an emitted signature.
    ///
    /// This is the size of the placeholder a host document reserves for
    /// the signature.
    pub fn signature_size(&self) -> usize {
        self.signature_size
    }

    pub fn set_signature_size(&mut self, size: usize) {
        self.signature_size = size;
    }

    /// The time recorded in the `signing-time` attribute.
    ///
    /// `None` means the current time at signing.
    pub fn signing_time(&self) -> Option<&DateTime<Utc>> {
        self.signing_time.as_ref()
    }

    pub fn set_signing_time(&mut self, time: DateTime<Utc>) {
        self.signing_time = Some(time);
    }

    pub fn time_stamp_provider(&self) -> Option<&dyn TimeStampProvider> {
        self.time_stamp_provider.as_deref()
    }

    /// Time-stamp signatures with the given provider.
    pub fn set_time_stamp_provider(&mut self, provider: impl TimeStampProvider + 'static) {
        self.time_stamp_provider = Some(Arc::new(provider));
    }

    /// Time-stamp signatures through an RFC 3161 server over HTTP.
    pub fn set_time_stamp_url(&mut self, url: impl IntoUrl) -> Result<()> {
        self.set_time_stamp_provider(TimestampClient::new(TimestampClientSettings::new(url)?));

        Ok(())
    }
}

/// Produces detached CMS `SignedData` signatures.
#[derive(Clone, Debug, Default)]
pub struct SignatureBuilder {
    settings: SigningSettings,
}

impl SignatureBuilder {
    pub fn new(settings: SigningSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SigningSettings {
        &self.settings
    }

    /// Sign `content` with a single identity.
    ///
    /// Returns the DER encoded `ContentInfo` holding a detached `SignedData`.
    pub fn sign(&self, content: &[u8], identity: &SigningIdentity) -> Result<Vec<u8>> {
        self.sign_with_identities(content, &[identity])
    }

    /// Sign `content` and encode the signature as base64.
    pub fn sign_base64(&self, content: &[u8], identity: &SigningIdentity) -> Result<String> {
        Ok(base64::encode(self.sign(content, identity)?))
    }

    /// Sign `content` with several identities.
    ///
    /// Every identity contributes a `SignerInfo` and its certificate chain.
    /// When time-stamping is configured, the first signer is time-stamped.
    pub fn sign_with_identities(
        &self,
        content: &[u8],
        identities: &[&SigningIdentity],
    ) -> Result<Vec<u8>> {
        if identities.is_empty() {
            return Err(SignatureError::Key("no signing identity provided".into()));
        }

        let provider = provider::current()?;
        let digest = provider.digest(content);
        let signing_time = self.settings.signing_time.unwrap_or_else(Utc::now);

        let mut signed_data = build_signed_data(
            &Oid(Bytes::copy_from_slice(OID_ID_DATA.as_ref())),
            None,
            &digest,
            identities,
            signing_time,
        )?;

        if let Some(tsa) = &self.settings.time_stamp_provider {
            let signature = signed_data
                .signer_infos
                .first()
                .map(|signer| signer.signature.to_bytes())
                .ok_or_else(|| SignatureError::Crypto("no signature produced".into()))?;

            let token = tsa.stamp(&provider.digest(&signature))?;
            signed_data = augment::add_timestamp(&signed_data, &token)?;
        }

        let der = der::to_der(&signed_data.encode_ber()?)?;

        if der.len() > self.settings.signature_size {
            return Err(SignatureError::CapacityExceeded {
                size: der.len(),
                capacity: self.settings.signature_size,
            });
        }

        info!(
            "produced {} byte signature with {} signer(s)",
            der.len(),
            identities.len()
        );

        Ok(der)
    }
}

fn attribute(typ: ConstOid, value: impl Values) -> Attribute {
    Attribute {
        typ: Oid(Bytes::copy_from_slice(typ.as_ref())),
        values: vec![AttributeValue::new(Captured::from_values(Mode::Der, value))],
    }
}

/// Build a `SignerInfo` over content with the given digest.
pub(crate) fn signer_info(
    identity: &SigningIdentity,
    content_type: &Oid,
    content_digest: &[u8],
    signing_time: DateTime<Utc>,
) -> Result<SignerInfo> {
    let cert = identity.leaf();
    let key = identity.key();

    let signature_algorithm = key
        .signature_algorithm()
        .map_err(|e| SignatureError::Key(format!("unusable signing key: {}", e)))?;

    let mut signed_attributes = SignedAttributes::default();
    signed_attributes.push(attribute(OID_CONTENT_TYPE, content_type.encode_ref()));
    signed_attributes.push(attribute(OID_SIGNING_TIME, UtcTime::from(signing_time).encode()));
    signed_attributes.push(attribute(OID_MESSAGE_DIGEST, content_digest.encode()));
    signed_attributes.sort_der()?;

    let mut signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: cert.issuer_name().clone(),
            serial_number: cert.serial_number_asn1().clone(),
        }),
        digest_algorithm: DigestAlgorithm::Sha256.into(),
        signed_attributes: Some(signed_attributes),
        signature_algorithm: signature_algorithm.into(),
        signature: SignatureValue::new(Bytes::new()),
        unsigned_attributes: None,
        signed_attributes_data: None,
    };

    let signed_content = signer_info
        .signed_attributes_digested_content()?
        .ok_or_else(|| SignatureError::Crypto("signed attributes missing".into()))?;

    let signature = key
        .try_sign(&signed_content)
        .map_err(|e| SignatureError::Crypto(format!("signing failed: {}", e)))?;

    signer_info.signature = SignatureValue::new(Bytes::from(signature));

    debug!(
        "signed {} bytes of attributes for {}",
        signed_content.len(),
        cert.subject_common_name().unwrap_or_default()
    );

    Ok(signer_info)
}

/// Assemble a `SignedData` signed by every identity.
///
/// `content` is embedded as `eContent` when given. Detached signatures pass
/// `None`. Time-stamp tokens embed their encoded `TSTInfo`, which is how the
/// in-process test authority builds its replies.
///
/// Embedded certificates are sorted so the `SET OF` is in DER order.
pub(crate) fn build_signed_data(
    content_type: &Oid,
    content: Option<&[u8]>,
    content_digest: &[u8],
    identities: &[&SigningIdentity],
    signing_time: DateTime<Utc>,
) -> Result<SignedData> {
    let mut signer_infos = SignerInfos::default();
    let mut certificates = CertificateSet::default();

    for identity in identities {
        signer_infos.push(signer_info(
            identity,
            content_type,
            content_digest,
            signing_time,
        )?);

        for cert in identity.chain() {
            let choice = CertificateChoices::from_certificate_der(cert.constructed_data())
                .map_err(|e| SignatureError::Key(format!("malformed certificate: {}", e)))?;

            if !certificates.contains(&choice) {
                certificates.push(choice);
            }
        }
    }

    certificates.sort_der();

    let mut digest_algorithms = DigestAlgorithmIdentifiers::default();
    digest_algorithms.push(DigestAlgorithm::Sha256.into());

    Ok(SignedData {
        version: CmsVersion::V1,
        digest_algorithms,
        content_info: EncapsulatedContentInfo {
            content_type: content_type.clone(),
            content: content.map(|data| OctetString::new(Bytes::copy_from_slice(data))),
        },
        certificates: Some(certificates),
        crls: None,
        signer_infos,
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::ErrorKind, testutil::*, verify},
        chrono::TimeZone,
        httpmock::prelude::*,
    };

    #[test]
    fn sign_hello_cypher() {
        crate::provider::install_default();

        let identity = rossi_identity();
        let builder = SignatureBuilder::default();
        let der = builder.sign(HELLO_CYPHER, &identity).unwrap();

        assert_eq!(der::to_der(&der).unwrap(), der);
        assert!(der.len() <= SigningSettings::DEFAULT_SIGNATURE_SIZE);

        let report = verify::verify_detached(&der, HELLO_CYPHER, false).unwrap();
        assert_eq!(report.total_signers(), 1);
        assert_eq!(report.verified_count(), 1);

        let result = report.get(0).unwrap();
        assert_eq!(
            result.message_digest.as_deref(),
            Some(ring::digest::digest(&ring::digest::SHA256, HELLO_CYPHER).as_ref())
        );
        assert_eq!(result.full_name.as_deref(), Some("Mario Rossi"));
    }

    #[test]
    fn detached_structure() {
        crate::provider::install_default();

        let mut settings = SigningSettings::default();
        let when = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        settings.set_signing_time(when);

        let der = SignatureBuilder::new(settings)
            .sign(HELLO_CYPHER, &rossi_identity())
            .unwrap();

        let raw = SignedData::decode_ber(&der).unwrap();
        assert_eq!(raw.content_info.content_type, OID_ID_DATA);
        assert!(raw.content_info.content.is_none());
        assert_eq!(raw.certificates.as_ref().unwrap().len(), 2);

        let signed_data = crate::SignedData::parse_ber(&der).unwrap();
        let signer = signed_data.signers().next().unwrap();
        assert_eq!(
            signer.signature_algorithm(),
            x509_certificate::SignatureAlgorithm::RsaSha256
        );
        assert_eq!(
            signer.signed_attributes().unwrap().signing_time(),
            Some(&when)
        );
        signer
            .verify_signature_with_signed_data(&signed_data)
            .unwrap();
        signer
            .verify_message_digest_with_content(HELLO_CYPHER)
            .unwrap();
    }

    #[test]
    fn signed_attributes_are_sorted() {
        crate::provider::install_default();

        let der = SignatureBuilder::default()
            .sign(HELLO_CYPHER, &rossi_identity())
            .unwrap();
        let raw = SignedData::decode_ber(&der).unwrap();
        let attributes = raw.signer_infos[0].signed_attributes.clone().unwrap();

        let mut sorted = attributes.clone();
        sorted.sort_der().unwrap();
        assert_eq!(attributes, sorted);
        assert_eq!(attributes.len(), 3);
    }

    #[test]
    fn certificates_are_sorted() {
        crate::provider::install_default();

        let rossi = rossi_identity();
        let bianchi = bianchi_identity();

        for identities in [[&rossi, &bianchi], [&bianchi, &rossi]] {
            let der = SignatureBuilder::default()
                .sign_with_identities(HELLO_CYPHER, &identities)
                .unwrap();
            let raw = SignedData::decode_ber(&der).unwrap();

            let encodings = raw
                .certificates
                .as_ref()
                .unwrap()
                .iter()
                .map(|cert| cert.as_slice().to_vec())
                .collect::<Vec<_>>();
            let mut sorted = encodings.clone();
            sorted.sort();

            assert_eq!(encodings.len(), 3);
            assert_eq!(encodings, sorted);
        }
    }

    #[test]
    fn subject_key_identifier_signer() {
        crate::provider::install_default();

        let identity = rossi_identity();
        let ski = crate::certificate_subject_key_identifier(identity.leaf()).unwrap();
        let digest = provider::current().unwrap().digest(HELLO_CYPHER);

        let mut raw = build_signed_data(
            &Oid(Bytes::copy_from_slice(OID_ID_DATA.as_ref())),
            None,
            &digest,
            &[&identity],
            Utc::now(),
        )
        .unwrap();

        // Only the signed attributes are covered by the signature.
        raw.signer_infos[0].version = CmsVersion::V3;
        raw.signer_infos[0].sid =
            SignerIdentifier::SubjectKeyIdentifier(OctetString::new(Bytes::from(ski.clone())));
        let der = der::to_der(&raw.encode_ber().unwrap()).unwrap();

        let signed_data = crate::SignedData::parse_ber(&der).unwrap();
        let signer = signed_data.signers().next().unwrap();
        assert_eq!(signer.subject_key_identifier(), Some(ski));
        assert!(signer.certificate_issuer_and_serial().is_none());
        assert_eq!(
            signer
                .find_certificate(signed_data.certificates())
                .unwrap()
                .subject_common_name()
                .as_deref(),
            Some("Mario Rossi")
        );
        signer
            .verify_signature_with_signed_data(&signed_data)
            .unwrap();

        let report = verify::verify_detached(&der, HELLO_CYPHER, false).unwrap();
        assert_eq!(report.verified_count(), 1);
        assert_eq!(
            report.get(0).unwrap().fiscal_code.as_deref(),
            Some("RSSMRA80A01H501U")
        );
    }

    #[test]
    fn ecdsa_signer() {
        crate::provider::install_default();

        let der = SignatureBuilder::default()
            .sign(HELLO_CYPHER, &bianchi_identity())
            .unwrap();

        let report = verify::verify_detached(&der, HELLO_CYPHER, false).unwrap();
        assert_eq!(report.verified_count(), 1);
        assert_eq!(
            report.get(0).unwrap().fiscal_code.as_deref(),
            Some("BNCGLU85M41F205X")
        );
    }

    #[test]
    fn multiple_identities() {
        crate::provider::install_default();

        let rossi = rossi_identity();
        let bianchi = bianchi_identity();
        let der = SignatureBuilder::default()
            .sign_with_identities(HELLO_CYPHER, &[&rossi, &bianchi])
            .unwrap();

        let raw = SignedData::decode_ber(&der).unwrap();
        // The shared CA certificate is embedded once.
        assert_eq!(raw.certificates.as_ref().unwrap().len(), 3);

        let report = verify::verify_detached(&der, HELLO_CYPHER, false).unwrap();
        assert_eq!(report.total_signers(), 2);
        assert_eq!(report.verified_count(), 2);

        let mut names = report
            .iter()
            .filter_map(|(_, result)| result.full_name.clone())
            .collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["Giulia Bianchi", "Mario Rossi"]);

        assert_eq!(
            SignatureBuilder::default()
                .sign_with_identities(HELLO_CYPHER, &[])
                .unwrap_err()
                .kind(),
            ErrorKind::Key
        );
    }

    #[test]
    fn capacity_exceeded() {
        crate::provider::install_default();

        let mut settings = SigningSettings::default();
        settings.set_signature_size(512);

        match SignatureBuilder::new(settings).sign(HELLO_CYPHER, &rossi_identity()) {
            Err(SignatureError::CapacityExceeded { size, capacity }) => {
                assert_eq!(capacity, 512);
                assert!(size > 512);
            }
            other => panic!("unexpected result: {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn base64_output() {
        crate::provider::install_default();

        let encoded = SignatureBuilder::default()
            .sign_base64(HELLO_CYPHER, &rossi_identity())
            .unwrap();

        let report = verify::verify(encoded.as_bytes(), true).unwrap();
        assert_eq!(report.verified_count(), 1);
    }

    #[test]
    fn time_stamped_signature() {
        crate::provider::install_default();

        let mut settings = SigningSettings::default();
        settings.set_time_stamp_provider(TestTsa::default());

        let der = SignatureBuilder::new(settings)
            .sign(HELLO_CYPHER, &rossi_identity())
            .unwrap();

        let signed_data = crate::SignedData::parse_ber(&der).unwrap();
        let signer = signed_data.signers().next().unwrap();
        assert_eq!(signer.verify_time_stamp_token().unwrap(), Some(()));

        let token = signer.time_stamp_token().unwrap().unwrap();
        assert_eq!(
            token.message_imprint(),
            ring::digest::digest(&ring::digest::SHA256, signer.signature()).as_ref()
        );

        let report = verify::verify_detached(&der, HELLO_CYPHER, false).unwrap();
        let result = report.get(0).unwrap();
        assert!(result.verified);
        assert_eq!(result.timestamp, Some(token.gen_time()));
        assert!(result.timestamp_verified);
    }

    #[test]
    fn failing_time_stamp_aborts() {
        crate::provider::install_default();

        let mut settings = SigningSettings::default();
        settings.set_time_stamp_provider(TestTsa::failing());

        let err = SignatureBuilder::new(settings)
            .sign(HELLO_CYPHER, &rossi_identity())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[test]
    fn time_stamp_server_error() {
        crate::provider::install_default();

        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/tsa");
            then.status(500).body("unavailable");
        });

        let mut settings = SigningSettings::default();
        settings.set_time_stamp_url(server.url("/tsa")).unwrap();

        match SignatureBuilder::new(settings).sign(HELLO_CYPHER, &rossi_identity()) {
            Err(SignatureError::Network { status, .. }) => assert_eq!(status, Some(500)),
            other => panic!("unexpected result: {:?}", other.map(|v| v.len())),
        }
        mock.assert();
    }

    #[test]
    fn settings_defaults() {
        let mut settings = SigningSettings::default();
        assert_eq!(settings.signature_size(), 16_000);
        assert!(settings.signing_time().is_none());
        assert!(settings.time_stamp_provider().is_none());

        settings
            .set_time_stamp_url("http://tsa.example.com/")
            .unwrap();
        assert!(settings.time_stamp_provider().is_some());
    }
}
