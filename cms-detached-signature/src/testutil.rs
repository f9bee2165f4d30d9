// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixtures shared by unit tests.

use {
    crate::{
        asn1::rfc3161::{MessageImprint, TstInfo, OID_CONTENT_TYPE_TST_INFO},
        der,
        error::{Result, SignatureError},
        identity::SigningIdentity,
        signing,
        time_stamp_protocol::TimeStampProvider,
    },
    bcder::{encode::Values, Integer, Mode, OctetString, Oid},
    bytes::Bytes,
    chrono::{Timelike, Utc},
    std::sync::atomic::{AtomicU64, Ordering},
    x509_certificate::{asn1time::GeneralizedTime, CapturedX509Certificate, DigestAlgorithm},
};

pub const HELLO_CYPHER: &[u8] = b"hello cypher";

pub const CA_CERT_PEM: &[u8] = include_bytes!("testdata/ca.pem");
pub const ROSSI_CERT_PEM: &[u8] = include_bytes!("testdata/rossi.pem");
pub const ROSSI_KEY_PEM: &[u8] = include_bytes!("testdata/rossi-key.pem");
pub const BIANCHI_CERT_PEM: &[u8] = include_bytes!("testdata/bianchi.pem");
pub const BIANCHI_KEY_PEM: &[u8] = include_bytes!("testdata/bianchi-key.pem");
pub const TSA_CERT_PEM: &[u8] = include_bytes!("testdata/tsa.pem");
pub const TSA_KEY_PEM: &[u8] = include_bytes!("testdata/tsa-key.pem");

/// Detached signature over [HELLO_CYPHER] made by `openssl cms -sign`.
pub const OPENSSL_DETACHED_DER: &[u8] = include_bytes!("testdata/openssl-detached.der");
/// Signature embedding [HELLO_CYPHER], made by `openssl cms -sign -stream`.
///
/// Indefinite-length BER, with the content as a constructed OCTET STRING.
pub const OPENSSL_ATTACHED_BER: &[u8] = include_bytes!("testdata/openssl-attached.ber");
/// Detached signature over [HELLO_CYPHER] by Bianchi (ECDSA) and Rossi (RSA).
pub const TWO_SIGNERS_DER: &[u8] = include_bytes!("testdata/two-signers.der");
/// Signature whose signing certificate is not embedded.
pub const UNLISTED_SIGNER_DER: &[u8] = include_bytes!("testdata/unlisted-signer.der");
/// Time-stamp token over the signature value of [OPENSSL_DETACHED_DER].
pub const SIGNATURE_TOKEN_DER: &[u8] = include_bytes!("testdata/signature-token.der");
/// Time-stamp token over the signature value of [OPENSSL_ATTACHED_BER].
pub const ATTACHED_SIGNATURE_TOKEN_DER: &[u8] =
    include_bytes!("testdata/attached-signature-token.der");

pub const HELLO_TSQ: &[u8] = include_bytes!("testdata/hello.tsq");
pub const HELLO_TSR: &[u8] = include_bytes!("testdata/hello.tsr");
pub const REJECTED_TSR: &[u8] = include_bytes!("testdata/rejected.tsr");

/// Decode the base64 body of a single-block PEM document.
pub fn pem_body(pem: &[u8]) -> Vec<u8> {
    let body = String::from_utf8_lossy(pem)
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .map(str::trim)
        .collect::<String>();

    base64::decode(body).unwrap()
}

fn chain(certs: &[&[u8]]) -> Vec<u8> {
    certs.concat()
}

pub fn rossi_cert() -> CapturedX509Certificate {
    CapturedX509Certificate::from_pem(ROSSI_CERT_PEM).unwrap()
}

pub fn ca_cert() -> CapturedX509Certificate {
    CapturedX509Certificate::from_pem(CA_CERT_PEM).unwrap()
}

pub fn rossi_identity() -> SigningIdentity {
    SigningIdentity::from_pem(ROSSI_KEY_PEM, chain(&[ROSSI_CERT_PEM, CA_CERT_PEM])).unwrap()
}

pub fn bianchi_identity() -> SigningIdentity {
    SigningIdentity::from_pem(BIANCHI_KEY_PEM, chain(&[BIANCHI_CERT_PEM, CA_CERT_PEM])).unwrap()
}

pub fn tsa_identity() -> SigningIdentity {
    SigningIdentity::from_pem(TSA_KEY_PEM, chain(&[TSA_CERT_PEM, CA_CERT_PEM])).unwrap()
}

/// An in-process time-stamp authority.
///
/// Issues tokens signed by the test TSA certificate, or fails like an
/// unavailable server.
#[derive(Debug, Default)]
pub struct TestTsa {
    serial: AtomicU64,
    failing: bool,
}

impl TestTsa {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }
}

impl TimeStampProvider for TestTsa {
    fn stamp(&self, digest: &[u8]) -> Result<Vec<u8>> {
        if self.failing {
            return Err(SignatureError::Network {
                status: Some(500),
                message: "boom".into(),
            });
        }

        let now = Utc::now().with_nanosecond(0).unwrap();

        let tst_info = TstInfo {
            version: Integer::from(1u8),
            // 1.3.6.1.4.1.4146.2.3
            policy: Oid(Bytes::from_static(&[43, 6, 1, 4, 1, 0xa0, 0x32, 2, 3])),
            message_imprint: MessageImprint {
                hash_algorithm: DigestAlgorithm::Sha256.into(),
                hashed_message: OctetString::new(Bytes::copy_from_slice(digest)),
            },
            serial_number: Integer::from(self.serial.fetch_add(1, Ordering::SeqCst) + 1),
            gen_time: GeneralizedTime::from(now),
            accuracy: None,
            ordering: None,
            nonce: None,
            tsa: None,
            extensions: None,
        };

        let mut ber = Vec::new();
        tst_info.encode_ref().write_encoded(Mode::Ber, &mut ber)?;
        let tst_info = der::to_der(&ber)?;

        let signed_data = signing::build_signed_data(
            &Oid(Bytes::copy_from_slice(OID_CONTENT_TYPE_TST_INFO.as_ref())),
            Some(&tst_info),
            &DigestAlgorithm::Sha256.digest_data(&tst_info),
            &[&tsa_identity()],
            now,
        )?;

        der::to_der(&signed_data.encode_ber()?)
    }
}
