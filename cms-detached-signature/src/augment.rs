// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Attaching time-stamp tokens to existing signatures.

A time-stamp token proves a signature value existed at a point in time. It
travels as the `id-aa-signatureTimeStampToken` unsigned attribute of the
`SignerInfo` whose signature it stamps. Unsigned attributes are outside the
signature, so adding one does not invalidate the signer.
*/

use {
    crate::{
        asn1::{
            rfc3161::OID_TIME_STAMP_TOKEN,
            rfc5652::{Attribute, AttributeValue, SignedData, UnsignedAttributes},
        },
        der,
        error::{Result, SignatureError},
        time_stamp_protocol::TimestampToken,
    },
    bcder::{decode::Constructed, Mode, Oid},
    bytes::Bytes,
    log::debug,
};

/// Attach a time-stamp token to the first signer of a `SignedData`.
///
/// `token` is the encoded `ContentInfo` returned by a time-stamp authority.
/// Its message imprint must be the digest of the first signer's signature
/// value. A token already present on that signer is replaced; other unsigned
/// attributes, other signers and the certificates are carried unchanged.
///
/// The input is not modified.
pub fn add_timestamp(signed_data: &SignedData, token: &[u8]) -> Result<SignedData> {
    let mut signed_data = signed_data.clone();

    let signer = signed_data
        .signer_infos
        .first_mut()
        .ok_or_else(|| SignatureError::Protocol("SignedData has no signer to time-stamp".into()))?;

    let parsed = TimestampToken::from_ber(token)?;
    parsed.verify_imprint(&signer.signature.to_bytes())?;

    let value = Constructed::decode(parsed.as_der(), Mode::Der, |cons| cons.capture_one())
        .map_err(|e| SignatureError::Protocol(format!("malformed time-stamp token: {}", e)))?;

    let attribute = Attribute {
        typ: Oid(Bytes::copy_from_slice(OID_TIME_STAMP_TOKEN.as_ref())),
        values: vec![AttributeValue::new(value)],
    };

    let attributes = signer
        .unsigned_attributes
        .get_or_insert_with(UnsignedAttributes::default);
    attributes.retain(|attr| attr.typ != OID_TIME_STAMP_TOKEN);
    attributes.push(attribute);

    debug!(
        "attached {} byte time-stamp token generated at {}",
        parsed.as_der().len(),
        parsed.gen_time()
    );

    Ok(signed_data)
}

/// Attach a time-stamp token to an encoded signature.
///
/// `signed_data` may be BER. It is transcoded to DER before decoding so
/// constructed or indefinite-length values survive re-encoding. Returns the
/// DER encoding of the augmented `SignedData`.
pub fn add_timestamp_der(signed_data: &[u8], token: &[u8]) -> Result<Vec<u8>> {
    let signed_data = SignedData::decode_ber(&der::to_der(signed_data)?)
        .map_err(|e| SignatureError::Parsing(format!("malformed SignedData: {}", e)))?;

    der::to_der(&add_timestamp(&signed_data, token)?.encode_ber()?)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::ErrorKind, testutil::*},
    };

    #[test]
    fn stamp_openssl_signature() {
        crate::provider::install_default();

        let original = SignedData::decode_ber(OPENSSL_DETACHED_DER).unwrap();
        let augmented = add_timestamp(&original, SIGNATURE_TOKEN_DER).unwrap();

        assert!(original.signer_infos[0].unsigned_attributes.is_none());
        assert_eq!(augmented.certificates, original.certificates);
        assert_eq!(
            augmented.signer_infos[0].signature,
            original.signer_infos[0].signature
        );
        assert_eq!(
            augmented.signer_infos[0]
                .unsigned_attributes
                .as_ref()
                .unwrap()
                .len(),
            1
        );

        let der = der::to_der(&augmented.encode_ber().unwrap()).unwrap();
        let signed_data = crate::SignedData::parse_ber(&der).unwrap();
        let signer = signed_data.signers().next().unwrap();

        signer
            .verify_signature_with_signed_data(&signed_data)
            .unwrap();
        assert_eq!(signer.verify_time_stamp_token().unwrap(), Some(()));
    }

    #[test]
    fn replaces_existing_token() {
        crate::provider::install_default();

        let once = add_timestamp_der(OPENSSL_DETACHED_DER, SIGNATURE_TOKEN_DER).unwrap();
        let twice = add_timestamp_der(&once, SIGNATURE_TOKEN_DER).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn stamp_attached_ber_signature() {
        crate::provider::install_default();

        let stamped =
            add_timestamp_der(OPENSSL_ATTACHED_BER, ATTACHED_SIGNATURE_TOKEN_DER).unwrap();
        assert_eq!(der::to_der(&stamped).unwrap(), stamped);

        let signed_data = crate::SignedData::parse_ber(&stamped).unwrap();
        assert_eq!(signed_data.signed_content(), Some(HELLO_CYPHER));

        let signer = signed_data.signers().next().unwrap();
        signer
            .verify_signature_with_signed_data(&signed_data)
            .unwrap();
        signer
            .verify_message_digest_with_signed_data(&signed_data)
            .unwrap();
        assert_eq!(signer.verify_time_stamp_token().unwrap(), Some(()));
    }

    #[test]
    fn imprint_must_match_signature() {
        crate::provider::install_default();

        // The token stamps the signature of a different structure.
        let err = add_timestamp_der(TWO_SIGNERS_DER, SIGNATURE_TOKEN_DER).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn rejects_bad_inputs() {
        crate::provider::install_default();

        let mut empty = SignedData::decode_ber(OPENSSL_DETACHED_DER).unwrap();
        empty.signer_infos.clear();
        assert_eq!(
            add_timestamp(&empty, SIGNATURE_TOKEN_DER).unwrap_err().kind(),
            ErrorKind::Protocol
        );

        let original = SignedData::decode_ber(OPENSSL_DETACHED_DER).unwrap();
        assert_eq!(
            add_timestamp(&original, b"\x30\x02\x05\x00")
                .unwrap_err()
                .kind(),
            ErrorKind::Protocol
        );

        assert_eq!(
            add_timestamp_der(b"garbage", SIGNATURE_TOKEN_DER)
                .unwrap_err()
                .kind(),
            ErrorKind::Parsing
        );
    }
}
