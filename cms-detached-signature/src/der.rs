// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! BER to DER transcoding.

`bcder` decodes BER but encodes constructed values through whatever
encoding mode it is asked for, and captured values keep the mode they were
read with. Signed output must be canonical, so structures are serialized
as BER and then rewritten by [to_der]:

* indefinite lengths become definite lengths,
* constructed universal string types are flattened to primitives,
* BOOLEAN true is normalized to `0xFF`,
* members of universal `SET` values are sorted by their encodings.

Context-tagged values are never reordered: an IMPLICIT `[n]` tag hides
whether the underlying type is a `SET` or a `SEQUENCE`.

Transcoding is idempotent.
*/

use {
    crate::error::{Result, SignatureError},
    bcder::{
        decode::{Constructed, Content, DecodeError, Source},
        encode, Mode, Tag,
    },
    bytes::Bytes,
};

/// A decoded BER value.
#[derive(Clone, Debug)]
enum Node {
    Primitive { tag: Tag, data: Bytes },
    Constructed { tag: Tag, children: Vec<Node> },
}

fn is_string_type(tag: Tag) -> bool {
    [
        Tag::BIT_STRING,
        Tag::OCTET_STRING,
        Tag::OBJECT_DESCRIPTOR,
        Tag::UTF8_STRING,
        Tag::NUMERIC_STRING,
        Tag::PRINTABLE_STRING,
        Tag::TELETEX_STRING,
        Tag::VIDEOTEX_STRING,
        Tag::IA5_STRING,
        Tag::UTC_TIME,
        Tag::GENERALIZED_TIME,
        Tag::GRAPHIC_STRING,
        Tag::VISIBLE_STRING,
        Tag::GENERAL_STRING,
        Tag::UNIVERSAL_STRING,
        Tag::BMP_STRING,
    ]
    .contains(&tag)
}

impl Node {
    fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_value(|tag, content| Self::from_content(tag, content))
    }

    fn from_content<S: Source>(
        tag: Tag,
        content: &mut Content<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        match content {
            Content::Primitive(prim) => {
                let data = prim.take_all()?;

                if tag == Tag::BOOLEAN && data.len() == 1 && data[0] != 0 {
                    Ok(Self::Primitive {
                        tag,
                        data: Bytes::from_static(&[0xff]),
                    })
                } else {
                    Ok(Self::Primitive { tag, data })
                }
            }
            Content::Constructed(cons) => {
                let mut children = Vec::new();

                while let Some(child) = Self::take_opt_from(cons)? {
                    children.push(child);
                }

                if is_string_type(tag) {
                    Self::flatten_string(tag, children).map_err(|msg| cons.content_err(msg))
                } else {
                    if tag == Tag::SET {
                        children.sort_by_cached_key(|child| child.to_vec());
                    }

                    Ok(Self::Constructed { tag, children })
                }
            }
        }
    }

    /// Collapse the segments of a constructed string into a primitive.
    fn flatten_string(tag: Tag, segments: Vec<Node>) -> Result<Self, &'static str> {
        let mut data = Vec::new();
        let mut unused = 0u8;
        let count = segments.len();

        for (i, segment) in segments.into_iter().enumerate() {
            let segment = match segment {
                Self::Primitive { tag: inner, data } if inner == tag => data,
                _ => return Err("constructed string segment has unexpected type"),
            };

            if tag == Tag::BIT_STRING {
                let (&segment_unused, bits) = segment
                    .split_first()
                    .ok_or("empty bit string segment")?;

                if segment_unused != 0 && i + 1 != count {
                    return Err("unused bits in non-final bit string segment");
                }

                unused = segment_unused;
                data.extend_from_slice(bits);
            } else {
                data.extend_from_slice(&segment);
            }
        }

        if tag == Tag::BIT_STRING {
            data.insert(0, unused);
        }

        Ok(Self::Primitive {
            tag,
            data: data.into(),
        })
    }

    fn content_len(&self) -> usize {
        match self {
            Self::Primitive { data, .. } => data.len(),
            Self::Constructed { children, .. } => {
                children.iter().map(|child| child.encoded_len()).sum()
            }
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Self::Primitive { tag, .. } | Self::Constructed { tag, .. } => {
                encode::total_encoded_len(*tag, self.content_len())
            }
        }
    }

    fn write(&self, target: &mut Vec<u8>) -> std::io::Result<()> {
        match self {
            Self::Primitive { tag, data } => {
                encode::write_header(target, *tag, false, data.len())?;
                target.extend_from_slice(data);
            }
            Self::Constructed { tag, children } => {
                encode::write_header(target, *tag, true, self.content_len())?;

                for child in children {
                    child.write(target)?;
                }
            }
        }

        Ok(())
    }

    fn to_vec(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.encoded_len());
        // Writing into a Vec does not fail.
        let _ = self.write(&mut buffer);

        buffer
    }
}

/// Transcode a single BER (or DER) encoded value to DER.
///
/// Trailing data after the value is an error.
pub fn to_der(data: &[u8]) -> Result<Vec<u8>> {
    let node = Constructed::decode(data, Mode::Ber, |cons| {
        cons.take_value(|tag, content| Node::from_content(tag, content))
    })
    .map_err(|e| SignatureError::Parsing(format!("BER decoding failed: {}", e)))?;

    let mut der = Vec::with_capacity(node.encoded_len());
    node.write(&mut der)?;

    Ok(der)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testutil::{OPENSSL_ATTACHED_BER, OPENSSL_DETACHED_DER, TWO_SIGNERS_DER},
    };

    #[test]
    fn der_is_unchanged() {
        let der = [0x30, 0x03, 0x02, 0x01, 0x01];
        assert_eq!(to_der(&der).unwrap(), der.to_vec());

        assert_eq!(to_der(OPENSSL_DETACHED_DER).unwrap(), OPENSSL_DETACHED_DER);
        assert_eq!(to_der(TWO_SIGNERS_DER).unwrap(), TWO_SIGNERS_DER);
    }

    #[test]
    fn indefinite_lengths() {
        // SEQUENCE (indefinite) { INTEGER 1 }
        let ber = [0x30, 0x80, 0x02, 0x01, 0x01, 0x00, 0x00];

        assert_eq!(to_der(&ber).unwrap(), vec![0x30, 0x03, 0x02, 0x01, 0x01]);
    }

    #[test]
    fn constructed_octet_string() {
        // OCTET STRING (constructed, indefinite) { "he", "llo" }
        let ber = [
            0x24, 0x80, 0x04, 0x02, b'h', b'e', 0x04, 0x03, b'l', b'l', b'o', 0x00, 0x00,
        ];

        assert_eq!(
            to_der(&ber).unwrap(),
            vec![0x04, 0x05, b'h', b'e', b'l', b'l', b'o']
        );
    }

    #[test]
    fn constructed_bit_string() {
        // BIT STRING (constructed) { 00 ff, 04 f0 }
        let ber = [0x23, 0x08, 0x03, 0x02, 0x00, 0xff, 0x03, 0x02, 0x04, 0xf0];

        assert_eq!(to_der(&ber).unwrap(), vec![0x03, 0x03, 0x04, 0xff, 0xf0]);
    }

    #[test]
    fn boolean_and_set_ordering() {
        // SET { BOOLEAN 0x01, INTEGER 5, BOOLEAN 0x00 }
        let ber = [
            0x31, 0x09, 0x01, 0x01, 0x01, 0x02, 0x01, 0x05, 0x01, 0x01, 0x00,
        ];

        assert_eq!(
            to_der(&ber).unwrap(),
            vec![0x31, 0x09, 0x01, 0x01, 0x00, 0x01, 0x01, 0xff, 0x02, 0x01, 0x05]
        );
    }

    #[test]
    fn context_tagged_sets_keep_order() {
        // [0] { INTEGER 2, INTEGER 1 }
        let der = [0xa0, 0x06, 0x02, 0x01, 0x02, 0x02, 0x01, 0x01];

        assert_eq!(to_der(&der).unwrap(), der.to_vec());
    }

    #[test]
    fn openssl_signature_is_idempotent() {
        let once = to_der(OPENSSL_ATTACHED_BER).unwrap();
        let twice = to_der(&once).unwrap();

        assert_ne!(once.as_slice(), OPENSSL_ATTACHED_BER);
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            to_der(&[0x30, 0x05, 0x02]),
            Err(SignatureError::Parsing(_))
        ));
        assert!(matches!(to_der(&[]), Err(SignatureError::Parsing(_))));
        assert!(matches!(
            to_der(&[0x02, 0x01, 0x01, 0x02, 0x01, 0x02]),
            Err(SignatureError::Parsing(_))
        ));
    }
}
