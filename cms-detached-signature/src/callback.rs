// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Signing callback for document libraries.

Libraries that write signed documents incrementally reserve a placeholder,
stream the bytes covered by the signature to a callback and splice the
returned signature into the placeholder. [SignatureInterface] is that
callback.
*/

use {
    crate::{error::Result, identity::SigningIdentity, signing::SignatureBuilder},
    log::debug,
    std::io::Read,
};

/// Produces a detached signature over streamed content.
pub trait SignatureInterface {
    /// Consume `content` and return the encoded signature over it.
    fn sign(&self, content: &mut dyn Read) -> Result<Vec<u8>>;
}

/// A [SignatureInterface] producing detached CMS signatures.
#[derive(Debug)]
pub struct DetachedSigner {
    builder: SignatureBuilder,
    identity: SigningIdentity,
}

impl DetachedSigner {
    pub fn new(builder: SignatureBuilder, identity: SigningIdentity) -> Self {
        Self { builder, identity }
    }

    pub fn builder(&self) -> &SignatureBuilder {
        &self.builder
    }

    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    /// The number of bytes the host must reserve for the signature.
    pub fn signature_size(&self) -> usize {
        self.builder.settings().signature_size()
    }
}

impl SignatureInterface for DetachedSigner {
    fn sign(&self, content: &mut dyn Read) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        content.read_to_end(&mut data)?;

        debug!("signing {} bytes of streamed content", data.len());

        self.builder.sign(&data, &self.identity)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::ErrorKind, signing::SigningSettings, testutil::*, verify},
        std::io::Cursor,
    };

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stream closed",
            ))
        }
    }

    #[test]
    fn sign_stream() {
        crate::provider::install_default();

        let signer = DetachedSigner::new(SignatureBuilder::default(), rossi_identity());
        let interface: &dyn SignatureInterface = &signer;

        let der = interface.sign(&mut Cursor::new(HELLO_CYPHER)).unwrap();
        assert!(der.len() <= signer.signature_size());

        let report = verify::verify_detached(&der, HELLO_CYPHER, false).unwrap();
        assert_eq!(report.verified_count(), 1);
    }

    #[test]
    fn placeholder_too_small() {
        crate::provider::install_default();

        let mut settings = SigningSettings::default();
        settings.set_signature_size(64);

        let signer = DetachedSigner::new(SignatureBuilder::new(settings), rossi_identity());
        let err = signer.sign(&mut Cursor::new(HELLO_CYPHER)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    }

    #[test]
    fn read_failure() {
        crate::provider::install_default();

        let signer = DetachedSigner::new(SignatureBuilder::default(), bianchi_identity());
        let err = signer.sign(&mut FailingReader).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
