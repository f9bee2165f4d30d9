// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Process-wide cryptographic provider registration.

Digest computation and signature verification go through a [CryptoProvider].
The host installs it once with [install_default] before signing or verifying.
Installation is idempotent: every caller observes the same instance.
*/

use {
    crate::error::{Result, SignatureError},
    once_cell::sync::OnceCell,
    ring::signature::UnparsedPublicKey,
    x509_certificate::{DigestAlgorithm, KeyAlgorithm, SignatureAlgorithm},
};

static PROVIDER: OnceCell<CryptoProvider> = OnceCell::new();

/// Cryptographic primitives backed by `ring`.
#[derive(Debug)]
pub struct CryptoProvider {
    name: &'static str,
    digest_algorithm: DigestAlgorithm,
}

impl CryptoProvider {
    fn ring() -> Self {
        Self {
            name: "ring",
            digest_algorithm: DigestAlgorithm::Sha256,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Digest algorithm used for content and signature digests.
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }

    /// Digest data with the provider's digest algorithm.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        self.digest_algorithm.digest_data(data)
    }

    /// Verify a signature made by the holder of `public_key`.
    pub fn verify_signature(
        &self,
        key_algorithm: KeyAlgorithm,
        signature_algorithm: SignatureAlgorithm,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let verification_algorithm = signature_algorithm
            .resolve_verification_algorithm(key_algorithm)
            .map_err(|e| SignatureError::Crypto(e.to_string()))?;

        UnparsedPublicKey::new(verification_algorithm, public_key)
            .verify(message, signature)
            .map_err(|_| SignatureError::Crypto("signature verification failed".into()))
    }
}

/// Install the default provider, returning the installed instance.
///
/// Calling this more than once, from any thread, is harmless.
pub fn install_default() -> &'static CryptoProvider {
    PROVIDER.get_or_init(CryptoProvider::ring)
}

/// Obtain the installed provider, if any.
pub fn get() -> Option<&'static CryptoProvider> {
    PROVIDER.get()
}

pub(crate) fn current() -> Result<&'static CryptoProvider> {
    get().ok_or_else(|| {
        SignatureError::Crypto("no cryptographic provider installed; call install_default()".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_is_idempotent() {
        let first = install_default();
        let second = install_default();

        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(get().unwrap(), first));
        assert_eq!(current().unwrap().name(), "ring");
    }

    #[test]
    fn concurrent_install() {
        let handles = (0..8)
            .map(|_| std::thread::spawn(|| install_default() as *const CryptoProvider as usize))
            .collect::<Vec<_>>();

        let addresses = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<std::collections::HashSet<_>>();

        assert_eq!(addresses.len(), 1);
    }

    #[test]
    fn sha256_digest() {
        let provider = install_default();

        assert_eq!(
            hex::encode(provider.digest(b"hello cypher")),
            hex::encode(ring::digest::digest(&ring::digest::SHA256, b"hello cypher"))
        );
    }
}
