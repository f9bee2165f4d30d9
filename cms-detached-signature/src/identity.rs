// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Private key and certificate chain used to produce signatures.

use {
    crate::error::{Result, SignatureError},
    x509_certificate::{CapturedX509Certificate, InMemorySigningKeyPair, KeyInfoSigner},
};

/// A signing key paired with its certificate chain.
///
/// The chain is ordered leaf first. The leaf certificate's public key must
/// belong to the signing key.
pub struct SigningIdentity {
    key: Box<dyn KeyInfoSigner>,
    chain: Vec<CapturedX509Certificate>,
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("key_algorithm", &self.key.key_algorithm())
            .field(
                "chain",
                &self
                    .chain
                    .iter()
                    .map(|cert| cert.subject_common_name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl SigningIdentity {
    /// Construct an instance from a key and a leaf-first certificate chain.
    pub fn new(key: Box<dyn KeyInfoSigner>, chain: Vec<CapturedX509Certificate>) -> Result<Self> {
        let leaf = chain
            .first()
            .ok_or_else(|| SignatureError::Key("certificate chain is empty".into()))?;

        if key.key_algorithm().is_none() {
            return Err(SignatureError::Key("unsupported key algorithm".into()));
        }

        if key.public_key_data() != leaf.public_key_data() {
            return Err(SignatureError::Key(format!(
                "private key does not match certificate {}",
                leaf.subject_common_name().unwrap_or_default()
            )));
        }

        Ok(Self { key, chain })
    }

    /// Load a PKCS#8 PEM private key and a PEM certificate chain.
    ///
    /// `chain_pem` may hold several `CERTIFICATE` blocks, leaf first.
    pub fn from_pem(key_pem: impl AsRef<[u8]>, chain_pem: impl AsRef<[u8]>) -> Result<Self> {
        let key = InMemorySigningKeyPair::from_pkcs8_pem(key_pem)
            .map_err(|e| SignatureError::Key(format!("unable to load private key: {}", e)))?;
        let chain = CapturedX509Certificate::from_pem_multiple(chain_pem)
            .map_err(|e| SignatureError::Key(format!("unable to load certificates: {}", e)))?;

        Self::new(Box::new(key), chain)
    }

    /// Load a PKCS#8 DER private key and DER certificates, leaf first.
    pub fn from_der<C: AsRef<[u8]>>(key_der: impl AsRef<[u8]>, chain_der: &[C]) -> Result<Self> {
        let key = InMemorySigningKeyPair::from_pkcs8_der(key_der)
            .map_err(|e| SignatureError::Key(format!("unable to load private key: {}", e)))?;
        let chain = chain_der
            .iter()
            .map(|data| {
                CapturedX509Certificate::from_der(data.as_ref().to_vec())
                    .map_err(|e| SignatureError::Key(format!("unable to load certificate: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(Box::new(key), chain)
    }

    pub fn key(&self) -> &dyn KeyInfoSigner {
        self.key.as_ref()
    }

    /// The certificate identifying the signer.
    pub fn leaf(&self) -> &CapturedX509Certificate {
        // Construction guarantees a non-empty chain.
        &self.chain[0]
    }

    pub fn chain(&self) -> &[CapturedX509Certificate] {
        &self.chain
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::ErrorKind, testutil::*},
    };

    #[test]
    fn load_pem() {
        let chain = format!(
            "{}{}",
            String::from_utf8_lossy(ROSSI_CERT_PEM),
            String::from_utf8_lossy(CA_CERT_PEM)
        );
        let identity = SigningIdentity::from_pem(ROSSI_KEY_PEM, chain).unwrap();

        assert_eq!(identity.chain().len(), 2);
        assert_eq!(
            identity.leaf().subject_common_name().as_deref(),
            Some("Mario Rossi")
        );
    }

    #[test]
    fn load_der() {
        let key = pem_body(ROSSI_KEY_PEM);
        let leaf = pem_body(ROSSI_CERT_PEM);
        let identity = SigningIdentity::from_der(key, &[leaf]).unwrap();

        assert_eq!(identity.chain().len(), 1);
    }

    #[test]
    fn mismatched_key() {
        let err = SigningIdentity::from_pem(BIANCHI_KEY_PEM, ROSSI_CERT_PEM).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Key);
    }

    #[test]
    fn empty_chain() {
        let key = InMemorySigningKeyPair::from_pkcs8_pem(ROSSI_KEY_PEM).unwrap();
        let err = SigningIdentity::new(Box::new(key), vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Key);
    }

    #[test]
    fn garbage_key() {
        let err = SigningIdentity::from_pem(b"not a key", ROSSI_CERT_PEM).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Key);
    }
}
