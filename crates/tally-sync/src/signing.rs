//! Detached manifest signatures.
//!
//! Manifests are signed with RSASSA-PKCS1-v1_5 over SHA-256 of the exact
//! bytes of the unsigned inner archive. PKCS#1 v1.5 signing is deterministic:
//! the same key over the same bytes always yields the same signature.

use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{ExportError, ExportResult};
use crate::verify::VerifyError;

/// Produces a detached signature over a byte stream.
pub trait ManifestSigner {
    fn sign(&self, data: &[u8]) -> ExportResult<Vec<u8>>;
}

/// Checks a detached signature produced by a [`ManifestSigner`].
pub trait SignatureVerifier {
    fn verify(&self, data: &[u8], signature: &[u8]) -> bool;
}

/// SHA256withRSA signer.
#[derive(Clone)]
pub struct RsaManifestSigner {
    key: SigningKey<Sha256>,
    key_id: String,
}

impl RsaManifestSigner {
    pub fn new(private_key: RsaPrivateKey) -> ExportResult<Self> {
        let key_id = key_id(&RsaPublicKey::from(&private_key)).map_err(|reason| {
            ExportError::Signing { reason }
        })?;
        Ok(Self {
            key: SigningKey::<Sha256>::new(private_key),
            key_id,
        })
    }

    /// Load a PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`) PEM.
    pub fn from_pem(pem: &str) -> ExportResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| ExportError::Signing {
                reason: format!("invalid RSA private key: {e}"),
            })?;
        Self::new(private_key)
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> ExportResult<Self> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
        Self::from_pem(&pem)
    }

    /// `sha256:` fingerprint of the DER-encoded public key.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl std::fmt::Debug for RsaManifestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaManifestSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl ManifestSigner for RsaManifestSigner {
    fn sign(&self, data: &[u8]) -> ExportResult<Vec<u8>> {
        let signature = self
            .key
            .try_sign(data)
            .map_err(|e| ExportError::Signing {
                reason: e.to_string(),
            })?;
        Ok(signature.to_vec())
    }
}

/// SHA256withRSA verifier.
#[derive(Clone)]
pub struct RsaManifestVerifier {
    key: VerifyingKey<Sha256>,
    key_id: String,
}

impl RsaManifestVerifier {
    pub fn new(public_key: RsaPublicKey) -> Result<Self, VerifyError> {
        let key_id = key_id(&public_key).map_err(|reason| VerifyError::Key { reason })?;
        Ok(Self {
            key: VerifyingKey::<Sha256>::new(public_key),
            key_id,
        })
    }

    /// Load an SPKI (`BEGIN PUBLIC KEY`) or PKCS#1 (`BEGIN RSA PUBLIC KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self, VerifyError> {
        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| VerifyError::Key {
                reason: format!("invalid RSA public key: {e}"),
            })?;
        Self::new(public_key)
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, VerifyError> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|source| VerifyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pem(&pem)
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl std::fmt::Debug for RsaManifestVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaManifestVerifier")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier for RsaManifestVerifier {
    fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        self.key.verify(data, &signature).is_ok()
    }
}

fn key_id(public_key: &RsaPublicKey) -> Result<String, String> {
    let der = public_key
        .to_public_key_der()
        .map_err(|e| format!("failed to encode public key: {e}"))?;
    Ok(format!("sha256:{}", hex::encode(Sha256::digest(der.as_bytes()))))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_PEM: &str = include_str!("../tests/fixtures/signing_key.pem");
    const PRIVATE_PKCS1_PEM: &str = include_str!("../tests/fixtures/signing_key.pkcs1.pem");
    const PUBLIC_PEM: &str = include_str!("../tests/fixtures/signing_key.pub.pem");
    const OTHER_PUBLIC_PEM: &str = include_str!("../tests/fixtures/other_key.pub.pem");

    #[test]
    fn signature_verifies_against_same_bytes() {
        let signer = RsaManifestSigner::from_pem(PRIVATE_PEM).unwrap();
        let verifier = RsaManifestVerifier::from_pem(PUBLIC_PEM).unwrap();

        let data = b"consumer_export.zip bytes";
        let sig = signer.sign(data).unwrap();

        assert_eq!(sig.len(), 256);
        assert!(verifier.verify(data, &sig));
        assert_eq!(signer.key_id(), verifier.key_id());
    }

    #[test]
    fn resigning_is_deterministic() {
        let signer = RsaManifestSigner::from_pem(PRIVATE_PEM).unwrap();
        let data = b"same bytes";
        assert_eq!(signer.sign(data).unwrap(), signer.sign(data).unwrap());
    }

    #[test]
    fn pkcs1_and_pkcs8_keys_sign_identically() {
        let pkcs8 = RsaManifestSigner::from_pem(PRIVATE_PEM).unwrap();
        let pkcs1 = RsaManifestSigner::from_pem(PRIVATE_PKCS1_PEM).unwrap();
        assert_eq!(pkcs8.sign(b"x").unwrap(), pkcs1.sign(b"x").unwrap());
    }

    #[test]
    fn flipped_byte_fails_verification() {
        let signer = RsaManifestSigner::from_pem(PRIVATE_PEM).unwrap();
        let verifier = RsaManifestVerifier::from_pem(PUBLIC_PEM).unwrap();

        let mut data = b"manifest payload".to_vec();
        let sig = signer.sign(&data).unwrap();
        data[3] ^= 0x01;

        assert!(!verifier.verify(&data, &sig));
    }

    #[test]
    fn other_key_rejects_signature() {
        let signer = RsaManifestSigner::from_pem(PRIVATE_PEM).unwrap();
        let verifier = RsaManifestVerifier::from_pem(OTHER_PUBLIC_PEM).unwrap();
        let sig = signer.sign(b"data").unwrap();
        assert!(!verifier.verify(b"data", &sig));
    }

    #[test]
    fn truncated_signature_is_rejected() {
        let signer = RsaManifestSigner::from_pem(PRIVATE_PEM).unwrap();
        let verifier = RsaManifestVerifier::from_pem(PUBLIC_PEM).unwrap();
        let sig = signer.sign(b"data").unwrap();
        assert!(!verifier.verify(b"data", &sig[..10]));
        assert!(!verifier.verify(b"data", &[]));
    }

    #[test]
    fn garbage_key_is_signing_error() {
        let err = RsaManifestSigner::from_pem("not a key").unwrap_err();
        assert!(matches!(err, ExportError::Signing { .. }));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn debug_does_not_print_key_material() {
        let signer = RsaManifestSigner::from_pem(PRIVATE_PEM).unwrap();
        let debug = format!("{signer:?}");
        assert!(debug.contains("sha256:"));
        assert!(!debug.contains("BEGIN"));
    }
}
