//! Tenant key material and encryption configuration.

use crate::error::{CodecError, CodecResult};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Tenant encryption key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

impl SecretKey {
    /// Generates a new random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CodecError::InvalidKeySize {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Derives a key from a passphrase using HKDF-SHA256.
    ///
    /// HKDF is appropriate when the input already has high entropy (a
    /// provisioned site secret). It is not a password hashing function.
    pub fn derive_from_passphrase(passphrase: &[u8], salt: &[u8]) -> CodecResult<Self> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let hk = Hkdf::<Sha256>::new(Some(salt), passphrase);
        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(b"coffre-tenant-key-v1", &mut bytes)
            .map_err(|_| CodecError::KeyDerivation("HKDF expand failed".into()))?;
        Ok(Self { bytes })
    }

    /// Returns the key as a byte slice.
    ///
    /// # Security
    ///
    /// Do not log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Per-tenant encryption configuration.
///
/// The three flags are independent: when one is off, the corresponding
/// value is stored and compared as cleartext. The key is shared read-only
/// by every operation for the tenant; pass this struct into each provider
/// constructor rather than holding process-wide state.
#[derive(Debug, Clone)]
pub struct TenantKeys {
    /// Organization code bounding this tenant's id space.
    pub org: String,
    /// Obfuscate the organization component of long ids.
    pub encrypt_org: bool,
    /// Obfuscate local and sub-document ids.
    pub encrypt_id: bool,
    /// Encrypt payload bytes.
    pub encrypt_payload: bool,
    /// The tenant key.
    pub key: SecretKey,
}

impl TenantKeys {
    /// Creates a configuration with all three flags enabled.
    #[must_use]
    pub fn new(org: impl Into<String>, key: SecretKey) -> Self {
        Self {
            org: org.into(),
            encrypt_org: true,
            encrypt_id: true,
            encrypt_payload: true,
            key,
        }
    }

    /// Creates a fully-cleartext configuration. The key is still required
    /// for secondary-key hashing.
    #[must_use]
    pub fn cleartext(org: impl Into<String>, key: SecretKey) -> Self {
        Self {
            org: org.into(),
            encrypt_org: false,
            encrypt_id: false,
            encrypt_payload: false,
            key,
        }
    }

    /// Sets the organization-code flag.
    #[must_use]
    pub fn encrypt_org(mut self, value: bool) -> Self {
        self.encrypt_org = value;
        self
    }

    /// Sets the local-id flag.
    #[must_use]
    pub fn encrypt_id(mut self, value: bool) -> Self {
        self.encrypt_id = value;
        self
    }

    /// Sets the payload flag.
    #[must_use]
    pub fn encrypt_payload(mut self, value: bool) -> Self {
        self.encrypt_payload = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_distinct_keys() {
        let k1 = SecretKey::generate();
        let k2 = SecretKey::generate();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn from_bytes_checks_size() {
        assert!(SecretKey::from_bytes(&[0u8; 16]).is_err());
        assert!(SecretKey::from_bytes(&[0u8; 32]).is_ok());
        assert!(SecretKey::from_bytes(&[0u8; 64]).is_err());
    }

    #[test]
    fn passphrase_derivation_is_stable() {
        let k1 = SecretKey::derive_from_passphrase(b"site secret", b"salt").unwrap();
        let k2 = SecretKey::derive_from_passphrase(b"site secret", b"salt").unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());

        let k3 = SecretKey::derive_from_passphrase(b"site secret", b"other").unwrap();
        assert_ne!(k1.as_bytes(), k3.as_bytes());
    }

    #[test]
    fn debug_redacts_key() {
        let key = SecretKey::generate();
        assert!(!format!("{key:?}").contains("bytes: ["));
    }

    #[test]
    fn builder_flags() {
        let keys = TenantKeys::new("815", SecretKey::generate()).encrypt_payload(false);
        assert!(keys.encrypt_org);
        assert!(keys.encrypt_id);
        assert!(!keys.encrypt_payload);

        let clear = TenantKeys::cleartext("815", SecretKey::generate());
        assert!(!clear.encrypt_org && !clear.encrypt_id && !clear.encrypt_payload);
    }
}
