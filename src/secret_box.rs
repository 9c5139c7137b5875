//! Credential protection at rest
//!
//! Uses XChaCha20-Poly1305 (192-bit nonce).
//! Key size: 32 bytes. Nonce: 24 bytes (random). Tag: 16 bytes.
//!
//! Ciphertext format:
//!   [ nonce (24 bytes) | ciphertext + tag ]
//!
//! The key lives in its own file next to the settings. Regenerating it makes
//! every previously stored ciphertext unreadable; nothing detects that
//! beyond the authentication failure on the next decrypt.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::CredentialError;
use crate::settings::write_atomic;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const AAD: &[u8] = b"wettermail-credential-v1";

/// Symmetric key material for the mail credential
pub struct CredentialKey(Zeroizing<[u8; KEY_LEN]>);

impl CredentialKey {
    /// Produce fresh, uniformly random key material
    #[must_use]
    pub fn generate() -> Self {
        let key = XChaCha20Poly1305::generate_key(&mut OsRng);
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialKey(***)")
    }
}

/// A decrypted mail credential. Never printed, wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    #[must_use]
    pub fn new(secret: String) -> Self {
        Self(Zeroizing::new(secret))
    }

    /// Borrow the plaintext. Only the mail transport should call this.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Encrypt `plaintext` under `key`, prepending a random 24-byte nonce.
pub fn encrypt(plaintext: &str, key: &CredentialKey) -> Result<Vec<u8>, CredentialError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CredentialError::Encrypt)?;

    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext.as_bytes(),
                aad: AAD,
            },
        )
        .map_err(|_| CredentialError::Encrypt)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt bytes produced by [`encrypt`].
///
/// Fails instead of returning garbage when the key is wrong or the data was
/// truncated or modified.
pub fn decrypt(data: &[u8], key: &CredentialKey) -> Result<Credential, CredentialError> {
    if data.len() < NONCE_LEN + TAG_LEN {
        return Err(CredentialError::Malformed);
    }
    let (nonce_bytes, ct) = data.split_at(NONCE_LEN);
    let nonce = XNonce::from_slice(nonce_bytes);

    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CredentialError::Authentication)?;

    let plaintext = Zeroizing::new(
        cipher
            .decrypt(nonce, Payload { msg: ct, aad: AAD })
            .map_err(|_| CredentialError::Authentication)?,
    );

    let text = std::str::from_utf8(&plaintext).map_err(|_| CredentialError::Encoding)?;
    Ok(Credential::new(text.to_string()))
}

/// Where the credential key comes from.
///
/// The file-backed store is the default; an OS keychain could sit behind the
/// same trait without touching the pipeline.
pub trait KeyStore {
    /// Load the existing key, `CredentialError::KeyMissing` if there is none
    fn load_key(&self) -> Result<CredentialKey, CredentialError>;

    /// Generate and persist a new key, replacing any existing one
    fn generate_key(&self) -> Result<CredentialKey, CredentialError>;

    /// Load the key, generating it on first use
    fn load_or_generate(&self) -> Result<CredentialKey, CredentialError> {
        match self.load_key() {
            Err(CredentialError::KeyMissing { .. }) => self.generate_key(),
            other => other,
        }
    }
}

/// Raw key bytes in a single file
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CredentialError {
        CredentialError::KeyIo {
            path: self.path.clone(),
            source,
        }
    }
}

impl KeyStore for FileKeyStore {
    #[tracing::instrument(name = "load_key", level = "debug", skip(self), fields(path = %self.path.display()))]
    fn load_key(&self) -> Result<CredentialKey, CredentialError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::KeyMissing {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let key: [u8; KEY_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| CredentialError::KeyInvalid {
                    path: self.path.clone(),
                    expected: KEY_LEN,
                    found: bytes.len(),
                })?;
        debug!("Loaded credential key");
        Ok(CredentialKey::from_bytes(key))
    }

    #[tracing::instrument(name = "generate_key", level = "debug", skip(self), fields(path = %self.path.display()))]
    fn generate_key(&self) -> Result<CredentialKey, CredentialError> {
        if self.path.exists() {
            warn!("Replacing existing credential key; stored credentials become unreadable");
        }

        let key = CredentialKey::generate();
        write_atomic(&self.path, &[key.as_bytes().as_slice()]).map_err(|e| self.io_error(e))?;

        info!("Generated new credential key");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip() {
        let key = CredentialKey::generate();
        for secret in ["hunter2", "pässwört mit Umlauten", "x"] {
            let ciphertext = encrypt(secret, &key).unwrap();
            assert_ne!(ciphertext.as_slice(), secret.as_bytes());
            assert_eq!(decrypt(&ciphertext, &key).unwrap().expose(), secret);
        }
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let ciphertext = encrypt("hunter2", &CredentialKey::generate()).unwrap();
        let result = decrypt(&ciphertext, &CredentialKey::generate());
        assert!(matches!(result, Err(CredentialError::Authentication)));
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let key = CredentialKey::generate();
        let mut ciphertext = encrypt("hunter2", &key).unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;
        assert!(matches!(
            decrypt(&ciphertext, &key),
            Err(CredentialError::Authentication)
        ));

        let mut flipped_nonce = encrypt("hunter2", &key).unwrap();
        flipped_nonce[0] ^= 0x80;
        assert!(decrypt(&flipped_nonce, &key).is_err());
    }

    #[test]
    fn test_truncated_ciphertext_is_malformed() {
        let key = CredentialKey::generate();
        let ciphertext = encrypt("hunter2", &key).unwrap();
        assert!(matches!(
            decrypt(&ciphertext[..NONCE_LEN], &key),
            Err(CredentialError::Malformed)
        ));
        assert!(matches!(decrypt(&[], &key), Err(CredentialError::Malformed)));
        assert!(matches!(
            decrypt(&ciphertext[..ciphertext.len() - 1], &key),
            Err(CredentialError::Authentication)
        ));
    }

    #[test]
    fn test_encryption_uses_fresh_nonces() {
        let key = CredentialKey::generate();
        assert_ne!(encrypt("same", &key).unwrap(), encrypt("same", &key).unwrap());
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let credential = Credential::new("hunter2".to_string());
        assert!(!format!("{credential:?}").contains("hunter2"));
        assert_eq!(format!("{:?}", CredentialKey::generate()), "CredentialKey(***)");
    }

    #[test]
    fn test_file_key_store_missing_key() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path().join("credential.key"));
        assert!(matches!(
            store.load_key(),
            Err(CredentialError::KeyMissing { .. })
        ));
    }

    #[test]
    fn test_file_key_store_generate_then_load() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path().join("nested").join("credential.key"));

        let generated = store.generate_key().unwrap();
        let ciphertext = encrypt("hunter2", &generated).unwrap();

        let loaded = store.load_key().unwrap();
        assert_eq!(decrypt(&ciphertext, &loaded).unwrap().expose(), "hunter2");
        assert_eq!(fs::read(store.path()).unwrap().len(), KEY_LEN);
    }

    #[test]
    fn test_load_or_generate_is_stable() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path().join("credential.key"));

        let first = store.load_or_generate().unwrap();
        let ciphertext = encrypt("hunter2", &first).unwrap();
        let second = store.load_or_generate().unwrap();
        assert_eq!(decrypt(&ciphertext, &second).unwrap().expose(), "hunter2");
    }

    #[test]
    fn test_regenerated_key_invalidates_ciphertext() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(dir.path().join("credential.key"));

        let ciphertext = encrypt("hunter2", &store.generate_key().unwrap()).unwrap();
        let replacement = store.generate_key().unwrap();
        assert!(matches!(
            decrypt(&ciphertext, &replacement),
            Err(CredentialError::Authentication)
        ));
    }

    #[test]
    fn test_short_key_file_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credential.key");
        fs::write(&path, b"too short").unwrap();
        let store = FileKeyStore::new(&path);
        assert!(matches!(
            store.load_key(),
            Err(CredentialError::KeyInvalid { found: 9, .. })
        ));
    }
}
