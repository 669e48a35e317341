//! AES-256-GCM file encryption and file-key wrapping
//!
//! Encrypted file layout (before packaging):
//! ```text
//! ciphertext = AES-256-GCM(key, iv, plaintext) || 16-byte tag
//! iv         = 12 random bytes, regenerated on every call
//! ```
//!
//! Wrapped file key (version 2 envelopes):
//! ```text
//! [12-byte iv][AES-256-GCM(wrap_key, file_key) || 16-byte tag]
//! wrap_key = HKDF-SHA256(ikm = ed25519 seed, info = "rektsafe-envelope-wrap-v1")
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use ed25519_dalek::SigningKey;
use hkdf::Hkdf;
use rand::RngCore;
use rektsafe_core::{RektsafeError, RektsafeResult};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{IV_SIZE, KEY_SIZE, TAG_SIZE};

const WRAP_INFO: &[u8] = b"rektsafe-envelope-wrap-v1";

/// A per-file AES-256 key. Zeroized on drop.
#[derive(Clone)]
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for FileKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

/// Output of a single `encrypt` call
#[derive(Debug, Clone)]
pub struct EncryptedFile {
    /// Ciphertext with the 16-byte tag appended
    pub ciphertext: Vec<u8>,
    pub key: FileKey,
    pub iv: [u8; IV_SIZE],
}

/// Generate a random 256-bit file key.
pub fn generate_file_key() -> FileKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    FileKey::from_bytes(bytes)
}

fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Encrypt a file buffer under a fresh key and IV.
pub fn encrypt(plaintext: &[u8]) -> RektsafeResult<EncryptedFile> {
    let key = generate_file_key();
    let iv = generate_iv();
    let ciphertext = encrypt_with(&key, &iv, plaintext)?;

    tracing::debug!(
        plaintext_len = plaintext.len(),
        ciphertext_len = ciphertext.len(),
        "file encrypted"
    );

    Ok(EncryptedFile {
        ciphertext,
        key,
        iv,
    })
}

fn encrypt_with(key: &FileKey, iv: &[u8; IV_SIZE], plaintext: &[u8]) -> RektsafeResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|e| RektsafeError::Encryption(format!("AES-256-GCM: {e}")))
}

/// Decrypt `ciphertext || tag` with the key and IV from the matching `encrypt` call.
pub fn decrypt(ciphertext: &[u8], key: &FileKey, iv: &[u8; IV_SIZE]) -> RektsafeResult<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(RektsafeError::Decryption(format!(
            "ciphertext too short: {} bytes (minimum {TAG_SIZE})",
            ciphertext.len()
        )));
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| {
            RektsafeError::Decryption(
                "authentication failed: wrong key, wrong IV, or tampered ciphertext".into(),
            )
        })?;

    tracing::debug!(plaintext_len = plaintext.len(), "file decrypted");
    Ok(plaintext)
}

/// Derive the key-wrapping key from an Ed25519 seed via HKDF-SHA256.
fn derive_wrap_key(signing_key: &SigningKey) -> RektsafeResult<FileKey> {
    let mut seed = signing_key.to_bytes();
    let hkdf = Hkdf::<Sha256>::new(None, &seed);
    seed.zeroize();

    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(WRAP_INFO, &mut okm)
        .map_err(|e| RektsafeError::Encryption(format!("HKDF expand failed: {e}")))?;
    Ok(FileKey::from_bytes(okm))
}

/// Wrap a file key under the signing key.
///
/// Output: `[12-byte iv][ciphertext + 16-byte tag]`
pub fn wrap_file_key(signing_key: &SigningKey, file_key: &FileKey) -> RektsafeResult<Vec<u8>> {
    let wrap_key = derive_wrap_key(signing_key)?;
    let iv = generate_iv();
    let ciphertext = encrypt_with(&wrap_key, &iv, file_key.as_bytes())?;

    let mut result = Vec::with_capacity(IV_SIZE + ciphertext.len());
    result.extend_from_slice(&iv);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Unwrap a file key produced by `wrap_file_key`.
pub fn unwrap_file_key(signing_key: &SigningKey, wrapped: &[u8]) -> RektsafeResult<FileKey> {
    if wrapped.len() != IV_SIZE + KEY_SIZE + TAG_SIZE {
        return Err(RektsafeError::Decryption(format!(
            "wrapped key has wrong size: {} bytes (expected {})",
            wrapped.len(),
            IV_SIZE + KEY_SIZE + TAG_SIZE
        )));
    }

    let (iv_bytes, ciphertext) = wrapped.split_at(IV_SIZE);
    let wrap_key = derive_wrap_key(signing_key)?;
    let cipher = Aes256Gcm::new(wrap_key.as_bytes().into());

    let mut plaintext = cipher
        .decrypt(Nonce::from_slice(iv_bytes), ciphertext)
        .map_err(|_| {
            RektsafeError::Decryption(
                "key unwrapping failed: signing key does not match this envelope".into(),
            )
        })?;

    let mut key_bytes = [0u8; KEY_SIZE];
    key_bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();

    Ok(FileKey::from_bytes(key_bytes))
}
