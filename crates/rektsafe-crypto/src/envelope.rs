//! Portable encrypted-file envelope
//!
//! Version 1 (key embedded):
//! ```text
//! { "version": 1, "originalFileName": "hello.txt", "iv": [12 numbers],
//!   "encryptedData": "<hex ciphertext||tag>", "key": { JWK oct/A256GCM },
//!   "timestamp": <ms since epoch> }
//! ```
//! Whoever holds a version 1 file can decrypt it; no share is involved.
//!
//! Version 2 (key wrapped) replaces `key` with `wrappedKey` (hex, see
//! [`crate::cipher::wrap_file_key`]) and `publicKey` (hex Ed25519 key whose
//! seed derives the wrapping key).

use ed25519_dalek::{SigningKey, VerifyingKey};
use rektsafe_core::{RektsafeError, RektsafeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cipher::{self, FileKey};
use crate::jwk::Jwk;
use crate::{ENVELOPE_VERSION_EMBEDDED, ENVELOPE_VERSION_WRAPPED, IV_SIZE, TAG_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub original_file_name: String,
    #[serde(default)]
    pub iv: Vec<u8>,
    #[serde(default)]
    pub encrypted_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Jwk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default)]
    pub timestamp: u64,
}

fn default_version() -> u32 {
    ENVELOPE_VERSION_EMBEDDED
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// How the file key travels in an envelope
#[derive(Debug, Clone)]
pub enum EnvelopeKey {
    Embedded(FileKey),
    Wrapped {
        wrapped: Vec<u8>,
        public_key: VerifyingKey,
    },
}

/// Decoded, validated envelope contents
#[derive(Debug, Clone)]
pub struct Unpacked {
    pub version: u32,
    pub file_name: String,
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_SIZE],
    pub key: EnvelopeKey,
    pub timestamp: u64,
}

impl Unpacked {
    /// Whether decryption needs a signing key (version 2).
    pub fn requires_signing_key(&self) -> bool {
        matches!(self.key, EnvelopeKey::Wrapped { .. })
    }

    /// Resolve the file key. Embedded keys ignore `signing_key`.
    pub fn file_key(&self, signing_key: Option<&SigningKey>) -> RektsafeResult<FileKey> {
        match &self.key {
            EnvelopeKey::Embedded(key) => Ok(key.clone()),
            EnvelopeKey::Wrapped {
                wrapped,
                public_key,
            } => {
                let signing_key = signing_key.ok_or_else(|| {
                    RektsafeError::Decryption(
                        "envelope key is wrapped: combine shares to recover the signing key first"
                            .into(),
                    )
                })?;
                if &signing_key.verifying_key() != public_key {
                    return Err(RektsafeError::Decryption(
                        "signing key does not belong to this envelope".into(),
                    ));
                }
                cipher::unwrap_file_key(signing_key, wrapped)
            }
        }
    }

    pub fn decrypt(&self, signing_key: Option<&SigningKey>) -> RektsafeResult<Vec<u8>> {
        let key = self.file_key(signing_key)?;
        cipher::decrypt(&self.ciphertext, &key, &self.iv)
    }
}

impl Envelope {
    /// Package a version 1 envelope with the file key embedded as a JWK.
    pub fn package(
        ciphertext: &[u8],
        iv: &[u8; IV_SIZE],
        key: &FileKey,
        file_name: &str,
    ) -> Self {
        Self {
            version: ENVELOPE_VERSION_EMBEDDED,
            original_file_name: file_name.to_string(),
            iv: iv.to_vec(),
            encrypted_data: hex::encode(ciphertext),
            key: Some(Jwk::from_file_key(key)),
            wrapped_key: None,
            public_key: None,
            timestamp: now_millis(),
        }
    }

    /// Package a version 2 envelope with the file key wrapped under `signing_key`.
    pub fn package_wrapped(
        ciphertext: &[u8],
        iv: &[u8; IV_SIZE],
        key: &FileKey,
        signing_key: &SigningKey,
        file_name: &str,
    ) -> RektsafeResult<Self> {
        let wrapped = cipher::wrap_file_key(signing_key, key)?;
        Ok(Self {
            version: ENVELOPE_VERSION_WRAPPED,
            original_file_name: file_name.to_string(),
            iv: iv.to_vec(),
            encrypted_data: hex::encode(ciphertext),
            key: None,
            wrapped_key: Some(hex::encode(wrapped)),
            public_key: Some(hex::encode(signing_key.verifying_key().as_bytes())),
            timestamp: now_millis(),
        })
    }

    /// Encrypt `plaintext` under a fresh key and package it (version 1).
    pub fn seal(file_name: &str, plaintext: &[u8]) -> RektsafeResult<Self> {
        let encrypted = cipher::encrypt(plaintext)?;
        Ok(Self::package(
            &encrypted.ciphertext,
            &encrypted.iv,
            &encrypted.key,
            file_name,
        ))
    }

    /// Encrypt `plaintext` and wrap its key under `signing_key` (version 2).
    pub fn seal_wrapped(
        file_name: &str,
        plaintext: &[u8],
        signing_key: &SigningKey,
    ) -> RektsafeResult<Self> {
        let encrypted = cipher::encrypt(plaintext)?;
        Self::package_wrapped(
            &encrypted.ciphertext,
            &encrypted.iv,
            &encrypted.key,
            signing_key,
            file_name,
        )
    }

    pub fn to_json(&self) -> RektsafeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> RektsafeResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| RektsafeError::InvalidPackage(format!("envelope JSON: {e}")))
    }

    /// Parse and validate envelope JSON in one step.
    pub fn unpackage_json(json: &str) -> RektsafeResult<Unpacked> {
        Self::from_json(json)?.unpackage()
    }

    /// Validate fields and decode them into an [`Unpacked`].
    pub fn unpackage(&self) -> RektsafeResult<Unpacked> {
        let invalid = |msg: String| RektsafeError::InvalidPackage(msg);

        if self.encrypted_data.is_empty() {
            return Err(invalid("missing 'encryptedData'".into()));
        }
        if self.iv.is_empty() {
            return Err(invalid("missing 'iv'".into()));
        }
        if self.iv.len() != IV_SIZE {
            return Err(invalid(format!(
                "'iv' must be {IV_SIZE} bytes, got {}",
                self.iv.len()
            )));
        }
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&self.iv);

        let ciphertext = hex::decode(&self.encrypted_data)
            .map_err(|e| invalid(format!("'encryptedData' is not hex: {e}")))?;
        if ciphertext.len() < TAG_SIZE {
            return Err(invalid(format!(
                "'encryptedData' shorter than the {TAG_SIZE}-byte tag"
            )));
        }

        let key = match self.version {
            ENVELOPE_VERSION_EMBEDDED => {
                let jwk = self
                    .key
                    .as_ref()
                    .ok_or_else(|| invalid("missing 'key'".into()))?;
                EnvelopeKey::Embedded(
                    jwk.to_file_key()
                        .map_err(|e| invalid(format!("'key': {e}")))?,
                )
            }
            ENVELOPE_VERSION_WRAPPED => {
                let wrapped = self
                    .wrapped_key
                    .as_deref()
                    .filter(|w| !w.is_empty())
                    .ok_or_else(|| invalid("missing 'wrappedKey'".into()))?;
                let wrapped = hex::decode(wrapped)
                    .map_err(|e| invalid(format!("'wrappedKey' is not hex: {e}")))?;
                let public_key = self
                    .public_key
                    .as_deref()
                    .ok_or_else(|| invalid("missing 'publicKey'".into()))?;
                let public_key = crate::sign::decode_public_key(public_key)
                    .map_err(|e| invalid(format!("'publicKey': {e}")))?;
                EnvelopeKey::Wrapped {
                    wrapped,
                    public_key,
                }
            }
            other => return Err(invalid(format!("unsupported envelope version {other}"))),
        };

        tracing::debug!(
            version = self.version,
            file_name = %self.original_file_name,
            ciphertext_len = ciphertext.len(),
            "envelope unpacked"
        );

        Ok(Unpacked {
            version: self.version,
            file_name: self.original_file_name.clone(),
            ciphertext,
            iv,
            key,
            timestamp: self.timestamp,
        })
    }

    pub fn write_to(&self, path: &Path) -> RektsafeResult<()> {
        std::fs::write(path, self.to_json()?)?;
        tracing::debug!(path = %path.display(), "wrote envelope");
        Ok(())
    }

    pub fn read_from(path: &Path) -> RektsafeResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::encrypt;

    fn signing_key(byte: u8) -> SigningKey {
        SigningKey::from_bytes(&[byte; 32])
    }

    #[test]
    fn package_unpackage_returns_inputs() {
        let encrypted = encrypt(b"0123456789").unwrap();
        let envelope = Envelope::package(
            &encrypted.ciphertext,
            &encrypted.iv,
            &encrypted.key,
            "hello.txt",
        );
        let unpacked = Envelope::unpackage_json(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(unpacked.file_name, "hello.txt");
        assert_eq!(unpacked.ciphertext, encrypted.ciphertext);
        assert_eq!(unpacked.iv, encrypted.iv);
        match unpacked.key {
            EnvelopeKey::Embedded(ref key) => assert_eq!(key, &encrypted.key),
            EnvelopeKey::Wrapped { .. } => panic!("expected embedded key"),
        }
        assert_eq!(unpacked.decrypt(None).unwrap(), b"0123456789");
    }

    #[test]
    fn wire_format_fields() {
        let envelope = Envelope::seal("a.bin", &[1, 2, 3]).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["originalFileName"], "a.bin");
        assert_eq!(value["iv"].as_array().unwrap().len(), 12);
        assert!(value["iv"][0].is_u64());
        assert_eq!(value["encryptedData"].as_str().unwrap().len(), (3 + 16) * 2);
        assert_eq!(value["key"]["kty"], "oct");
        assert!(value["timestamp"].as_u64().unwrap() > 0);
        assert!(value.get("wrappedKey").is_none());
    }

    #[test]
    fn missing_fields_are_invalid_package() {
        let envelope = Envelope::seal("x", b"data").unwrap();
        for field in ["encryptedData", "iv", "key"] {
            let mut value = serde_json::to_value(&envelope).unwrap();
            value.as_object_mut().unwrap().remove(field);
            let err = Envelope::unpackage_json(&value.to_string()).unwrap_err();
            assert!(
                matches!(err, RektsafeError::InvalidPackage(_)),
                "removing {field} should be InvalidPackage, got {err:?}"
            );
        }
    }

    #[test]
    fn malformed_json_is_invalid_package() {
        let err = Envelope::unpackage_json("{\"version\": 1,").unwrap_err();
        assert!(matches!(err, RektsafeError::InvalidPackage(_)));
    }

    #[test]
    fn wrong_iv_length_is_rejected() {
        let mut envelope = Envelope::seal("x", b"data").unwrap();
        envelope.iv.pop();
        let err = envelope.unpackage().unwrap_err();
        assert!(err.to_string().contains("12 bytes"));
    }

    #[test]
    fn non_hex_data_is_rejected() {
        let mut envelope = Envelope::seal("x", b"data").unwrap();
        envelope.encrypted_data = "zz".repeat(20);
        assert!(matches!(
            envelope.unpackage().unwrap_err(),
            RektsafeError::InvalidPackage(_)
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut envelope = Envelope::seal("x", b"data").unwrap();
        envelope.version = 9;
        assert!(envelope.unpackage().unwrap_err().to_string().contains("version 9"));
    }

    #[test]
    fn tampered_data_fails_decrypt() {
        let mut envelope = Envelope::seal("x", b"attack at dawn").unwrap();
        let mut bytes = hex::decode(&envelope.encrypted_data).unwrap();
        bytes[0] ^= 0x80;
        envelope.encrypted_data = hex::encode(bytes);

        let unpacked = envelope.unpackage().unwrap();
        assert!(matches!(
            unpacked.decrypt(None).unwrap_err(),
            RektsafeError::Decryption(_)
        ));
    }

    #[test]
    fn wrapped_envelope_needs_matching_signing_key() {
        let sk = signing_key(3);
        let envelope = Envelope::seal_wrapped("w.txt", b"wrapped payload", &sk).unwrap();
        assert_eq!(envelope.version, ENVELOPE_VERSION_WRAPPED);
        assert!(envelope.key.is_none());

        let unpacked = Envelope::unpackage_json(&envelope.to_json().unwrap()).unwrap();
        assert!(unpacked.requires_signing_key());
        assert!(unpacked.decrypt(None).is_err());
        assert!(unpacked.decrypt(Some(&signing_key(4))).is_err());
        assert_eq!(unpacked.decrypt(Some(&sk)).unwrap(), b"wrapped payload");
    }

    #[test]
    fn wrapped_envelope_missing_wrapped_key() {
        let sk = signing_key(5);
        let mut envelope = Envelope::seal_wrapped("w", b"p", &sk).unwrap();
        envelope.wrapped_key = None;
        assert!(matches!(
            envelope.unpackage().unwrap_err(),
            RektsafeError::InvalidPackage(_)
        ));
    }

    #[test]
    fn file_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("hello.txt.encrypted");
        let envelope = Envelope::seal("hello.txt", b"file body").unwrap();

        envelope.write_to(&path).unwrap();
        let loaded = Envelope::read_from(&path).unwrap();
        assert_eq!(loaded, envelope);
    }
}
