//! JSON Web Key encoding for AES-256-GCM and Ed25519 keys
//!
//! Field values use unpadded base64url, the form Web Crypto `exportKey("jwk")`
//! produces, so envelopes and bundles interoperate with browser exports.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::VerifyingKey;
use rektsafe_core::{RektsafeError, RektsafeResult};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::cipher::FileKey;
use crate::KEY_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// Ed25519 public key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// Ed25519 private material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    /// Symmetric key material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_ops: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Jwk {
    /// Export an AES-256-GCM file key.
    pub fn from_file_key(key: &FileKey) -> Self {
        Self {
            kty: "oct".into(),
            k: Some(URL_SAFE_NO_PAD.encode(key.as_bytes())),
            alg: Some("A256GCM".into()),
            ext: Some(true),
            key_ops: vec!["encrypt".into(), "decrypt".into()],
            ..Default::default()
        }
    }

    /// Export an Ed25519 public key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self {
            kty: "OKP".into(),
            crv: Some("Ed25519".into()),
            x: Some(URL_SAFE_NO_PAD.encode(key.as_bytes())),
            ext: Some(true),
            key_ops: vec!["verify".into()],
            ..Default::default()
        }
    }

    /// Export 32 bytes of Ed25519 private material tagged with `kid`.
    ///
    /// For replicated shares this is the seed itself; for Shamir shares it is
    /// the share's evaluation point and is not usable as a key on its own.
    pub fn from_private_material(
        public: &VerifyingKey,
        material: &[u8; KEY_SIZE],
        kid: impl Into<String>,
    ) -> Self {
        Self {
            d: Some(URL_SAFE_NO_PAD.encode(material)),
            key_ops: vec!["sign".into()],
            kid: Some(kid.into()),
            ..Self::from_verifying_key(public)
        }
    }

    /// Import as an AES-256-GCM file key.
    pub fn to_file_key(&self) -> RektsafeResult<FileKey> {
        if self.kty != "oct" {
            return Err(RektsafeError::Decoding(format!(
                "expected JWK kty 'oct', got '{}'",
                self.kty
            )));
        }
        if let Some(alg) = &self.alg {
            if alg != "A256GCM" {
                return Err(RektsafeError::Decoding(format!(
                    "expected JWK alg 'A256GCM', got '{alg}'"
                )));
            }
        }
        let k = self
            .k
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RektsafeError::Decoding("JWK is missing 'k'".into()))?;
        Ok(FileKey::from_bytes(decode_32(k, "k")?))
    }

    /// Import the Ed25519 public key from `x`.
    pub fn to_verifying_key(&self) -> RektsafeResult<VerifyingKey> {
        self.require_ed25519()?;
        let x = self
            .x
            .as_deref()
            .ok_or_else(|| RektsafeError::Decoding("JWK is missing 'x'".into()))?;
        VerifyingKey::from_bytes(&decode_32(x, "x")?)
            .map_err(|e| RektsafeError::Decoding(format!("invalid Ed25519 public key: {e}")))
    }

    /// Raw 32 bytes of `d`.
    pub fn private_material(&self) -> RektsafeResult<[u8; KEY_SIZE]> {
        self.require_ed25519()?;
        let d = self
            .d
            .as_deref()
            .ok_or_else(|| RektsafeError::Decoding("JWK is missing 'd'".into()))?;
        decode_32(d, "d")
    }

    fn require_ed25519(&self) -> RektsafeResult<()> {
        if self.kty != "OKP" || self.crv.as_deref() != Some("Ed25519") {
            return Err(RektsafeError::Decoding(format!(
                "expected an OKP/Ed25519 JWK, got kty '{}' crv {:?}",
                self.kty, self.crv
            )));
        }
        Ok(())
    }
}

fn decode_32(value: &str, field: &str) -> RektsafeResult<[u8; KEY_SIZE]> {
    let mut bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| RektsafeError::Decoding(format!("JWK '{field}' is not base64url: {e}")))?;
    if bytes.len() != KEY_SIZE {
        let len = bytes.len();
        bytes.zeroize();
        return Err(RektsafeError::Decoding(format!(
            "JWK '{field}' must be {KEY_SIZE} bytes, got {len}"
        )));
    }
    let mut out = [0u8; KEY_SIZE];
    out.copy_from_slice(&bytes);
    bytes.zeroize();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::generate_file_key;
    use ed25519_dalek::SigningKey;

    #[test]
    fn file_key_jwk_shape() {
        let key = generate_file_key();
        let jwk = Jwk::from_file_key(&key);
        let value = serde_json::to_value(&jwk).unwrap();

        assert_eq!(value["kty"], "oct");
        assert_eq!(value["alg"], "A256GCM");
        assert_eq!(value["k"].as_str().unwrap().len(), 43);
        assert!(value.get("crv").is_none());
        assert_eq!(jwk.to_file_key().unwrap(), key);
    }

    #[test]
    fn private_jwk_carries_kid_and_public() {
        let sk = SigningKey::from_bytes(&[9u8; KEY_SIZE]);
        let jwk = Jwk::from_private_material(&sk.verifying_key(), &sk.to_bytes(), "party-3");

        assert_eq!(jwk.kid.as_deref(), Some("party-3"));
        assert_eq!(jwk.to_verifying_key().unwrap(), sk.verifying_key());
        assert_eq!(jwk.private_material().unwrap(), sk.to_bytes());
    }

    #[test]
    fn parses_browser_export() {
        let json = r#"{"alg":"A256GCM","ext":true,"k":"AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8","key_ops":["encrypt","decrypt"],"kty":"oct"}"#;
        let jwk: Jwk = serde_json::from_str(json).unwrap();
        let key = jwk.to_file_key().unwrap();
        let expected: Vec<u8> = (0u8..32).collect();
        assert_eq!(key.as_bytes().as_slice(), expected.as_slice());
    }

    #[test]
    fn rejects_wrong_key_type() {
        let sk = SigningKey::from_bytes(&[1u8; KEY_SIZE]);
        let jwk = Jwk::from_verifying_key(&sk.verifying_key());
        assert!(matches!(
            jwk.to_file_key().unwrap_err(),
            RektsafeError::Decoding(_)
        ));
        let aes = Jwk::from_file_key(&generate_file_key());
        assert!(aes.to_verifying_key().is_err());
    }

    #[test]
    fn rejects_short_key() {
        let jwk = Jwk {
            kty: "oct".into(),
            k: Some(URL_SAFE_NO_PAD.encode([0u8; 16])),
            ..Default::default()
        };
        let err = jwk.to_file_key().unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn rejects_missing_material() {
        let jwk = Jwk {
            kty: "oct".into(),
            k: Some(String::new()),
            ..Default::default()
        };
        assert!(jwk.to_file_key().is_err());
    }
}
