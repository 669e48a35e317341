//! Ed25519 message and file-digest signatures, serialized as lowercase hex

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rektsafe_core::{RektsafeError, RektsafeResult};
use sha2::{Digest, Sha256};

use crate::{KEY_SIZE, SIGNATURE_SIZE};

/// Sign the UTF-8 bytes of `message`.
pub fn sign(message: &str, signing_key: &SigningKey) -> String {
    let signature = signing_key.sign(message.as_bytes());
    tracing::debug!(message_len = message.len(), "message signed");
    hex::encode(signature.to_bytes())
}

/// Verify a hex signature over `message`.
///
/// A mismatch returns `Ok(false)`; only malformed hex is an error.
/// Verification is strict: small-order public keys and `R` points are
/// rejected, which no honestly generated Ed25519 key produces.
pub fn verify(
    message: &str,
    signature_hex: &str,
    public_key: &VerifyingKey,
) -> RektsafeResult<bool> {
    verify_bytes(message.as_bytes(), signature_hex, public_key)
}

/// SHA-256 digest of a file's contents.
pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Sign the SHA-256 digest of `data`.
pub fn sign_digest(data: &[u8], signing_key: &SigningKey) -> String {
    let digest = sha256_digest(data);
    tracing::debug!(data_len = data.len(), digest = %hex::encode(digest), "digest signed");
    hex::encode(signing_key.sign(&digest).to_bytes())
}

/// Verify a signature produced by [`sign_digest`].
pub fn verify_digest(
    data: &[u8],
    signature_hex: &str,
    public_key: &VerifyingKey,
) -> RektsafeResult<bool> {
    verify_bytes(&sha256_digest(data), signature_hex, public_key)
}

fn verify_bytes(
    msg: &[u8],
    signature_hex: &str,
    public_key: &VerifyingKey,
) -> RektsafeResult<bool> {
    let signature = decode_signature(signature_hex)?;
    let valid = public_key.verify_strict(msg, &signature).is_ok();
    tracing::debug!(valid, "signature checked");
    Ok(valid)
}

/// Parse a 64-byte hex signature. Accepts an optional `0x` prefix.
pub fn decode_signature(signature_hex: &str) -> RektsafeResult<Signature> {
    let mut bytes = [0u8; SIGNATURE_SIZE];
    decode_hex_into(signature_hex, &mut bytes, "signature")?;
    Ok(Signature::from_bytes(&bytes))
}

/// Parse a 32-byte hex Ed25519 public key. Accepts an optional `0x` prefix.
pub fn decode_public_key(public_hex: &str) -> RektsafeResult<VerifyingKey> {
    let mut bytes = [0u8; KEY_SIZE];
    decode_hex_into(public_hex, &mut bytes, "public key")?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| RektsafeError::Decoding(format!("invalid Ed25519 public key: {e}")))
}

fn decode_hex_into(input: &str, out: &mut [u8], what: &str) -> RektsafeResult<()> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode_to_slice(trimmed, out).map_err(|e| {
        RektsafeError::Decoding(format!(
            "{what} must be {} hex characters: {e}",
            out.len() * 2
        ))
    })
}
