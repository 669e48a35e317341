//! rektsafe-crypto: client-side share generation, file envelopes, and signing
//!
//! Workflow:
//! ```text
//! generate_keys(N, t) ──► ShareBundle (export)
//!        │
//!        └──► encrypt(file) ──► Envelope (.encrypted JSON) ──► unpackage ──► decrypt
//!                                        ▲
//!                         ThresholdGate: selected.len() >= t
//! ```
//!
//! Share schemes:
//! - `replicated`: every share carries the same Ed25519 private key under a
//!   different `kid`. The threshold is a UI counter only, and a version 1
//!   envelope embeds its AES key, so the file alone decrypts. This is a
//!   threshold *simulation* and is labelled as such in all output.
//! - `shamir`: the 32-byte Ed25519 seed is split over GF(2^8). Reconstruction
//!   needs `t` shares. Combined with a version 2 envelope (AES key wrapped
//!   under a key derived from the seed), opening the file needs `t` shares.

pub mod cipher;
pub mod envelope;
pub mod gate;
pub mod jwk;
pub mod keys;
pub mod session;
pub mod shamir;
pub mod shares;
pub mod sign;
pub mod threshold;

pub use cipher::{decrypt, encrypt, generate_file_key, EncryptedFile, FileKey};
pub use envelope::{Envelope, EnvelopeKey, Unpacked};
pub use gate::{GateState, ThresholdGate};
pub use jwk::Jwk;
pub use keys::{generate_keys, generate_keys_with, KeyGeneration, Share};
pub use session::Session;
pub use shares::{BundleShare, ShareBundle};
pub use sign::{sign, sign_digest, verify, verify_digest};
pub use threshold::{ShareScheme, ThresholdConfig};

pub use ed25519_dalek::{SigningKey, VerifyingKey};

/// Size of an AES-256 key and of an Ed25519 seed (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM IV (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of an Ed25519 signature
pub const SIGNATURE_SIZE: usize = 64;

/// Smallest accepted threshold
pub const MIN_THRESHOLD: u8 = 2;

/// Hard cap on the number of parties
pub const MAX_PARTIES: u8 = 10;

/// Envelope format with the AES key embedded as a JWK
pub const ENVELOPE_VERSION_EMBEDDED: u32 = 1;

/// Envelope format with the AES key wrapped under the signing key
pub const ENVELOPE_VERSION_WRAPPED: u32 = 2;
