//! Key generation: one Ed25519 keypair fanned out into labelled party shares

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::RngCore;
use rektsafe_core::RektsafeResult;
use zeroize::Zeroize;

use crate::jwk::Jwk;
use crate::shamir;
use crate::threshold::{ShareScheme, ThresholdConfig};
use crate::KEY_SIZE;

/// One party's share. Zeroized on drop.
///
/// Under [`ShareScheme::Replicated`] `material` is the full Ed25519 seed and is
/// identical across every share. Under [`ShareScheme::Shamir`] it is the
/// share's evaluation point.
#[derive(Clone)]
pub struct Share {
    pub id: u8,
    pub label: String,
    material: [u8; KEY_SIZE],
}

impl Share {
    pub fn new(id: u8, material: [u8; KEY_SIZE]) -> Self {
        Self {
            id,
            label: party_label(id),
            material,
        }
    }

    pub fn material(&self) -> &[u8; KEY_SIZE] {
        &self.material
    }

    /// Export as a private JWK with `kid = label`.
    pub fn to_jwk(&self, public_key: &VerifyingKey) -> Jwk {
        Jwk::from_private_material(public_key, &self.material, self.label.clone())
    }
}

impl Drop for Share {
    fn drop(&mut self) {
        self.material.zeroize();
    }
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Share")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// `party-<id>`
pub fn party_label(id: u8) -> String {
    format!("party-{id}")
}

/// Result of key generation
#[derive(Debug)]
pub struct KeyGeneration {
    pub signing_key: SigningKey,
    pub public_key: VerifyingKey,
    pub config: ThresholdConfig,
    pub scheme: ShareScheme,
    pub shares: Vec<Share>,
}

/// Generate a keypair and `total_parties` replicated shares.
///
/// Every share carries the same private key: this is a threshold simulation,
/// not a threshold scheme. Use [`generate_keys_with`] and
/// [`ShareScheme::Shamir`] for real splitting.
pub fn generate_keys(total_parties: u8, threshold: u8) -> RektsafeResult<KeyGeneration> {
    let config = ThresholdConfig::new(total_parties, threshold)?;
    generate_keys_with(config, ShareScheme::Replicated)
}

/// Generate a keypair and split it according to `scheme`.
pub fn generate_keys_with(
    config: ThresholdConfig,
    scheme: ShareScheme,
) -> RektsafeResult<KeyGeneration> {
    let mut seed = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut seed);
    let signing_key = SigningKey::from_bytes(&seed);
    let public_key = signing_key.verifying_key();

    let shares = match scheme {
        ShareScheme::Replicated => (1..=config.total_parties())
            .map(|id| Share::new(id, seed))
            .collect(),
        ShareScheme::Shamir => shamir::split(&seed, config.threshold(), config.total_parties())?
            .iter()
            .map(|p| Share::new(p.x, p.y))
            .collect(),
    };
    seed.zeroize();

    tracing::debug!(
        total_parties = config.total_parties(),
        threshold = config.threshold(),
        %scheme,
        public_key = %hex::encode(public_key.as_bytes()),
        "generated keypair and shares"
    );
    if scheme == ShareScheme::Replicated {
        tracing::warn!("replicated shares all carry the full private key (threshold simulation)");
    }

    Ok(KeyGeneration {
        signing_key,
        public_key,
        config,
        scheme,
        shares,
    })
}
