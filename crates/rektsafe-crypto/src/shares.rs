//! Key-shares bundle: export, import, and key recovery from selected shares
//!
//! Bundle format (JSON):
//! ```text
//! { "publicKey": JWK, "threshold": t, "totalParties": n, "scheme": "replicated",
//!   "shares": [ { "id": 1, "share": JWK with kid "party-1" }, ... ] }
//! ```
//! `scheme` is optional on import and defaults to `replicated`.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rektsafe_core::{RektsafeError, RektsafeResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use zeroize::Zeroize;

use crate::jwk::Jwk;
use crate::keys::KeyGeneration;
use crate::shamir::{self, ShamirPoint};
use crate::threshold::{ShareScheme, ThresholdConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleShare {
    pub id: u8,
    pub share: Jwk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareBundle {
    pub public_key: Jwk,
    pub threshold: u8,
    pub total_parties: u8,
    #[serde(default)]
    pub scheme: ShareScheme,
    pub shares: Vec<BundleShare>,
}

impl From<&KeyGeneration> for ShareBundle {
    fn from(generation: &KeyGeneration) -> Self {
        Self {
            public_key: Jwk::from_verifying_key(&generation.public_key),
            threshold: generation.config.threshold(),
            total_parties: generation.config.total_parties(),
            scheme: generation.scheme,
            shares: generation
                .shares
                .iter()
                .map(|s| BundleShare {
                    id: s.id,
                    share: s.to_jwk(&generation.public_key),
                })
                .collect(),
        }
    }
}

impl ShareBundle {
    /// Threshold configuration, validated against the party limits.
    pub fn config(&self) -> RektsafeResult<ThresholdConfig> {
        ThresholdConfig::new(self.total_parties, self.threshold)
    }

    pub fn verifying_key(&self) -> RektsafeResult<VerifyingKey> {
        self.public_key.to_verifying_key()
    }

    /// Check structure: valid config, public key, and unique in-range share ids.
    pub fn validate(&self) -> RektsafeResult<()> {
        let config = self
            .config()
            .map_err(|e| RektsafeError::InvalidPackage(format!("bundle: {e}")))?;
        self.verifying_key()
            .map_err(|e| RektsafeError::InvalidPackage(format!("bundle public key: {e}")))?;

        let mut seen = BTreeSet::new();
        for entry in &self.shares {
            if !config.contains_party(entry.id) {
                return Err(RektsafeError::InvalidPackage(format!(
                    "share id {} outside 1..={}",
                    entry.id, self.total_parties
                )));
            }
            if !seen.insert(entry.id) {
                return Err(RektsafeError::InvalidPackage(format!(
                    "duplicate share id {}",
                    entry.id
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> RektsafeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> RektsafeResult<Self> {
        let bundle: Self = serde_json::from_str(json)
            .map_err(|e| RektsafeError::InvalidPackage(format!("bundle JSON: {e}")))?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn write_to(&self, path: &Path) -> RektsafeResult<()> {
        std::fs::write(path, self.to_json()?)?;
        tracing::debug!(path = %path.display(), shares = self.shares.len(), "wrote share bundle");
        Ok(())
    }

    pub fn read_from(path: &Path) -> RektsafeResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn share(&self, id: u8) -> RektsafeResult<&BundleShare> {
        self.shares
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| {
                RektsafeError::Configuration(format!("party-{id} is not in this bundle"))
            })
    }

    /// Recover the signing key from the shares with the given ids.
    ///
    /// At least `threshold` distinct ids are required. For replicated bundles
    /// every share already holds the full key, so the count check is the only
    /// gate; for Shamir bundles the key is reconstructed by interpolation.
    /// Either way the result must match the bundle's public key.
    pub fn recover_signing_key(&self, ids: &[u8]) -> RektsafeResult<SigningKey> {
        self.validate()?;
        let unique: BTreeSet<u8> = ids.iter().copied().collect();
        if unique.len() < self.threshold as usize {
            return Err(RektsafeError::Configuration(format!(
                "need at least {} shares, got {}",
                self.threshold,
                unique.len()
            )));
        }

        let mut seed = match self.scheme {
            ShareScheme::Replicated => {
                let mut materials = Vec::with_capacity(unique.len());
                for &id in &unique {
                    materials.push(self.share(id)?.share.private_material()?);
                }
                let Some(&first) = materials.first() else {
                    return Err(RektsafeError::Configuration("no shares selected".into()));
                };
                let consistent = materials.iter().all(|m| m == &first);
                materials.zeroize();
                if !consistent {
                    return Err(RektsafeError::InvalidPackage(
                        "replicated shares disagree on the private key".into(),
                    ));
                }
                first
            }
            ShareScheme::Shamir => {
                let mut points = Vec::with_capacity(unique.len());
                for &id in &unique {
                    points.push(ShamirPoint {
                        x: id,
                        y: self.share(id)?.share.private_material()?,
                    });
                }
                shamir::combine(&points)?
            }
        };

        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();

        if signing_key.verifying_key() != self.verifying_key()? {
            return Err(RektsafeError::InvalidPackage(
                "selected shares do not reconstruct the bundle's public key".into(),
            ));
        }

        tracing::debug!(
            scheme = %self.scheme,
            shares = unique.len(),
            "recovered signing key from shares"
        );
        Ok(signing_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keys, generate_keys_with};

    fn shamir_bundle(total: u8, threshold: u8) -> (KeyGeneration, ShareBundle) {
        let config = ThresholdConfig::new(total, threshold).unwrap();
        let generation = generate_keys_with(config, ShareScheme::Shamir).unwrap();
        let bundle = ShareBundle::from(&generation);
        (generation, bundle)
    }

    #[test]
    fn bundle_json_shape() {
        let generation = generate_keys(5, 3).unwrap();
        let bundle = ShareBundle::from(&generation);
        let value: serde_json::Value = serde_json::from_str(&bundle.to_json().unwrap()).unwrap();

        assert_eq!(value["threshold"], 3);
        assert_eq!(value["totalParties"], 5);
        assert_eq!(value["scheme"], "replicated");
        assert_eq!(value["publicKey"]["kty"], "OKP");
        assert!(value["publicKey"].get("d").is_none());
        assert_eq!(value["shares"].as_array().unwrap().len(), 5);
        assert_eq!(value["shares"][0]["id"], 1);
        assert_eq!(value["shares"][0]["share"]["kid"], "party-1");
    }

    #[test]
    fn import_without_scheme_defaults_to_replicated() {
        let generation = generate_keys(3, 2).unwrap();
        let bundle = ShareBundle::from(&generation);
        let mut value = serde_json::to_value(&bundle).unwrap();
        value.as_object_mut().unwrap().remove("scheme");

        let parsed = ShareBundle::from_json(&value.to_string()).unwrap();
        assert_eq!(parsed.scheme, ShareScheme::Replicated);
        assert_eq!(parsed, bundle);
    }

    #[test]
    fn replicated_recovery_matches_generated_key() {
        let generation = generate_keys(5, 3).unwrap();
        let bundle = ShareBundle::from(&generation);
        let recovered = bundle.recover_signing_key(&[1, 4, 5]).unwrap();
        assert_eq!(recovered.to_bytes(), generation.signing_key.to_bytes());
    }

    #[test]
    fn recovery_requires_threshold_distinct_ids() {
        let generation = generate_keys(5, 3).unwrap();
        let bundle = ShareBundle::from(&generation);
        let err = bundle.recover_signing_key(&[1, 1, 2]).unwrap_err();
        assert!(matches!(err, RektsafeError::Configuration(_)));
    }

    #[test]
    fn shamir_recovery_from_any_subset() {
        let (generation, bundle) = shamir_bundle(5, 3);
        for ids in [[1u8, 2, 3], [2, 4, 5], [1, 3, 5]] {
            let recovered = bundle.recover_signing_key(&ids).unwrap();
            assert_eq!(recovered.to_bytes(), generation.signing_key.to_bytes());
        }
    }

    #[test]
    fn shamir_single_share_is_not_the_key() {
        let (generation, bundle) = shamir_bundle(3, 2);
        let material = bundle.shares[0].share.private_material().unwrap();
        assert_ne!(material, generation.signing_key.to_bytes());
    }

    #[test]
    fn shamir_recovery_detects_foreign_share() {
        let (_, mut bundle) = shamir_bundle(4, 2);
        let (_, other) = shamir_bundle(4, 2);
        bundle.shares[1] = other.shares[1].clone();

        let err = bundle.recover_signing_key(&[1, 2]).unwrap_err();
        assert!(matches!(err, RektsafeError::InvalidPackage(_)));
    }

    #[test]
    fn recovery_rejects_malformed_bundle_without_panicking() {
        let generation = generate_keys(3, 2).unwrap();
        let mut bundle = ShareBundle::from(&generation);
        bundle.threshold = 0;
        let err = bundle.recover_signing_key(&[]).unwrap_err();
        assert!(matches!(err, RektsafeError::InvalidPackage(_)));
    }

    #[test]
    fn unknown_party_is_rejected() {
        let generation = generate_keys(3, 2).unwrap();
        let mut bundle = ShareBundle::from(&generation);
        bundle.shares.truncate(2);
        let err = bundle.recover_signing_key(&[1, 3]).unwrap_err();
        assert!(err.to_string().contains("party-3"));
    }

    #[test]
    fn validate_rejects_duplicates_and_bad_config() {
        let generation = generate_keys(3, 2).unwrap();
        let mut bundle = ShareBundle::from(&generation);
        bundle.shares[1].id = 1;
        assert!(matches!(
            bundle.validate().unwrap_err(),
            RektsafeError::InvalidPackage(_)
        ));

        let mut bundle = ShareBundle::from(&generation);
        bundle.threshold = 1;
        assert!(ShareBundle::from_json(&bundle.to_json().unwrap()).is_err());
    }

    #[test]
    fn file_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("shares.json");
        let generation = generate_keys(4, 3).unwrap();
        let bundle = ShareBundle::from(&generation);

        bundle.write_to(&path).unwrap();
        let loaded = ShareBundle::read_from(&path).unwrap();
        assert_eq!(loaded, bundle);
    }
}
