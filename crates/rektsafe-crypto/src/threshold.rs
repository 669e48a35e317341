//! Party count / threshold validation and share scheme selection

use rektsafe_core::{RektsafeError, RektsafeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{MAX_PARTIES, MIN_THRESHOLD};

/// Validated `(total_parties, threshold)` pair.
///
/// Invariant: `2 <= threshold <= total_parties <= 10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdConfig {
    total_parties: u8,
    threshold: u8,
}

impl ThresholdConfig {
    pub fn new(total_parties: u8, threshold: u8) -> RektsafeResult<Self> {
        if total_parties > MAX_PARTIES {
            return Err(RektsafeError::Configuration(format!(
                "total parties must be at most {MAX_PARTIES}, got {total_parties}"
            )));
        }
        if threshold < MIN_THRESHOLD {
            return Err(RektsafeError::Configuration(format!(
                "threshold must be at least {MIN_THRESHOLD}, got {threshold}"
            )));
        }
        if threshold > total_parties {
            return Err(RektsafeError::Configuration(format!(
                "threshold {threshold} exceeds total parties {total_parties}"
            )));
        }
        Ok(Self {
            total_parties,
            threshold,
        })
    }

    pub fn total_parties(&self) -> u8 {
        self.total_parties
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Party ids run `1..=total_parties`.
    pub fn contains_party(&self, id: u8) -> bool {
        (1..=self.total_parties).contains(&id)
    }
}

/// How the private key is distributed across party shares
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareScheme {
    /// Same private key in every share (threshold simulation)
    #[default]
    Replicated,
    /// Shamir's Secret Sharing of the Ed25519 seed over GF(2^8)
    Shamir,
}

impl fmt::Display for ShareScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareScheme::Replicated => f.write_str("replicated"),
            ShareScheme::Shamir => f.write_str("shamir"),
        }
    }
}

impl FromStr for ShareScheme {
    type Err = RektsafeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replicated" => Ok(ShareScheme::Replicated),
            "shamir" => Ok(ShareScheme::Shamir),
            other => Err(RektsafeError::Configuration(format!(
                "unknown share scheme '{other}' (expected 'replicated' or 'shamir')"
            ))),
        }
    }
}
