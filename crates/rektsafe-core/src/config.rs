use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration (loaded from rektsafe.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RektsafeConfig {
    pub log: LogConfig,
    pub keygen: KeygenConfig,
    pub envelope: EnvelopeConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Defaults for `rektsafe keygen` when flags are omitted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeygenConfig {
    /// Number of parties (2..=10)
    pub total_parties: u8,
    /// Shares required to unlock (2..=total_parties)
    pub threshold: u8,
    /// Share scheme: "replicated" (demo, same key in every share) or "shamir"
    pub scheme: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Extension appended to encrypted files
    pub extension: String,
    /// Wrap the file key under the signing key (version 2 envelope)
    /// instead of embedding it as a JWK
    pub wrap_key: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for generated bundles and envelopes (default: current dir)
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl Default for KeygenConfig {
    fn default() -> Self {
        Self {
            total_parties: 5,
            threshold: 3,
            scheme: "replicated".into(),
        }
    }
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            extension: "encrypted".into(),
            wrap_key: false,
        }
    }
}

impl RektsafeConfig {
    /// Load from a TOML file; a missing file yields defaults.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    }
}
