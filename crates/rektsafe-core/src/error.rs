use thiserror::Error;

pub type RektsafeResult<T> = Result<T, RektsafeError>;

#[derive(Debug, Error)]
pub enum RektsafeError {
    /// Bad party count or threshold.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Includes authentication-tag mismatch on tampered ciphertext.
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("invalid package: {0}")]
    InvalidPackage(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RektsafeError {
    /// Short taxonomy name, used as the prefix of terminal output lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::Encryption(_) => "EncryptionError",
            Self::Decryption(_) => "DecryptionError",
            Self::InvalidPackage(_) => "InvalidPackageError",
            Self::Decoding(_) => "DecodingError",
            Self::Io(_) => "IoError",
            Self::Json(_) => "JsonError",
            Self::Other(_) => "Error",
        }
    }
}
