pub mod config;
pub mod error;
pub mod types;

pub use error::{RektsafeError, RektsafeResult};
pub use types::{Severity, TerminalLine};
