pub mod config;
pub mod error;
pub mod types;

pub use config::{CompletionProvider, Config};
pub use error::ThreatMapError;
pub use types::*;
