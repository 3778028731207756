//! Data model: chain configuration, domain types, error taxonomy

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
