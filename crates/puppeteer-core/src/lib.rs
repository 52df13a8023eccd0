//! Puppeteer Core - Types, configuration, and error handling

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::{Error, PathDiagnostic, Result};
pub use types::*;
