//! # MarketPulse Core
//!
//! Shared configuration and error types for the MarketPulse workspace.

pub mod config;
pub mod error;

pub use config::PulseConfig;
pub use error::{PulseError, Result};
