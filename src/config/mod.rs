//! Configuration module for the takeout-downloader.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - CLI argument merging
//! - Configuration and index-range validation

pub mod loader;
pub mod validation;

pub use loader::{AuthConfig, Config, ExportConfig, OptionsConfig};
pub use validation::{validate_config, validate_range};
