//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, AuthConfig, ...)
//! - [`defaults`]: Serde defaulting functions
//! - [`validation`]: Start-up validation pass

mod defaults;
mod types;
mod validation;

pub use types::{
    AuthConfig, ClientConfig, ClientKind, Config, ConfigError, DatabaseConfig, LogFormat,
    PipelineConfig, ServerConfig,
};
pub use validation::validate;
