//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the reason crates:
//! - Logging and tracing initialisation
//! - Configuration loading (builder, JSON settings file, environment)
//! - Backend and context-lifetime selection enums
//!
//! ## Overview
//!
//! Nothing in this crate touches storage. It decides *which* backend gets
//! wired up and *where* it connects, and sets up the `tracing` pipeline every
//! executor logs through.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ConnectionStringSource, ContextLifetime, ReasonsConfig, RepositoryMode};
pub use error::{Error, Result};
