//! # Unlearning to Rest Common Library
//!
//! Shared code for the study server and its tooling:
//! - Configuration loading and root folder resolution
//! - Model catalog and counterbalanced model ordering
//! - Database schema, migrations and row models
//! - Utility functions

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use config::{ModelCatalog, ModelSpec, Provider, StudyConfig};
pub use error::{Error, Result};
