// src/config/mod.rs

//! Configuration loading and validation for goalweaver.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: knob ranges, `after` references and DAG shape.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, GoalConfig, OrchestratorSection, RawConfigFile};
pub use validate::validate_config;
