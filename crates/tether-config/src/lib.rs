//! Configuration system for the Tether session repository.
//!
//! Provides TOML-based configuration with:
//! - Primary/secondary store selection (`[session]`)
//! - Idle-timeout policy settings (`[session.max_age]`)
//! - Per-store settings (`[stores.key_value]`, `[stores.document]`, `[stores.relational]`)
//! - Config file layering (user config dir + project-local overrides)
//!
//! Files are parsed leniently so layers can be merged; [`TetherConfig::validate`]
//! rejects missing or contradictory store selections before anything is built.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigLayer, ConfigSource, LayerStatus, LoadedConfig, load_config, load_config_file,
    load_config_with_options, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
