//! Parsing and validation of `lockstep.toml` run configuration files.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`LockstepConfig`], resolves its `[buses]` tables into a
//! [`SchemaSet`](lockstep_ir::SchemaSet), and derives the simulator's
//! [`SimConfig`](lockstep_sim::SimConfig).

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_schemas, sim_config};
pub use types::*;
