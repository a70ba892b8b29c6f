pub mod analysis;
#[cfg(feature = "cli")]
pub mod config;
pub mod core;
pub mod domain;
pub mod rename;
pub mod rewrite;
pub mod scenario;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, toml_config::TomlConfig, CliConfig};

pub use core::{engine::MigrationEngine, pipeline::MigratePipeline};
pub use utils::error::{MigrateError, Result};
