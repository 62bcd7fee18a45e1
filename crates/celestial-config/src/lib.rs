//! Configuration for the celestial body generator.
//!
//! Settings persist to disk as a RON file, can be overridden from the command
//! line via clap, and support hot-reload detection so an editor loop can pick
//! up changes without restarting.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    BackendPreference, BodyConfig, ComputeConfig, Config, DebugConfig, GenerationConfig,
    default_config_dir,
};
pub use error::ConfigError;
