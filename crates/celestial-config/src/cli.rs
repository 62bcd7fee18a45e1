//! Command-line argument parsing for the celestial generator.

use std::path::PathBuf;

use clap::Parser;

use crate::{BackendPreference, Config};

/// Celestial body generator command-line arguments.
///
/// CLI values override settings loaded from `celestial.ron`.
#[derive(Parser, Debug)]
#[command(name = "celestial", about = "Procedural celestial body generator")]
pub struct CliArgs {
    /// Terrain tessellation resolution.
    #[arg(long)]
    pub resolution: Option<u32>,

    /// Collision mesh tessellation resolution.
    #[arg(long)]
    pub collision_resolution: Option<u32>,

    /// Log generation stage timings.
    #[arg(long)]
    pub log_timers: Option<bool>,

    /// Compute backend (auto, gpu, host).
    #[arg(long, value_enum)]
    pub backend: Option<BackendPreference>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(resolution) = args.resolution {
            self.generation.resolution = resolution;
        }
        if let Some(resolution) = args.collision_resolution {
            self.generation.collision_resolution = resolution;
        }
        if let Some(log_timers) = args.log_timers {
            self.generation.log_timers = log_timers;
        }
        if let Some(backend) = args.backend {
            self.compute.backend = backend;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> CliArgs {
        CliArgs {
            resolution: None,
            collision_resolution: None,
            log_timers: None,
            backend: None,
            log_level: None,
            config: None,
        }
    }

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            resolution: Some(42),
            backend: Some(BackendPreference::Host),
            ..empty_args()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.generation.resolution, 42);
        assert_eq!(config.compute.backend, BackendPreference::Host);
        // Non-overridden fields retain defaults
        assert_eq!(config.generation.collision_resolution, 300);
        assert!(!config.generation.log_timers);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&empty_args());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::try_parse_from([
            "celestial",
            "--resolution",
            "64",
            "--backend",
            "gpu",
            "--log-timers",
            "true",
        ])
        .unwrap();
        assert_eq!(args.resolution, Some(64));
        assert_eq!(args.backend, Some(BackendPreference::Gpu));
        assert_eq!(args.log_timers, Some(true));
    }
}
