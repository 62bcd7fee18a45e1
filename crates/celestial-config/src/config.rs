//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "celestial.ron";

/// Top-level generator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Mesh generation settings.
    pub generation: GenerationConfig,
    /// Body shape and shading settings.
    pub body: BodyConfig,
    /// Compute backend selection.
    pub compute: ComputeConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Tessellation and regeneration settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Terrain tessellation density (subdivisions per octahedron edge).
    pub resolution: u32,
    /// Collision mesh tessellation density, independent of `resolution`.
    pub collision_resolution: u32,
    /// Log elapsed time of each generation stage.
    pub log_timers: bool,
    /// Repeat every shading-only refresh once more on the same tick.
    pub double_shading_pass: bool,
    /// Regenerate on edit ticks. When false, `update` does nothing.
    pub show: bool,
}

/// Settings of the body being generated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BodyConfig {
    /// Uniform scale applied to the unit-radius body.
    pub scale: f32,
    /// Ocean level in [0, 1] between the lowest terrain point and radius 1.
    pub ocean_level: f32,
    /// Whether the body has an ocean at all.
    pub has_ocean: bool,
    /// Jitter vertex directions before height scaling.
    pub perturb_vertices: bool,
    /// Perturbation strength as a fraction of half an edge length.
    pub perturb_strength: f32,
}

/// Which compute backend evaluates the height and shading kernels.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum,
)]
pub enum BackendPreference {
    /// Use the GPU when an adapter is available, otherwise the host backend.
    #[default]
    Auto,
    /// Require a GPU adapter.
    Gpu,
    /// Evaluate kernels on the CPU.
    Host,
}

/// Compute backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComputeConfig {
    /// Backend selection.
    pub backend: BackendPreference,
    /// Prefer a discrete adapter when several are present.
    pub high_performance: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Directory for JSON log files in debug builds.
    pub log_dir: Option<PathBuf>,
}

// --- Default implementations ---

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            resolution: 300,
            collision_resolution: 300,
            log_timers: false,
            double_shading_pass: true,
            show: true,
        }
    }
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            ocean_level: 0.5,
            has_ocean: true,
            perturb_vertices: false,
            perturb_strength: 0.7,
        }
    }
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            high_performance: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// Per-user configuration directory, e.g. `~/.config/celestial` on Linux.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("celestial"))
        .ok_or(ConfigError::NoConfigDir)
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `celestial.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Returns `true` if a change from `self` to `other` affects terrain shape.
    pub fn shape_changed(&self, other: &Config) -> bool {
        self.generation.resolution != other.generation.resolution
            || self.generation.collision_resolution != other.generation.collision_resolution
            || self.body.perturb_vertices != other.body.perturb_vertices
            || self.body.perturb_strength != other.body.perturb_strength
    }

    /// Returns `true` if a change from `self` to `other` affects shading only.
    pub fn shading_changed(&self, other: &Config) -> bool {
        self.body.ocean_level != other.body.ocean_level
            || self.body.has_ocean != other.body.has_ocean
    }
}
