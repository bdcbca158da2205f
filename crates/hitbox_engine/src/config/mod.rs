//! Configuration system
//!
//! [`PhysicsConfig`] holds the simulation constants shared by every physics
//! call: tick rate, tile/chunk geometry and the soft collision push constant.
//! Any [`Config`] can be loaded from and saved to `.toml` or `.ron` files.

pub use serde::{Serialize, Deserialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value failed validation
    #[error("Invalid configuration value `{field}`: {reason}")]
    Invalid {
        /// Offending field name
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Simulation constants for the physics core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Fixed simulation rate
    pub ticks_per_second: u32,

    /// Width of a tile in world units
    pub tile_size: f32,

    /// Number of wall subtiles along each side of a tile
    pub subtiles_per_tile: u32,

    /// Number of tiles along each side of a chunk
    pub chunk_size_tiles: u32,

    /// Number of tiles along each side of a layer
    pub board_size_tiles: u32,

    /// Scale of the push force applied by soft collisions
    pub soft_push_force_constant: f32,

    /// Number of layers created with the world
    pub layer_count: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 60,
            tile_size: 64.0,
            subtiles_per_tile: 4,
            chunk_size_tiles: 4,
            board_size_tiles: 64,
            soft_push_force_constant: 75.0,
            layer_count: 1,
        }
    }
}

impl Config for PhysicsConfig {}

impl PhysicsConfig {
    /// Seconds per tick
    pub fn delta_time(&self) -> f32 {
        1.0 / self.ticks_per_second as f32
    }

    /// Side length of a layer in world units
    pub fn world_size(&self) -> f32 {
        self.board_size_tiles as f32 * self.tile_size
    }

    /// Side length of a chunk in world units
    pub fn chunk_size(&self) -> f32 {
        self.chunk_size_tiles as f32 * self.tile_size
    }

    /// Number of chunks along each side of a layer
    pub fn chunks_per_side(&self) -> usize {
        (self.board_size_tiles as usize).div_ceil(self.chunk_size_tiles as usize)
    }

    /// Side length of a wall subtile in world units
    pub fn subtile_size(&self) -> f32 {
        self.tile_size / self.subtiles_per_tile as f32
    }

    /// Number of subtiles along each side of a layer
    pub fn subtiles_per_side(&self) -> usize {
        (self.board_size_tiles * self.subtiles_per_tile) as usize
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks_per_second == 0 {
            return Err(ConfigError::Invalid {
                field: "ticks_per_second",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.tile_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "tile_size",
                reason: format!("must be positive, got {}", self.tile_size),
            });
        }
        if self.subtiles_per_tile == 0 {
            return Err(ConfigError::Invalid {
                field: "subtiles_per_tile",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.chunk_size_tiles == 0 || self.board_size_tiles == 0 {
            return Err(ConfigError::Invalid {
                field: "chunk_size_tiles",
                reason: "chunk and board sizes must be at least 1 tile".to_string(),
            });
        }
        if self.soft_push_force_constant < 0.0 {
            return Err(ConfigError::Invalid {
                field: "soft_push_force_constant",
                reason: "must not be negative".to_string(),
            });
        }
        if self.layer_count == 0 {
            return Err(ConfigError::Invalid {
                field: "layer_count",
                reason: "a world needs at least one layer".to_string(),
            });
        }
        Ok(())
    }
}
