use crate::mutator::{DEFAULT_MAX_DEPTH, DEFAULT_MIN_DEPTH};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid depth range {min}..={max}: bounds must satisfy 1 <= min <= max")]
    InvalidDepthRange { min: usize, max: usize },

    #[error("Initial generation depth must be at least 1")]
    ZeroInitialDepth,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct MutationSettings {
    #[serde(default = "default_min_depth")]
    pub min_depth: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Fixed seed for reproducible runs; a fresh seed is drawn when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_min_depth() -> usize {
    DEFAULT_MIN_DEPTH
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl MutationSettings {
    pub fn depth_range(&self) -> RangeInclusive<usize> {
        self.min_depth..=self.max_depth
    }

    /// Builds the RNG for a fuzzing run from `seed`.
    pub fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        }
    }
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            min_depth: default_min_depth(),
            max_depth: default_max_depth(),
            seed: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct GenerationSettings {
    #[serde(default = "default_initial_depth")]
    pub initial_depth: usize,
}

pub fn default_initial_depth() -> usize {
    10
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            initial_depth: default_initial_depth(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct GramfuzzConfig {
    #[serde(default)]
    pub mutation: MutationSettings,
    #[serde(default)]
    pub generation: GenerationSettings,
}

impl GramfuzzConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GramfuzzConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let MutationSettings {
            min_depth,
            max_depth,
            ..
        } = self.mutation;
        if min_depth == 0 || min_depth > max_depth {
            return Err(ConfigError::InvalidDepthRange {
                min: min_depth,
                max: max_depth,
            });
        }
        if self.generation.initial_depth == 0 {
            return Err(ConfigError::ZeroInitialDepth);
        }
        Ok(())
    }
}
