//! Run configuration: an optional YAML/JSON file, overridden by flags.

use std::path::Path;

use anyhow::{Context, Result, bail};
use bsp_kmeans::Config;
use serde::Deserialize;

/// Configuration file format. Every field may also come from a flag.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default)]
    pub epsilon: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ConfigFile {
    /// Loads a config file, choosing the format by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        let cfg = match ext {
            "json" => serde_json::from_slice(&data)?,
            "yaml" | "yml" => serde_yaml::from_slice(&data)?,
            _ => bail!("unsupported config format: {}", path.display()),
        };
        Ok(cfg)
    }

    /// Applies flag values on top of the file. Flags win.
    pub fn merge(mut self, flags: ConfigFile) -> Self {
        self.k = flags.k.or(self.k);
        self.max_iterations = flags.max_iterations.or(self.max_iterations);
        self.epsilon = flags.epsilon.or(self.epsilon);
        self.seed = flags.seed.or(self.seed);
        self
    }

    /// Builds and validates the library configuration.
    pub fn resolve(self) -> Result<Config> {
        let Some(k) = self.k else {
            bail!("number of clusters not set (use -k or the config file)");
        };
        let Some(max_iterations) = self.max_iterations else {
            bail!("maximum number of iterations not set (use -n or the config file)");
        };
        let mut config = Config::new(k, max_iterations);
        if let Some(epsilon) = self.epsilon {
            config = config.with_epsilon(epsilon);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config.validate()?;
        Ok(config)
    }
}
