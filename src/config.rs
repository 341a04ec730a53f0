//! Fusion settings: defaults, optional TOML file, environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FusionError, Result};
use crate::search::document::DedupStrategy;
use crate::search::ensemble::WeightPolicy;
use crate::search::hybrid::{DEFAULT_RRF_C, validate_constant};

/// Environment variable naming a settings file.
pub const CONFIG_ENV: &str = "RRF_FUSION_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionSettings {
    #[serde(default = "default_c")]
    pub c: f64,
    /// Per-retriever weights, by configured position
    #[serde(default)]
    pub weights: Vec<f64>,
    #[serde(default)]
    pub dedup: DedupStrategy,
    #[serde(default)]
    pub weight_policy: WeightPolicy,
    #[serde(default)]
    pub parallel: bool,
}

const fn default_c() -> f64 {
    DEFAULT_RRF_C
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            c: DEFAULT_RRF_C,
            weights: Vec::new(),
            dedup: DedupStrategy::Content,
            weight_policy: WeightPolicy::Lenient,
            parallel: false,
        }
    }
}

impl FusionSettings {
    /// Load settings.
    ///
    /// Order: defaults, then the file at `explicit_path` (or `$RRF_FUSION_CONFIG`)
    /// if it exists, then `RRF_FUSION_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();

        let path = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        if let Some(path) = path {
            if let Some(patch) = Self::load_patch(&path)? {
                settings.merge_patch(patch);
            }
        }

        settings.apply_env_overrides()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Parse a complete TOML document, filling omitted keys with defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(raw).map_err(|err| FusionError::Config(format!("parse config: {err}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        validate_constant(self.c)
            .map_err(|_| FusionError::Config(format!("c must be finite and > 0, got {}", self.c)))?;
        if let Some(bad) = self.weights.iter().find(|w| !w.is_finite()) {
            return Err(FusionError::Config(format!("weight {bad} is not finite")));
        }
        Ok(())
    }

    fn load_patch(path: &Path) -> Result<Option<SettingsPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| FusionError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| FusionError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: SettingsPatch) {
        if let Some(value) = patch.c {
            self.c = value;
        }
        if let Some(value) = patch.weights {
            self.weights = value;
        }
        if let Some(value) = patch.dedup {
            self.dedup = value;
        }
        if let Some(value) = patch.weight_policy {
            self.weight_policy = value;
        }
        if let Some(value) = patch.parallel {
            self.parallel = value;
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `RRF_FUSION_*` overrides, reading each key through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = env_f64(&lookup, "RRF_FUSION_C")? {
            self.c = value;
        }
        if let Some(values) = env_f64_list(&lookup, "RRF_FUSION_WEIGHTS")? {
            self.weights = values;
        }
        if let Some(value) = lookup("RRF_FUSION_DEDUP") {
            self.dedup = value.parse().map_err(FusionError::Config)?;
        }
        if let Some(value) = lookup("RRF_FUSION_WEIGHT_POLICY") {
            self.weight_policy = value.parse().map_err(FusionError::Config)?;
        }
        if let Some(value) = env_bool(&lookup, "RRF_FUSION_PARALLEL")? {
            self.parallel = value;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SettingsPatch {
    pub c: Option<f64>,
    pub weights: Option<Vec<f64>>,
    pub dedup: Option<DedupStrategy>,
    pub weight_policy: Option<WeightPolicy>,
    pub parallel: Option<bool>,
}

fn env_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(FusionError::Config(format!(
            "invalid {key} value {value}: expected true or false"
        ))),
    }
}

fn env_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<f64>> {
    match lookup(key) {
        Some(value) => value.trim().parse::<f64>().map(Some).map_err(|err| {
            FusionError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        None => Ok(None),
    }
}

fn env_f64_list(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Vec<f64>>> {
    match lookup(key) {
        Some(value) => value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry.parse::<f64>().map_err(|err| {
                    FusionError::Config(format!("invalid {key} entry {entry}: {err}"))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        None => Ok(None),
    }
}
