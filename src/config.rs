//! Tunables for mapping proposals and merges.
//!
//! Values come from built-in defaults, optionally overlaid by a YAML file
//! (`--config`), then by individual command-line flags.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;
pub const DEFAULT_TOP_K_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MergeConfig {
    /// Minimum similarity for a target column to be suggested.
    pub similarity_threshold: f64,
    /// Maximum number of suggestions kept per unmapped source column.
    pub top_k_suggestions: usize,
    /// Allow several source columns to feed one target column.
    pub allow_many_to_one_mapping: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            top_k_suggestions: DEFAULT_TOP_K_SUGGESTIONS,
            allow_many_to_one_mapping: false,
        }
    }
}

impl MergeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        let config: MergeConfig =
            serde_yaml::from_reader(reader).context("Parsing merge config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.similarity_threshold),
            "similarityThreshold must be between 0 and 1 (got {})",
            self.similarity_threshold
        );
        ensure!(
            self.top_k_suggestions > 0,
            "topKSuggestions must be at least 1"
        );
        Ok(())
    }

    pub fn with_overrides(
        mut self,
        threshold: Option<f64>,
        top_k: Option<usize>,
        allow_many_to_one: bool,
    ) -> Result<Self> {
        if let Some(value) = threshold {
            self.similarity_threshold = value;
        }
        if let Some(value) = top_k {
            self.top_k_suggestions = value;
        }
        if allow_many_to_one {
            self.allow_many_to_one_mapping = true;
        }
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_documented_values() {
        let config = MergeConfig::default();
        assert_eq!(config.similarity_threshold, 0.6);
        assert_eq!(config.top_k_suggestions, 3);
        assert!(!config.allow_many_to_one_mapping);
    }

    #[test]
    fn load_fills_missing_keys_with_defaults() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "similarityThreshold: 0.75").unwrap();
        let config = MergeConfig::load(file.path()).expect("load config");
        assert_eq!(config.similarity_threshold, 0.75);
        assert_eq!(config.top_k_suggestions, 3);
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let err = MergeConfig::default()
            .with_overrides(Some(1.5), None, false)
            .unwrap_err();
        assert!(err.to_string().contains("similarityThreshold"));

        let err = MergeConfig::default()
            .with_overrides(None, Some(0), false)
            .unwrap_err();
        assert!(err.to_string().contains("topKSuggestions"));
    }
}
