//! Configuration
//!
//! TOML files describing a parameter sweep for the batch runner, or a
//! single run for the CLI.

use abm_types::{ParamValue, Params};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors that can occur while loading or writing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A parameter sweep.
///
/// ```toml
/// [batch]
/// iterations = 5
/// max_steps = 100
///
/// [fixed]
/// width = 10
///
/// [variable]
/// n = [10, 50, 100]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub batch: BatchSection,
    /// Parameters shared by every run
    #[serde(default)]
    pub fixed: Params,
    /// Parameters to sweep, each with its list of values, in file order
    #[serde(default)]
    pub variable: IndexMap<String, Vec<ParamValue>>,
}

impl SweepConfig {
    /// Loads a sweep from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses a sweep from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Number of runs the sweep expands to.
    pub fn run_count(&self) -> usize {
        let combinations: usize = self.variable.values().map(Vec::len).product();
        combinations * self.batch.iterations.max(1)
    }
}

/// Run counts and limits for a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// Repetitions of every parameter combination
    pub iterations: usize,
    /// Step limit per run
    pub max_steps: u64,
    /// Seed of the first run; run k uses `seed + k`
    pub seed: u64,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            iterations: 1,
            max_steps: 1000,
            seed: 0,
        }
    }
}

/// A single run, as read by `abm run --config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub model: Option<String>,
    pub steps: Option<u64>,
    pub seed: Option<u64>,
    pub params: Params,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sweep_parses_all_sections() {
        let config = SweepConfig::from_str(
            r#"
            [batch]
            iterations = 3
            max_steps = 50
            seed = 42

            [fixed]
            width = 10
            torus = true

            [variable]
            n = [10, 50]
            density = [0.1, 0.5, 0.9]
            "#,
        )
        .unwrap();

        assert_eq!(config.batch.iterations, 3);
        assert_eq!(config.batch.max_steps, 50);
        assert_eq!(config.batch.seed, 42);
        assert_eq!(config.fixed.get("width"), Some(&ParamValue::Int(10)));
        assert_eq!(config.fixed.get("torus"), Some(&ParamValue::Bool(true)));
        assert_eq!(config.variable["density"][1], ParamValue::Float(0.5));
        assert_eq!(config.run_count(), 18);
    }

    #[test]
    fn test_empty_sweep_uses_defaults() {
        let config = SweepConfig::from_str("").unwrap();
        assert_eq!(config, SweepConfig::default());
        assert_eq!(config.batch.iterations, 1);
        assert_eq!(config.batch.max_steps, 1000);
        assert_eq!(config.run_count(), 1);
    }

    #[test]
    fn test_partial_batch_section() {
        let config = SweepConfig::from_str("[batch]\nmax_steps = 7\n").unwrap();
        assert_eq!(config.batch.max_steps, 7);
        assert_eq!(config.batch.iterations, 1);
    }

    #[test]
    fn test_sweep_toml_roundtrip() {
        let mut config = SweepConfig::default();
        config.fixed.set("width", 5i64);
        config
            .variable
            .insert("n".to_string(), vec![ParamValue::Int(1), ParamValue::Int(2)]);
        let text = config.to_toml().unwrap();
        assert_eq!(SweepConfig::from_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            SweepConfig::from_str("[batch\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_run_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "model = \"schelling\"\nsteps = 20\n\n[params]\nhomophily = 3").unwrap();
        let config = RunConfig::from_file(file.path()).unwrap();
        assert_eq!(config.model.as_deref(), Some("schelling"));
        assert_eq!(config.steps, Some(20));
        assert_eq!(config.seed, None);
        assert_eq!(config.params.get_i64("homophily"), Ok(3));
    }
}
