//! Harness configuration.
//!
//! The engine has no runtime configuration (the width is a build-time
//! constant); this only shapes what `hvbench` measures.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// What the measurement harness runs and how.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// RNG seed; `None` seeds from OS entropy.
    pub seed: Option<u64>,
    /// Timed calls per measurement.
    pub iterations: usize,
    /// Input counts for the majority benchmark.
    pub majority_sizes: Vec<usize>,
    /// Target densities for the arbitrary-density generator.
    pub densities: Vec<f64>,
    /// Exponents for the power-of-two generator.
    pub pow2_exponents: Vec<u32>,
    /// Chained permutations per round-trip check.
    pub permutation_rounds: usize,
    /// Reuse one output buffer (cache resident) instead of a fresh buffer per call.
    pub resident: bool,
    /// Run one untimed pass before measuring.
    pub warmup: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            seed: None,
            iterations: 1_000,
            majority_sizes: vec![3, 5, 7, 9, 11, 27, 63, 109, 255, 1_021],
            densities: vec![0.001, 0.01, 0.1, 0.26, 0.5, 0.74, 0.9, 0.99, 0.999],
            pow2_exponents: vec![1, 2, 3, 4, 6, 8],
            permutation_rounds: 16,
            resident: true,
            warmup: true,
        }
    }
}

impl BenchConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "loaded harness config");
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, message: String| ConfigError::Invalid {
            field: field.into(),
            message,
        };

        if self.iterations == 0 {
            return Err(invalid("iterations", "must be > 0".into()));
        }
        if self.permutation_rounds == 0 {
            return Err(invalid("permutation_rounds", "must be > 0".into()));
        }
        if self.majority_sizes.is_empty() {
            return Err(invalid("majority_sizes", "must not be empty".into()));
        }
        if let Some(&n) = self.majority_sizes.iter().find(|&&n| n == 0) {
            return Err(invalid("majority_sizes", format!("size {n} must be > 0")));
        }
        if let Some(&p) = self.densities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(invalid("densities", format!("{p} is outside [0, 1]")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_is_valid() {
        BenchConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = BenchConfig::from_toml_str("iterations = 50\nseed = 9\n").unwrap();
        assert_eq!(config.iterations, 50);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.majority_sizes, BenchConfig::default().majority_sizes);
    }

    #[test]
    fn rejects_out_of_range_density() {
        let err = BenchConfig::from_toml_str("densities = [0.5, 1.5]").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "densities"));
    }

    #[test]
    fn rejects_zero_majority_size() {
        let err = BenchConfig::from_toml_str("majority_sizes = [3, 0]").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = BenchConfig::from_toml_str("iteratons = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "resident = false\npow2_exponents = [2]").unwrap();
        let config = BenchConfig::load(file.path()).unwrap();
        assert!(!config.resident);
        assert_eq!(config.pow2_exponents, vec![2]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = BenchConfig::load(Path::new("/nonexistent/hvbench.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
