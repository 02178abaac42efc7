//! Engine configuration
//!
//! Loaded from TOML, e.g.
//!
//! ```toml
//! seed = 7
//! cycles_per_second = 0.5
//!
//! [limits]
//! max_sequence_len = 6561
//! ```
//!
//! Every field is optional; missing ones take the defaults below.

use crate::error::{PatternError, PatternResult};
use crate::pattern::Fraction;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Size guards for the fractal generators
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Longest step sequence a generator may build (default 3^12)
    pub max_sequence_len: usize,
    /// Iteration cap for IFS, chaos maps and L-system output
    pub max_iterations: usize,
    /// Widest cellular automaton
    pub max_automaton_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_sequence_len: 531_441,
            max_iterations: 100_000,
            max_automaton_size: 1024,
        }
    }
}

impl Limits {
    /// Fail with a `PatternArgument` error when `len` exceeds the sequence limit
    pub fn check_sequence(&self, combinator: &'static str, len: usize) -> PatternResult<()> {
        if len > self.max_sequence_len {
            return Err(PatternError::argument(
                combinator,
                format!(
                    "sequence of length {} exceeds limit {}",
                    len, self.max_sequence_len
                ),
            ));
        }
        Ok(())
    }

    pub fn check_iterations(&self, combinator: &'static str, iterations: usize) -> PatternResult<()> {
        if iterations > self.max_iterations {
            return Err(PatternError::argument(
                combinator,
                format!(
                    "{} iterations exceeds limit {}",
                    iterations, self.max_iterations
                ),
            ));
        }
        Ok(())
    }

    pub fn check_automaton(&self, combinator: &'static str, size: usize) -> PatternResult<()> {
        if size > self.max_automaton_size {
            return Err(PatternError::argument(
                combinator,
                format!(
                    "automaton size {} exceeds limit {}",
                    size, self.max_automaton_size
                ),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seed for the random combinators
    pub seed: u64,
    /// Playback rate used to turn cycle positions into deadlines
    pub cycles_per_second: f64,
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: 0,
            cycles_per_second: 0.5,
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn load(path: &Path) -> PatternResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML content
    pub fn from_toml_str(content: &str) -> PatternResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> PatternResult<String> {
        toml::to_string_pretty(self).map_err(|e| PatternError::Config(e.to_string()))
    }

    pub fn validate(&self) -> PatternResult<()> {
        if !(self.cycles_per_second.is_finite() && self.cycles_per_second > 0.0) {
            return Err(PatternError::Config(format!(
                "cycles_per_second must be positive, got {}",
                self.cycles_per_second
            )));
        }
        let limits = &self.limits;
        if limits.max_sequence_len == 0
            || limits.max_iterations == 0
            || limits.max_automaton_size == 0
        {
            return Err(PatternError::Config("limits must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Seconds from cycle zero to `cycle` at the configured rate
    pub fn deadline(&self, cycle: Fraction) -> f64 {
        cycle.to_float() / self.cycles_per_second
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.limits.max_sequence_len, 531_441);
    }

    #[test]
    fn test_partial_limits() {
        let config = Config::from_toml_str("seed = 9\n[limits]\nmax_iterations = 50\n").unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.limits.max_iterations, 50);
        assert_eq!(config.limits.max_automaton_size, 1024);
    }

    #[test]
    fn test_rejects_zero_rate() {
        let err = Config::from_toml_str("cycles_per_second = 0.0").unwrap_err();
        assert!(matches!(err, PatternError::Config(_)));
    }

    #[test]
    fn test_rejects_bad_toml() {
        assert!(matches!(
            Config::from_toml_str("seed = \"x\""),
            Err(PatternError::Config(_))
        ));
    }

    #[test]
    fn test_deadline() {
        let config = Config {
            cycles_per_second: 2.0,
            ..Config::default()
        };
        assert_eq!(config.deadline(Fraction::new(3, 2)), 0.75);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config {
            seed: 3,
            ..Config::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_limit_checks() {
        let limits = Limits {
            max_sequence_len: 8,
            ..Limits::default()
        };
        assert!(limits.check_sequence("cantor", 8).is_ok());
        assert!(matches!(
            limits.check_sequence("cantor", 9),
            Err(PatternError::PatternArgument { combinator: "cantor", .. })
        ));
    }
}
