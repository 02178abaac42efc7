//! Loading configuration files from disk

use std::io::Write;
use tempfile::NamedTempFile;
use tessel::config::{Config, Limits};
use tessel::error::PatternError;
use tessel::fractal::Generator;
use tessel::pattern::{Fraction, Pattern};

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
seed = 42
cycles_per_second = 2.0

[limits]
max_sequence_len = 729
max_iterations = 500
max_automaton_size = 64
"#,
    );
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.seed, 42);
    assert_eq!(config.deadline(Fraction::from_integer(3)), 1.5);
    assert_eq!(
        config.limits,
        Limits {
            max_sequence_len: 729,
            max_iterations: 500,
            max_automaton_size: 64,
        }
    );
}

#[test]
fn test_limits_from_file_bound_generators() {
    let file = write_config("[limits]\nmax_sequence_len = 27\n");
    let config = Config::load(file.path()).unwrap();

    let small: Generator = "cantor:3".parse().unwrap();
    assert!(small.build(&config.limits).is_ok());
    let large: Generator = "cantor:4".parse().unwrap();
    assert!(large.build(&config.limits).is_err());
}

#[test]
fn test_seed_from_file_drives_degrade() {
    let file = write_config("seed = 7\n");
    let config = Config::load(file.path()).unwrap();

    let hats = Pattern::fastcat((0..16).map(Pattern::pure).collect());
    let a = hats.clone().degrade_by_with_seed(0.5, config.seed).unwrap();
    let b = hats.degrade_by_with_seed(0.5, Config::load(file.path()).unwrap().seed).unwrap();
    assert_eq!(a.first_cycle().unwrap(), b.first_cycle().unwrap());
}

#[test]
fn test_round_trip_through_file() {
    let config = Config {
        seed: 3,
        cycles_per_second: 0.75,
        limits: Limits::default(),
    };
    let file = write_config(&config.to_toml().unwrap());
    assert_eq!(Config::load(file.path()).unwrap(), config);
}

#[test]
fn test_invalid_files() {
    let missing = Config::load(std::path::Path::new("/nonexistent/tessel.toml")).unwrap_err();
    assert!(matches!(missing, PatternError::Io(_)));

    let malformed = write_config("seed = [not toml");
    assert!(matches!(
        Config::load(malformed.path()).unwrap_err(),
        PatternError::Config(_)
    ));

    let stopped = write_config("cycles_per_second = 0.0\n");
    assert!(matches!(
        Config::load(stopped.path()).unwrap_err(),
        PatternError::Config(_)
    ));
}
