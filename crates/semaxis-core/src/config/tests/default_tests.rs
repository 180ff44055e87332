//! Tests for default configuration values and TOML loading.

use crate::config::Config;

#[test]
fn test_default_config_values() {
    let config = Config::default();

    assert!((config.analysis.pca_var - 0.90).abs() < f64::EPSILON);
    assert_eq!(config.analysis.k_min, 3);
    assert_eq!(config.analysis.k_max, 12);
    assert_eq!(config.analysis.seed, 42);
    assert_eq!(config.analysis.ica_max_iter, 5000);
    assert_eq!(config.analysis.explore_restarts, 10);
    assert_eq!(config.analysis.final_restarts, 20);
    assert_eq!(config.embedding.batch_size, 16);
    assert_eq!(config.embedding.max_len, 384);
    assert!((config.unlock.q - 0.90).abs() < f64::EPSILON);
    assert_eq!(config.unlock.add_k, 2);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_default_config_is_valid() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_partial_toml_falls_back_to_defaults() {
    let parsed: Config = toml::from_str(
        r#"
        [analysis]
        k_max = 8

        [unlock]
        add_k = 0
        "#,
    )
    .expect("partial toml must parse");

    assert_eq!(parsed.analysis.k_max, 8);
    assert_eq!(parsed.analysis.k_min, 3);
    assert_eq!(parsed.unlock.add_k, 0);
    assert!((parsed.unlock.q - 0.90).abs() < f64::EPSILON);
    assert_eq!(parsed.storage.result_root, "semaxis-results");
}

#[test]
fn test_from_file_roundtrip() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("semaxis.toml");
    std::fs::write(
        &path,
        "[embedding]\nmodel = \"intfloat/multilingual-e5-large\"\n[analysis]\nseed = 7\n",
    )
    .expect("write config");

    let config = Config::from_file(&path).expect("load config");

    assert_eq!(config.embedding.model, "intfloat/multilingual-e5-large");
    assert_eq!(config.analysis.seed, 7);
    println!("[VERIFIED] Config::from_file merges file values over defaults");
}
