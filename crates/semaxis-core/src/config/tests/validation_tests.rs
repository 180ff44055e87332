//! Tests for configuration validation.

use crate::config::{validate_unlock_quantile, Config};

#[test]
fn test_validation_rejects_pca_var_out_of_range() {
    let mut config = Config::default();
    config.analysis.pca_var = 1.0;

    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("analysis.pca_var"));
}

#[test]
fn test_validation_rejects_k_max_below_k_min() {
    let mut config = Config::default();
    config.analysis.k_min = 5;
    config.analysis.k_max = 4;

    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("analysis.k_max"));
}

#[test]
fn test_validation_rejects_k_min_below_two() {
    let mut config = Config::default();
    config.analysis.k_min = 1;

    assert!(config.validate().is_err());
}

#[test]
fn test_validation_rejects_unlock_quantile_bounds() {
    for q in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
        let mut config = Config::default();
        config.unlock.q = q;
        let result = config.validate();
        assert!(result.is_err(), "q={} must be rejected", q);
        assert!(result.unwrap_err().is_configuration());
    }
    println!("[VERIFIED] unlock.q outside (0, 1) is a configuration error");
}

#[test]
fn test_unlock_quantile_accepts_open_interval() {
    assert!(validate_unlock_quantile(0.5).is_ok());
    assert!(validate_unlock_quantile(0.999).is_ok());
    assert!(validate_unlock_quantile(0.001).is_ok());
}

#[test]
fn test_validation_rejects_empty_model() {
    let mut config = Config::default();
    config.embedding.model = "  ".to_string();

    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("embedding.model"));
}
