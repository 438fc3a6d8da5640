use std::fs;
use tempfile::TempDir;

use super::*;

#[test]
fn missing_config_falls_back_to_defaults_in_dir() {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = load_existing_config(temp_dir.path());

    assert_eq!(config.mongo, MongoConfig::default());
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn broken_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("temp dir");
    fs::write(temp_dir.path().join("config.toml"), "[mongo\nuri = ").expect("write");

    let config = load_existing_config(temp_dir.path());
    assert_eq!(config.mongo.database, "pdet_solar_analysis");
    assert_eq!(config.config_file_path(), temp_dir.path().join("config.toml"));
}

#[test]
fn stored_values_are_loaded() {
    let temp_dir = TempDir::new().expect("temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[mongo]\ndatabase = \"pdet_staging\"\n\n[schema]\npolicy = \"strict\"\n",
    )
    .expect("write");

    let config = load_existing_config(temp_dir.path());
    assert_eq!(config.mongo.database, "pdet_staging");
    assert_eq!(config.schema.policy, CreationPolicy::Strict);
}

#[test]
fn policy_names_match_config_file_values() {
    for (policy, label) in POLICIES {
        assert!(label.starts_with(policy_name(policy)));
    }
}
