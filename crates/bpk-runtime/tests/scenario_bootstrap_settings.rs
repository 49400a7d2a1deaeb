//! Scenario: bootstrap loads layered config files into engine settings.

use std::path::PathBuf;

use bpk_runtime::bootstrap::{load_dotenv, load_settings, DOTENV_FILE};
use bpk_schemas::RegionId;

fn write_temp(name: &str, body: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bpk-bootstrap-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn later_layers_override_earlier_ones() {
    let base = write_temp(
        "base.yaml",
        "engine:\n  region: 1\nreconcile:\n  search_radius: 0.5\n",
    );
    let local = write_temp("local.yaml", "engine:\n  region: 4\nlogging:\n  filter: debug\n");

    let (loaded, settings) =
        load_settings(&[base.to_str().unwrap(), local.to_str().unwrap()]).unwrap();

    assert_eq!(settings.region, RegionId(4));
    assert_eq!(settings.search_radius, 0.5);
    assert_eq!(settings.log_filter, "debug");
    assert_eq!(loaded.config_hash.len(), 64);
}

#[test]
fn missing_region_is_rejected() {
    let only = write_temp("no-region.yaml", "store:\n  max_connections: 3\n");
    let err = load_settings(&[only.to_str().unwrap()]).unwrap_err();
    assert!(err.to_string().contains("engine.region"), "{err}");
}

#[test]
fn literal_connection_string_is_rejected() {
    let bad = write_temp(
        "secret.yaml",
        "engine:\n  region: 1\nstore:\n  url: postgres://u:p@localhost/db\n",
    );
    assert!(load_settings(&[bad.to_str().unwrap()]).is_err());
}

#[test]
fn missing_env_file_is_ignored() {
    // Integration tests run from the crate root, which ships no env file.
    assert!(!std::path::Path::new(DOTENV_FILE).exists());
    load_dotenv();
    load_dotenv();
}
