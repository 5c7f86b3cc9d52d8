use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use mipcache::config::Config;
use mipcache::stale::SweepOptions;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Skip Env so other tests' variables can't interfere
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
[cache]
max_bytes = 1073741824

[sweep]
workers = 6
drain_timeout_secs = 600
"#,
    )
    .unwrap();

    let config = Config::load(Some(&config_path)).unwrap();

    assert_eq!(config.cache.max_bytes, Some(1 << 30));
    assert_eq!(config.cache.budget(), 1 << 30);
    assert_eq!(config.sweep.workers, Some(6));

    let options = SweepOptions::from(&config.sweep);
    assert_eq!(options.workers, Some(6));
    assert_eq!(options.drain_timeout, Duration::from_secs(600));
}

#[test]
fn test_config_partial_toml_keeps_defaults() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[sweep]\nworkers = 3\n").unwrap();

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path))
        .extract()
        .unwrap();

    assert_eq!(config.sweep.workers, Some(3));
    assert_eq!(config.sweep.drain_timeout_secs, 86_400);
    assert_eq!(config.cache.max_bytes, None);
}

#[test]
fn test_config_env_overrides_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[sweep]\nworkers = 3\n").unwrap();

    // Dedicated prefix keeps this test independent of Config::load
    std::env::set_var("MIPCACHE_ENVTEST_SWEEP__WORKERS", "12");
    std::env::set_var("MIPCACHE_ENVTEST_CACHE__MAX_BYTES", "4096");

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed("MIPCACHE_ENVTEST_").split("__"))
        .extract()
        .unwrap();

    assert_eq!(config.sweep.workers, Some(12));
    assert_eq!(config.cache.max_bytes, Some(4096));

    std::env::remove_var("MIPCACHE_ENVTEST_SWEEP__WORKERS");
    std::env::remove_var("MIPCACHE_ENVTEST_CACHE__MAX_BYTES");
}

#[test]
fn test_config_invalid_values_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    fs::write(&config_path, "[sweep]\nworkers = \"many\"\n").unwrap();
    assert!(Config::load(Some(&config_path)).is_err());

    fs::write(&config_path, "[sweep]\ndrain_timeout_secs = 0\n").unwrap();
    assert!(Config::load(Some(&config_path)).is_err());

    fs::write(&config_path, "not = [valid").unwrap();
    assert!(Config::load(Some(&config_path)).is_err());
}

#[test]
fn test_config_toml_round_trip() {
    let mut config = Config::default();
    config.cache.max_bytes = Some(2048);
    config.sweep.workers = Some(2);

    let text = config.to_toml().unwrap();
    assert!(text.contains("max_bytes = 2048"));
    assert!(text.contains("workers = 2"));

    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
