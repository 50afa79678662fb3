use std::env;
use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::load_config;
use super::settings::Settings;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.hub.concurrency, 5);
    assert!(settings.hub.allow_duplicate_ids);
    assert_eq!(settings.log.level, "info");
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    // load_config reads config/default.* relative to the working directory
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        port = 9000

        [hub]
        concurrency = 10
        allow_duplicate_ids = false
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();
    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.hub.concurrency, 10);
    assert!(!cfg.hub.allow_duplicate_ids);
    assert_eq!(cfg.log.level, "info");
}

#[test]
#[serial]
fn load_config_from_env_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    let cfg = temp_env::with_vars(
        [
            ("PUBHUB__SERVER__HOST", Some("0.0.0.0")),
            ("PUBHUB__HUB__CONCURRENCY", Some("32")),
            ("PUBHUB__HUB__ALLOW_DUPLICATE_IDS", Some("false")),
            ("PUBHUB__LOG__LEVEL", Some("debug")),
        ],
        load_config,
    );
    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.hub.concurrency, 32);
    assert!(!cfg.hub.allow_duplicate_ids);
    assert_eq!(cfg.log.level, "debug");
}

#[test]
#[serial]
fn load_config_without_sources_yields_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    let cfg = load_config();
    env::set_current_dir(orig).expect("restore cwd");

    assert_eq!(cfg.expect("load_config failed"), Settings::default());
}
