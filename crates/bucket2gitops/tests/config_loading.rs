//! Loading configuration files from disk.

mod common;

use common::*;
use serial_test::serial;

use bucket2gitops::config::{load_config, StoreType};
use bucket2gitops::{ConfigError, Generator, GeneratorError};

#[test]
#[serial]
fn test_written_config_round_trips_through_loader() {
    let harness = TestHarness::new();
    let config = harness
        .config()
        .prefix("crc.testing/crc-wrl62")
        .cluster_override("app", "prod", "https://prod.k8s.example.com:6443")
        .build();
    let path = harness.write_config("bucket2gitops.yaml", &config);

    let loaded = load_config(&path).expect("config loads");

    assert_eq!(loaded.store.store_type, StoreType::Filesystem);
    assert_eq!(loaded.store.prefix, "crc.testing/crc-wrl62");
    assert_eq!(loaded.environments.len(), 4);
    assert_eq!(
        loaded.cluster_overrides["app"]["prod"],
        "https://prod.k8s.example.com:6443"
    );
}

#[test]
#[serial]
fn test_environment_overrides_repository() {
    let harness = TestHarness::new();
    let config = harness.config().build();
    let path = harness.write_config("bucket2gitops.yaml", &config);

    std::env::set_var("GIT_REPOSITORY", "https://git.example.com/other/gitops.git");
    let loaded = load_config(&path);
    std::env::remove_var("GIT_REPOSITORY");

    assert_eq!(
        loaded.expect("config loads").repository.url,
        "https://git.example.com/other/gitops.git"
    );
}

#[test]
#[serial]
fn test_missing_file_is_read_error() {
    let harness = TestHarness::new();
    let err = load_config(harness.config_dir.join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
}

#[test]
#[serial]
fn test_unknown_environment_override_rejected() {
    let harness = TestHarness::new();
    let config = harness
        .config()
        .cluster_override("app", "qa", "https://qa.k8s.example.com")
        .build_unchecked();
    let path = harness.write_config("bucket2gitops.yaml", &config);

    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Validation { .. }));
}

#[tokio::test]
async fn test_invalid_custom_pattern_fails_before_run() {
    let harness = TestHarness::new();
    let config = harness
        .config()
        .dangerous_pattern("broken", "(unclosed")
        .build_unchecked();

    let err = Generator::from_config(&config).err().expect("pattern rejected");
    assert!(matches!(
        err,
        GeneratorError::Config(ConfigError::InvalidPattern { .. })
    ));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_insufficient_disk_space_aborts_write() {
    let harness = TestHarness::new();
    harness.put_object("app/web.yaml", &deployment("web", "app", 1));
    let config = harness.config().min_free_bytes(u64::MAX).build();

    let err = harness.run(&config).await.unwrap_err();

    assert!(matches!(err, GeneratorError::Storage(_)));
    assert_eq!(err.exit_code(), 4);
    assert!(harness.snapshot().is_empty());
}
