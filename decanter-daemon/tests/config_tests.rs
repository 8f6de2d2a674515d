//! Configuration loading tests against the shipped example file.

use std::io::Write;

use decanter_core::config::DecanterConfig;
use decanter_daemon::orchestrator::Orchestrator;
use serial_test::serial;

const EXAMPLE: &str = include_str!("../../decanter.toml.example");

#[tokio::test]
#[serial]
async fn test_build_from_example_file() {
    let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
    // Loopback port 0 so the test never collides with a running daemon
    let content = EXAMPLE.replace("0.0.0.0:4560", "127.0.0.1:0");
    file.write_all(content.as_bytes()).unwrap();

    let orchestrator = Orchestrator::build(file.path())
        .await
        .expect("example config should build");
    assert!(orchestrator.config().socket.enabled);
}

#[tokio::test]
#[serial]
async fn test_build_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = Orchestrator::build(&dir.path().join("missing.toml")).await;
    let err = result.err().expect("missing file should fail");
    assert!(err.to_string().contains("failed to load config"), "got: {err}");
}

#[test]
#[serial]
fn test_env_override_disables_collector() {
    // SAFETY: serial_test로 직렬 실행되므로 다른 스레드와 경합하지 않음
    unsafe { std::env::set_var("DECANTER_CAMEL_ENABLED", "false") };
    let mut config = DecanterConfig::parse(EXAMPLE).unwrap();
    config.apply_env_overrides();
    // SAFETY: 위와 동일
    unsafe { std::env::remove_var("DECANTER_CAMEL_ENABLED") };

    assert!(!config.camel.enabled);
    assert!(config.validate().is_ok());
}
