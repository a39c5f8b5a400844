#![cfg(unix)]

use jsii_bridge_core::{Bridge, BridgeConfig, BridgeError, BridgeStatus};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const FAKE_KERNEL: &str = r#"
echo '{"hello":"jsii-runtime@1.0.0"}'
while IFS= read -r line; do
  case "$line" in
    *'"api":"stats"'*) echo '{"ok":{"objectCount":3}}' ;;
    *) echo '{"error":"unsupported request","stack":"fake-kernel.sh"}' ;;
  esac
done
"#;

fn write_kernel(dir: &Path) -> PathBuf {
    let script = dir.join("fake-kernel.sh");
    std::fs::write(&script, FAKE_KERNEL).unwrap();
    script
}

fn shell_config(script: PathBuf, expected_version: &str) -> BridgeConfig {
    BridgeConfig {
        node: "/bin/sh".to_string(),
        runtime_script: script,
        expected_version: expected_version.to_string(),
        shutdown_grace: Duration::from_secs(5),
        ..BridgeConfig::default()
    }
}

#[test]
fn child_process_kernel_answers_requests() {
    let dir = tempfile::tempdir().unwrap();
    let mut bridge = Bridge::new(shell_config(write_kernel(dir.path()), "1.0.0"));

    assert_eq!(bridge.stats().unwrap().object_count, 3);
    let err = bridge.naming("calc").unwrap_err();
    assert_eq!(err.kernel_message(), Some("unsupported request"));

    bridge.close().unwrap();
    assert_eq!(bridge.status(), BridgeStatus::Closed);
    assert!(matches!(bridge.stats(), Err(BridgeError::Closed)));
}

#[test]
fn child_process_version_mismatch_is_protocol_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut bridge = Bridge::new(shell_config(write_kernel(dir.path()), "2.0.0"));

    let err = bridge.stats().unwrap_err();
    assert!(matches!(err, BridgeError::Protocol(_)));
    assert_eq!(bridge.status(), BridgeStatus::Failed);
}

#[test]
fn missing_interpreter_is_transport_error() {
    let config = BridgeConfig {
        node: "/nonexistent/jsii-node".to_string(),
        ..BridgeConfig::default()
    };
    let mut bridge = Bridge::new(config);

    let err = bridge.start().unwrap_err();
    assert!(matches!(err, BridgeError::Transport(_)));
    assert_eq!(bridge.status(), BridgeStatus::Failed);
}

#[test]
fn kernel_exits_on_stdin_eof_without_being_killed() {
    let dir = tempfile::tempdir().unwrap();
    let config = BridgeConfig {
        shutdown_grace: Duration::from_secs(30),
        ..shell_config(write_kernel(dir.path()), "1.0.0")
    };
    let mut bridge = Bridge::new(config);
    assert_eq!(bridge.stats().unwrap().object_count, 3);

    let started = Instant::now();
    bridge.close().unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(bridge.status(), BridgeStatus::Closed);
}
