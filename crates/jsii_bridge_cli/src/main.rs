//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `jsii_bridge_core` linkage.
//! - With `--probe`, launch the kernel from the environment and report its stats.
//! - Keep output deterministic for quick local sanity checks.

use jsii_bridge_core::{default_log_level, init_logging, Bridge, BridgeConfig};
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("jsii_bridge_core version={}", jsii_bridge_core::core_version());
    println!(
        "jsii_bridge_core kernel_version={}",
        jsii_bridge_core::expected_runtime_version()
    );

    if !std::env::args().skip(1).any(|arg| arg == "--probe") {
        return ExitCode::SUCCESS;
    }

    if let Err(err) = init_logging(default_log_level(), None) {
        eprintln!("logging disabled: {err}");
    }

    let config = BridgeConfig::from_env();
    println!(
        "kernel launch={} {}",
        config.node,
        config.runtime_script.display()
    );

    let mut bridge = Bridge::new(config);
    let outcome = bridge.stats().and_then(|stats| {
        println!("kernel object_count={}", stats.object_count);
        bridge.close()
    });

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_probe module=cli status=error error={}", err);
            eprintln!("probe failed: {err}");
            ExitCode::FAILURE
        }
    }
}
