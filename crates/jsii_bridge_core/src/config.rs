//! Bridge configuration.
//!
//! # Responsibility
//! - Describe how to launch the kernel and which version to accept.
//! - Resolve defaults from the process environment.
//!
//! # Invariants
//! - `expected_version` defaults to the compiled-in `version.txt`.
//! - `JSII_DEBUG=1` is the only switch that raises verbosity on both sides.

use crate::transport::LaunchSpec;
use std::path::PathBuf;
use std::time::Duration;

const COMPILED_RUNTIME_VERSION: &str = include_str!("../version.txt");
const DEFAULT_NODE: &str = "node";
const DEFAULT_RUNTIME_SCRIPT: &str = "jsii-runtime.js";
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub const ENV_DEBUG: &str = "JSII_DEBUG";
pub const ENV_NODE: &str = "JSII_NODE";
pub const ENV_RUNTIME: &str = "JSII_RUNTIME";

/// Kernel version this bridge was built against.
pub fn expected_runtime_version() -> &'static str {
    COMPILED_RUNTIME_VERSION.trim()
}

/// Whether `JSII_DEBUG=1` is set.
pub fn debug_requested() -> bool {
    std::env::var(ENV_DEBUG).is_ok_and(|value| value.trim() == "1")
}

/// What happens to an object table entry after a successful `del`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Entries live as long as the bridge.
    #[default]
    RetainForever,
    /// The entry is dropped once the kernel confirms the delete.
    ReleaseOnDelete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Interpreter that runs the kernel entry point.
    pub node: String,
    /// Kernel entry point script.
    pub runtime_script: PathBuf,
    pub extra_args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub expected_version: String,
    pub debug: bool,
    pub release_policy: ReleasePolicy,
    /// How long `close` waits for the kernel to exit before killing it.
    pub shutdown_grace: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            node: DEFAULT_NODE.to_string(),
            runtime_script: PathBuf::from(DEFAULT_RUNTIME_SCRIPT),
            extra_args: Vec::new(),
            env: Vec::new(),
            expected_version: expected_runtime_version().to_string(),
            debug: false,
            release_policy: ReleasePolicy::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `JSII_NODE`, `JSII_RUNTIME` and `JSII_DEBUG`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(node) = non_empty_env(ENV_NODE) {
            config.node = node;
        }
        if let Some(script) = non_empty_env(ENV_RUNTIME) {
            config.runtime_script = PathBuf::from(script);
        }
        config.debug = debug_requested();
        config
    }

    /// Launch description for the kernel child process.
    pub fn launch_spec(&self) -> LaunchSpec {
        let mut args = vec![self.runtime_script.display().to_string()];
        args.extend(self.extra_args.iter().cloned());

        let mut env = self.env.clone();
        if self.debug {
            env.push((ENV_DEBUG.to_string(), "1".to_string()));
        }

        LaunchSpec {
            program: self.node.clone(),
            args,
            env,
            shutdown_grace: self.shutdown_grace,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
