//! Line-oriented kernel transport and version handshake.
//!
//! # Responsibility
//! - Move single UTF-8 JSON lines between the bridge and the kernel.
//! - Verify the kernel's hello line before any request is sent.
//!
//! # Invariants
//! - Channels know nothing about request/response shapes.
//! - `close` is idempotent.
//! - A handshake mismatch is reported as `BridgeError::Protocol`.

use crate::error::{BridgeError, BridgeResult};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod process;

pub use memory::{MemoryChannel, MemoryHandle};
pub use process::{LaunchSpec, ProcessChannel};

/// Product name announced in the kernel hello line.
pub const RUNTIME_PRODUCT: &str = "jsii-runtime";

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug)]
pub enum TransportError {
    Spawn {
        program: String,
        source: std::io::Error,
    },
    Io(std::io::Error),
    /// The kernel closed its output stream.
    Disconnected,
    /// The channel was closed locally.
    Closed,
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn { program, source } => {
                write!(f, "failed to launch kernel `{program}`: {source}")
            }
            Self::Io(err) => write!(f, "kernel channel i/o failed: {err}"),
            Self::Disconnected => write!(f, "kernel closed its output stream"),
            Self::Closed => write!(f, "kernel channel is closed"),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            Self::Io(err) => Some(err),
            Self::Disconnected | Self::Closed => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Bidirectional line channel to one kernel.
pub trait KernelChannel {
    /// Writes one line; the channel appends the terminator.
    fn send_line(&mut self, line: &str) -> TransportResult<()>;
    /// Reads one line without its terminator.
    fn read_line(&mut self) -> TransportResult<String>;
    /// Closes both directions. Calling it again is a no-op.
    fn close(&mut self) -> TransportResult<()>;
}

/// Formats the hello line a kernel of `version` announces.
pub fn hello_line(version: &str) -> String {
    serde_json::json!({ "hello": format!("{RUNTIME_PRODUCT}@{version}") }).to_string()
}

/// Reads and verifies the kernel hello line.
///
/// Returns the announced `<product>@<version>` string.
///
/// # Errors
/// - `Protocol` when the line is not a hello or the version differs.
/// - `Transport` when the kernel disconnects first.
pub fn handshake(channel: &mut dyn KernelChannel, expected_version: &str) -> BridgeResult<String> {
    let expected = format!("{RUNTIME_PRODUCT}@{expected_version}");
    let line = channel.read_line()?;

    let announced = serde_json::from_str::<serde_json::Value>(&line)
        .ok()
        .and_then(|hello| hello.get("hello").and_then(|v| v.as_str()).map(str::to_string));
    let Some(announced) = announced else {
        error!("event=handshake module=transport status=error error_code=malformed_hello");
        return Err(BridgeError::Protocol(format!(
            "expected a hello line from the kernel, got `{line}`"
        )));
    };

    if announced != expected {
        error!(
            "event=handshake module=transport status=error error_code=version_mismatch announced={} expected={}",
            announced, expected
        );
        return Err(BridgeError::Protocol(format!(
            "Invalid {RUNTIME_PRODUCT} handshake version '{announced}'. Expected: '{expected}'"
        )));
    }

    info!(
        "event=handshake module=transport status=ok version={}",
        announced
    );
    Ok(announced)
}
