//! Bridge error taxonomy.
//!
//! # Responsibility
//! - Give every failure that can reach a bridge caller one structured variant.
//!
//! # Invariants
//! - `Protocol` is fatal: the bridge refuses further calls after it.
//! - `Kernel` is scoped to the one operation that received it.
//! - Callback failures never surface here; they travel back to the kernel.

use crate::model::object::ObjectRef;
use crate::transport::TransportError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug)]
pub enum BridgeError {
    /// Handshake mismatch or malformed hello line.
    Protocol(String),
    /// Wire-level `error` response.
    Kernel {
        message: String,
        stack: Option<String>,
    },
    /// The reference is already mapped, or the object already has another identity.
    RegistrationConflict(ObjectRef),
    /// A reference names a type absent from the Type Registry.
    UnresolvedType(String),
    /// An enum token names an enum or member absent from the Type Registry.
    UnresolvedEnum(String),
    /// The Type Registry already holds an entry for this fqn.
    DuplicateType(String),
    /// A wire mapping carries more than one reserved token key.
    AmbiguousToken(Vec<String>),
    /// A wire value is structurally invalid.
    InvalidWireValue(String),
    /// An object without a bridge identity was passed to the kernel.
    UnregisteredObject,
    Transport(TransportError),
    Json(serde_json::Error),
    /// The bridge was closed.
    Closed,
}

impl BridgeError {
    /// Builds a kernel error from an `error` response.
    pub fn kernel(message: impl Into<String>, stack: Option<String>) -> Self {
        Self::Kernel {
            message: message.into(),
            stack,
        }
    }

    /// Kernel-reported message, when this is a `Kernel` error.
    pub fn kernel_message(&self) -> Option<&str> {
        match self {
            Self::Kernel { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Protocol(message) => write!(f, "protocol error: {message}"),
            Self::Kernel {
                message,
                stack: Some(stack),
            } => write!(f, "{message}\n{stack}"),
            Self::Kernel {
                message,
                stack: None,
            } => write!(f, "{message}"),
            Self::RegistrationConflict(objref) => {
                write!(f, "objref {objref} already registered")
            }
            Self::UnresolvedType(fqn) => write!(f, "unable to resolve native type for {fqn}"),
            Self::UnresolvedEnum(fqn) => {
                write!(f, "unable to resolve enum reference for FQN {fqn}")
            }
            Self::DuplicateType(fqn) => write!(f, "type already registered: {fqn}"),
            Self::AmbiguousToken(keys) => {
                write!(f, "wire mapping carries multiple tokens: {}", keys.join(", "))
            }
            Self::InvalidWireValue(message) => write!(f, "invalid wire value: {message}"),
            Self::UnregisteredObject => {
                write!(f, "object has no bridge identity and cannot be marshaled")
            }
            Self::Transport(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "malformed kernel message: {err}"),
            Self::Closed => write!(f, "bridge is closed"),
        }
    }
}

impl Error for BridgeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for BridgeError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
