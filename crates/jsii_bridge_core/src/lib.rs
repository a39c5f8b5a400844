//! Host-side runtime bridge to the jsii kernel.
//! Owns the kernel channel, object identity, value marshaling and callback
//! dispatch; generated bindings sit on top of `Bridge`.

pub mod config;
pub mod error;
pub mod logging;
pub mod marshal;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod runtime;
pub mod transport;

pub use config::{expected_runtime_version, BridgeConfig, ReleasePolicy};
pub use error::{BridgeError, BridgeResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::object::{
    CallbackError, JsiiObject, MemberTable, ObjectCore, ObjectHandle, ObjectRef,
};
pub use model::value::{EnumValue, NativeValue};
pub use protocol::{
    CallbackCompletion, CallbackKind, CallbackRequest, KernelStats, LoadResponse, Override,
    PromiseId, Request,
};
pub use registry::object_table::ObjectTable;
pub use registry::type_registry::{Allocator, BindingModule, TypeEntry, TypeRegistry};
pub use runtime::{Bridge, BridgeDiagnostics, BridgeStatus};
pub use transport::{KernelChannel, MemoryChannel, MemoryHandle, ProcessChannel, TransportError};

/// Returns the bridge crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
