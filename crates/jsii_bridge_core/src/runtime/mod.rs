//! Bridge runtime: lifecycle, request engine, callback dispatch and the typed
//! kernel operations.

mod api;
mod bridge;
mod callback;

pub use bridge::{Bridge, BridgeDiagnostics, BridgeStatus, CallbackHandler};
