//! Native-side data model of the bridge.
//!
//! # Responsibility
//! - Define the values bindings exchange with the bridge.
//! - Define object identity and the member tables used for callbacks.
//!
//! # Invariants
//! - Every shared object is identified by one stable `ObjectRef`.
//! - Object identity is pointer identity of its `ObjectHandle`.

pub mod object;
pub mod value;
