//! Object reference table.
//!
//! # Responsibility
//! - Map object references to native proxies.
//! - Materialize proxies for kernel-created objects on first sight.
//!
//! # Invariants
//! - Resolving the same reference twice returns the same `Rc` (pointer-equal).
//! - Registration of an already mapped reference is a bridge bug and fails.
//! - Lazily materialized proxies are allocated, never constructed: no kernel
//!   `create` call and no client-side constructor side effects.

use crate::error::{BridgeError, BridgeResult};
use crate::model::object::{ObjectHandle, ObjectRef};
use crate::registry::type_registry::TypeRegistry;
use log::debug;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct ObjectTable {
    entries: BTreeMap<ObjectRef, ObjectHandle>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `objref` to `obj` and stamps the proxy's identity.
    ///
    /// # Errors
    /// - `RegistrationConflict` when `objref` is already mapped, or when `obj`
    ///   is already bound to a different reference.
    pub fn register(&mut self, objref: ObjectRef, obj: ObjectHandle) -> BridgeResult<ObjectHandle> {
        if self.entries.contains_key(&objref) {
            return Err(BridgeError::RegistrationConflict(objref));
        }
        if !obj.core().bind(&objref) {
            return Err(BridgeError::RegistrationConflict(objref));
        }

        debug!(
            "event=object_register module=registry status=ok objref={} table_size={}",
            objref,
            self.entries.len() + 1
        );
        self.entries.insert(objref, Rc::clone(&obj));
        Ok(obj)
    }

    /// Returns the proxy for `objref`, allocating one if this is its first sight.
    ///
    /// # Errors
    /// - `UnresolvedType` when the reference's fqn is not a registered class.
    pub fn resolve(&mut self, objref: &ObjectRef, types: &TypeRegistry) -> BridgeResult<ObjectHandle> {
        if let Some(existing) = self.entries.get(objref) {
            return Ok(Rc::clone(existing));
        }

        let allocate = types.allocator(objref.type_fqn())?;
        debug!(
            "event=object_materialize module=registry status=start objref={}",
            objref
        );
        self.register(objref.clone(), allocate())
    }

    pub fn get(&self, objref: &ObjectRef) -> Option<ObjectHandle> {
        self.entries.get(objref).cloned()
    }

    pub fn contains(&self, objref: &ObjectRef) -> bool {
        self.entries.contains_key(objref)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered references, sorted.
    pub fn refs(&self) -> impl Iterator<Item = &ObjectRef> {
        self.entries.keys()
    }

    /// Drops the mapping for `objref`. Only the release policy calls this.
    pub fn release(&mut self, objref: &ObjectRef) -> Option<ObjectHandle> {
        let released = self.entries.remove(objref);
        if released.is_some() {
            debug!(
                "event=object_release module=registry status=ok objref={} table_size={}",
                objref,
                self.entries.len()
            );
        }
        released
    }
}
