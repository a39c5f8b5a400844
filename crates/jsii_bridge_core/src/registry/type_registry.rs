//! Fully-qualified type name registry.
//!
//! # Responsibility
//! - Map class fqns to bare-instance allocators.
//! - Map enum fqns to their member sets.
//!
//! # Invariants
//! - One entry per fqn; re-registration is rejected.
//! - Allocators never talk to the kernel; they build an unbound proxy only.

use crate::error::{BridgeError, BridgeResult};
use crate::model::object::ObjectHandle;
use crate::model::value::EnumValue;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Builds a bare proxy without running any construction logic.
pub type Allocator = fn() -> ObjectHandle;

#[derive(Debug, Clone)]
pub enum TypeEntry {
    Class { allocate: Allocator },
    Enum { members: BTreeSet<String> },
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeEntry>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class allocator under `fqn`.
    pub fn register_class(&mut self, fqn: impl Into<String>, allocate: Allocator) -> BridgeResult<()> {
        self.insert(fqn.into(), TypeEntry::Class { allocate })
    }

    /// Registers an enum and its member names under `fqn`.
    pub fn register_enum(&mut self, fqn: impl Into<String>, members: &[&str]) -> BridgeResult<()> {
        let members = members.iter().map(|member| member.to_string()).collect();
        self.insert(fqn.into(), TypeEntry::Enum { members })
    }

    fn insert(&mut self, fqn: String, entry: TypeEntry) -> BridgeResult<()> {
        if self.types.contains_key(fqn.as_str()) {
            return Err(BridgeError::DuplicateType(fqn));
        }
        debug!("event=type_register module=registry status=ok fqn={}", fqn);
        self.types.insert(fqn, entry);
        Ok(())
    }

    /// Fails with `DuplicateType` if `other` holds any fqn already registered here.
    pub fn check_disjoint(&self, other: &TypeRegistry) -> BridgeResult<()> {
        match other.types.keys().find(|fqn| self.types.contains_key(fqn.as_str())) {
            Some(fqn) => Err(BridgeError::DuplicateType(fqn.clone())),
            None => Ok(()),
        }
    }

    /// Moves every entry of `staged` into this registry, all or nothing.
    pub fn merge(&mut self, staged: TypeRegistry) -> BridgeResult<()> {
        self.check_disjoint(&staged)?;
        debug!(
            "event=type_merge module=registry status=ok count={}",
            staged.types.len()
        );
        self.types.extend(staged.types);
        Ok(())
    }

    pub fn get(&self, fqn: &str) -> Option<&TypeEntry> {
        self.types.get(fqn)
    }

    pub fn contains(&self, fqn: &str) -> bool {
        self.types.contains_key(fqn)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered fqns, sorted.
    pub fn fqns(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    /// Returns the allocator registered for a class `fqn`.
    pub fn allocator(&self, fqn: &str) -> BridgeResult<Allocator> {
        match self.types.get(fqn) {
            Some(TypeEntry::Class { allocate }) => Ok(*allocate),
            _ => Err(BridgeError::UnresolvedType(fqn.to_string())),
        }
    }

    /// Resolves a fully-qualified enum member name (`<fqn>/<MEMBER>`).
    pub fn resolve_enum(&self, member_fqn: &str) -> BridgeResult<EnumValue> {
        let value = EnumValue::parse(member_fqn)?;
        match self.types.get(value.fqn.as_str()) {
            Some(TypeEntry::Enum { members }) if members.contains(value.member.as_str()) => {
                Ok(value)
            }
            _ => Err(BridgeError::UnresolvedEnum(member_fqn.to_string())),
        }
    }
}

/// Generated binding module: one assembly plus the native types it defines.
pub trait BindingModule {
    fn assembly_name(&self) -> &str;
    fn assembly_version(&self) -> &str;
    /// Path of the assembly tarball the kernel loads.
    fn tarball(&self) -> &Path;
    /// Registers every class and enum of the assembly.
    fn register_types(&self, registry: &mut TypeRegistry) -> BridgeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::{TypeEntry, TypeRegistry};
    use crate::error::BridgeError;
    use crate::model::object::{JsiiObject, ObjectCore, ObjectHandle};
    use std::any::Any;
    use std::rc::Rc;

    #[derive(Default)]
    struct Bare {
        core: ObjectCore,
    }

    impl JsiiObject for Bare {
        fn core(&self) -> &ObjectCore {
            &self.core
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn allocate_bare() -> ObjectHandle {
        Rc::new(Bare::default())
    }

    #[test]
    fn registers_classes_and_enums() {
        let mut registry = TypeRegistry::new();
        registry
            .register_class("calc.Calculator", allocate_bare)
            .expect("class registration");
        registry
            .register_enum("calc.Style", &["NORMAL", "DECORATED"])
            .expect("enum registration");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.fqns(), vec!["calc.Calculator", "calc.Style"]);
        assert!(matches!(
            registry.get("calc.Style"),
            Some(TypeEntry::Enum { .. })
        ));
        assert!(registry.allocator("calc.Calculator").is_ok());
    }

    #[test]
    fn rejects_duplicate_fqn() {
        let mut registry = TypeRegistry::new();
        registry
            .register_class("calc.Calculator", allocate_bare)
            .expect("first registration");
        let err = registry
            .register_enum("calc.Calculator", &["A"])
            .expect_err("duplicate must fail");
        assert!(matches!(err, BridgeError::DuplicateType(_)));
    }

    #[test]
    fn allocator_for_enum_or_missing_is_unresolved() {
        let mut registry = TypeRegistry::new();
        registry
            .register_enum("calc.Style", &["NORMAL"])
            .expect("enum registration");

        assert!(matches!(
            registry.allocator("calc.Style"),
            Err(BridgeError::UnresolvedType(_))
        ));
        assert!(matches!(
            registry.allocator("calc.Missing"),
            Err(BridgeError::UnresolvedType(_))
        ));
    }

    #[test]
    fn resolve_enum_checks_members() {
        let mut registry = TypeRegistry::new();
        registry
            .register_enum("calc.Style", &["NORMAL", "DECORATED"])
            .expect("enum registration");

        let value = registry
            .resolve_enum("calc.Style/DECORATED")
            .expect("known member");
        assert_eq!(value.member, "DECORATED");

        assert!(matches!(
            registry.resolve_enum("calc.Style/SHOUTING"),
            Err(BridgeError::UnresolvedEnum(_))
        ));
        assert!(matches!(
            registry.resolve_enum("calc.Other/NORMAL"),
            Err(BridgeError::UnresolvedEnum(_))
        ));
    }

    #[test]
    fn merge_is_all_or_nothing() {
        let mut registry = TypeRegistry::new();
        registry
            .register_class("calc.Calculator", allocate_bare)
            .expect("class registration");

        let mut clashing = TypeRegistry::new();
        clashing
            .register_enum("calc.Style", &["NORMAL"])
            .expect("enum registration");
        clashing
            .register_class("calc.Calculator", allocate_bare)
            .expect("staged class registration");
        let err = registry.merge(clashing).expect_err("clash must fail");
        assert!(matches!(err, BridgeError::DuplicateType(ref fqn) if fqn == "calc.Calculator"));
        assert!(!registry.contains("calc.Style"));

        let mut staged = TypeRegistry::new();
        staged
            .register_enum("calc.Style", &["NORMAL"])
            .expect("enum registration");
        registry.merge(staged).expect("disjoint merge");
        assert_eq!(registry.fqns(), vec!["calc.Calculator", "calc.Style"]);
    }
}
