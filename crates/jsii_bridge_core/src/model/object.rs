//! Object references, proxy identity and per-type member tables.
//!
//! # Responsibility
//! - Define the opaque `ObjectRef` handle exchanged with the kernel.
//! - Define the `JsiiObject` contract every native proxy implements.
//! - Provide the explicit `name -> fn` member table used by callback dispatch.
//!
//! # Invariants
//! - An `ObjectRef` always has the `<id>@<fqn>` shape; the split happens at the
//!   first `@` so scoped type names (`@scope/pkg.Type`) stay intact.
//! - A proxy is bound to at most one `ObjectRef` for its whole lifetime.

use crate::error::{BridgeError, BridgeResult};
use crate::model::value::NativeValue;
use crate::runtime::Bridge;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Reserved wire key for object reference tokens.
pub const TOKEN_REF: &str = "$jsii.byref";

static OBJREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^@]+)@(.+)$").expect("valid objref regex"));

/// Opaque identifier of one live object shared across the bridge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "RefToken", try_from = "RefToken")]
pub struct ObjectRef {
    raw: String,
    split_at: usize,
}

impl ObjectRef {
    /// Parses a raw `<id>@<fqn>` reference string.
    ///
    /// # Errors
    /// - Returns `InvalidWireValue` when either side of the `@` is empty or the
    ///   separator is missing.
    pub fn parse(raw: impl Into<String>) -> BridgeResult<Self> {
        let raw = raw.into();
        let split_at = match OBJREF_RE.captures(&raw) {
            Some(captures) => captures.get(1).map(|id| id.end()),
            None => None,
        };
        match split_at {
            Some(split_at) => Ok(Self { raw, split_at }),
            None => Err(BridgeError::InvalidWireValue(format!(
                "object reference `{raw}` is not of the form <id>@<fqn>"
            ))),
        }
    }

    /// Full reference string as it appears on the wire.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Kernel-assigned id part.
    pub fn id(&self) -> &str {
        &self.raw[..self.split_at]
    }

    /// Fully-qualified type name part, used as the Type Registry key.
    pub fn type_fqn(&self) -> &str {
        &self.raw[self.split_at + 1..]
    }

    /// Returns the `{"$jsii.byref": ...}` token for this reference.
    pub fn to_token(&self) -> serde_json::Value {
        let mut token = serde_json::Map::new();
        token.insert(
            TOKEN_REF.to_string(),
            serde_json::Value::String(self.raw.clone()),
        );
        serde_json::Value::Object(token)
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Serde shape of an object reference on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RefToken {
    #[serde(rename = "$jsii.byref")]
    byref: String,
}

impl From<ObjectRef> for RefToken {
    fn from(value: ObjectRef) -> Self {
        Self { byref: value.raw }
    }
}

impl TryFrom<RefToken> for ObjectRef {
    type Error = BridgeError;

    fn try_from(value: RefToken) -> Result<Self, Self::Error> {
        Self::parse(value.byref)
    }
}

/// Identity cell embedded in every proxy.
///
/// Set exactly once, when the object reference table registers the proxy.
#[derive(Debug, Default)]
pub struct ObjectCore {
    objref: once_cell::unsync::OnceCell<ObjectRef>,
}

impl ObjectCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bound reference, if the proxy has a bridge identity.
    pub fn objref(&self) -> Option<&ObjectRef> {
        self.objref.get()
    }

    /// Binds `objref`; returns `false` if a different reference is already bound.
    pub(crate) fn bind(&self, objref: &ObjectRef) -> bool {
        match self.objref.get() {
            Some(existing) => existing == objref,
            None => self.objref.set(objref.clone()).is_ok(),
        }
    }
}

/// Contract implemented by native proxies (generated or hand-written).
pub trait JsiiObject: Any {
    /// Identity cell of this proxy.
    fn core(&self) -> &ObjectCore;

    /// Upcast used for typed access from member functions.
    fn as_any(&self) -> &dyn Any;

    /// Member table consulted when the kernel calls back into this object.
    fn members(&self) -> &MemberTable {
        MemberTable::empty()
    }
}

impl dyn JsiiObject {
    /// Returns the bound reference or `UnregisteredObject`.
    pub fn objref(&self) -> BridgeResult<&ObjectRef> {
        self.core()
            .objref()
            .ok_or(BridgeError::UnregisteredObject)
    }

    pub fn downcast_ref<T: JsiiObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl Debug for dyn JsiiObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.core().objref() {
            Some(objref) => write!(f, "JsiiObject({objref})"),
            None => f.write_str("JsiiObject(<unbound>)"),
        }
    }
}

/// Shared handle to a native proxy. Identity is pointer identity.
pub type ObjectHandle = Rc<dyn JsiiObject>;

/// Error type returned by member functions; delivered to the kernel as `err`.
pub type CallbackError = Box<dyn Error>;

pub type MethodFn =
    fn(&mut Bridge, &ObjectHandle, Vec<NativeValue>) -> Result<NativeValue, CallbackError>;
pub type GetterFn = fn(&mut Bridge, &ObjectHandle) -> Result<NativeValue, CallbackError>;
pub type SetterFn = fn(&mut Bridge, &ObjectHandle, NativeValue) -> Result<(), CallbackError>;

static EMPTY_MEMBERS: Lazy<MemberTable> = Lazy::new(MemberTable::default);

/// Explicit per-type table from wire member names to native functions.
#[derive(Debug, Clone, Default)]
pub struct MemberTable {
    methods: BTreeMap<String, MethodFn>,
    getters: BTreeMap<String, GetterFn>,
    setters: BTreeMap<String, SetterFn>,
}

impl MemberTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared table with no members.
    pub fn empty() -> &'static MemberTable {
        &EMPTY_MEMBERS
    }

    pub fn method(mut self, name: impl Into<String>, f: MethodFn) -> Self {
        self.methods.insert(name.into(), f);
        self
    }

    pub fn getter(mut self, name: impl Into<String>, f: GetterFn) -> Self {
        self.getters.insert(name.into(), f);
        self
    }

    pub fn setter(mut self, name: impl Into<String>, f: SetterFn) -> Self {
        self.setters.insert(name.into(), f);
        self
    }

    pub fn find_method(&self, name: &str) -> Option<MethodFn> {
        self.methods.get(name).copied()
    }

    pub fn find_getter(&self, name: &str) -> Option<GetterFn> {
        self.getters.get(name).copied()
    }

    pub fn find_setter(&self, name: &str) -> Option<SetterFn> {
        self.setters.get(name).copied()
    }

    /// Names of all overridable methods, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    /// Names of all properties with a getter or setter, sorted and deduplicated.
    pub fn property_names(&self) -> Vec<&str> {
        let mut names = self
            .getters
            .keys()
            .chain(self.setters.keys())
            .map(String::as_str)
            .collect::<Vec<_>>();
        names.sort_unstable();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::{MemberTable, ObjectCore, ObjectRef};
    use crate::model::value::NativeValue;

    #[test]
    fn parses_id_and_fqn() {
        let objref = ObjectRef::parse("o1@pkg.MyClass").expect("valid objref");
        assert_eq!(objref.id(), "o1");
        assert_eq!(objref.type_fqn(), "pkg.MyClass");
        assert_eq!(objref.as_str(), "o1@pkg.MyClass");
    }

    #[test]
    fn keeps_scoped_type_names_intact() {
        let objref = ObjectRef::parse("10042@@scope/calc-lib.Number").expect("valid objref");
        assert_eq!(objref.id(), "10042");
        assert_eq!(objref.type_fqn(), "@scope/calc-lib.Number");
    }

    #[test]
    fn rejects_malformed_references() {
        for raw in ["", "no-separator", "@pkg.Type", "o1@"] {
            assert!(ObjectRef::parse(raw).is_err(), "`{raw}` must be rejected");
        }
    }

    #[test]
    fn serializes_as_byref_token() {
        let objref = ObjectRef::parse("o7@pkg.Thing").expect("valid objref");
        let json = serde_json::to_value(&objref).expect("serialize objref");
        assert_eq!(json, serde_json::json!({ "$jsii.byref": "o7@pkg.Thing" }));
        assert_eq!(json, objref.to_token());

        let back: ObjectRef = serde_json::from_value(json).expect("deserialize objref");
        assert_eq!(back, objref);
    }

    #[test]
    fn core_binds_only_once() {
        let core = ObjectCore::new();
        let first = ObjectRef::parse("o1@pkg.A").expect("valid objref");
        let second = ObjectRef::parse("o2@pkg.A").expect("valid objref");

        assert!(core.bind(&first));
        assert!(core.bind(&first), "rebinding the same ref is a no-op");
        assert!(!core.bind(&second));
        assert_eq!(core.objref(), Some(&first));
    }

    #[test]
    fn member_table_lists_names() {
        let table = MemberTable::new()
            .method("compute", |_, _, _| Ok(NativeValue::Null))
            .getter("value", |_, _| Ok(NativeValue::Null))
            .setter("value", |_, _, _| Ok(()))
            .setter("label", |_, _, _| Ok(()));

        assert_eq!(table.method_names(), vec!["compute"]);
        assert_eq!(table.property_names(), vec!["label", "value"]);
        assert!(table.find_method("missing").is_none());
        assert!(MemberTable::empty().method_names().is_empty());
    }
}
