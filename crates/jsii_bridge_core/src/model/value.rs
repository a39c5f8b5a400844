//! Native value model exchanged with bindings.
//!
//! # Responsibility
//! - Represent every value the marshaler can produce from a wire value.
//! - Keep object identity as pointer identity, never structural equality.
//!
//! # Invariants
//! - `NativeValue::Object` equality is `Rc::ptr_eq`.
//! - Dates are always normalized to UTC.

use crate::error::{BridgeError, BridgeResult};
use crate::model::object::ObjectHandle;
use chrono::{DateTime, Utc};
use serde_json::Number;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// One member of a registered enum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnumValue {
    /// Fully-qualified name of the enum type.
    pub fqn: String,
    /// Member name, e.g. `NORMAL`.
    pub member: String,
}

impl EnumValue {
    pub fn new(fqn: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            fqn: fqn.into(),
            member: member.into(),
        }
    }

    /// Parses `<enum-fqn>/<MEMBER>`, splitting at the last `/`.
    pub fn parse(member_fqn: &str) -> BridgeResult<Self> {
        match member_fqn.rsplit_once('/') {
            Some((fqn, member)) if !fqn.is_empty() && !member.is_empty() => {
                Ok(Self::new(fqn, member))
            }
            _ => Err(BridgeError::InvalidWireValue(format!(
                "enum reference `{member_fqn}` is not of the form <fqn>/<MEMBER>"
            ))),
        }
    }

    /// Fully-qualified member name used in enum tokens.
    pub fn member_fqn(&self) -> String {
        format!("{}/{}", self.fqn, self.member)
    }
}

impl Display for EnumValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.fqn, self.member)
    }
}

/// Value on the native side of the bridge.
#[derive(Debug, Clone, Default)]
pub enum NativeValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<NativeValue>),
    Map(BTreeMap<String, NativeValue>),
    Date(DateTime<Utc>),
    Enum(EnumValue),
    Object(ObjectHandle),
}

impl NativeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(value) => value.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => value.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[NativeValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, NativeValue>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Date(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Self::Enum(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Self::Object(handle) => Some(handle),
            _ => None,
        }
    }

    /// Returns true when both values are the same proxy instance.
    pub fn is_same_object(&self, other: &NativeValue) -> bool {
        match (self, other) {
            (Self::Object(left), Self::Object(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Number(left), Self::Number(right)) => left == right,
            (Self::String(left), Self::String(right)) => left == right,
            (Self::Array(left), Self::Array(right)) => left == right,
            (Self::Map(left), Self::Map(right)) => left == right,
            (Self::Date(left), Self::Date(right)) => left == right,
            (Self::Enum(left), Self::Enum(right)) => left == right,
            (Self::Object(left), Self::Object(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for NativeValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u32> for NativeValue {
    fn from(value: u32) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for NativeValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

/// Non-finite floats have no JSON form and become `Null`.
impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<DateTime<Utc>> for NativeValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<EnumValue> for NativeValue {
    fn from(value: EnumValue) -> Self {
        Self::Enum(value)
    }
}

impl From<ObjectHandle> for NativeValue {
    fn from(value: ObjectHandle) -> Self {
        Self::Object(value)
    }
}

impl<T: Into<NativeValue>> From<Vec<T>> for NativeValue {
    fn from(value: Vec<T>) -> Self {
        Self::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<NativeValue>> From<BTreeMap<String, T>> for NativeValue {
    fn from(value: BTreeMap<String, T>) -> Self {
        Self::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{EnumValue, NativeValue};
    use std::collections::BTreeMap;

    #[test]
    fn enum_member_fqn_splits_at_last_slash() {
        let value = EnumValue::parse("@scope/calc-lib.EnumFromScopedModule/VALUE2")
            .expect("valid enum fqn");
        assert_eq!(value.fqn, "@scope/calc-lib.EnumFromScopedModule");
        assert_eq!(value.member, "VALUE2");
        assert_eq!(
            value.member_fqn(),
            "@scope/calc-lib.EnumFromScopedModule/VALUE2"
        );
    }

    #[test]
    fn enum_parse_rejects_missing_member() {
        assert!(EnumValue::parse("calc.Style").is_err());
        assert!(EnumValue::parse("calc.Style/").is_err());
        assert!(EnumValue::parse("/NORMAL").is_err());
    }

    #[test]
    fn conversions_build_expected_variants() {
        assert_eq!(NativeValue::from(12).as_i64(), Some(12));
        assert_eq!(NativeValue::from(1.5).as_f64(), Some(1.5));
        assert!(NativeValue::from(f64::NAN).is_null());
        assert_eq!(NativeValue::from("a").as_str(), Some("a"));
        assert_eq!(NativeValue::from(None::<i64>), NativeValue::Null);

        let array = NativeValue::from(vec![1, 2]);
        assert_eq!(array.as_array().map(<[NativeValue]>::len), Some(2));

        let mut map = BTreeMap::new();
        map.insert("k".to_string(), true);
        let map = NativeValue::from(map);
        assert_eq!(
            map.as_map().and_then(|entries| entries.get("k")),
            Some(&NativeValue::Bool(true))
        );
    }

    #[test]
    fn integers_and_floats_stay_distinct() {
        assert_ne!(NativeValue::from(1), NativeValue::from(1.0));
    }
}
