//! Conversion between native values and wire values.
//!
//! # Responsibility
//! - Encode `NativeValue` into JSON wire values with reserved tokens.
//! - Decode wire values, resolving object references through the table.
//!
//! # Invariants
//! - Token priority on decode is date > reference > enum, and a mapping with
//!   more than one token key is rejected.
//! - A token key whose value is `null` counts as absent; such a mapping
//!   decodes as a plain map.
//! - Dates are written as ISO-8601 in UTC with a `Z` suffix.
//! - Token-free values round-trip structurally.

use crate::error::{BridgeError, BridgeResult};
use crate::model::object::{ObjectRef, TOKEN_REF};
use crate::model::value::NativeValue;
use crate::registry::object_table::ObjectTable;
use crate::registry::type_registry::TypeRegistry;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const TOKEN_DATE: &str = "$jsii.date";
pub const TOKEN_ENUM: &str = "$jsii.enum";

/// Reserved keys in decode priority order.
const TOKEN_PRIORITY: [&str; 3] = [TOKEN_DATE, TOKEN_REF, TOKEN_ENUM];

/// Encodes a native value for the wire.
///
/// # Errors
/// - `UnregisteredObject` when an object without bridge identity is found.
pub fn to_wire(value: &NativeValue) -> BridgeResult<Value> {
    Ok(match value {
        NativeValue::Null => Value::Null,
        NativeValue::Bool(value) => Value::Bool(*value),
        NativeValue::Number(value) => Value::Number(value.clone()),
        NativeValue::String(value) => Value::String(value.clone()),
        NativeValue::Array(items) => Value::Array(to_wire_all(items)?),
        NativeValue::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, value) in entries {
                map.insert(key.clone(), to_wire(value)?);
            }
            Value::Object(map)
        }
        NativeValue::Date(value) => token(TOKEN_DATE, format_date(value)),
        NativeValue::Enum(value) => token(TOKEN_ENUM, value.member_fqn()),
        NativeValue::Object(handle) => handle.objref()?.to_token(),
    })
}

/// Encodes an argument list.
pub fn to_wire_all(values: &[NativeValue]) -> BridgeResult<Vec<Value>> {
    values.iter().map(to_wire).collect()
}

/// Decodes a wire value.
///
/// Foreign object references are materialized through `objects`/`types`.
///
/// # Errors
/// - `AmbiguousToken` for a mapping with more than one reserved key.
/// - `InvalidWireValue` for malformed token payloads.
/// - `UnresolvedType` / `UnresolvedEnum` for fqns absent from `types`.
pub fn from_wire(
    value: &Value,
    objects: &mut ObjectTable,
    types: &TypeRegistry,
) -> BridgeResult<NativeValue> {
    match value {
        Value::Null => Ok(NativeValue::Null),
        Value::Bool(value) => Ok(NativeValue::Bool(*value)),
        Value::Number(value) => Ok(NativeValue::Number(value.clone())),
        Value::String(value) => Ok(NativeValue::String(value.clone())),
        Value::Array(items) => items
            .iter()
            .map(|item| from_wire(item, objects, types))
            .collect::<BridgeResult<Vec<_>>>()
            .map(NativeValue::Array),
        Value::Object(map) => match token_key(map)? {
            Some(TOKEN_DATE) => parse_date(token_str(map, TOKEN_DATE)?).map(NativeValue::Date),
            Some(TOKEN_REF) => {
                let objref = ObjectRef::parse(token_str(map, TOKEN_REF)?)?;
                objects.resolve(&objref, types).map(NativeValue::Object)
            }
            Some(_) => types
                .resolve_enum(token_str(map, TOKEN_ENUM)?)
                .map(NativeValue::Enum),
            None => map
                .iter()
                .map(|(key, value)| -> BridgeResult<(String, NativeValue)> {
                    Ok((key.clone(), from_wire(value, objects, types)?))
                })
                .collect::<BridgeResult<BTreeMap<_, _>>>()
                .map(NativeValue::Map),
        },
    }
}

/// Formats a date the way the kernel expects it.
pub fn format_date(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parses an ISO-8601 date and normalizes it to UTC.
pub fn parse_date(raw: &str) -> BridgeResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| BridgeError::InvalidWireValue(format!("invalid date `{raw}`: {err}")))
}

/// Returns the single reserved key of `map` holding a non-null value, if any.
fn token_key(map: &Map<String, Value>) -> BridgeResult<Option<&'static str>> {
    let present = TOKEN_PRIORITY
        .iter()
        .copied()
        .filter(|key| map.get(*key).is_some_and(|value| !value.is_null()))
        .collect::<Vec<_>>();
    match present.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        _ => Err(BridgeError::AmbiguousToken(
            present.iter().map(|key| key.to_string()).collect(),
        )),
    }
}

fn token_str<'a>(map: &'a Map<String, Value>, key: &str) -> BridgeResult<&'a str> {
    map.get(key).and_then(Value::as_str).ok_or_else(|| {
        BridgeError::InvalidWireValue(format!("`{key}` token must carry a string"))
    })
}

fn token(key: &str, payload: String) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(key.to_string(), Value::String(payload));
    Value::Object(map)
}
