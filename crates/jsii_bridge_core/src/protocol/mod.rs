//! Kernel wire messages.
//!
//! # Responsibility
//! - Define the request objects the bridge writes and the response objects it
//!   reads, as serde types.
//!
//! # Invariants
//! - Requests are tagged by an `api` field naming the operation.
//! - Synchronous callback completion travels as `{"complete": {...}}`.
//! - Optional fields are omitted, never sent as `null`.

use crate::model::object::ObjectRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One top-level kernel request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "api", rename_all = "lowercase")]
pub enum Request {
    Load {
        name: String,
        version: String,
        tarball: String,
    },
    Create {
        fqn: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        args: Vec<Value>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        overrides: Vec<Override>,
    },
    Del {
        objref: ObjectRef,
    },
    Get {
        objref: ObjectRef,
        property: String,
    },
    Sget {
        fqn: String,
        property: String,
    },
    Set {
        objref: ObjectRef,
        property: String,
        value: Value,
    },
    Sset {
        fqn: String,
        property: String,
        value: Value,
    },
    Invoke {
        objref: ObjectRef,
        method: String,
        args: Vec<Value>,
    },
    Sinvoke {
        fqn: String,
        method: String,
        args: Vec<Value>,
    },
    Begin {
        objref: ObjectRef,
        method: String,
        args: Vec<Value>,
    },
    End {
        promiseid: String,
    },
    Callbacks,
    Complete {
        cbid: String,
        err: Option<String>,
        result: Option<Value>,
    },
    Naming {
        assembly: String,
    },
    Stats,
}

impl Request {
    /// Operation name, as written in the `api` field.
    pub fn api(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::Create { .. } => "create",
            Self::Del { .. } => "del",
            Self::Get { .. } => "get",
            Self::Sget { .. } => "sget",
            Self::Set { .. } => "set",
            Self::Sset { .. } => "sset",
            Self::Invoke { .. } => "invoke",
            Self::Sinvoke { .. } => "sinvoke",
            Self::Begin { .. } => "begin",
            Self::End { .. } => "end",
            Self::Callbacks => "callbacks",
            Self::Complete { .. } => "complete",
            Self::Naming { .. } => "naming",
            Self::Stats => "stats",
        }
    }
}

/// Member the kernel must route back to the client object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Override {
    Method {
        method: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cookie: Option<String>,
    },
    Property {
        property: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cookie: Option<String>,
    },
}

impl Override {
    pub fn method(name: impl Into<String>) -> Self {
        Self::Method {
            method: name.into(),
            cookie: None,
        }
    }

    pub fn property(name: impl Into<String>) -> Self {
        Self::Property {
            property: name.into(),
            cookie: None,
        }
    }
}

/// Outcome of one callback, sent back inside `{"complete": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackCompletion {
    pub cbid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CompleteEnvelope<'a> {
    pub complete: &'a CallbackCompletion,
}

/// Any line the kernel sends in reply to a request.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct KernelResponse {
    #[serde(default)]
    pub ok: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub callback: Option<Value>,
}

/// Kernel-initiated request against a client-owned object.
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    pub cbid: String,
    pub cookie: Option<String>,
    pub kind: CallbackKind,
    raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackKind {
    Invoke(InvokeCallback),
    Get(GetCallback),
    Set(SetCallback),
    /// A built-in body was present but did not parse; only a generic handler
    /// can serve it.
    Malformed(String),
    /// Payload with none of the built-in shapes; only a generic handler can serve it.
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvokeCallback {
    pub objref: ObjectRef,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetCallback {
    pub objref: ObjectRef,
    pub property: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetCallback {
    pub objref: ObjectRef,
    pub property: String,
    #[serde(default)]
    pub value: Value,
}

impl CallbackRequest {
    /// Classifies a callback payload without rejecting it.
    ///
    /// A present but unparseable `invoke`/`get`/`set` body becomes
    /// `CallbackKind::Malformed`; the raw JSON is always kept for generic
    /// handlers. A non-string `cbid` is kept in its JSON text form.
    pub fn from_value(raw: Value) -> Self {
        let cbid = match raw.get("cbid") {
            Some(Value::String(cbid)) => cbid.clone(),
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        };
        let cookie = raw
            .get("cookie")
            .and_then(Value::as_str)
            .map(str::to_string);
        let kind = classify_callback(&raw);
        Self {
            cbid,
            cookie,
            kind,
            raw,
        }
    }

    /// Payload exactly as received.
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// `null` bodies count as absent.
fn classify_callback(raw: &Value) -> CallbackKind {
    let body = |key: &str| raw.get(key).filter(|body| !body.is_null()).cloned();
    let parsed = if let Some(invoke) = body("invoke") {
        serde_json::from_value(invoke).map(CallbackKind::Invoke)
    } else if let Some(get) = body("get") {
        serde_json::from_value(get).map(CallbackKind::Get)
    } else if let Some(set) = body("set") {
        serde_json::from_value(set).map(CallbackKind::Set)
    } else {
        return CallbackKind::Other;
    };
    parsed.unwrap_or_else(|err| CallbackKind::Malformed(err.to_string()))
}

/// `ok` payload of `load`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoadResponse {
    pub assembly: String,
    pub types: u64,
}

/// `ok` payload of `stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct KernelStats {
    #[serde(rename = "objectCount")]
    pub object_count: u64,
}

/// Handle of an asynchronous invocation started with `begin`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PromiseId(pub String);

#[derive(Debug, Deserialize)]
pub(crate) struct ValueBody {
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultBody {
    #[serde(default)]
    pub result: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BeginBody {
    pub promiseid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbacksBody {
    #[serde(default)]
    pub callbacks: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompleteBody {
    pub cbid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NamingBody {
    #[serde(default)]
    pub naming: Value,
}
