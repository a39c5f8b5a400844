#![allow(dead_code)]

use jsii_bridge_core::transport::hello_line;
use jsii_bridge_core::{
    Bridge, BridgeConfig, JsiiObject, MemberTable, MemoryChannel, MemoryHandle, NativeValue,
    ObjectCore, ObjectHandle,
};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub const KERNEL_VERSION: &str = "1.0.0";
pub const GREETER_FQN: &str = "test.Greeter";

thread_local! {
    static GREETER_ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

pub fn config() -> BridgeConfig {
    BridgeConfig {
        expected_version: KERNEL_VERSION.to_string(),
        ..BridgeConfig::default()
    }
}

/// Bridge over an in-memory kernel; `respond` maps each request to reply lines.
pub fn scripted_bridge(respond: impl FnMut(&Value) -> Vec<Value> + 'static) -> (Bridge, MemoryHandle) {
    scripted_bridge_with(config(), respond)
}

pub fn scripted_bridge_with(
    config: BridgeConfig,
    mut respond: impl FnMut(&Value) -> Vec<Value> + 'static,
) -> (Bridge, MemoryHandle) {
    let (channel, handle) = MemoryChannel::with_responder(move |line| {
        let request: Value = serde_json::from_str(line).expect("bridge writes JSON lines");
        respond(&request)
            .into_iter()
            .map(|reply| reply.to_string())
            .collect()
    });
    handle.push_line(hello_line(KERNEL_VERSION));
    (Bridge::with_channel(config, channel), handle)
}

pub fn ok(body: Value) -> Value {
    json!({ "ok": body })
}

pub fn byref(raw: &str) -> Value {
    json!({ "$jsii.byref": raw })
}

pub fn invoke_callback(cbid: &str, objref: &str, method: &str, args: Value) -> Value {
    json!({
        "callback": {
            "cbid": cbid,
            "invoke": { "objref": byref(objref), "method": method, "args": args }
        }
    })
}

/// Lines sent with a top-level `complete` key.
pub fn completions(handle: &MemoryHandle) -> Vec<Value> {
    handle
        .sent_json()
        .into_iter()
        .filter_map(|line| line.get("complete").cloned())
        .collect()
}

/// Client-side proxy used across the integration tests.
pub struct Greeter {
    core: ObjectCore,
    greeting: RefCell<String>,
}

impl Greeter {
    pub fn new(greeting: &str) -> ObjectHandle {
        Rc::new(Self {
            core: ObjectCore::new(),
            greeting: RefCell::new(greeting.to_string()),
        })
    }

    pub fn allocate() -> ObjectHandle {
        GREETER_ALLOCATIONS.with(|count| count.set(count.get() + 1));
        Self::new("")
    }

    pub fn allocations() -> usize {
        GREETER_ALLOCATIONS.with(Cell::get)
    }

    pub fn greeting(handle: &ObjectHandle) -> String {
        handle
            .downcast_ref::<Greeter>()
            .map(|greeter| greeter.greeting.borrow().clone())
            .unwrap_or_default()
    }
}

static GREETER_MEMBERS: Lazy<MemberTable> = Lazy::new(|| {
    MemberTable::new()
        .method("greet", |_, this, args| {
            let greeter = this.downcast_ref::<Greeter>().ok_or("not a greeter")?;
            let name = args.first().and_then(NativeValue::as_str).unwrap_or("world");
            Ok(format!("{}, {}", greeter.greeting.borrow(), name).into())
        })
        .method("fail", |_, _, _| Err("boom".into()))
        .getter("greeting", |_, this| Ok(Greeter::greeting(this).into()))
        .setter("greeting", |_, this, value| {
            let greeter = this.downcast_ref::<Greeter>().ok_or("not a greeter")?;
            *greeter.greeting.borrow_mut() = value.as_str().ok_or("greeting must be a string")?.to_string();
            Ok(())
        })
});

impl JsiiObject for Greeter {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn members(&self) -> &MemberTable {
        &GREETER_MEMBERS
    }
}
