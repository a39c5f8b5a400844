mod common;

use common::{byref, ok, scripted_bridge, Greeter};
use jsii_bridge_core::{CallbackKind, NativeValue, ObjectRef, PromiseId};
use serde_json::json;

fn queued_greet(cbid: &str, name: &str) -> serde_json::Value {
    json!({
        "cbid": cbid,
        "invoke": { "objref": byref("c1@test.Greeter"), "method": "greet", "args": [name] }
    })
}

#[test]
fn begin_drain_end_runs_queued_callbacks() {
    let (mut bridge, handle) = scripted_bridge(|request| {
        let body = match request["api"].as_str().unwrap_or_default() {
            "begin" => json!({ "promiseid": "p1" }),
            "callbacks" => json!({ "callbacks": [queued_greet("cb1", "a"), queued_greet("cb2", "b")] }),
            "complete" => json!({ "cbid": request["cbid"].clone() }),
            "end" => json!({ "result": 2 }),
            _ => json!({}),
        };
        vec![ok(body)]
    });
    bridge
        .register_object(ObjectRef::parse("c1@test.Greeter").unwrap(), Greeter::new("Hey"))
        .unwrap();
    let target = ObjectRef::parse("k1@calc.Async").unwrap();

    let promise = bridge.begin(&target, "greetLater", &[]).unwrap();
    assert_eq!(promise, PromiseId("p1".to_string()));

    assert_eq!(bridge.drain_callbacks().unwrap(), 2);
    assert_eq!(bridge.end(&promise).unwrap().as_i64(), Some(2));

    let sent = handle.sent_json();
    assert_eq!(
        sent[0],
        json!({ "api": "begin", "objref": byref("k1@calc.Async"), "method": "greetLater", "args": [] })
    );
    assert_eq!(sent[1], json!({ "api": "callbacks" }));
    assert_eq!(sent[2], json!({ "api": "complete", "cbid": "cb1", "result": "Hey, a" }));
    assert_eq!(sent[3], json!({ "api": "complete", "cbid": "cb2", "result": "Hey, b" }));
    assert_eq!(sent[4], json!({ "api": "end", "promiseid": "p1" }));
}

#[test]
fn callbacks_can_be_listed_and_completed_by_hand() {
    let (mut bridge, handle) = scripted_bridge(|request| {
        let body = match request["api"].as_str().unwrap_or_default() {
            "callbacks" => json!({ "callbacks": [queued_greet("cb1", "a")] }),
            "complete" => json!({ "cbid": request["cbid"].clone() }),
            _ => json!({}),
        };
        vec![ok(body)]
    });

    let pending = bridge.callbacks().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].cbid, "cb1");
    assert!(matches!(pending[0].kind, CallbackKind::Invoke(ref call) if call.method == "greet"));

    let acknowledged = bridge
        .complete("cb1", Some("not today"), &NativeValue::from("ignored"))
        .unwrap();
    assert_eq!(acknowledged, "cb1");
    assert_eq!(
        handle.sent_json()[1],
        json!({ "api": "complete", "cbid": "cb1", "err": "not today" })
    );
}

#[test]
fn empty_callback_queue_drains_nothing() {
    let (mut bridge, handle) = scripted_bridge(|_| vec![ok(json!({ "callbacks": [] }))]);
    assert_eq!(bridge.drain_callbacks().unwrap(), 0);
    assert_eq!(handle.sent_lines().len(), 1);
}

#[test]
fn unparseable_queued_callback_does_not_block_the_rest() {
    let (mut bridge, handle) = scripted_bridge(|request| {
        let body = match request["api"].as_str().unwrap_or_default() {
            "callbacks" => json!({ "callbacks": [
                { "cbid": "cb1", "invoke": { "objref": byref("c1@test.Greeter"), "method": 7 } },
                queued_greet("cb2", "b")
            ] }),
            "complete" => json!({ "cbid": request["cbid"].clone() }),
            _ => json!({}),
        };
        vec![ok(body)]
    });
    bridge
        .register_object(ObjectRef::parse("c1@test.Greeter").unwrap(), Greeter::new("Hey"))
        .unwrap();

    let pending = bridge.callbacks().unwrap();
    assert!(matches!(pending[0].kind, CallbackKind::Malformed(_)));
    assert_eq!(pending[0].raw()["invoke"]["method"], json!(7));

    assert_eq!(bridge.drain_callbacks().unwrap(), 2);
    let sent = handle.sent_json();
    assert_eq!(sent[2]["cbid"], json!("cb1"));
    assert!(sent[2]["err"]
        .as_str()
        .is_some_and(|err| err.starts_with("malformed callback cb1")));
    assert_eq!(sent[2].get("result"), None);
    assert_eq!(sent[3], json!({ "api": "complete", "cbid": "cb2", "result": "Hey, b" }));
}
