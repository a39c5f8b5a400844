//! Bridge context: lifecycle state machine and the request/response engine.
//!
//! # Responsibility
//! - Own the kernel channel, the object table and the type registry.
//! - Launch and handshake lazily, close idempotently (also on drop).
//! - Run the synchronous request loop, servicing callbacks in between.
//!
//! # Invariants
//! - Unstarted -> Running -> Closed; a failed start is terminal (`Failed`).
//! - Exactly one request is outstanding at a time; nested callbacks complete
//!   in strict LIFO order because they are serviced by direct recursion.
//! - Null-valued top-level request fields are never written.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::logging::sanitize_message;
use crate::marshal;
use crate::model::object::{CallbackError, ObjectHandle, ObjectRef};
use crate::model::value::NativeValue;
use crate::protocol::{CallbackRequest, CompleteEnvelope, KernelResponse, LoadResponse, Request};
use crate::registry::object_table::ObjectTable;
use crate::registry::type_registry::{Allocator, TypeRegistry};
use crate::transport::{self, KernelChannel, ProcessChannel, TransportResult};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::rc::Rc;

const MAX_LOGGED_LINE_CHARS: usize = 512;

/// Generic callback handler; takes precedence over member-table dispatch.
pub type CallbackHandler =
    dyn Fn(&mut Bridge, &CallbackRequest) -> Result<NativeValue, CallbackError>;

type Launcher = Box<dyn FnOnce() -> TransportResult<Box<dyn KernelChannel>>>;

enum BridgeState {
    Unstarted,
    Running(Box<dyn KernelChannel>),
    Failed(String),
    Closed,
}

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    Unstarted,
    Running,
    Failed,
    Closed,
}

/// Counters for diagnostics; not part of the protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeDiagnostics {
    pub requests_sent: u64,
    pub callbacks_serviced: u64,
    pub max_callback_depth: usize,
    pub object_count: usize,
}

pub struct Bridge {
    config: BridgeConfig,
    state: BridgeState,
    launcher: Option<Launcher>,
    pub(crate) objects: ObjectTable,
    pub(crate) types: TypeRegistry,
    pub(crate) callback_handler: Option<Rc<CallbackHandler>>,
    pub(crate) loaded: BTreeMap<String, LoadResponse>,
    pub(crate) callback_depth: usize,
    pub(crate) diagnostics: BridgeDiagnostics,
}

impl Bridge {
    /// Bridge that launches the kernel child process described by `config`.
    pub fn new(config: BridgeConfig) -> Self {
        let spec = config.launch_spec();
        Self::with_launcher(config, move || {
            ProcessChannel::spawn(&spec).map(|channel| Box::new(channel) as Box<dyn KernelChannel>)
        })
    }

    /// Bridge over an already connected channel; the handshake still runs first.
    pub fn with_channel(config: BridgeConfig, channel: impl KernelChannel + 'static) -> Self {
        Self::with_launcher(config, move || Ok(Box::new(channel) as Box<dyn KernelChannel>))
    }

    /// Bridge whose channel is produced by `launcher` on first use.
    pub fn with_launcher(
        config: BridgeConfig,
        launcher: impl FnOnce() -> TransportResult<Box<dyn KernelChannel>> + 'static,
    ) -> Self {
        Self {
            config,
            state: BridgeState::Unstarted,
            launcher: Some(Box::new(launcher)),
            objects: ObjectTable::new(),
            types: TypeRegistry::new(),
            callback_handler: None,
            loaded: BTreeMap::new(),
            callback_depth: 0,
            diagnostics: BridgeDiagnostics::default(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn status(&self) -> BridgeStatus {
        match self.state {
            BridgeState::Unstarted => BridgeStatus::Unstarted,
            BridgeState::Running(_) => BridgeStatus::Running,
            BridgeState::Failed(_) => BridgeStatus::Failed,
            BridgeState::Closed => BridgeStatus::Closed,
        }
    }

    /// Launches the kernel and verifies its version. No-op when running.
    ///
    /// # Errors
    /// - `Protocol` on handshake mismatch; the bridge then stays `Failed`.
    /// - `Transport` when the kernel cannot be launched or disconnects.
    /// - `Closed` after `close`.
    pub fn start(&mut self) -> BridgeResult<()> {
        match &self.state {
            BridgeState::Running(_) => return Ok(()),
            BridgeState::Failed(reason) => {
                return Err(BridgeError::Protocol(format!(
                    "bridge failed to start: {reason}"
                )))
            }
            BridgeState::Closed => return Err(BridgeError::Closed),
            BridgeState::Unstarted => {}
        }

        let launcher = self.launcher.take().ok_or(BridgeError::Closed)?;
        let mut channel = match launcher() {
            Ok(channel) => channel,
            Err(err) => {
                self.state = BridgeState::Failed(err.to_string());
                return Err(err.into());
            }
        };

        match transport::handshake(channel.as_mut(), &self.config.expected_version) {
            Ok(_) => {
                self.state = BridgeState::Running(channel);
                Ok(())
            }
            Err(err) => {
                if let Err(close_err) = channel.close() {
                    warn!(
                        "event=bridge_start module=engine status=error close_error={}",
                        close_err
                    );
                }
                self.state = BridgeState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Closes the kernel channel. Idempotent; the bridge never reopens.
    ///
    /// Dropping the bridge calls this too, but `Drop` does not run on
    /// `std::process::exit` or when panics abort. In that case the OS closes
    /// the pipes and the kernel exits on stdin EOF without a grace-period
    /// kill, so call `close` explicitly before exiting the process.
    pub fn close(&mut self) -> BridgeResult<()> {
        self.launcher = None;
        match std::mem::replace(&mut self.state, BridgeState::Closed) {
            BridgeState::Running(mut channel) => {
                info!(
                    "event=bridge_close module=engine status=start requests_sent={} objects={}",
                    self.diagnostics.requests_sent,
                    self.objects.len()
                );
                channel.close()?;
                Ok(())
            }
            BridgeState::Unstarted | BridgeState::Failed(_) | BridgeState::Closed => Ok(()),
        }
    }

    /// Sends one request and returns its `ok` payload (`Null` for void).
    ///
    /// Kernel callbacks arriving before the terminal response are serviced
    /// here and answered with `{"complete": ...}` lines.
    pub fn call(&mut self, request: &Request) -> BridgeResult<Value> {
        let mut payload = serde_json::to_value(request)?;
        strip_nulls(&mut payload);
        self.send(&payload.to_string())?;
        self.diagnostics.requests_sent += 1;

        loop {
            let response = self.receive()?;

            if let Some(message) = response.error {
                debug!(
                    "event=kernel_error module=engine api={} depth={}",
                    request.api(),
                    self.callback_depth
                );
                return Err(BridgeError::kernel(message, response.stack));
            }

            if let Some(callback) = response.callback {
                let completion = self.dispatch_callback(callback);
                let line = serde_json::to_string(&CompleteEnvelope {
                    complete: &completion,
                })?;
                self.send(&line)?;
                continue;
            }

            return Ok(response.ok.unwrap_or(Value::Null));
        }
    }

    fn channel(&mut self) -> BridgeResult<&mut dyn KernelChannel> {
        self.start()?;
        match &mut self.state {
            BridgeState::Running(channel) => Ok(channel.as_mut()),
            _ => Err(BridgeError::Closed),
        }
    }

    fn send(&mut self, line: &str) -> BridgeResult<()> {
        let depth = self.callback_depth;
        self.channel()?.send_line(line)?;
        debug!(
            "event=kernel_send module=engine depth={} line={}",
            depth,
            sanitize_message(line, MAX_LOGGED_LINE_CHARS)
        );
        Ok(())
    }

    fn receive(&mut self) -> BridgeResult<KernelResponse> {
        let depth = self.callback_depth;
        let line = self.channel()?.read_line()?;
        debug!(
            "event=kernel_recv module=engine depth={} line={}",
            depth,
            sanitize_message(&line, MAX_LOGGED_LINE_CHARS)
        );
        Ok(serde_json::from_str(&line)?)
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// Registration entry point used by generated bindings for classes.
    pub fn register_class(&mut self, fqn: impl Into<String>, allocate: Allocator) -> BridgeResult<()> {
        self.types.register_class(fqn, allocate)
    }

    /// Registration entry point used by generated bindings for enums.
    pub fn register_enum(&mut self, fqn: impl Into<String>, members: &[&str]) -> BridgeResult<()> {
        self.types.register_enum(fqn, members)
    }

    /// Maps `objref` to a locally constructed object.
    pub fn register_object(&mut self, objref: ObjectRef, obj: ObjectHandle) -> BridgeResult<ObjectHandle> {
        self.objects.register(objref, obj)
    }

    /// Returns the proxy for `objref`, materializing it on first sight.
    pub fn resolve_object(&mut self, objref: &ObjectRef) -> BridgeResult<ObjectHandle> {
        self.objects.resolve(objref, &self.types)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn object_refs(&self) -> Vec<ObjectRef> {
        self.objects.refs().cloned().collect()
    }

    pub fn to_wire(&self, value: &NativeValue) -> BridgeResult<Value> {
        marshal::to_wire(value)
    }

    pub fn from_wire(&mut self, value: &Value) -> BridgeResult<NativeValue> {
        marshal::from_wire(value, &mut self.objects, &self.types)
    }

    /// Installs a generic handler that receives every callback first.
    pub fn on_callback(
        &mut self,
        handler: impl Fn(&mut Bridge, &CallbackRequest) -> Result<NativeValue, CallbackError> + 'static,
    ) {
        self.callback_handler = Some(Rc::new(handler));
    }

    pub fn clear_callback_handler(&mut self) {
        self.callback_handler = None;
    }

    pub fn diagnostics(&self) -> BridgeDiagnostics {
        BridgeDiagnostics {
            object_count: self.objects.len(),
            ..self.diagnostics
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("event=bridge_close module=engine status=error error={}", err);
        }
    }
}

/// Removes null-valued fields from a top-level request object.
pub(crate) fn strip_nulls(payload: &mut Value) {
    if let Value::Object(map) = payload {
        map.retain(|_, value| !value.is_null());
    }
}

#[cfg(test)]
mod tests {
    use super::{strip_nulls, Bridge, BridgeStatus};
    use crate::config::BridgeConfig;
    use crate::error::BridgeError;
    use crate::protocol::Request;
    use crate::transport::{hello_line, MemoryChannel, TransportError};
    use serde_json::json;

    fn config() -> BridgeConfig {
        BridgeConfig {
            expected_version: "1.0.0".to_string(),
            ..BridgeConfig::default()
        }
    }

    #[test]
    fn strip_nulls_only_touches_top_level() {
        let mut payload = json!({ "a": null, "b": { "c": null }, "d": 1 });
        strip_nulls(&mut payload);
        assert_eq!(payload, json!({ "b": { "c": null }, "d": 1 }));
    }

    #[test]
    fn start_is_lazy_and_idempotent() {
        let (channel, handle) = MemoryChannel::new();
        handle.push_line(hello_line("1.0.0"));
        let mut bridge = Bridge::with_channel(config(), channel);

        assert_eq!(bridge.status(), BridgeStatus::Unstarted);
        bridge.start().expect("start");
        bridge.start().expect("second start is a no-op");
        assert_eq!(bridge.status(), BridgeStatus::Running);
        assert!(handle.sent_lines().is_empty());
    }

    #[test]
    fn launch_failure_is_terminal() {
        let mut bridge = Bridge::with_launcher(config(), || Err(TransportError::Disconnected));
        let first = bridge.start().expect_err("launch must fail");
        assert!(matches!(first, BridgeError::Transport(_)));
        assert_eq!(bridge.status(), BridgeStatus::Failed);

        let again = bridge.call(&Request::Stats).expect_err("failed bridge refuses calls");
        assert!(matches!(again, BridgeError::Protocol(_)));
    }

    #[test]
    fn close_before_start_never_launches() {
        let mut bridge =
            Bridge::with_launcher(config(), || panic!("launcher must not run after close"));
        bridge.close().expect("close");
        bridge.close().expect("close is idempotent");
        assert_eq!(bridge.status(), BridgeStatus::Closed);
        assert!(matches!(bridge.start(), Err(BridgeError::Closed)));
    }

    #[test]
    fn drop_closes_running_channel() {
        let (channel, handle) = MemoryChannel::new();
        handle.push_line(hello_line("1.0.0"));
        {
            let mut bridge = Bridge::with_channel(config(), channel);
            bridge.start().expect("start");
        }
        assert!(handle.is_closed());
    }

    #[test]
    fn malformed_response_line_is_json_error() {
        let (channel, handle) = MemoryChannel::with_responder(|_| vec!["not json".to_string()]);
        handle.push_line(hello_line("1.0.0"));
        let mut bridge = Bridge::with_channel(config(), channel);

        let err = bridge.call(&Request::Stats).expect_err("garbage must fail");
        assert!(matches!(err, BridgeError::Json(_)));
        assert_eq!(bridge.status(), BridgeStatus::Running);
    }
}
