//! Kernel-initiated callback dispatch.
//!
//! # Responsibility
//! - Route one callback to the generic handler or to the target object's
//!   member table.
//! - Turn the outcome into a `CallbackCompletion`.
//!
//! # Invariants
//! - A failing callback becomes `err` in the completion; it never aborts the
//!   bridge or the request that is waiting on it.
//! - A completion carries either `err` or `result`, never both.

use super::bridge::Bridge;
use crate::marshal;
use crate::model::object::CallbackError;
use crate::model::value::NativeValue;
use crate::protocol::{CallbackCompletion, CallbackKind, CallbackRequest};
use log::{debug, warn};
use serde_json::Value;

impl Bridge {
    /// Services one raw callback payload and returns its completion.
    pub(crate) fn dispatch_callback(&mut self, raw: Value) -> CallbackCompletion {
        let request = CallbackRequest::from_value(raw);
        let cbid = request.cbid.clone();

        self.callback_depth += 1;
        self.diagnostics.callbacks_serviced += 1;
        self.diagnostics.max_callback_depth = self
            .diagnostics
            .max_callback_depth
            .max(self.callback_depth);
        let depth = self.callback_depth;

        let outcome = self.service_callback(&request);
        self.callback_depth -= 1;

        let encoded = outcome.and_then(|value| {
            marshal::to_wire(&value).map_err(|err| -> CallbackError { Box::new(err) })
        });

        match encoded {
            Ok(result) => {
                debug!(
                    "event=callback module=callback status=ok cbid={} depth={}",
                    cbid, depth
                );
                CallbackCompletion {
                    cbid,
                    err: None,
                    result: (!result.is_null()).then_some(result),
                }
            }
            Err(err) => {
                warn!(
                    "event=callback module=callback status=error cbid={} depth={} error={}",
                    cbid, depth, err
                );
                CallbackCompletion {
                    cbid,
                    err: Some(err.to_string()),
                    result: None,
                }
            }
        }
    }

    fn service_callback(&mut self, request: &CallbackRequest) -> Result<NativeValue, CallbackError> {
        if let Some(handler) = self.callback_handler.clone() {
            return handler(self, request);
        }

        match &request.kind {
            CallbackKind::Invoke(call) => {
                let target = self.resolve_object(&call.objref)?;
                let method = target.members().find_method(&call.method).ok_or_else(|| {
                    format!("no method `{}` on {}", call.method, call.objref)
                })?;
                let args = call
                    .args
                    .iter()
                    .map(|arg| self.from_wire(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                method(self, &target, args)
            }
            CallbackKind::Get(call) => {
                let target = self.resolve_object(&call.objref)?;
                let getter = target.members().find_getter(&call.property).ok_or_else(|| {
                    format!("no readable property `{}` on {}", call.property, call.objref)
                })?;
                getter(self, &target)
            }
            CallbackKind::Set(call) => {
                let target = self.resolve_object(&call.objref)?;
                let setter = target.members().find_setter(&call.property).ok_or_else(|| {
                    format!("no writable property `{}` on {}", call.property, call.objref)
                })?;
                let value = self.from_wire(&call.value)?;
                setter(self, &target, value)?;
                Ok(NativeValue::Null)
            }
            CallbackKind::Malformed(error) => {
                Err(format!("malformed callback {}: {error}", request.cbid).into())
            }
            CallbackKind::Other => Err(format!(
                "callback {} has no invoke, get or set payload and no handler is installed",
                request.cbid
            )
            .into()),
        }
    }
}
