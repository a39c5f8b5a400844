//! Typed kernel operations.
//!
//! Each operation builds one `Request`, runs it through the engine and decodes
//! the `ok` payload. Argument and result values cross the marshaler.

use super::bridge::Bridge;
use crate::config::ReleasePolicy;
use crate::error::BridgeResult;
use crate::marshal;
use crate::model::object::{ObjectHandle, ObjectRef};
use crate::model::value::NativeValue;
use crate::protocol::{
    BeginBody, CallbackRequest, CallbacksBody, CompleteBody, KernelStats, LoadResponse,
    NamingBody, Override, PromiseId, Request, ResultBody, ValueBody,
};
use crate::registry::type_registry::{BindingModule, TypeRegistry};
use log::info;
use serde_json::Value;
use std::path::Path;

impl Bridge {
    /// Loads an assembly tarball into the kernel.
    pub fn load(&mut self, name: &str, version: &str, tarball: &Path) -> BridgeResult<LoadResponse> {
        let ok = self.call(&Request::Load {
            name: name.to_string(),
            version: version.to_string(),
            tarball: tarball.display().to_string(),
        })?;
        let loaded: LoadResponse = serde_json::from_value(ok)?;
        info!(
            "event=assembly_load module=api status=ok assembly={} types={}",
            loaded.assembly, loaded.types
        );
        Ok(loaded)
    }

    /// Loads the module's assembly and registers its types. Loading the
    /// same assembly twice returns the first response.
    ///
    /// Types are staged and only merged once the kernel accepted the load,
    /// so a failed load can be retried.
    pub fn load_module(&mut self, module: &dyn BindingModule) -> BridgeResult<LoadResponse> {
        if let Some(loaded) = self.loaded.get(module.assembly_name()) {
            return Ok(loaded.clone());
        }
        let mut staged = TypeRegistry::new();
        module.register_types(&mut staged)?;
        self.types.check_disjoint(&staged)?;

        let loaded = self.load(module.assembly_name(), module.assembly_version(), module.tarball())?;
        self.types.merge(staged)?;
        self.loaded
            .insert(module.assembly_name().to_string(), loaded.clone());
        Ok(loaded)
    }

    /// Creates a kernel object and returns its reference.
    pub fn create(
        &mut self,
        fqn: &str,
        args: &[NativeValue],
        overrides: &[Override],
    ) -> BridgeResult<ObjectRef> {
        let ok = self.call(&Request::Create {
            fqn: fqn.to_string(),
            args: marshal::to_wire_all(args)?,
            overrides: overrides.to_vec(),
        })?;
        Ok(serde_json::from_value(ok)?)
    }

    /// Creates a kernel object backed by the native `obj`.
    ///
    /// Every member in `obj.members()` is announced as an override, and `obj`
    /// is registered under the returned reference.
    pub fn create_object(
        &mut self,
        obj: ObjectHandle,
        fqn: &str,
        args: &[NativeValue],
    ) -> BridgeResult<ObjectHandle> {
        let overrides = overrides_for(&obj);
        let objref = self.create(fqn, args, &overrides)?;
        self.register_object(objref, obj)
    }

    /// Deletes a kernel object. Under `ReleaseOnDelete` the local entry goes too.
    pub fn del(&mut self, objref: &ObjectRef) -> BridgeResult<()> {
        self.call(&Request::Del {
            objref: objref.clone(),
        })?;
        if self.config().release_policy == ReleasePolicy::ReleaseOnDelete {
            self.objects.release(objref);
        }
        Ok(())
    }

    pub fn get(&mut self, objref: &ObjectRef, property: &str) -> BridgeResult<NativeValue> {
        let ok = self.call(&Request::Get {
            objref: objref.clone(),
            property: property.to_string(),
        })?;
        self.decode_value_body(ok)
    }

    /// Reads a static property.
    pub fn sget(&mut self, fqn: &str, property: &str) -> BridgeResult<NativeValue> {
        let ok = self.call(&Request::Sget {
            fqn: fqn.to_string(),
            property: property.to_string(),
        })?;
        self.decode_value_body(ok)
    }

    pub fn set(&mut self, objref: &ObjectRef, property: &str, value: &NativeValue) -> BridgeResult<()> {
        self.call(&Request::Set {
            objref: objref.clone(),
            property: property.to_string(),
            value: marshal::to_wire(value)?,
        })?;
        Ok(())
    }

    /// Writes a static property.
    pub fn sset(&mut self, fqn: &str, property: &str, value: &NativeValue) -> BridgeResult<()> {
        self.call(&Request::Sset {
            fqn: fqn.to_string(),
            property: property.to_string(),
            value: marshal::to_wire(value)?,
        })?;
        Ok(())
    }

    pub fn invoke(
        &mut self,
        objref: &ObjectRef,
        method: &str,
        args: &[NativeValue],
    ) -> BridgeResult<NativeValue> {
        let ok = self.call(&Request::Invoke {
            objref: objref.clone(),
            method: method.to_string(),
            args: marshal::to_wire_all(args)?,
        })?;
        self.decode_result_body(ok)
    }

    /// Invokes a static method.
    pub fn sinvoke(&mut self, fqn: &str, method: &str, args: &[NativeValue]) -> BridgeResult<NativeValue> {
        let ok = self.call(&Request::Sinvoke {
            fqn: fqn.to_string(),
            method: method.to_string(),
            args: marshal::to_wire_all(args)?,
        })?;
        self.decode_result_body(ok)
    }

    /// Starts an asynchronous invocation; finish it with `end`.
    pub fn begin(
        &mut self,
        objref: &ObjectRef,
        method: &str,
        args: &[NativeValue],
    ) -> BridgeResult<PromiseId> {
        let ok = self.call(&Request::Begin {
            objref: objref.clone(),
            method: method.to_string(),
            args: marshal::to_wire_all(args)?,
        })?;
        let body: BeginBody = serde_json::from_value(ok)?;
        Ok(PromiseId(body.promiseid))
    }

    pub fn end(&mut self, promise: &PromiseId) -> BridgeResult<NativeValue> {
        let ok = self.call(&Request::End {
            promiseid: promise.0.clone(),
        })?;
        self.decode_result_body(ok)
    }

    /// Lists callbacks the kernel queued for asynchronous invocations.
    pub fn callbacks(&mut self) -> BridgeResult<Vec<CallbackRequest>> {
        let ok = self.call(&Request::Callbacks)?;
        let body: CallbacksBody = serde_json::from_value(ok)?;
        Ok(body
            .callbacks
            .into_iter()
            .map(CallbackRequest::from_value)
            .collect())
    }

    /// Reports the outcome of a queued callback; returns the acknowledged cbid.
    pub fn complete(
        &mut self,
        cbid: &str,
        err: Option<&str>,
        result: &NativeValue,
    ) -> BridgeResult<String> {
        let result = match err {
            Some(_) => None,
            None => Some(marshal::to_wire(result)?).filter(|value| !value.is_null()),
        };
        let ok = self.call(&Request::Complete {
            cbid: cbid.to_string(),
            err: err.map(str::to_string),
            result,
        })?;
        let body: CompleteBody = serde_json::from_value(ok)?;
        Ok(body.cbid)
    }

    /// Services every queued callback and completes it. Returns how many ran.
    pub fn drain_callbacks(&mut self) -> BridgeResult<usize> {
        let pending = self.callbacks()?;
        let count = pending.len();
        for callback in pending {
            let completion = self.dispatch_callback(callback.raw().clone());
            self.call(&Request::Complete {
                cbid: completion.cbid,
                err: completion.err,
                result: completion.result,
            })?;
        }
        Ok(count)
    }

    /// Per-language naming information of an assembly, as sent by the kernel.
    pub fn naming(&mut self, assembly: &str) -> BridgeResult<Value> {
        let ok = self.call(&Request::Naming {
            assembly: assembly.to_string(),
        })?;
        let body: NamingBody = serde_json::from_value(ok)?;
        Ok(body.naming)
    }

    /// Kernel-side statistics.
    pub fn stats(&mut self) -> BridgeResult<KernelStats> {
        let ok = self.call(&Request::Stats)?;
        Ok(serde_json::from_value(ok)?)
    }

    fn decode_value_body(&mut self, ok: Value) -> BridgeResult<NativeValue> {
        if ok.is_null() {
            return Ok(NativeValue::Null);
        }
        let body: ValueBody = serde_json::from_value(ok)?;
        self.from_wire(&body.value)
    }

    fn decode_result_body(&mut self, ok: Value) -> BridgeResult<NativeValue> {
        if ok.is_null() {
            return Ok(NativeValue::Null);
        }
        let body: ResultBody = serde_json::from_value(ok)?;
        self.from_wire(&body.result)
    }
}

/// Overrides announcing every member of `obj`'s table.
fn overrides_for(obj: &ObjectHandle) -> Vec<Override> {
    let members = obj.members();
    members
        .method_names()
        .into_iter()
        .map(Override::method)
        .chain(members.property_names().into_iter().map(Override::property))
        .collect()
}
