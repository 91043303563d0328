//! Narrow introspection capabilities over a loaded guest.
//!
//! The attacher and invoker only talk to a guest through these traits; the
//! wasmtime specifics stay in the `LoadedInstance` implementation below.

use wasmtime::{Mutability, Val, ValType};

use crate::error::IntrospectError;
use crate::host::{HostObject, HostState};
use crate::loader::{call_guest, LoadedInstance};
use crate::symbols::{Access, FieldDescriptor, Lowered, MethodDescriptor, TypeDescriptor, TypeName};
use crate::trace::{Phase, Trace};

/// A value on its way into a guest.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    Null,
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Object(HostObject),
}

pub trait TypeChain {
    /// Entry type first, then its bases.
    fn chain(&self) -> &[TypeDescriptor];

    fn find_hidden_method(&self, name: &str, params: &[TypeName]) -> Option<MethodDescriptor> {
        self.chain()
            .iter()
            .find_map(|ty| ty.method(name, params, Access::Hidden))
            .cloned()
    }

    fn find_hidden_field(&self, name: &str) -> Option<FieldDescriptor> {
        self.chain()
            .iter()
            .find_map(|ty| ty.field(name, Access::Hidden))
            .cloned()
    }
}

/// Lines a guest wrote through `host.log` since the last drain.
pub trait GuestLog {
    fn take_guest_log(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// Move pending guest lines into `trace` under `phase`.
pub fn record_guest_log<G: GuestLog + ?Sized>(guest: &mut G, phase: Phase, trace: &mut Trace) {
    for line in guest.take_guest_log() {
        trace.ok(phase, format!("guest: {line}"));
    }
}

pub trait InternalStateWriter: TypeChain + GuestLog {
    fn write_field(&mut self, field: &FieldDescriptor, value: HostValue)
        -> Result<(), IntrospectError>;
}

pub trait HiddenMethodInvoker: TypeChain + GuestLog {
    fn invoke_hidden(
        &mut self,
        method: &MethodDescriptor,
        args: Vec<HostValue>,
    ) -> Result<(), IntrospectError>;
}

impl TypeChain for LoadedInstance {
    fn chain(&self) -> &[TypeDescriptor] {
        LoadedInstance::chain(self)
    }
}

impl GuestLog for LoadedInstance {
    fn take_guest_log(&mut self) -> Vec<String> {
        self.store.data_mut().take_guest_log()
    }
}

impl InternalStateWriter for LoadedInstance {
    fn write_field(
        &mut self,
        field: &FieldDescriptor,
        value: HostValue,
    ) -> Result<(), IntrospectError> {
        let global = self
            .instance
            .get_global(&mut self.store, &field.export)
            .ok_or_else(|| IntrospectError::MissingMember {
                member: field.export.clone(),
            })?;

        let ty = global.ty(&self.store);
        if ty.mutability() != Mutability::Var {
            return Err(IntrospectError::AccessDenied {
                member: field.export.clone(),
                detail: "field is immutable".to_string(),
            });
        }
        if !lowered_matches(field.ty.lowered(), ty.content()) {
            return Err(IntrospectError::TypeMismatch {
                member: field.export.clone(),
                detail: format!("declared {} but global is {}", field.ty, ty.content()),
            });
        }

        let val = lower(self.store.data_mut(), &field.export, &field.ty, value)?;
        global
            .set(&mut self.store, val)
            .map_err(|e| IntrospectError::TypeMismatch {
                member: field.export.clone(),
                detail: e.to_string(),
            })?;
        tracing::debug!(field = %field.export, "wrote hidden field");
        Ok(())
    }
}

impl HiddenMethodInvoker for LoadedInstance {
    fn invoke_hidden(
        &mut self,
        method: &MethodDescriptor,
        args: Vec<HostValue>,
    ) -> Result<(), IntrospectError> {
        let func = self
            .instance
            .get_func(&mut self.store, &method.export)
            .ok_or_else(|| IntrospectError::MissingMember {
                member: method.export.clone(),
            })?;

        if args.len() != method.params.len() {
            return Err(IntrospectError::TypeMismatch {
                member: method.export.clone(),
                detail: format!(
                    "expected {} arguments, got {}",
                    method.params.len(),
                    args.len()
                ),
            });
        }

        let wasm_params: Vec<ValType> = func.ty(&self.store).params().collect();
        if wasm_params.len() != method.params.len() + 1 {
            return Err(IntrospectError::TypeMismatch {
                member: method.export.clone(),
                detail: format!(
                    "wasm signature takes {} values, declared {} plus receiver",
                    wasm_params.len(),
                    method.params.len()
                ),
            });
        }
        if !lowered_matches(Lowered::I32, &wasm_params[0]) {
            return Err(IntrospectError::TypeMismatch {
                member: method.export.clone(),
                detail: "receiver must be i32".to_string(),
            });
        }

        let mut vals = Vec::with_capacity(wasm_params.len());
        vals.push(Val::I32(self.receiver()));
        for ((declared, value), wasm_ty) in method
            .params
            .iter()
            .zip(args)
            .zip(wasm_params.iter().skip(1))
        {
            if !lowered_matches(declared.lowered(), wasm_ty) {
                return Err(IntrospectError::TypeMismatch {
                    member: method.export.clone(),
                    detail: format!("declared {declared} but wasm parameter is {wasm_ty}"),
                });
            }
            vals.push(lower(self.store.data_mut(), &method.export, declared, value)?);
        }

        call_guest(&mut self.store, &self.limits, func, &vals, &method.export)?;
        tracing::debug!(method = %method.export, "invoked hidden method");
        Ok(())
    }
}

impl LoadedInstance {
    /// The host object a handle-typed field currently points at.
    pub fn field_object(&mut self, name: &str) -> Option<HostObject> {
        let field = self.find_hidden_field(name)?;
        let global = self.instance.get_global(&mut self.store, &field.export)?;
        let handle = global.get(&mut self.store).i32()?;
        self.store.data().object(handle).cloned()
    }
}

fn lowered_matches(lowered: Lowered, ty: &ValType) -> bool {
    match lowered {
        Lowered::I32 => matches!(ty, ValType::I32),
        Lowered::I64 => matches!(ty, ValType::I64),
        Lowered::F32 => matches!(ty, ValType::F32),
        Lowered::F64 => matches!(ty, ValType::F64),
    }
}

fn lower(
    state: &mut HostState,
    member: &str,
    declared: &TypeName,
    value: HostValue,
) -> Result<Val, IntrospectError> {
    let mismatch = |detail: String| IntrospectError::TypeMismatch {
        member: member.to_string(),
        detail,
    };
    match value {
        HostValue::Null if declared.is_primitive() => {
            Err(mismatch(format!("null passed for primitive {declared}")))
        }
        HostValue::Null => Ok(Val::I32(0)),
        HostValue::I32(v) if matches!(declared, TypeName::I32 | TypeName::Bool) => Ok(Val::I32(v)),
        HostValue::I64(v) if *declared == TypeName::I64 => Ok(Val::I64(v)),
        HostValue::F32(v) if *declared == TypeName::F32 => Ok(Val::F32(v.to_bits())),
        HostValue::F64(v) if *declared == TypeName::F64 => Ok(Val::F64(v.to_bits())),
        HostValue::Object(object) if declared.accepts(&object.type_name()) => {
            Ok(Val::I32(state.bind(object)))
        }
        HostValue::Object(object) => Err(mismatch(format!(
            "{} is not assignable to {declared}",
            object.type_name()
        ))),
        other => Err(mismatch(format!("{other:?} is not assignable to {declared}"))),
    }
}
