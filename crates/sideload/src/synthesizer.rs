//! Type-directed argument synthesis for the full-attachment call.
//!
//! The tables here encode what each platform level is known to expect from
//! `attach`. They are exact-match and version-coupled: when a
//! platform changes the signature the produced arguments are simply wrong,
//! and the caller records the resulting failure as a degradation.

use crate::descriptor::{RequestPlaceholder, SyntheticDescriptor};
use crate::environment::{HostEnvironment, PlatformVersion};
use crate::host::HostObject;
use crate::introspect::HostValue;
use crate::symbols::TypeName;

/// Something the synthesizer knows how to point at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnownRef {
    Context,
    Application,
    Resources,
    Configuration,
    Instrumentation,
    Descriptor,
    DescriptorName,
    Request,
}

/// Symbolic argument. Resolved against [`Knowns`] only when lowered.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Known(KnownRef),
}

pub struct Knowns<'a> {
    pub env: &'a HostEnvironment,
    pub descriptor: &'a SyntheticDescriptor,
    pub request: &'a RequestPlaceholder,
}

impl Knowns<'_> {
    pub fn object(&self, known: KnownRef) -> Option<HostObject> {
        let object = match known {
            KnownRef::Context => HostObject::Context(self.env.context.clone()),
            KnownRef::Application => {
                HostObject::Application(self.env.application_scope().clone())
            }
            KnownRef::Resources => HostObject::Resources(self.env.resources.clone()),
            KnownRef::Configuration => HostObject::Configuration(self.env.configuration().clone()),
            KnownRef::Instrumentation => {
                HostObject::Instrumentation(self.env.instrumentation.clone()?)
            }
            KnownRef::Descriptor => HostObject::Descriptor(self.descriptor.clone()),
            KnownRef::DescriptorName => HostObject::Text(self.descriptor.name.clone()),
            KnownRef::Request => HostObject::Request(self.request.clone()),
        };
        Some(object)
    }

    pub fn resolve(&self, value: &Value) -> HostValue {
        match value {
            Value::Null => HostValue::Null,
            Value::I32(v) => HostValue::I32(*v),
            Value::I64(v) => HostValue::I64(*v),
            Value::F32(v) => HostValue::F32(*v),
            Value::F64(v) => HostValue::F64(*v),
            Value::Known(known) => self
                .object(*known)
                .map(HostValue::Object)
                .unwrap_or(HostValue::Null),
        }
    }
}

/// One platform level's priority table.
pub trait ParameterStrategy: Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, platform: PlatformVersion) -> bool;

    fn value_for(&self, ty: &TypeName, knowns: &Knowns<'_>) -> Value;
}

/// Platforms before 15: configuration and titles are not passed.
pub struct BaselineTable;

/// Platform 15 and later.
pub struct ConfiguredTable;

const CONFIGURED_SINCE: PlatformVersion = PlatformVersion(15);

impl ParameterStrategy for BaselineTable {
    fn name(&self) -> &'static str {
        "baseline"
    }

    fn supports(&self, platform: PlatformVersion) -> bool {
        platform < CONFIGURED_SINCE
    }

    fn value_for(&self, ty: &TypeName, knowns: &Knowns<'_>) -> Value {
        shared_value(ty, knowns)
    }
}

impl ParameterStrategy for ConfiguredTable {
    fn name(&self) -> &'static str {
        "configured"
    }

    fn supports(&self, platform: PlatformVersion) -> bool {
        platform >= CONFIGURED_SINCE
    }

    fn value_for(&self, ty: &TypeName, knowns: &Knowns<'_>) -> Value {
        match ty {
            TypeName::Configuration => Value::Known(KnownRef::Configuration),
            TypeName::CharSequence => Value::Known(KnownRef::DescriptorName),
            other => shared_value(other, knowns),
        }
    }
}

fn shared_value(ty: &TypeName, knowns: &Knowns<'_>) -> Value {
    match ty {
        TypeName::Context => Value::Known(KnownRef::Context),
        TypeName::Application => Value::Known(KnownRef::Application),
        TypeName::Resources => Value::Known(KnownRef::Resources),
        TypeName::Instrumentation if knowns.env.instrumentation.is_some() => {
            Value::Known(KnownRef::Instrumentation)
        }
        TypeName::ComponentInfo => Value::Known(KnownRef::Descriptor),
        TypeName::Intent => Value::Known(KnownRef::Request),
        TypeName::I32 | TypeName::Bool => Value::I32(0),
        TypeName::I64 => Value::I64(0),
        TypeName::F32 => Value::F32(0.0),
        TypeName::F64 => Value::F64(0.0),
        // Runtime thread, binder tokens, parent component, strings and
        // anything unrecognised.
        _ => Value::Null,
    }
}

static STRATEGIES: [&dyn ParameterStrategy; 2] = [&ConfiguredTable, &BaselineTable];

pub fn strategy_for(platform: PlatformVersion) -> &'static dyn ParameterStrategy {
    STRATEGIES
        .iter()
        .copied()
        .find(|s| s.supports(platform))
        .unwrap_or(&BaselineTable)
}

/// One value per parameter, in order. Never fails.
pub fn synthesize(
    strategy: &dyn ParameterStrategy,
    params: &[TypeName],
    knowns: &Knowns<'_>,
) -> Vec<Value> {
    params
        .iter()
        .map(|ty| strategy.value_for(ty, knowns))
        .collect()
}
