//! Tiered capability attachment.
//!
//! Tier 1 stores the host's application scope on the guest through its
//! hidden base-context setter or field. Nothing downstream works without it,
//! so its failure is the only failure `attach` reports.
//!
//! Tier 2 replays the guest runtime's own `attach` on the base lifecycle type
//! with synthesized arguments. Its signature moves between platform levels;
//! whatever happens there is recorded and otherwise ignored.

use serde::Serialize;

use crate::descriptor::{RequestPlaceholder, SyntheticDescriptor};
use crate::environment::HostEnvironment;
use crate::error::IntrospectError;
use crate::host::HostObject;
use crate::introspect::{record_guest_log, HiddenMethodInvoker, HostValue, InternalStateWriter};
use crate::symbols::{Access, FieldDescriptor, MethodDescriptor, TypeName};
use crate::synthesizer::{strategy_for, synthesize, Knowns};
use crate::trace::{Phase, Trace};

/// Base lifecycle type every entry type is expected to derive from.
pub const LIFECYCLE_BASE: &str = "app.Component";
pub const BASE_CONTEXT_SETTER: &str = "attach_base_context";
pub const BASE_CONTEXT_FIELD: &str = "base";
pub const FULL_ATTACH_METHOD: &str = "attach";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentTier {
    None,
    BaseOnly,
    FullAttach,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AttachmentResult {
    pub tier: AttachmentTier,
    pub succeeded: bool,
}

impl AttachmentResult {
    const FAILED: Self = Self {
        tier: AttachmentTier::None,
        succeeded: false,
    };
}

enum BaseTarget {
    Setter(MethodDescriptor),
    Field(FieldDescriptor),
}

enum FullOutcome {
    Completed { method: String, strategy: &'static str },
    Absent(String),
    Failed(IntrospectError),
}

/// Never fails outright; a failed Tier 1 comes back as
/// `{ tier: None, succeeded: false }`.
pub fn attach<I>(instance: &mut I, env: &HostEnvironment, trace: &mut Trace) -> AttachmentResult
where
    I: InternalStateWriter + HiddenMethodInvoker,
{
    let type_name = instance
        .chain()
        .first()
        .map(|t| t.name.clone())
        .unwrap_or_default();

    let base = attach_base(instance, env);
    record_guest_log(instance, Phase::BaseAttach, trace);
    match base {
        Ok(via) => {
            tracing::info!(entry = %type_name, %via, "base context attached");
            trace.ok(Phase::BaseAttach, format!("Base context attached via {via}"));
        }
        Err(err) => {
            tracing::warn!(entry = %type_name, error = %err, "base attachment failed");
            trace.failed(
                Phase::BaseAttach,
                format!("Failed to initialize {type_name}: {err}"),
            );
            return AttachmentResult::FAILED;
        }
    }

    let full = attach_full(instance, env, &type_name);
    record_guest_log(instance, Phase::FullAttach, trace);
    let tier = match full {
        FullOutcome::Completed { method, strategy } => {
            tracing::info!(entry = %type_name, %method, strategy, "full attachment completed");
            trace.ok(
                Phase::FullAttach,
                format!("{method} called ({strategy} parameter table)"),
            );
            AttachmentTier::FullAttach
        }
        FullOutcome::Absent(reason) => {
            tracing::debug!(entry = %type_name, %reason, "full attachment skipped");
            trace.degraded(
                Phase::FullAttach,
                format!("{reason}; basic initialization complete"),
            );
            AttachmentTier::BaseOnly
        }
        FullOutcome::Failed(err) => {
            tracing::warn!(entry = %type_name, error = %err, "full attachment degraded");
            trace.degraded(
                Phase::FullAttach,
                format!("attach() failed, using simplified initialization: {err}"),
            );
            AttachmentTier::BaseOnly
        }
    };

    AttachmentResult {
        tier,
        succeeded: true,
    }
}

fn attach_base<I>(instance: &mut I, env: &HostEnvironment) -> Result<String, IntrospectError>
where
    I: InternalStateWriter + HiddenMethodInvoker,
{
    let scope = HostValue::Object(HostObject::Application(env.application_scope().clone()));
    match find_base_target(instance)? {
        BaseTarget::Setter(method) => {
            instance.invoke_hidden(&method, vec![scope])?;
            Ok(method.export)
        }
        BaseTarget::Field(field) => {
            instance.write_field(&field, scope)?;
            Ok(field.export)
        }
    }
}

/// Setter before field, nearest type first.
fn find_base_target<I>(instance: &I) -> Result<BaseTarget, IntrospectError>
where
    I: InternalStateWriter + HiddenMethodInvoker,
{
    let setters: Vec<&MethodDescriptor> = instance
        .chain()
        .iter()
        .flat_map(|ty| ty.methods_named(BASE_CONTEXT_SETTER, Access::Hidden))
        .collect();
    if let Some(first) = setters.first() {
        return setters
            .iter()
            .find(|m| m.params.len() == 1 && m.params[0].accepts(&TypeName::Application))
            .map(|m| BaseTarget::Setter((*m).clone()))
            .ok_or_else(|| IntrospectError::TypeMismatch {
                member: first.export.clone(),
                detail: "setter must take a single Context".to_string(),
            });
    }

    if let Some(field) = instance.find_hidden_field(BASE_CONTEXT_FIELD) {
        if !field.ty.accepts(&TypeName::Application) {
            return Err(IntrospectError::TypeMismatch {
                member: field.export.clone(),
                detail: format!("field holds {} not Context", field.ty),
            });
        }
        return Ok(BaseTarget::Field(field));
    }

    Err(IntrospectError::MissingMember {
        member: format!("{BASE_CONTEXT_SETTER}(Context) or {BASE_CONTEXT_FIELD}:Context"),
    })
}

fn attach_full<I>(instance: &mut I, env: &HostEnvironment, type_name: &str) -> FullOutcome
where
    I: InternalStateWriter + HiddenMethodInvoker,
{
    let Some(base) = instance.chain().iter().find(|t| t.name == LIFECYCLE_BASE) else {
        return FullOutcome::Absent(format!("{type_name} does not derive from {LIFECYCLE_BASE}"));
    };
    let Some(method) = base
        .methods_named(FULL_ATTACH_METHOD, Access::Hidden)
        .next()
        .cloned()
    else {
        return FullOutcome::Absent(format!(
            "no {FULL_ATTACH_METHOD}() declared on {LIFECYCLE_BASE}"
        ));
    };

    let descriptor = SyntheticDescriptor::for_component(env, type_name);
    let request = RequestPlaceholder::addressed_to(&descriptor);
    let knowns = Knowns {
        env,
        descriptor: &descriptor,
        request: &request,
    };
    let strategy = strategy_for(env.platform);
    let args = synthesize(strategy, &method.params, &knowns)
        .iter()
        .map(|v| knowns.resolve(v))
        .collect();

    tracing::debug!(method = %method.signature(), strategy = strategy.name(), "invoking full attachment");
    match instance.invoke_hidden(&method, args) {
        Ok(()) => FullOutcome::Completed {
            method: method.signature(),
            strategy: strategy.name(),
        },
        Err(err) => FullOutcome::Failed(err),
    }
}
