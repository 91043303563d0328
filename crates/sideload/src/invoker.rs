use crate::descriptor::InitialState;
use crate::error::InvokeError;
use crate::host::HostObject;
use crate::introspect::{record_guest_log, HiddenMethodInvoker, HostValue};
use crate::symbols::TypeName;
use crate::trace::{Phase, Trace};

pub const ENTRY_METHOD: &str = "on_create";

/// Lifecycle steps that normally follow the entry method, in call order.
pub const FOLLOW_UP_METHODS: [&str; 2] = ["on_start", "on_resume"];

/// Call `on_create(Bundle)` with a fresh initial state. Any guest failure is
/// contained in the returned error.
pub fn invoke<I>(
    instance: &mut I,
    initial_state: InitialState,
    trace: &mut Trace,
) -> Result<(), InvokeError>
where
    I: HiddenMethodInvoker,
{
    let type_name = instance
        .chain()
        .first()
        .map(|t| t.name.clone())
        .unwrap_or_default();

    let Some(method) = instance.find_hidden_method(ENTRY_METHOD, &[TypeName::Bundle]) else {
        let err = InvokeError::MethodNotFound {
            type_name,
            method: format!("{ENTRY_METHOD}(Bundle)"),
        };
        trace.failed(Phase::Invoke, err.to_string());
        return Err(err);
    };

    tracing::debug!(method = %method.export, "invoking lifecycle entry");
    let state = HostValue::Object(HostObject::State(initial_state));
    let outcome = instance.invoke_hidden(&method, vec![state]);
    record_guest_log(instance, Phase::Invoke, trace);
    match outcome {
        Ok(()) => {
            trace.ok(
                Phase::Invoke,
                format!("{} executed successfully", method.signature()),
            );
            Ok(())
        }
        Err(cause) => {
            let err = InvokeError::InvocationThrew(cause.to_string());
            tracing::warn!(entry = %type_name, error = %err, "lifecycle entry threw");
            trace.failed(Phase::Invoke, err.to_string());
            Err(err)
        }
    }
}

/// Best-effort `on_start()` / `on_resume()`. Undeclared steps are skipped.
/// Returns `false` if any declared step threw.
pub fn invoke_follow_up<I>(instance: &mut I, trace: &mut Trace) -> bool
where
    I: HiddenMethodInvoker,
{
    let mut clean = true;
    for name in FOLLOW_UP_METHODS {
        let Some(method) = instance.find_hidden_method(name, &[]) else {
            tracing::debug!(method = name, "follow-up lifecycle step not declared");
            continue;
        };
        let outcome = instance.invoke_hidden(&method, Vec::new());
        record_guest_log(instance, Phase::FollowUp, trace);
        match outcome {
            Ok(()) => trace.ok(Phase::FollowUp, format!("{}() called", name)),
            Err(err) => {
                clean = false;
                tracing::warn!(method = name, error = %err, "follow-up lifecycle step failed");
                trace.degraded(Phase::FollowUp, format!("{}() failed: {err}", name));
            }
        }
    }
    clean
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::limits::RuntimeLimits;
    use crate::loader::{LoadedInstance, ModuleLoader, ModuleReference};

    fn load(wat_src: &str) -> (TempDir, LoadedInstance) {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("guest.wasm");
        std::fs::write(&path, wat::parse_str(wat_src).expect("valid wat")).expect("write");
        let loaded = ModuleLoader::new(RuntimeLimits::default())
            .expect("loader")
            .load(&ModuleReference::new(&path, "demo.Greeter"), &mut Trace::new())
            .ok()
            .expect("load");
        (dir, loaded)
    }

    #[test]
    fn passes_an_empty_bundle_handle() {
        let (_dir, mut guest) = load(
            r#"(module
                (import "host" "handle_kind" (func $kind (param i32) (result i32)))
                (func (export "demo.Greeter::new()") (result i32) i32.const 64)
                (func (export "demo.Greeter::on_create(Bundle)") (param i32 i32)
                  local.get 1
                  call $kind
                  i32.const 9
                  i32.ne
                  if unreachable end)
            )"#,
        );

        let mut trace = Trace::new();
        invoke(&mut guest, InitialState::empty(), &mut trace).expect("invoke");
        assert_eq!(trace.in_phase(Phase::Invoke).count(), 1);
        assert!(!trace.has_failure());
    }

    #[test]
    fn missing_entry_is_method_not_found() {
        let (_dir, mut guest) = load(
            r#"(module
                (func (export "demo.Greeter::new()") (result i32) i32.const 64)
                (func (export "demo.Greeter::on_create(String)") (param i32 i32))
            )"#,
        );

        let err = invoke(&mut guest, InitialState::empty(), &mut Trace::new())
            .expect_err("must fail");
        assert!(matches!(err, InvokeError::MethodNotFound { .. }));
    }

    #[test]
    fn trapping_entry_is_contained() {
        let (_dir, mut guest) = load(
            r#"(module
                (func (export "demo.Greeter::new()") (result i32) i32.const 64)
                (func (export "demo.Greeter::on_create(Bundle)") (param i32 i32)
                  unreachable)
            )"#,
        );

        let mut trace = Trace::new();
        let err = invoke(&mut guest, InitialState::empty(), &mut trace).expect_err("must fail");
        match err {
            InvokeError::InvocationThrew(cause) => {
                assert!(cause.contains("unreachable"), "unexpected cause: {cause}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(trace.has_failure());
    }

    #[test]
    fn follow_up_skips_undeclared_and_reports_throws() {
        let (_dir, mut guest) = load(
            r#"(module
                (func (export "demo.Greeter::new()") (result i32) i32.const 64)
                (func (export "demo.Greeter::on_start()") (param i32)
                  unreachable)
            )"#,
        );

        let mut trace = Trace::new();
        assert!(!invoke_follow_up(&mut guest, &mut trace));
        assert_eq!(trace.in_phase(Phase::FollowUp).count(), 1);
    }

    #[test]
    fn follow_up_output_precedes_each_step_outcome() {
        let (_dir, mut guest) = load(
            r#"(module
                (import "host" "log" (func $log (param i32 i32)))
                (memory (export "memory") 1)
                (data (i32.const 0) "starting")
                (data (i32.const 16) "resuming")
                (func (export "demo.Greeter::new()") (result i32) i32.const 64)
                (func (export "demo.Greeter::on_start()") (param i32)
                  i32.const 0
                  i32.const 8
                  call $log)
                (func (export "demo.Greeter::on_resume()") (param i32)
                  i32.const 16
                  i32.const 8
                  call $log
                  unreachable)
            )"#,
        );

        let mut trace = Trace::new();
        assert!(!invoke_follow_up(&mut guest, &mut trace));
        let messages: Vec<_> = trace.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], "guest: starting");
        assert_eq!(messages[1], "on_start() called");
        assert_eq!(messages[2], "guest: resuming");
        assert!(messages[3].starts_with("on_resume() failed"));
    }
}
