//! Host side of a guest store: the object handle table and the `host` import
//! namespace guests may link against.

use wasmtime::{Caller, Config, Engine, Linker, StoreLimits, StoreLimitsBuilder};

use crate::descriptor::{InitialState, RequestPlaceholder, SyntheticDescriptor};
use crate::environment::{
    ApplicationScope, Configuration, HostContext, Instrumentation, Resources,
};
use crate::error::{Error, Result};
use crate::limits::RuntimeLimits;
use crate::symbols::TypeName;

pub const HOST_MODULE: &str = "host";

/// Guest log lines longer than this are truncated.
const MAX_LOG_LINE: usize = 4096;

/// A host value a guest can hold by handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostObject {
    Context(HostContext),
    Application(ApplicationScope),
    Resources(Resources),
    Configuration(Configuration),
    Instrumentation(Instrumentation),
    Descriptor(SyntheticDescriptor),
    Request(RequestPlaceholder),
    Text(String),
    State(InitialState),
}

impl HostObject {
    pub fn type_name(&self) -> TypeName {
        match self {
            HostObject::Context(_) => TypeName::Context,
            HostObject::Application(_) => TypeName::Application,
            HostObject::Resources(_) => TypeName::Resources,
            HostObject::Configuration(_) => TypeName::Configuration,
            HostObject::Instrumentation(_) => TypeName::Instrumentation,
            HostObject::Descriptor(_) => TypeName::ComponentInfo,
            HostObject::Request(_) => TypeName::Intent,
            HostObject::Text(_) => TypeName::CharSequence,
            HostObject::State(_) => TypeName::Bundle,
        }
    }

    /// Stable tag reported by `host.handle_kind`; `0` is reserved for null.
    pub fn kind_tag(&self) -> i32 {
        match self {
            HostObject::Context(_) => 1,
            HostObject::Application(_) => 2,
            HostObject::Resources(_) => 3,
            HostObject::Configuration(_) => 4,
            HostObject::Instrumentation(_) => 5,
            HostObject::Descriptor(_) => 6,
            HostObject::Request(_) => 7,
            HostObject::Text(_) => 8,
            HostObject::State(_) => 9,
        }
    }
}

/// Store data for one cycle. Dropped together with the guest instance.
#[derive(Clone, Debug)]
pub struct HostState {
    objects: Vec<HostObject>,
    guest_log: Vec<String>,
    host_fault: Option<String>,
    store_limits: StoreLimits,
}

impl HostState {
    pub fn new(limits: &RuntimeLimits) -> Self {
        let store_limits = StoreLimitsBuilder::new()
            .memory_size(limits.max_memory_bytes())
            .build();
        Self {
            objects: Vec::new(),
            guest_log: Vec::new(),
            host_fault: None,
            store_limits,
        }
    }

    /// Handles start at 1 so that 0 stays null on the guest side.
    pub fn bind(&mut self, object: HostObject) -> i32 {
        self.objects.push(object);
        i32::try_from(self.objects.len()).unwrap_or(i32::MAX)
    }

    pub fn object(&self, handle: i32) -> Option<&HostObject> {
        let index = usize::try_from(handle).ok()?.checked_sub(1)?;
        self.objects.get(index)
    }

    pub fn store_limits(&mut self) -> &mut StoreLimits {
        &mut self.store_limits
    }

    pub fn take_guest_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.guest_log)
    }

    pub fn take_host_fault(&mut self) -> Option<String> {
        self.host_fault.take()
    }
}

/// The host's own code-resolution scope. Guests may import from it; it never
/// sees anything a guest defines.
pub struct HostScope {
    engine: Engine,
    linker: Linker<HostState>,
}

impl HostScope {
    pub fn new() -> Result<Self> {
        let mut config = Config::new();
        config.consume_fuel(true);
        let engine = Engine::new(&config)
            .map_err(|e| Error::ConfigError(format!("failed to initialize wasm engine: {e}")))?;
        let linker = host_linker(&engine)?;
        Ok(Self { engine, linker })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn linker(&self) -> &Linker<HostState> {
        &self.linker
    }
}

fn host_linker(engine: &Engine) -> Result<Linker<HostState>> {
    let mut linker = Linker::new(engine);
    linker
        .func_wrap(
            HOST_MODULE,
            "log",
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| {
                let Some(memory) = caller.get_export("memory").and_then(|e| e.into_memory()) else {
                    caller.data_mut().host_fault =
                        Some("wasm module did not export memory".to_string());
                    return;
                };

                if ptr < 0 || len < 0 {
                    caller.data_mut().host_fault =
                        Some("guest passed negative log pointer/length".to_string());
                    return;
                }

                let start = ptr as usize;
                let len = (len as usize).min(MAX_LOG_LINE);
                let Some(end) = start.checked_add(len) else {
                    caller.data_mut().host_fault = Some("guest log pointer overflow".to_string());
                    return;
                };

                let data = memory.data(&caller);
                if end > data.len() {
                    caller.data_mut().host_fault = Some(format!(
                        "guest log range [{start}, {end}) exceeds memory size {}",
                        data.len()
                    ));
                    return;
                }

                let line = String::from_utf8_lossy(&data[start..end]).into_owned();
                tracing::info!(target: "sideload::guest", "{line}");
                caller.data_mut().guest_log.push(line);
            },
        )
        .map_err(|e| Error::ConfigError(format!("failed to bind log hostcall: {e}")))?;

    linker
        .func_wrap(
            HOST_MODULE,
            "handle_kind",
            |caller: Caller<'_, HostState>, handle: i32| -> i32 {
                caller
                    .data()
                    .object(handle)
                    .map(HostObject::kind_tag)
                    .unwrap_or(0)
            },
        )
        .map_err(|e| Error::ConfigError(format!("failed to bind handle_kind hostcall: {e}")))?;

    Ok(linker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_one_based_and_zero_is_null() {
        let mut state = HostState::new(&RuntimeLimits::default());
        let handle = state.bind(HostObject::Text("demo".to_string()));

        assert_eq!(handle, 1);
        assert_eq!(state.object(0), None);
        assert_eq!(state.object(-3), None);
        assert_eq!(
            state.object(handle).map(HostObject::type_name),
            Some(TypeName::CharSequence)
        );
    }

    #[test]
    fn host_scope_builds() {
        let scope = HostScope::new().expect("host scope");
        let mut store = wasmtime::Store::new(
            scope.engine(),
            HostState::new(&RuntimeLimits::default()),
        );
        assert!(scope.linker().get(&mut store, HOST_MODULE, "log").is_some());
        assert!(scope
            .linker()
            .get(&mut store, HOST_MODULE, "handle_kind")
            .is_some());
        assert!(scope.linker().get(&mut store, HOST_MODULE, "exit").is_none());
    }
}
