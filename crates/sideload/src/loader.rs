//! Module loading: file path + qualified type name to a constructed instance.

use std::path::{Path, PathBuf};

use wasmtime::{ExternType, Func, Instance, Module, Store, Trap, Val, ValType};

use crate::error::{IntrospectError, LoadError, Result};
use crate::host::{HostScope, HostState};
use crate::introspect::record_guest_log;
use crate::limits::RuntimeLimits;
use crate::symbols::{Access, SymbolTable, TypeDescriptor};
use crate::trace::{Phase, Trace};

pub const CONSTRUCTOR: &str = "new";

/// What to load. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleReference {
    path: PathBuf,
    type_name: String,
}

impl ModuleReference {
    pub fn new(path: impl Into<PathBuf>, type_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            type_name: type_name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// A constructed guest object together with its resolved type chain.
///
/// Owns the store, so every host object bound for the guest lives exactly as
/// long as this value.
pub struct LoadedInstance {
    pub(crate) store: Store<HostState>,
    pub(crate) instance: Instance,
    pub(crate) limits: RuntimeLimits,
    receiver: i32,
    chain: Vec<TypeDescriptor>,
}

impl LoadedInstance {
    pub fn type_name(&self) -> &str {
        self.chain.first().map(|t| t.name.as_str()).unwrap_or("")
    }

    /// Entry type first, then its bases.
    pub fn chain(&self) -> &[TypeDescriptor] {
        &self.chain
    }

    pub fn receiver(&self) -> i32 {
        self.receiver
    }
}

pub struct ModuleLoader {
    scope: HostScope,
    limits: RuntimeLimits,
}

impl ModuleLoader {
    pub fn new(limits: RuntimeLimits) -> Result<Self> {
        limits.validate()?;
        Ok(Self {
            scope: HostScope::new()?,
            limits,
        })
    }

    pub fn limits(&self) -> &RuntimeLimits {
        &self.limits
    }

    /// Parse the module's symbol table without instantiating anything.
    pub fn inspect(&self, path: &Path) -> std::result::Result<SymbolTable, LoadError> {
        let module = self.compile(path)?;
        Ok(SymbolTable::from_module(&module))
    }

    /// Load `module_ref` against the host scope and record a single trace
    /// entry for the outcome, preceded by any lines the constructor logged.
    pub fn load(
        &self,
        module_ref: &ModuleReference,
        trace: &mut Trace,
    ) -> std::result::Result<LoadedInstance, LoadError> {
        match self.load_inner(module_ref) {
            Ok(mut loaded) => {
                record_guest_log(&mut loaded, Phase::Load, trace);
                trace.ok(
                    Phase::Load,
                    format!(
                        "Class loaded: {} from {} (chain: {}); instance created",
                        loaded.type_name(),
                        module_ref.path().display(),
                        loaded
                            .chain()
                            .iter()
                            .map(|t| t.name.as_str())
                            .collect::<Vec<_>>()
                            .join(" -> ")
                    ),
                );
                Ok(loaded)
            }
            Err(err) => {
                tracing::warn!(path = %module_ref.path().display(), error = %err, "module load failed");
                trace.failed(Phase::Load, err.to_string());
                Err(err)
            }
        }
    }

    fn load_inner(
        &self,
        module_ref: &ModuleReference,
    ) -> std::result::Result<LoadedInstance, LoadError> {
        let type_name = module_ref.type_name();
        let module = self.compile(module_ref.path())?;

        let symbols = SymbolTable::from_module(&module);
        let chain = symbols.chain(type_name);
        let Some(entry) = chain.first() else {
            return Err(LoadError::SymbolNotFound {
                path: module_ref.path().to_path_buf(),
                type_name: type_name.to_string(),
            });
        };
        tracing::debug!(
            entry = %type_name,
            depth = chain.len(),
            "resolved entry type"
        );

        let constructor = entry
            .method(CONSTRUCTOR, &[], Access::Hidden)
            .cloned()
            .ok_or_else(|| instantiation_failed(type_name, "no zero-argument constructor new()"))?;

        enforce_memory_limit(&module, &self.limits, type_name)?;

        let mut store = Store::new(self.scope.engine(), HostState::new(&self.limits));
        store.limiter(|state| state.store_limits());
        store
            .set_fuel(self.limits.fuel_per_call())
            .map_err(|e| instantiation_failed(type_name, format!("failed to set fuel: {e}")))?;

        let instance = self
            .scope
            .linker()
            .instantiate(&mut store, &module)
            .map_err(|e| instantiation_failed(type_name, format!("link failed: {e}")))?;

        let func = instance
            .get_func(&mut store, &constructor.export)
            .ok_or_else(|| instantiation_failed(type_name, "constructor export vanished"))?;
        let ty = func.ty(&store);
        let returns_handle =
            ty.params().len() == 0 && ty.results().len() == 1 && ty.results().all(|r| matches!(r, ValType::I32));
        if !returns_handle {
            return Err(instantiation_failed(
                type_name,
                "constructor must have wasm signature () -> i32",
            ));
        }

        let results = call_guest(&mut store, &self.limits, func, &[], &constructor.export)
            .map_err(|e| instantiation_failed(type_name, e.to_string()))?;
        let receiver = results.first().and_then(Val::i32).unwrap_or(0);
        if receiver == 0 {
            return Err(instantiation_failed(type_name, "constructor returned null"));
        }

        tracing::info!(entry = %type_name, receiver, "guest instance created");
        Ok(LoadedInstance {
            store,
            instance,
            limits: self.limits.clone(),
            receiver,
            chain,
        })
    }

    fn compile(&self, path: &Path) -> std::result::Result<Module, LoadError> {
        let bytes = std::fs::read(path).map_err(|e| LoadError::NotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Module::from_binary(self.scope.engine(), &bytes).map_err(|e| LoadError::BadFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

fn instantiation_failed(type_name: &str, reason: impl Into<String>) -> LoadError {
    LoadError::InstantiationFailed {
        type_name: type_name.to_string(),
        reason: reason.into(),
    }
}

fn enforce_memory_limit(
    module: &Module,
    limits: &RuntimeLimits,
    type_name: &str,
) -> std::result::Result<(), LoadError> {
    let max_bytes = limits.max_memory_bytes_u64();
    for export in module.exports() {
        if let ExternType::Memory(memory) = export.ty() {
            let page_size = memory.page_size();
            let declared_min_bytes = memory.minimum().saturating_mul(page_size);
            if declared_min_bytes > max_bytes {
                return Err(instantiation_failed(
                    type_name,
                    format!(
                        "module declares {} bytes of minimum linear memory, exceeding max_memory_mb={}",
                        declared_min_bytes, limits.max_memory_mb
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Run one guest function with a fresh fuel budget. Traps, fuel exhaustion
/// and host-call faults all come back as [`IntrospectError::Trapped`].
pub(crate) fn call_guest(
    store: &mut Store<HostState>,
    limits: &RuntimeLimits,
    func: Func,
    args: &[Val],
    member: &str,
) -> std::result::Result<Vec<Val>, IntrospectError> {
    store
        .set_fuel(limits.fuel_per_call())
        .map_err(|e| IntrospectError::Trapped {
            member: member.to_string(),
            detail: format!("failed to set fuel: {e}"),
        })?;

    let mut results: Vec<Val> = func.ty(&*store).results().map(|_| Val::I32(0)).collect();
    let outcome = func.call(&mut *store, args, &mut results);

    if let Some(fault) = store.data_mut().take_host_fault() {
        return Err(IntrospectError::Trapped {
            member: member.to_string(),
            detail: format!("hostcall processing failed: {fault}"),
        });
    }

    outcome.map_err(|e| IntrospectError::Trapped {
        member: member.to_string(),
        detail: describe_trap(&e),
    })?;
    Ok(results)
}

fn describe_trap(err: &wasmtime::Error) -> String {
    match err.downcast_ref::<Trap>() {
        Some(Trap::OutOfFuel) => "exceeded CPU budget".to_string(),
        Some(trap) => trap.to_string(),
        None => err.to_string(),
    }
}
