#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

//! # Sideload - Out-of-band module bootstrapper
//!
//! Loads a WebAssembly component the host never installed, wires it into the
//! host's runtime context and fires its lifecycle entry method:
//! - `ModuleLoader`: compiles a module, resolves the entry type from its
//!   export-name symbol table and calls its constructor
//! - `attacher::attach`: tiered capability attachment (base context, then a
//!   best-effort full attach with synthesized arguments)
//! - `invoker::invoke`: calls `on_create(Bundle)` with an empty initial state
//! - `Bootstrapper`: sequences the three and produces a `Trace` and a `Verdict`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sideload::{BootstrapOptions, Bootstrapper, HostEnvironment, ModuleReference, RuntimeLimits};
//!
//! let bootstrapper = Bootstrapper::new(RuntimeLimits::default(), BootstrapOptions::default())?;
//! let report = bootstrapper.run(
//!     &ModuleReference::new("greeter.wasm", "demo.Greeter"),
//!     &HostEnvironment::default(),
//! );
//! print!("{}", report.trace.render());
//! println!("{}", report.verdict.indicator());
//! # Ok::<(), sideload::Error>(())
//! ```

pub mod attacher;
pub mod bootstrap;
pub mod descriptor;
pub mod environment;
pub mod error;
pub mod host;
pub mod introspect;
pub mod invoker;
pub mod limits;
pub mod loader;
pub mod profile;
pub mod storage_report;
pub mod symbols;
pub mod synthesizer;
pub mod trace;

pub use attacher::{attach, AttachmentResult, AttachmentTier};
pub use bootstrap::{BootstrapOptions, Bootstrapper, CycleReport, Verdict};
pub use descriptor::{InitialState, RequestPlaceholder, SyntheticDescriptor};
pub use environment::{
    ApplicationScope, Configuration, HostContext, HostEnvironment, Instrumentation,
    PlatformVersion, Resources, StorageLocations,
};
pub use error::{Error, IntrospectError, InvokeError, LoadError, Result};
pub use host::{HostObject, HostScope, HostState};
pub use introspect::{
    record_guest_log, GuestLog, HiddenMethodInvoker, HostValue, InternalStateWriter, TypeChain,
};
pub use invoker::{invoke, invoke_follow_up};
pub use limits::RuntimeLimits;
pub use loader::{LoadedInstance, ModuleLoader, ModuleReference};
pub use profile::{parse_host_profile_toml, HostProfile};
pub use symbols::{
    parse_export_name, FieldDescriptor, MethodDescriptor, SymbolTable, TypeDescriptor, TypeName,
    Visibility,
};
pub use synthesizer::{strategy_for, synthesize, Knowns, ParameterStrategy, Value};
pub use trace::{Phase, Status, Trace, TraceEntry};
