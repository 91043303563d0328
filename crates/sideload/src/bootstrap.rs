//! One load-attach-invoke cycle and its verdict.

use serde::Serialize;

use crate::attacher::{self, AttachmentResult};
use crate::descriptor::InitialState;
use crate::environment::HostEnvironment;
use crate::error::Result;
use crate::invoker;
use crate::limits::RuntimeLimits;
use crate::loader::{ModuleLoader, ModuleReference};
use crate::storage_report;
use crate::trace::Trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    PartialSuccess,
    Failure,
}

impl Verdict {
    /// One-line indicator for the host UI.
    pub fn indicator(&self) -> &'static str {
        match self {
            Verdict::Success => "Module started successfully",
            Verdict::PartialSuccess => "Module started with lifecycle warnings",
            Verdict::Failure => "Module failed to start",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Verdict::Failure)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BootstrapOptions {
    /// Call `on_start()` / `on_resume()` after the entry method.
    pub follow_up_lifecycle: bool,
    /// List the host storage locations after a successful invocation.
    pub storage_report: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            follow_up_lifecycle: false,
            storage_report: true,
        }
    }
}

/// Everything surfaced to the caller once a cycle ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub verdict: Verdict,
    pub trace: Trace,
    /// `None` when the cycle stopped at load.
    pub attachment: Option<AttachmentResult>,
}

pub struct Bootstrapper {
    loader: ModuleLoader,
    options: BootstrapOptions,
}

impl Bootstrapper {
    pub fn new(limits: RuntimeLimits, options: BootstrapOptions) -> Result<Self> {
        Ok(Self {
            loader: ModuleLoader::new(limits)?,
            options,
        })
    }

    /// Runs to completion on the calling thread. The environment is only
    /// borrowed; the loaded instance is dropped before returning.
    pub fn run(&self, module_ref: &ModuleReference, env: &HostEnvironment) -> CycleReport {
        let mut trace = Trace::new();
        tracing::info!(
            path = %module_ref.path().display(),
            entry = module_ref.type_name(),
            platform = %env.platform,
            "starting cycle"
        );

        let mut instance = match self.loader.load(module_ref, &mut trace) {
            Ok(instance) => instance,
            Err(err) => {
                tracing::warn!(error = %err, "cycle stopped at load");
                return finish(Verdict::Failure, trace, None);
            }
        };

        let attachment = attacher::attach(&mut instance, env, &mut trace);
        if !attachment.succeeded {
            return finish(Verdict::Failure, trace, Some(attachment));
        }

        let invoked = invoker::invoke(&mut instance, InitialState::empty(), &mut trace);
        if let Err(err) = invoked {
            tracing::warn!(error = %err, "cycle stopped at invoke");
            return finish(Verdict::Failure, trace, Some(attachment));
        }

        let mut verdict = Verdict::Success;
        if self.options.follow_up_lifecycle && !invoker::invoke_follow_up(&mut instance, &mut trace)
        {
            verdict = Verdict::PartialSuccess;
        }

        if self.options.storage_report {
            storage_report::report(&env.storage, &mut trace);
        }

        finish(verdict, trace, Some(attachment))
    }
}

fn finish(verdict: Verdict, trace: Trace, attachment: Option<AttachmentResult>) -> CycleReport {
    tracing::info!(?verdict, entries = trace.len(), "cycle finished");
    CycleReport {
        verdict,
        trace,
        attachment,
    }
}
