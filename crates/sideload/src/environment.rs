//! Capability bundle supplied by the surrounding host application.
//!
//! The core only ever borrows a [`HostEnvironment`]; anything handed to a
//! guest is a snapshot bound into that cycle's store and dropped with it.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Host platform level. Parameter tables are selected by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PlatformVersion(pub u32);

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "platform-{}", self.0)
    }
}

/// The raw context the caller runs in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HostContext {
    pub package_name: String,
    pub label: String,
}

/// Top-level application-scope view of the host. This, not the caller's
/// context, is what base attachment stores on a guest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApplicationScope {
    pub package_name: String,
    pub process_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Configuration {
    pub locale: String,
    pub density_dpi: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Resources {
    pub configuration: Configuration,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Instrumentation {
    pub name: String,
}

/// Host-designated storage locations, listed for diagnostics only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StorageLocations {
    pub files_dir: PathBuf,
    pub cache_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HostEnvironment {
    pub context: HostContext,
    pub application: ApplicationScope,
    pub resources: Resources,
    pub instrumentation: Option<Instrumentation>,
    pub storage: StorageLocations,
    pub platform: PlatformVersion,
}

impl HostEnvironment {
    pub fn application_scope(&self) -> &ApplicationScope {
        &self.application
    }

    pub fn package_name(&self) -> &str {
        &self.application.package_name
    }

    pub fn configuration(&self) -> &Configuration {
        &self.resources.configuration
    }
}

impl Default for HostEnvironment {
    fn default() -> Self {
        let package_name = "dev.sideload.host".to_string();
        Self {
            context: HostContext {
                package_name: package_name.clone(),
                label: "sideload".to_string(),
            },
            application: ApplicationScope {
                package_name: package_name.clone(),
                process_name: package_name,
            },
            resources: Resources {
                configuration: Configuration {
                    locale: "en-US".to_string(),
                    density_dpi: 160,
                },
            },
            instrumentation: Some(Instrumentation {
                name: "sideload.Instrumentation".to_string(),
            }),
            storage: StorageLocations {
                files_dir: PathBuf::from("files"),
                cache_dir: PathBuf::from("cache"),
            },
            platform: PlatformVersion(15),
        }
    }
}
