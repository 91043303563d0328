//! Host profile: the TOML the CLI reads to build a [`HostEnvironment`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::environment::{
    ApplicationScope, Configuration, HostContext, HostEnvironment, Instrumentation,
    PlatformVersion, Resources, StorageLocations,
};
use crate::error::{Error, Result};
use crate::limits::RuntimeLimits;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostProfile {
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub resources: ResourcesSection,
    #[serde(default)]
    pub instrumentation: InstrumentationSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub limits: RuntimeLimits,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostSection {
    #[serde(default = "default_package_name")]
    pub package_name: String,
    /// Defaults to `package_name`.
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default = "default_platform_version")]
    pub platform_version: u32,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            package_name: default_package_name(),
            process_name: None,
            platform_version: default_platform_version(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourcesSection {
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_density_dpi")]
    pub density_dpi: u32,
}

impl Default for ResourcesSection {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            density_dpi: default_density_dpi(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentationSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_instrumentation_name")]
    pub name: String,
}

impl Default for InstrumentationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            name: default_instrumentation_name(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    #[serde(default = "default_files_dir")]
    pub files_dir: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            files_dir: default_files_dir(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl HostProfile {
    /// Read and validate a profile file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to read host profile {}: {}",
                path.display(),
                e
            ))
        })?;
        parse_host_profile_toml(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.package_name.trim().is_empty() {
            return Err(Error::ConfigError(
                "host.package_name must be a non-empty string".to_string(),
            ));
        }
        if matches!(&self.host.process_name, Some(p) if p.trim().is_empty()) {
            return Err(Error::ConfigError(
                "host.process_name must be non-empty when set".to_string(),
            ));
        }
        if self.host.platform_version == 0 {
            return Err(Error::ConfigError(
                "host.platform_version must be positive".to_string(),
            ));
        }
        if self.resources.locale.trim().is_empty() {
            return Err(Error::ConfigError(
                "resources.locale must be a non-empty string".to_string(),
            ));
        }
        if self.instrumentation.enabled && self.instrumentation.name.trim().is_empty() {
            return Err(Error::ConfigError(
                "instrumentation.name must be non-empty when enabled".to_string(),
            ));
        }
        self.limits.validate()
    }

    pub fn limits(&self) -> &RuntimeLimits {
        &self.limits
    }

    pub fn into_environment(self) -> HostEnvironment {
        let package_name = self.host.package_name;
        let process_name = self
            .host
            .process_name
            .unwrap_or_else(|| package_name.clone());
        HostEnvironment {
            context: HostContext {
                package_name: package_name.clone(),
                label: "sideload".to_string(),
            },
            application: ApplicationScope {
                package_name,
                process_name,
            },
            resources: Resources {
                configuration: Configuration {
                    locale: self.resources.locale,
                    density_dpi: self.resources.density_dpi,
                },
            },
            instrumentation: self.instrumentation.enabled.then(|| Instrumentation {
                name: self.instrumentation.name,
            }),
            storage: StorageLocations {
                files_dir: self.storage.files_dir,
                cache_dir: self.storage.cache_dir,
            },
            platform: PlatformVersion(self.host.platform_version),
        }
    }
}

pub fn parse_host_profile_toml(content: &str) -> Result<HostProfile> {
    let profile: HostProfile = toml::from_str(content)
        .map_err(|e| Error::ConfigError(format!("failed to parse host profile TOML: {e}")))?;
    profile.validate()?;
    Ok(profile)
}

fn default_package_name() -> String {
    "dev.sideload.host".to_string()
}

const fn default_platform_version() -> u32 {
    15
}

fn default_locale() -> String {
    "en-US".to_string()
}

const fn default_density_dpi() -> u32 {
    160
}

const fn default_true() -> bool {
    true
}

fn default_instrumentation_name() -> String {
    "sideload.Instrumentation".to_string()
}

fn default_files_dir() -> PathBuf {
    PathBuf::from("files")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}
