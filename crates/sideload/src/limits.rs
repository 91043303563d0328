use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-call fuel granted for each millisecond of CPU budget.
const FUEL_PER_CPU_MS: u64 = 100_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeLimits {
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u32,
    #[serde(default = "default_max_cpu_ms")]
    pub max_cpu_ms: u32,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            max_memory_mb: default_max_memory_mb(),
            max_cpu_ms: default_max_cpu_ms(),
        }
    }
}

impl RuntimeLimits {
    pub fn validate(&self) -> Result<()> {
        if self.max_memory_mb < 1 || self.max_cpu_ms < 1 {
            return Err(Error::ConfigError(
                "limits values must be positive integers".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fuel_per_call(&self) -> u64 {
        u64::from(self.max_cpu_ms).saturating_mul(FUEL_PER_CPU_MS)
    }

    pub fn max_memory_bytes_u64(&self) -> u64 {
        u64::from(self.max_memory_mb).saturating_mul(1024 * 1024)
    }

    pub fn max_memory_bytes(&self) -> usize {
        usize::try_from(self.max_memory_bytes_u64()).unwrap_or(usize::MAX)
    }
}

const fn default_max_memory_mb() -> u32 {
    64
}

const fn default_max_cpu_ms() -> u32 {
    100
}
