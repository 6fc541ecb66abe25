//! Kernel client, scheduler and OpenSCAD host settings.
//!
//! Both structs deserialize from camelCase JSON with every field optional,
//! so a config file only needs the keys it overrides.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::OutputFormat;

pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
pub const DEFAULT_INVOKE_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_INIT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_WORKER_COMMAND: &str = "rackforge-kernel-host";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KernelConfig {
    /// Quiet period after the last edit before a render fires.
    pub debounce_ms: u64,
    pub invoke_timeout_ms: u64,
    pub init_timeout_ms: u64,
    pub output_format: OutputFormat,
    /// Worker executable for process-backed kernels.
    pub worker_command: PathBuf,
    pub worker_args: Vec<String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            invoke_timeout_ms: DEFAULT_INVOKE_TIMEOUT_MS,
            init_timeout_ms: DEFAULT_INIT_TIMEOUT_MS,
            output_format: OutputFormat::default(),
            worker_command: PathBuf::from(DEFAULT_WORKER_COMMAND),
            worker_args: Vec::new(),
        }
    }
}

impl KernelConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_millis(self.invoke_timeout_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenScadConfig {
    pub binary: PathBuf,
    /// Directory containing `rackforge/panel.scad`, exported as `OPENSCADPATH`.
    pub library_path: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl Default for OpenScadConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("openscad"),
            library_path: None,
            extra_args: Vec::new(),
        }
    }
}
