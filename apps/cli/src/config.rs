//! `--config` file: kernel and OpenSCAD settings, camelCase JSON.
//!
//! ```json
//! {
//!   "kernel": { "debounceMs": 500, "workerCommand": "/usr/local/bin/rackforge-kernel-host" },
//!   "openscad": { "binary": "/usr/bin/openscad", "libraryPath": "/usr/share/rackforge" }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rackforge_kernel::{
    InProcessSpawner, KernelConfig, OpenScadConfig, OpenScadHost, ProcessSpawner, WorkerSpawner,
};

use crate::error::CliError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RackforgeConfig {
    pub kernel: KernelConfig,
    pub openscad: OpenScadConfig,
}

impl RackforgeConfig {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CliError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Worker arguments, with the OpenSCAD settings forwarded as flags.
    pub fn worker_args(&self) -> Vec<String> {
        let mut args = self.kernel.worker_args.clone();
        args.push("--openscad".to_string());
        args.push(self.openscad.binary.display().to_string());
        if let Some(library) = &self.openscad.library_path {
            args.push("--library".to_string());
            args.push(library.display().to_string());
        }
        args
    }

    pub fn spawner(&self, in_process: bool) -> Arc<dyn WorkerSpawner> {
        if in_process {
            let host = Arc::new(OpenScadHost::new(self.openscad.clone()));
            Arc::new(InProcessSpawner::new(host))
        } else {
            Arc::new(ProcessSpawner::new(
                self.kernel.worker_command.clone(),
                self.worker_args(),
            ))
        }
    }
}
