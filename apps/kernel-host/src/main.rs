//! Kernel worker process.
//!
//! Reads requests from stdin and writes responses to stdout, one JSON
//! document per line. Logs go to stderr so they never corrupt the protocol
//! stream.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use rackforge_kernel::{serve_lines, OpenScadConfig, OpenScadHost};

#[derive(Parser)]
#[command(name = "rackforge-kernel-host", version, about = "Rackforge render worker (OpenSCAD)")]
struct Args {
    /// OpenSCAD executable.
    #[arg(long, default_value = "openscad")]
    openscad: PathBuf,
    /// Directory holding `rackforge/panel.scad`.
    #[arg(long)]
    library: Option<PathBuf>,
    /// Extra arguments passed to every OpenSCAD run.
    #[arg(long = "openscad-arg")]
    openscad_args: Vec<String>,
}

impl Args {
    fn openscad_config(self) -> OpenScadConfig {
        OpenScadConfig {
            binary: self.openscad,
            library_path: self.library,
            extra_args: self.openscad_args,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let host = Arc::new(OpenScadHost::new(Args::parse().openscad_config()));
    match serve_lines(host, tokio::io::stdin(), tokio::io::stdout()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Kernel host stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
