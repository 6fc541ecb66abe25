mod config;
mod error;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use clap::{Parser, Subcommand, ValueEnum};

use rackforge_core::{catalog, RackConfig, Side};
use rackforge_drc::{check_scene, PlacementViolation, Severity};
use rackforge_io::project;
use rackforge_kernel::{
    KernelClient, OutputFormat, RenderOutcome, RenderReport, RenderRequest, RenderScheduler,
};

use crate::config::RackforgeConfig;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "rackforge", version, about = "Design printable rack faceplates")]
struct Cli {
    /// JSON settings file for the kernel and OpenSCAD.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the built-in device catalog.
    Catalog,
    /// Run placement checks on a scene document.
    Check {
        scene: PathBuf,
        /// Print violations as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Write the kernel program for a scene.
    Export {
        scene: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only one half of a split panel.
        #[arg(long, value_enum)]
        side: Option<SideArg>,
    },
    /// Render a scene to an STL mesh.
    Render {
        scene: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        kernel: KernelArgs,
    },
    /// Re-render whenever the scene file changes.
    Watch {
        scene: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        kernel: KernelArgs,
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
    },
}

#[derive(clap::Args)]
struct KernelArgs {
    /// ASCII STL instead of binary.
    #[arg(long)]
    ascii: bool,
    /// Run OpenSCAD from this process instead of a worker process.
    #[arg(long)]
    in_process: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Left,
    Right,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Left => Side::Left,
            SideArg::Right => Side::Right,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = match &cli.config {
        Some(path) => RackforgeConfig::load(path)?,
        None => RackforgeConfig::default(),
    };

    match cli.command {
        Command::Catalog => {
            for entry in catalog::entries() {
                println!(
                    "{:<16} {:<28} {:>6} x {:>6} x {:>6} mm",
                    entry.id, entry.name, entry.width, entry.height, entry.depth
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { scene, json } => {
            let scene = project::load(&scene)?;
            let violations = check_scene(&scene);
            if json {
                println!("{}", serde_json::to_string_pretty(&violations)?);
            } else {
                for line in describe_violations(&scene, &violations) {
                    println!("{line}");
                }
                println!("{} device(s), {} violation(s)", scene.device_count(), violations.len());
            }
            Ok(if has_errors(&violations) {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Export { scene, output, side } => {
            let scene = project::load(&scene)?;
            let program = match side {
                Some(side) => rackforge_io::serialize_side(&scene, side.into()),
                None => rackforge_io::serialize(&scene),
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, program)?;
                    log::info!("Wrote {}", path.display());
                }
                None => print!("{program}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Render {
            scene,
            output,
            kernel,
        } => {
            let scene = project::load(&scene)?;
            let client = KernelClient::new(config.spawner(kernel.in_process), config.kernel.clone());
            let request = RenderRequest::for_scene(&scene, output_format(&kernel, &config));
            let response = client.invoke(request).await;
            match response.outcome {
                RenderOutcome::Success(mesh) => {
                    tokio::fs::write(&output, &mesh.data).await?;
                    println!("Wrote {} ({} bytes)", output.display(), mesh.data.len());
                    Ok(ExitCode::SUCCESS)
                }
                RenderOutcome::Failure(failure) => {
                    eprintln!("render failed: {}", failure.message);
                    if let Some(stderr) = failure.stderr {
                        eprintln!("{stderr}");
                    }
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Watch {
            scene,
            output,
            kernel,
            poll_ms,
        } => {
            let mut config = config;
            config.kernel.output_format = output_format(&kernel, &config);
            let client = Arc::new(KernelClient::new(
                config.spawner(kernel.in_process),
                config.kernel.clone(),
            ));
            watch(client, &config, &scene, &output, Duration::from_millis(poll_ms)).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn watch(
    client: Arc<KernelClient>,
    config: &RackforgeConfig,
    scene_path: &Path,
    output: &Path,
    poll: Duration,
) -> Result<(), CliError> {
    let scene = project::load(scene_path)?;
    report_violations(&scene);
    let scheduler = RenderScheduler::spawn(client, &config.kernel, scene);
    let mut reports = scheduler.subscribe_reports();
    let mut last_modified = modified(scene_path).await;
    let mut ticker = tokio::time::interval(poll);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    log::info!("Watching {}", scene_path.display());
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {
                let current = modified(scene_path).await;
                if current == last_modified {
                    continue;
                }
                last_modified = current;
                match project::load(scene_path) {
                    Ok(scene) => {
                        report_violations(&scene);
                        scheduler.update_scene(scene);
                    }
                    Err(e) => log::warn!("Ignoring unreadable scene: {}", e),
                }
            }
            changed = reports.changed() => {
                if changed.is_err() {
                    break;
                }
                let report = reports.borrow_and_update().clone();
                if let Some(report) = report {
                    write_report(&report, output).await?;
                }
            }
        }
    }

    scheduler.shutdown().await;
    Ok(())
}

async fn write_report(report: &RenderReport, output: &Path) -> Result<(), CliError> {
    match &report.outcome {
        RenderOutcome::Success(mesh) => {
            tokio::fs::write(output, &mesh.data).await?;
            println!(
                "[{}] wrote {} ({} bytes, {:.1} s)",
                report.scene_hash,
                output.display(),
                mesh.data.len(),
                report.elapsed.as_secs_f64()
            );
        }
        RenderOutcome::Failure(failure) => {
            eprintln!("[{}] render failed: {}", report.scene_hash, failure.message);
        }
    }
    Ok(())
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.and_then(|m| m.modified()).ok()
}

fn output_format(kernel: &KernelArgs, config: &RackforgeConfig) -> OutputFormat {
    if kernel.ascii {
        OutputFormat::MeshAscii
    } else {
        config.kernel.output_format
    }
}

fn report_violations(scene: &RackConfig) {
    let violations = check_scene(scene);
    for line in describe_violations(scene, &violations) {
        log::warn!("{}", line);
    }
}

fn describe_violations(scene: &RackConfig, violations: &[PlacementViolation]) -> Vec<String> {
    violations
        .iter()
        .map(|v| {
            let name = scene
                .device(&v.device_id)
                .map(|d| d.display_name())
                .unwrap_or("<unknown>");
            format!("{:?}: {} ({})", v.severity, name, v.message)
        })
        .collect()
}

fn has_errors(violations: &[PlacementViolation]) -> bool {
    violations.iter().any(|v| v.severity == Severity::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackforge_core::PlacedDevice;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "rackforge",
            "--config",
            "rf.json",
            "export",
            "panel.json",
            "--side",
            "left",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("rf.json")));
        assert!(matches!(
            cli.command,
            Command::Export {
                side: Some(SideArg::Left),
                output: None,
                ..
            }
        ));

        let cli = Cli::try_parse_from(["rackforge", "render", "p.json", "-o", "p.stl", "--ascii"]).unwrap();
        match cli.command {
            Command::Render { kernel, .. } => {
                assert!(kernel.ascii);
                assert!(!kernel.in_process);
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_overlapping_scene_fails_check() {
        let mut scene = RackConfig::new(2).unwrap();
        scene
            .add_device(PlacedDevice::from_catalog("rpi5", 0.0, 0.0).unwrap(), None)
            .unwrap();
        scene
            .add_device(PlacedDevice::from_catalog("rpi5", 10.0, 0.0).unwrap(), None)
            .unwrap();
        let violations = check_scene(&scene);
        assert!(has_errors(&violations));
        let lines = describe_violations(&scene, &violations);
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|l| l.contains("Raspberry Pi 5")));
    }

    #[test]
    fn test_saved_scene_exports_same_program() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let scene = RackConfig::new(1).unwrap();
        project::save(&path, &scene).unwrap();

        let loaded = project::load(&path).unwrap();
        assert_eq!(rackforge_io::serialize(&loaded), rackforge_io::serialize(&scene));
    }
}
