//! Kernel host backed by the `openscad` command line.
//!
//! Each invoke writes the program into a scratch directory, runs
//! `openscad -o scene.stl --export-format binstl|asciistl [-D name=value]... scene.scad`
//! and returns the exported file.

use std::path::Path;
use std::process::Output;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::OpenScadConfig;
use crate::host::{KernelHost, ProgressSink};
use crate::protocol::{InvokePayload, OutputFormat, ResultPayload};

pub struct OpenScadHost {
    config: OpenScadConfig,
}

impl OpenScadHost {
    pub fn new(config: OpenScadConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.config.binary);
        command.args(&self.config.extra_args);
        if let Some(library) = &self.config.library_path {
            command.env("OPENSCADPATH", library);
        }
        command.kill_on_drop(true);
        command
    }

    fn render_args(payload: &InvokePayload, input: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            output.display().to_string(),
            "--export-format".to_string(),
            export_format(payload.output_format).to_string(),
        ];
        for (name, value) in &payload.variables {
            args.push("-D".to_string());
            args.push(format!("{}={}", name, value.to_literal()));
        }
        args.push(input.display().to_string());
        args
    }

    async fn run(&self, payload: InvokePayload, progress: &ProgressSink) -> Result<ResultPayload, String> {
        let scratch = tempfile::tempdir().map_err(|e| format!("Failed to create scratch directory: {}", e))?;
        let input = scratch.path().join("scene.scad");
        let output = scratch.path().join("scene.stl");
        tokio::fs::write(&input, payload.program.as_bytes())
            .await
            .map_err(|e| format!("Failed to write program: {}", e))?;

        progress.report("Rendering").await;
        let started = Instant::now();
        let Output {
            status,
            stdout,
            stderr,
        } = self
            .command()
            .args(Self::render_args(&payload, &input, &output))
            .output()
            .await
            .map_err(|e| format!("Failed to run {}: {}", self.config.binary.display(), e))?;
        let render_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        let stdout = non_empty(stdout);
        let stderr = non_empty(stderr);
        if !status.success() {
            return Ok(ResultPayload {
                success: false,
                error: Some(format!("OpenSCAD exited with {}", status)),
                stdout,
                stderr,
                render_time_ms: Some(render_time_ms),
                ..ResultPayload::default()
            });
        }

        let mesh = tokio::fs::read(&output)
            .await
            .map_err(|e| format!("OpenSCAD produced no output: {}", e))?;
        log::info!("Rendered {} bytes in {:.0} ms", mesh.len(), render_time_ms);
        Ok(ResultPayload {
            stdout,
            stderr,
            render_time_ms: Some(render_time_ms),
            ..ResultPayload::success(mesh)
        })
    }
}

#[async_trait]
impl KernelHost for OpenScadHost {
    async fn init(&self, progress: &ProgressSink) -> Result<(), String> {
        progress.report("Checking OpenSCAD").await;
        // `--version` prints to stderr.
        let output = self
            .command()
            .arg("--version")
            .output()
            .await
            .map_err(|e| format!("OpenSCAD not available at {}: {}", self.config.binary.display(), e))?;
        if !output.status.success() {
            return Err(format!("OpenSCAD version check exited with {}", output.status));
        }
        let version = String::from_utf8_lossy(&output.stderr);
        log::info!("Using {}", version.trim());
        Ok(())
    }

    async fn invoke(&self, payload: InvokePayload, progress: &ProgressSink) -> ResultPayload {
        match self.run(payload, progress).await {
            Ok(result) => result,
            Err(message) => {
                log::error!("{}", message);
                ResultPayload::failure(message)
            }
        }
    }
}

fn export_format(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::MeshBinary => "binstl",
        OutputFormat::MeshAscii => "asciistl",
    }
}

fn non_empty(bytes: Vec<u8>) -> Option<String> {
    let text = String::from_utf8_lossy(&bytes).trim_end().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::VariableValue;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn test_render_args() {
        let mut variables = BTreeMap::new();
        variables.insert("label".to_string(), VariableValue::Text("NAS".into()));
        variables.insert("preview".to_string(), VariableValue::Bool(true));
        let payload = InvokePayload {
            program: String::new(),
            output_format: OutputFormat::MeshAscii,
            variables,
        };
        let args = OpenScadHost::render_args(
            &payload,
            &PathBuf::from("/tmp/x/scene.scad"),
            &PathBuf::from("/tmp/x/scene.stl"),
        );
        assert_eq!(
            args,
            vec![
                "-o",
                "/tmp/x/scene.stl",
                "--export-format",
                "asciistl",
                "-D",
                "label=\"NAS\"",
                "-D",
                "preview=true",
                "/tmp/x/scene.scad",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_fails_init_and_invoke() {
        let host = OpenScadHost::new(OpenScadConfig {
            binary: PathBuf::from("/nonexistent/openscad"),
            ..OpenScadConfig::default()
        });
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        let progress = ProgressSink::new(tx);
        assert!(host.init(&progress).await.is_err());

        let result = host
            .invoke(
                InvokePayload {
                    program: "cube(1);".into(),
                    output_format: OutputFormat::MeshBinary,
                    variables: BTreeMap::new(),
                },
                &progress,
            )
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Failed to run"));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(b"  \n".to_vec()), None);
        assert_eq!(non_empty(b"WARNING: x\n".to_vec()), Some("WARNING: x".to_string()));
    }
}
