//! Ways of starting a kernel worker.
//!
//! Whatever the worker is (a child process or a task in this process), the
//! client only sees a [`WorkerChannel`]: a request sender and a response
//! receiver. The worker is gone when the response receiver yields `None`.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::host::{serve, KernelHost};
use crate::protocol::{WorkerRequest, WorkerResponse};

pub const CHANNEL_CAPACITY: usize = 64;

pub struct WorkerChannel {
    pub requests: mpsc::Sender<WorkerRequest>,
    pub responses: mpsc::Receiver<WorkerResponse>,
}

impl WorkerChannel {
    /// Channel pair plus the ends a worker implementation holds.
    pub fn pair() -> (
        Self,
        mpsc::Receiver<WorkerRequest>,
        mpsc::Sender<WorkerResponse>,
    ) {
        let (request_tx, request_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (response_tx, response_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                requests: request_tx,
                responses: response_rx,
            },
            request_rx,
            response_tx,
        )
    }
}

#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    async fn spawn(&self) -> Result<WorkerChannel, KernelError>;
}

/// Runs a [`KernelHost`] on a background task.
pub struct InProcessSpawner {
    host: Arc<dyn KernelHost>,
}

impl InProcessSpawner {
    pub fn new(host: Arc<dyn KernelHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl WorkerSpawner for InProcessSpawner {
    async fn spawn(&self) -> Result<WorkerChannel, KernelError> {
        let (channel, requests, responses) = WorkerChannel::pair();
        tokio::spawn(serve(self.host.clone(), requests, responses));
        Ok(channel)
    }
}

/// Starts a worker executable speaking line-delimited JSON on stdio.
/// The worker's stderr is inherited so its logs reach the terminal.
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessSpawner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &KernelConfig) -> Self {
        Self::new(config.worker_command.clone(), config.worker_args.clone())
    }
}

#[async_trait]
impl WorkerSpawner for ProcessSpawner {
    async fn spawn(&self) -> Result<WorkerChannel, KernelError> {
        log::info!("Starting kernel worker {}", self.program.display());
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(KernelError::Spawn)?;

        let mut stdin = child.stdin.take().ok_or(KernelError::ChannelClosed)?;
        let stdout = child.stdout.take().ok_or(KernelError::ChannelClosed)?;
        let (channel, mut requests, responses) = WorkerChannel::pair();

        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                if let Err(e) = write_json_line(&mut stdin, &request).await {
                    log::warn!("Kernel worker stdin closed: {}", e);
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match serde_json::from_str::<WorkerResponse>(&line) {
                        Ok(response) => {
                            if responses.send(response).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => log::warn!("Ignoring malformed worker message: {}", e),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("Kernel worker stdout failed: {}", e);
                        break;
                    }
                }
            }
            drop(responses);
            match child.wait().await {
                Ok(status) => log::info!("Kernel worker exited: {}", status),
                Err(e) => log::warn!("Failed to reap kernel worker: {}", e),
            }
        });

        Ok(channel)
    }
}

pub(crate) async fn write_json_line<W, T>(writer: &mut W, value: &T) -> Result<(), KernelError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
