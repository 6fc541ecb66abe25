//! Worker side of the protocol.
//!
//! A [`KernelHost`] does the actual rendering. [`serve`] drives one over a
//! pair of channels; [`serve_lines`] does the same over a byte stream with
//! newline-delimited JSON framing, which is what the worker binary runs on
//! stdio.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;

use crate::error::KernelError;
use crate::protocol::{InvokePayload, ResultPayload, WorkerRequest, WorkerResponse};
use crate::transport::{write_json_line, CHANNEL_CAPACITY};

/// Sends uncorrelated progress text back to the client.
#[derive(Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<WorkerResponse>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<WorkerResponse>) -> Self {
        Self { tx }
    }

    pub async fn report(&self, status: impl Into<String>) {
        // Progress is advisory; a closed link surfaces through the result path.
        let _ = self.tx.send(WorkerResponse::progress(status)).await;
    }
}

#[async_trait]
pub trait KernelHost: Send + Sync {
    /// One-time preparation before the first invoke. An `Err` is reported
    /// to the client as an `error` message in place of `ready`.
    async fn init(&self, _progress: &ProgressSink) -> Result<(), String> {
        Ok(())
    }

    async fn invoke(&self, payload: InvokePayload, progress: &ProgressSink) -> ResultPayload;
}

/// Answer requests until the request channel closes or the client stops
/// listening. Invocations run one at a time in arrival order.
pub async fn serve<H>(
    host: Arc<H>,
    mut requests: mpsc::Receiver<WorkerRequest>,
    responses: mpsc::Sender<WorkerResponse>,
) where
    H: KernelHost + ?Sized,
{
    let progress = ProgressSink::new(responses.clone());
    let mut ready = false;

    while let Some(request) = requests.recv().await {
        let reply = match request {
            WorkerRequest::Init { id } if ready => Some(WorkerResponse::Ready { id: Some(id) }),
            WorkerRequest::Init { id } => match host.init(&progress).await {
                Ok(()) => {
                    ready = true;
                    log::info!("Kernel ready");
                    Some(WorkerResponse::Ready { id: Some(id) })
                }
                Err(message) => {
                    log::error!("Kernel initialization failed: {}", message);
                    Some(WorkerResponse::error(Some(id), message))
                }
            },
            WorkerRequest::Invoke { id, .. } if !ready => {
                Some(WorkerResponse::error(Some(id), "Kernel is not initialized"))
            }
            WorkerRequest::Invoke { id, payload } => {
                log::debug!("Invoking kernel for request {}", id);
                let result = host.invoke(payload, &progress).await;
                Some(WorkerResponse::RenderResult { id, payload: result })
            }
            WorkerRequest::Cancel { id } => {
                log::debug!("Cancel for request {} ignored; invocations run to completion", id);
                None
            }
        };

        if let Some(reply) = reply {
            if responses.send(reply).await.is_err() {
                break;
            }
        }
    }
    log::debug!("Kernel host request stream closed");
}

/// [`serve`] over a byte stream, one JSON document per line in each
/// direction. Returns when the reader reaches end of input.
pub async fn serve_lines<H, R, W>(host: Arc<H>, reader: R, writer: W) -> Result<(), KernelError>
where
    H: KernelHost + ?Sized + 'static,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (request_tx, request_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (response_tx, mut response_rx) = mpsc::channel::<WorkerResponse>(CHANNEL_CAPACITY);

    let server = tokio::spawn(serve(host, request_rx, response_tx));
    let output = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(response) = response_rx.recv().await {
            write_json_line(&mut writer, &response).await?;
        }
        Ok::<(), KernelError>(())
    });

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WorkerRequest>(&line) {
            Ok(request) => {
                if request_tx.send(request).await.is_err() {
                    break;
                }
            }
            Err(e) => log::warn!("Ignoring malformed request: {}", e),
        }
    }
    drop(request_tx);

    if let Err(e) = server.await {
        log::error!("Kernel host task failed: {}", e);
    }
    match output.await {
        Ok(result) => result,
        Err(e) => {
            log::error!("Kernel host writer task failed: {}", e);
            Ok(())
        }
    }
}
