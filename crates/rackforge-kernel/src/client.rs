//! Kernel client: owns the worker link and correlates responses by id.
//!
//! The worker is started lazily on the first call and restarted on the
//! call after it goes away. Any number of invocations may be pending at
//! once; each waits on its own oneshot keyed by [`RequestId`], so responses
//! can arrive in any order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::protocol::{OutputFormat, RequestId, ResultPayload, WorkerRequest, WorkerResponse};
use crate::render::{FailureKind, RenderOutcome, RenderRequest, RenderResponse};
use crate::scheduler::RenderBackend;
use crate::transport::{WorkerChannel, WorkerSpawner};

/// Latest worker status. Progress text overwrites the previous value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelStatus {
    Stopped,
    Starting,
    Ready,
    Progress(String),
    Error(String),
}

struct Pending {
    reply: oneshot::Sender<RenderResponse>,
    format: OutputFormat,
}

#[derive(Default)]
struct Link {
    /// Present while a ready worker is attached.
    requests: Option<mpsc::Sender<WorkerRequest>>,
    pending: HashMap<RequestId, Pending>,
    /// Bumped per worker so a stale dispatcher cannot tear down its successor.
    generation: u64,
}

struct Shared {
    link: Mutex<Link>,
    status: watch::Sender<KernelStatus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, status: KernelStatus) {
        self.status.send_replace(status);
    }

    fn take_pending(&self, id: &RequestId) -> Option<Pending> {
        self.lock().pending.remove(id)
    }

    fn complete(&self, id: RequestId, payload: ResultPayload) {
        match self.take_pending(&id) {
            Some(pending) => {
                let outcome = RenderOutcome::from_payload(payload, pending.format);
                // The caller may have given up already.
                let _ = pending.reply.send(RenderResponse { id, outcome });
            }
            None => log::debug!("Dropping result for unknown or expired request {}", id),
        }
    }

    fn fail(&self, id: RequestId, kind: FailureKind, message: String) {
        match self.take_pending(&id) {
            Some(pending) => {
                let _ = pending.reply.send(RenderResponse::failed(id, kind, message));
            }
            None => log::debug!("Dropping error for unknown or expired request {}: {}", id, message),
        }
    }

    /// Detach worker `generation` and fail everything still waiting on it.
    fn disconnect(&self, generation: u64) {
        let orphaned: Vec<(RequestId, Pending)> = {
            let mut link = self.lock();
            if link.generation != generation {
                return;
            }
            link.requests = None;
            link.pending.drain().collect()
        };
        log::warn!(
            "Kernel worker disconnected with {} request(s) pending",
            orphaned.len()
        );
        for (id, pending) in orphaned {
            let _ = pending.reply.send(RenderResponse::failed(
                id,
                FailureKind::WorkerUnavailable,
                "Kernel worker terminated",
            ));
        }
        self.publish(KernelStatus::Error("Kernel worker terminated".to_string()));
    }
}

pub struct KernelClient {
    spawner: Arc<dyn WorkerSpawner>,
    config: KernelConfig,
    /// Serializes startup so concurrent first calls share one worker.
    init_lock: tokio::sync::Mutex<()>,
    shared: Arc<Shared>,
}

impl KernelClient {
    pub fn new(spawner: Arc<dyn WorkerSpawner>, config: KernelConfig) -> Self {
        let (status, _) = watch::channel(KernelStatus::Stopped);
        Self {
            spawner,
            config,
            init_lock: tokio::sync::Mutex::new(()),
            shared: Arc::new(Shared {
                link: Mutex::new(Link::default()),
                status,
            }),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.shared.lock().requests.is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn status(&self) -> KernelStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<KernelStatus> {
        self.shared.status.subscribe()
    }

    /// Start the worker and wait for `ready`. Idempotent once ready; after
    /// a failure the next call starts over with a fresh worker.
    pub async fn initialize(&self) -> Result<(), KernelError> {
        let _guard = self.init_lock.lock().await;
        if self.is_ready() {
            return Ok(());
        }

        self.shared.publish(KernelStatus::Starting);
        let result = self.start_worker().await;
        if let Err(e) = &result {
            log::error!("Kernel initialization failed: {}", e);
            self.shared.publish(KernelStatus::Error(e.to_string()));
        }
        result
    }

    async fn start_worker(&self) -> Result<(), KernelError> {
        let WorkerChannel {
            requests,
            mut responses,
        } = self.spawner.spawn().await?;

        requests
            .send(WorkerRequest::Init { id: RequestId::new() })
            .await
            .map_err(|_| KernelError::ChannelClosed)?;

        let handshake = async {
            while let Some(message) = responses.recv().await {
                match message {
                    WorkerResponse::Ready { .. } => return Ok(()),
                    WorkerResponse::Progress { payload } => {
                        self.shared.publish(KernelStatus::Progress(payload.status))
                    }
                    WorkerResponse::Error { payload, .. } => {
                        return Err(KernelError::InitRejected(payload.message))
                    }
                    other => log::warn!("Ignoring {} message before worker is ready", other.kind()),
                }
            }
            Err(KernelError::ChannelClosed)
        };
        let timeout = self.config.init_timeout();
        tokio::time::timeout(timeout, handshake)
            .await
            .map_err(|_| KernelError::InitTimeout(timeout))??;

        let generation = {
            let mut link = self.shared.lock();
            link.generation += 1;
            link.requests = Some(requests);
            link.generation
        };
        tokio::spawn(dispatch(self.shared.clone(), responses, generation));
        self.shared.publish(KernelStatus::Ready);
        log::info!("Kernel worker ready");
        Ok(())
    }

    /// Render `request`. Never returns an error: worker, kernel and timeout
    /// failures all come back as [`RenderOutcome::Failure`].
    pub async fn invoke(&self, request: RenderRequest) -> RenderResponse {
        let id = RequestId::new();
        if let Err(e) = self.initialize().await {
            return RenderResponse::failed(id, FailureKind::WorkerUnavailable, e.to_string());
        }

        let format = request.output_format;
        let (reply, response) = oneshot::channel();
        let requests = {
            let mut link = self.shared.lock();
            match link.requests.clone() {
                Some(requests) => {
                    link.pending.insert(id, Pending { reply, format });
                    requests
                }
                None => {
                    return RenderResponse::failed(
                        id,
                        FailureKind::WorkerUnavailable,
                        "Kernel worker is not running",
                    )
                }
            }
        };

        let envelope = WorkerRequest::Invoke {
            id,
            payload: request.into_payload(),
        };
        if requests.send(envelope).await.is_err() {
            self.shared.take_pending(&id);
            return RenderResponse::failed(
                id,
                FailureKind::WorkerUnavailable,
                "Kernel worker channel closed",
            );
        }
        log::debug!("Sent render request {}", id);

        let timeout = self.config.invoke_timeout();
        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => RenderResponse::failed(
                id,
                FailureKind::WorkerUnavailable,
                "Kernel worker dropped the request",
            ),
            Err(_) => {
                self.shared.take_pending(&id);
                if requests.try_send(WorkerRequest::Cancel { id }).is_err() {
                    log::debug!("Could not send cancel for request {}", id);
                }
                log::warn!("Render request {} timed out after {:?}", id, timeout);
                RenderResponse::failed(
                    id,
                    FailureKind::Timeout,
                    format!("Render timed out after {} s", timeout.as_secs_f64()),
                )
            }
        }
    }
}

#[async_trait]
impl RenderBackend for KernelClient {
    async fn render(&self, request: RenderRequest) -> RenderResponse {
        self.invoke(request).await
    }
}

async fn dispatch(shared: Arc<Shared>, mut responses: mpsc::Receiver<WorkerResponse>, generation: u64) {
    while let Some(message) = responses.recv().await {
        match message {
            WorkerResponse::RenderResult { id, payload } => shared.complete(id, payload),
            WorkerResponse::Progress { payload } => {
                shared.publish(KernelStatus::Progress(payload.status))
            }
            WorkerResponse::Error {
                id: Some(id),
                payload,
            } => shared.fail(id, FailureKind::Kernel, payload.message),
            WorkerResponse::Error { id: None, payload } => {
                log::warn!("Kernel worker error: {}", payload.message);
                shared.publish(KernelStatus::Error(payload.message));
            }
            WorkerResponse::Ready { .. } => log::debug!("Ignoring repeated ready"),
        }
    }
    shared.disconnect(generation);
}
