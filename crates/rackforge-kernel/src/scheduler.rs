//! Debounced, single-flight render scheduling.
//!
//! Scene edits arrive far faster than the kernel can render. The scheduler
//! waits for a quiet period after the last geometry change, keeps at most
//! one render in flight, and when edits land during a render it issues
//! exactly one follow-up built from the live scene once the current render
//! finishes. Edits that leave the scene fingerprint unchanged (camera moves,
//! identity-only changes) never schedule anything.
//!
//! The decision logic lives in [`Coalescer`], a plain state machine with no
//! I/O. [`RenderScheduler`] runs it on a task against a [`RenderBackend`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use rackforge_core::{RackConfig, SceneHash};

use crate::config::KernelConfig;
use crate::protocol::{OutputFormat, RequestId};
use crate::render::{FailureKind, RenderOutcome, RenderRequest, RenderResponse};

#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn render(&self, request: RenderRequest) -> RenderResponse;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Waiting out the quiet period before rendering.
    Debouncing,
    Rendering,
    /// A render is in flight and the scene changed again after its debounce
    /// elapsed; one more render follows when it finishes.
    RenderingWithPendingReplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Wait,
    StartRender,
}

/// Render scheduling state machine.
///
/// The debounce deadline is tracked separately from the phase because the
/// quiet-period timer keeps running while a render is in flight.
#[derive(Debug)]
pub struct Coalescer {
    phase: Phase,
    deadline: Option<Instant>,
    last_scheduled: Option<SceneHash>,
    debounce: Duration,
}

impl Coalescer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            deadline: None,
            last_scheduled: None,
            debounce,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Record a scene change. Returns `false`, leaving everything untouched,
    /// when `hash` equals the last scheduled scene.
    pub fn scene_changed(&mut self, hash: SceneHash, now: Instant) -> bool {
        if self.last_scheduled == Some(hash) {
            return false;
        }
        self.last_scheduled = Some(hash);
        self.deadline = Some(now + self.debounce);
        if self.phase == Phase::Idle {
            self.phase = Phase::Debouncing;
        }
        true
    }

    /// The scene about to be rendered; it may be newer than the last change seen.
    pub fn mark_scheduled(&mut self, hash: SceneHash) {
        self.last_scheduled = Some(hash);
    }

    pub fn timer_fired(&mut self) -> Action {
        self.deadline = None;
        match self.phase {
            Phase::Debouncing => {
                self.phase = Phase::Rendering;
                Action::StartRender
            }
            Phase::Rendering => {
                self.phase = Phase::RenderingWithPendingReplay;
                Action::Wait
            }
            Phase::RenderingWithPendingReplay | Phase::Idle => Action::Wait,
        }
    }

    pub fn render_finished(&mut self) -> Action {
        match self.phase {
            Phase::RenderingWithPendingReplay => {
                // The replay renders the live scene, which already holds any
                // edit still being debounced.
                self.deadline = None;
                self.phase = Phase::Rendering;
                Action::StartRender
            }
            Phase::Rendering => {
                self.phase = if self.deadline.is_some() {
                    Phase::Debouncing
                } else {
                    Phase::Idle
                };
                Action::Wait
            }
            Phase::Idle | Phase::Debouncing => {
                log::warn!("Render finished while {:?}", self.phase);
                Action::Wait
            }
        }
    }
}

/// Result of one scheduled render.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub scene_hash: SceneHash,
    pub request_id: RequestId,
    pub outcome: RenderOutcome,
    pub elapsed: Duration,
}

pub type ReportReceiver = watch::Receiver<Option<Arc<RenderReport>>>;

/// Handle to a running scheduler task.
pub struct RenderScheduler {
    scene: watch::Sender<RackConfig>,
    reports: ReportReceiver,
    phase: watch::Receiver<Phase>,
    task: JoinHandle<()>,
}

impl RenderScheduler {
    /// Start scheduling; `initial` is treated as the first edit.
    pub fn spawn(backend: Arc<dyn RenderBackend>, config: &KernelConfig, initial: RackConfig) -> Self {
        let (scene_tx, scene_rx) = watch::channel(initial);
        let (report_tx, report_rx) = watch::channel(None);
        let (phase_tx, phase_rx) = watch::channel(Phase::Idle);
        let actor = Actor {
            backend,
            format: config.output_format,
            machine: Coalescer::new(config.debounce()),
            scene: scene_rx,
            reports: report_tx,
            phase: phase_tx,
        };
        Self {
            scene: scene_tx,
            reports: report_rx,
            phase: phase_rx,
            task: tokio::spawn(actor.run()),
        }
    }

    pub fn update_scene(&self, config: RackConfig) {
        self.scene.send_replace(config);
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.clone()
    }

    pub fn subscribe_reports(&self) -> ReportReceiver {
        self.reports.clone()
    }

    pub fn latest_report(&self) -> Option<Arc<RenderReport>> {
        self.reports.borrow().clone()
    }

    /// Stop accepting edits. A render already in flight finishes and is
    /// reported; a pending debounce is dropped.
    pub async fn shutdown(self) {
        let Self { scene, task, .. } = self;
        drop(scene);
        if let Err(e) = task.await {
            log::error!("Render scheduler task failed: {}", e);
        }
    }
}

struct InFlight {
    scene_hash: SceneHash,
    task: JoinHandle<RenderReport>,
}

struct Actor {
    backend: Arc<dyn RenderBackend>,
    format: OutputFormat,
    machine: Coalescer,
    scene: watch::Receiver<RackConfig>,
    reports: watch::Sender<Option<Arc<RenderReport>>>,
    phase: watch::Sender<Phase>,
}

impl Actor {
    async fn run(mut self) {
        let initial = self.scene.borrow_and_update().snapshot_hash();
        self.machine.scene_changed(initial, Instant::now());
        self.publish_phase();

        let mut in_flight: Option<InFlight> = None;
        let mut scene_open = true;
        loop {
            let deadline = self.machine.deadline();
            tokio::select! {
                changed = self.scene.changed(), if scene_open => {
                    if changed.is_err() {
                        log::debug!("Scene source closed, render scheduler stopping");
                        scene_open = false;
                    } else {
                        let hash = self.scene.borrow_and_update().snapshot_hash();
                        if self.machine.scene_changed(hash, Instant::now()) {
                            log::debug!("Scene {} changed, debouncing", hash);
                        }
                    }
                }
                _ = sleep_until(deadline) => {
                    if self.machine.timer_fired() == Action::StartRender {
                        in_flight = Some(self.start_render());
                    }
                }
                finished = join(&mut in_flight) => {
                    if let Some(done) = in_flight.take() {
                        self.publish_report(done.scene_hash, finished);
                    }
                    if self.machine.render_finished() == Action::StartRender {
                        in_flight = Some(self.start_render());
                    }
                }
            }
            self.publish_phase();

            if !scene_open && in_flight.is_none() {
                break;
            }
        }
    }

    /// Render whatever the scene is now, not what it was when the timer was armed.
    fn start_render(&mut self) -> InFlight {
        let config = self.scene.borrow_and_update().clone();
        let scene_hash = config.snapshot_hash();
        self.machine.mark_scheduled(scene_hash);

        let request = RenderRequest::for_scene(&config, self.format);
        let backend = self.backend.clone();
        log::info!("Rendering scene {}", scene_hash);
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let response = backend.render(request).await;
            RenderReport {
                scene_hash,
                request_id: response.id,
                outcome: response.outcome,
                elapsed: started.elapsed(),
            }
        });
        InFlight { scene_hash, task }
    }

    fn publish_report(&self, scene_hash: SceneHash, finished: Result<RenderReport, JoinError>) {
        let report = match finished {
            Ok(report) => report,
            Err(e) => {
                log::error!("Render task for scene {} failed: {}", scene_hash, e);
                RenderReport {
                    scene_hash,
                    request_id: RequestId::new(),
                    outcome: RenderOutcome::failure(FailureKind::WorkerUnavailable, e.to_string()),
                    elapsed: Duration::ZERO,
                }
            }
        };
        match &report.outcome {
            RenderOutcome::Success(mesh) => log::info!(
                "Rendered scene {} ({} bytes) in {:?}",
                report.scene_hash,
                mesh.data.len(),
                report.elapsed
            ),
            RenderOutcome::Failure(failure) => log::warn!(
                "Render of scene {} failed ({:?}): {}",
                report.scene_hash,
                failure.kind,
                failure.message
            ),
        }
        self.reports.send_replace(Some(Arc::new(report)));
    }

    fn publish_phase(&self) {
        let phase = self.machine.phase();
        self.phase.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            *current = phase;
            true
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn join(in_flight: &mut Option<InFlight>) -> Result<RenderReport, JoinError> {
    match in_flight {
        Some(flight) => (&mut flight.task).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderedMesh;
    use rackforge_core::{CameraState, PlacedDevice};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockBackend {
        delay: Duration,
        fail: bool,
        active: AtomicUsize,
        max_active: AtomicUsize,
        programs: Mutex<Vec<String>>,
    }

    impl MockBackend {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                delay,
                fail,
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                programs: Mutex::new(Vec::new()),
            })
        }

        fn programs(&self) -> Vec<String> {
            self.programs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RenderBackend for MockBackend {
        async fn render(&self, request: RenderRequest) -> RenderResponse {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            self.programs.lock().unwrap().push(request.program.clone());
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return RenderResponse::failed(RequestId::new(), FailureKind::Kernel, "CGAL error");
            }
            RenderResponse {
                id: RequestId::new(),
                outcome: RenderOutcome::Success(RenderedMesh {
                    data: request.program.into_bytes(),
                    format: request.output_format,
                    stdout: None,
                    stderr: None,
                    render_time_ms: None,
                }),
            }
        }
    }

    fn scene(x: f64) -> RackConfig {
        let mut config = RackConfig::new(1).unwrap();
        config
            .add_device(PlacedDevice::from_catalog("rpi4", x, 0.0).unwrap(), None)
            .unwrap();
        config
    }

    fn program(config: &RackConfig) -> String {
        rackforge_io::serialize(config)
    }

    fn start(backend: Arc<MockBackend>, initial: RackConfig) -> RenderScheduler {
        RenderScheduler::spawn(backend, &KernelConfig::default(), initial)
    }

    #[test]
    fn test_coalescer_transitions() {
        let now = Instant::now();
        let mut machine = Coalescer::new(Duration::from_secs(1));
        assert!(machine.scene_changed(SceneHash(1), now));
        assert_eq!(machine.phase(), Phase::Debouncing);
        assert!(!machine.scene_changed(SceneHash(1), now));

        assert_eq!(machine.timer_fired(), Action::StartRender);
        assert_eq!(machine.phase(), Phase::Rendering);
        assert_eq!(machine.deadline(), None);

        // Edit during render, debounce elapses before it finishes.
        assert!(machine.scene_changed(SceneHash(2), now));
        assert_eq!(machine.phase(), Phase::Rendering);
        assert_eq!(machine.timer_fired(), Action::Wait);
        assert_eq!(machine.phase(), Phase::RenderingWithPendingReplay);
        assert!(machine.scene_changed(SceneHash(3), now));
        assert!(machine.deadline().is_some());

        // The replay covers the edit whose debounce had not yet elapsed.
        assert_eq!(machine.render_finished(), Action::StartRender);
        assert_eq!(machine.phase(), Phase::Rendering);
        assert_eq!(machine.deadline(), None);
        assert_eq!(machine.render_finished(), Action::Wait);
        assert_eq!(machine.phase(), Phase::Idle);

        // Edit during render, render finishes first.
        assert!(machine.scene_changed(SceneHash(4), now));
        assert_eq!(machine.timer_fired(), Action::StartRender);
        assert!(machine.scene_changed(SceneHash(5), now));
        assert_eq!(machine.render_finished(), Action::Wait);
        assert_eq!(machine.phase(), Phase::Debouncing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_renders_once() {
        let backend = MockBackend::new(Duration::from_millis(200), false);
        let scheduler = start(backend.clone(), scene(0.0));
        for i in 1..=5 {
            tokio::time::sleep(Duration::from_millis(300)).await;
            scheduler.update_scene(scene(i as f64));
        }
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(backend.programs(), vec![program(&scene(5.0))]);
        assert_eq!(scheduler.phase(), Phase::Idle);
        let report = scheduler.latest_report().unwrap();
        assert_eq!(report.scene_hash, scene(5.0).snapshot_hash());
        assert!(report.outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_only_edit_is_skipped() {
        let backend = MockBackend::new(Duration::from_millis(200), false);
        let initial = scene(0.0);
        let scheduler = start(backend.clone(), initial.clone());
        let mut reports = scheduler.subscribe_reports();
        reports.changed().await.unwrap();

        let mut same = initial.clone();
        same.camera = Some(CameraState {
            azimuth: 30.0,
            elevation: 15.0,
            distance: 600.0,
        });
        let id = same.devices().next().unwrap().id;
        let mut device = same.remove_device(&id).unwrap().device;
        device.id = uuid::Uuid::new_v4();
        same.add_device(device, None).unwrap();
        scheduler.update_scene(same);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.programs().len(), 1);
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_during_render_converge_on_latest() {
        let backend = MockBackend::new(Duration::from_secs(5), false);
        let scheduler = start(backend.clone(), scene(0.0));

        // First render runs from t=1s to t=6s.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(scheduler.phase(), Phase::Rendering);
        scheduler.update_scene(scene(1.0));
        tokio::time::sleep(Duration::from_millis(500)).await;
        scheduler.update_scene(scene(2.0));
        tokio::time::sleep(Duration::from_millis(500)).await;
        scheduler.update_scene(scene(3.0));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(scheduler.phase(), Phase::RenderingWithPendingReplay);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(
            backend.programs(),
            vec![program(&scene(0.0)), program(&scene(3.0))]
        );
        assert_eq!(backend.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.phase(), Phase::Idle);
        let report = scheduler.latest_report().unwrap();
        assert_eq!(report.scene_hash, scene(3.0).snapshot_hash());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_edit_is_folded_into_replay() {
        let backend = MockBackend::new(Duration::from_secs(5), false);
        let scheduler = start(backend.clone(), scene(0.0));

        // First render runs 1s to 6s. The edit at 2s sets the replay flag at
        // 3s; the edit at 5.5s is still debouncing when the render ends.
        tokio::time::sleep(Duration::from_secs(2)).await;
        scheduler.update_scene(scene(1.0));
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(scheduler.phase(), Phase::RenderingWithPendingReplay);
        scheduler.update_scene(scene(2.0));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(
            backend.programs(),
            vec![program(&scene(0.0)), program(&scene(2.0))]
        );
        assert_eq!(backend.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.phase(), Phase::Idle);
        let report = scheduler.latest_report().unwrap();
        assert_eq!(report.scene_hash, scene(2.0).snapshot_hash());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_after_render_finishes_debounces_again() {
        let backend = MockBackend::new(Duration::from_millis(500), false);
        let scheduler = start(backend.clone(), scene(0.0));

        // Render runs 1.0s to 1.5s; this edit lands at 1.2s.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        scheduler.update_scene(scene(7.0));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(scheduler.phase(), Phase::Debouncing);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            backend.programs(),
            vec![program(&scene(0.0)), program(&scene(7.0))]
        );
        assert_eq!(backend.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_reported_without_retry() {
        let backend = MockBackend::new(Duration::from_millis(100), true);
        let scheduler = start(backend.clone(), scene(0.0));
        let mut reports = scheduler.subscribe_reports();
        reports.changed().await.unwrap();

        let report = reports.borrow().clone().unwrap();
        let failure = report.outcome.failure_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Kernel);
        assert_eq!(failure.message, "CGAL error");

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.programs().len(), 1);
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_finishes_in_flight_render() {
        let backend = MockBackend::new(Duration::from_secs(2), false);
        let scheduler = start(backend.clone(), scene(0.0));
        let reports = scheduler.subscribe_reports();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        scheduler.shutdown().await;
        assert!(reports.borrow().is_some());
        assert_eq!(backend.programs().len(), 1);
    }
}
