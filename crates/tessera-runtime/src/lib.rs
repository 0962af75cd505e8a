//! Section build scheduling: priority queues, worker dispatch, GPU hand-off.
#![forbid(unsafe_code)]

mod buffer_pool;
mod compiled;
mod crash;
mod device;
mod exec;
mod globals;
mod queue;
mod section;
mod task;
mod upload;

pub use buffer_pool::{BufferPool, BufferPoolStats};
pub use compiled::CompiledResult;
pub use crash::{CrashReport, CrashSink, DeferredCrashSink};
pub use device::{GpuBuffer, GpuDevice, UploadError};
pub use globals::GlobalRenderables;
pub use queue::DEFAULT_HIGH_PRIORITY_QUOTA;
pub use section::{ESCALATE_AFTER_CANCELS, NEIGHBOR_CHECK_DISTANCE_SQ, Section};
pub use task::{CompileTask, TaskOutcome};

use std::error::Error;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendError, Sender, bounded, unbounded};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tessera_chunk::{RegionSnapshot, SectionPos};
use tessera_geom::Vec3;
use tessera_mesh_cpu::{GeometryGenerator, LayerBuffers};

use crate::queue::TaskQueues;
use crate::upload::UploadQueue;

/// Which world columns currently have data. Consulted by workers for neighbour gating.
pub trait ColumnPresence: Send + Sync {
    fn is_column_loaded(&self, cx: i32, cz: i32) -> bool;
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub workers: usize,
    pub buffer_packs: usize,
    pub high_priority_quota: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .saturating_sub(1)
            .max(1);
        Self {
            workers,
            buffer_packs: workers,
            high_priority_quota: DEFAULT_HIGH_PRIORITY_QUOTA,
        }
    }
}

/// Everything the scheduler calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn GeometryGenerator>,
    pub columns: Arc<dyn ColumnPresence>,
    pub device: Arc<dyn GpuDevice>,
    pub crash_sink: Arc<dyn CrashSink>,
}

#[derive(Debug)]
pub enum SchedulerError {
    WorkerPool(ThreadPoolBuildError),
    Coordinator(io::Error),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::WorkerPool(e) => write!(f, "failed to build worker pool: {}", e),
            SchedulerError::Coordinator(e) => write!(f, "failed to start coordinator: {}", e),
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SchedulerError::WorkerPool(e) => Some(e),
            SchedulerError::Coordinator(e) => Some(e),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub queued: usize,
    pub pending_uploads: usize,
    pub free_buffers: usize,
    pub in_flight: usize,
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queued={} uploads={} free_buffers={} in_flight={}",
            self.queued, self.pending_uploads, self.free_buffers, self.in_flight
        )
    }
}

enum Command {
    Schedule(CompileTask),
    Completed {
        pack: LayerBuffers,
        outcome: TaskOutcome,
    },
    Dispose {
        ack: Sender<()>,
    },
}

/// State reachable from the coordinator, workers and upload jobs.
pub(crate) struct Shared {
    pub(crate) generator: Arc<dyn GeometryGenerator>,
    pub(crate) columns: Arc<dyn ColumnPresence>,
    pub(crate) device: Arc<dyn GpuDevice>,
    pub(crate) crash_sink: Arc<dyn CrashSink>,
    pub(crate) uploads: UploadQueue,
    pool: Arc<BufferPool>,
    closed: AtomicBool,
    queued: AtomicUsize,
    in_flight: AtomicUsize,
    cmd_tx: Sender<Command>,
}

impl Shared {
    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn complete(&self, pack: LayerBuffers, outcome: TaskOutcome) {
        if let Err(SendError(cmd)) = self.cmd_tx.send(Command::Completed { pack, outcome }) {
            // Coordinator already gone; settle the pack here.
            if let Command::Completed { pack, outcome } = cmd {
                self.settle(pack, outcome);
            }
        }
    }

    fn settle(&self, pack: LayerBuffers, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Successful => self.pool.release(pack),
            TaskOutcome::Cancelled => self.pool.discard(pack),
        }
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Single thread that owns the queues and is the only one acquiring packs.
struct Coordinator {
    rx: Receiver<Command>,
    queues: TaskQueues,
    workers: ThreadPool,
    shared: Arc<Shared>,
    dispose_ack: Option<Sender<()>>,
}

impl Coordinator {
    fn run(mut self) {
        while let Ok(cmd) = self.rx.recv() {
            match cmd {
                Command::Schedule(task) => {
                    if self.dispose_ack.is_some() {
                        task.cancel();
                        self.shared.queued.fetch_sub(1, Ordering::AcqRel);
                    } else {
                        self.queues.push(task);
                    }
                }
                Command::Completed { pack, outcome } => self.shared.settle(pack, outcome),
                Command::Dispose { ack } => {
                    let dropped = self.queues.drain();
                    for task in &dropped {
                        task.cancel();
                    }
                    self.shared.queued.fetch_sub(dropped.len(), Ordering::AcqRel);
                    log::debug!(
                        target: "scheduler",
                        "dispose: cancelled {} queued tasks, {} in flight",
                        dropped.len(),
                        self.shared.in_flight.load(Ordering::Acquire)
                    );
                    self.dispose_ack = Some(ack);
                }
            }
            if let Some(ack) = &self.dispose_ack {
                if self.shared.in_flight.load(Ordering::Acquire) == 0 {
                    let _ = ack.send(());
                    break;
                }
                continue;
            }
            self.advance();
        }
        log::debug!(target: "scheduler", "coordinator stopped");
    }

    /// Dispatches until the queues run dry or every pack is out. `in_flight` is raised
    /// before `queued` drops so the two never read as idle together mid-dispatch.
    /// Rebuilds of far sections with missing neighbour columns are cancelled here,
    /// before a pack is taken for them.
    fn advance(&mut self) {
        while !self.shared.is_closed() && !self.queues.is_empty() && self.shared.pool.has_free() {
            let before = self.queues.len();
            let next = self.queues.pop_next();
            let removed = before - self.queues.len();
            let Some(task) = next else {
                self.shared.queued.fetch_sub(removed, Ordering::AcqRel);
                break;
            };
            if task.is_rebuild()
                && !task
                    .section()
                    .has_all_neighbors(task.camera, self.shared.columns.as_ref())
            {
                log::trace!(
                    target: "scheduler",
                    "section {} waits for neighbours",
                    task.section().index()
                );
                task.cancel();
                self.shared.queued.fetch_sub(removed, Ordering::AcqRel);
                continue;
            }
            let Some(pack) = self.shared.pool.acquire() else {
                self.queues.push(task);
                self.shared.queued.fetch_sub(removed - 1, Ordering::AcqRel);
                break;
            };
            self.shared.in_flight.fetch_add(1, Ordering::AcqRel);
            self.shared.queued.fetch_sub(removed, Ordering::AcqRel);
            log::trace!(target: "scheduler", "dispatch {:?}", task);
            let shared = self.shared.clone();
            self.workers
                .spawn(move || exec::run_task(task, pack, shared));
        }
    }
}

pub struct Scheduler {
    shared: Arc<Shared>,
    globals: Arc<GlobalRenderables>,
    camera: Mutex<Vec3>,
    /// Pack reserved for synchronous compiles on the render thread.
    fixed_pack: Mutex<LayerBuffers>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        pool: Arc<BufferPool>,
        collab: Collaborators,
    ) -> Result<Self, SchedulerError> {
        let workers = ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("tessera-mesh-{i}"))
            .build()
            .map_err(SchedulerError::WorkerPool)?;
        let (cmd_tx, cmd_rx) = unbounded::<Command>();
        let shared = Arc::new(Shared {
            generator: collab.generator,
            columns: collab.columns,
            device: collab.device,
            crash_sink: collab.crash_sink,
            uploads: UploadQueue::new(),
            pool,
            closed: AtomicBool::new(false),
            queued: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            cmd_tx,
        });
        let coordinator = Coordinator {
            rx: cmd_rx,
            queues: TaskQueues::new(config.high_priority_quota),
            workers,
            shared: shared.clone(),
            dispose_ack: None,
        };
        let handle = thread::Builder::new()
            .name("tessera-coordinator".into())
            .spawn(move || coordinator.run())
            .map_err(SchedulerError::Coordinator)?;
        log::info!(
            target: "scheduler",
            "scheduler started: workers={} buffer_packs={} quota={}",
            config.workers.max(1),
            shared.pool.capacity(),
            config.high_priority_quota
        );
        Ok(Self {
            shared,
            globals: Arc::new(GlobalRenderables::new()),
            camera: Mutex::new(Vec3::ZERO),
            fixed_pack: Mutex::new(LayerBuffers::new()),
            coordinator: Mutex::new(Some(handle)),
        })
    }

    /// Builds the buffer pool from `config.buffer_packs`.
    pub fn with_config(config: SchedulerConfig, collab: Collaborators) -> Result<Self, SchedulerError> {
        let pool = Arc::new(BufferPool::new(config.buffer_packs));
        Self::new(config, pool, collab)
    }

    /// New section wired to this scheduler's global renderable registry.
    pub fn create_section(&self, index: usize, pos: SectionPos) -> Arc<Section> {
        Section::new(index, pos, self.globals.clone())
    }

    pub fn globals(&self) -> &Arc<GlobalRenderables> {
        &self.globals
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.shared.pool
    }

    pub fn set_camera(&self, pos: Vec3) {
        *self.camera.lock().unwrap_or_else(PoisonError::into_inner) = pos;
    }

    pub fn camera(&self) -> Vec3 {
        *self.camera.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn mark_dirty(&self, section: &Section, caused_by_player: bool) {
        section.mark_dirty(caused_by_player);
    }

    /// Queues a rebuild of `section`; `None` stands for an all-air region.
    pub fn schedule(&self, section: &Arc<Section>, snapshot: Option<RegionSnapshot>) {
        let player = section.is_dirty_from_player();
        let task = section.create_compile_task(snapshot, self.camera(), player);
        section.set_not_dirty();
        self.submit(task);
    }

    /// Queues a translucency resort. Returns false when the section has nothing to sort.
    pub fn schedule_resort(&self, section: &Arc<Section>) -> bool {
        match section.create_resort_task(self.camera()) {
            Some(task) => {
                self.submit(task);
                true
            }
            None => false,
        }
    }

    fn submit(&self, task: CompileTask) {
        if self.shared.is_closed() {
            task.cancel();
            return;
        }
        self.shared.queued.fetch_add(1, Ordering::AcqRel);
        if let Err(SendError(cmd)) = self.shared.cmd_tx.send(Command::Schedule(task)) {
            self.shared.queued.fetch_sub(1, Ordering::AcqRel);
            if let Command::Schedule(task) = cmd {
                task.cancel();
            }
        }
    }

    /// Builds, uploads and publishes `section` on the calling thread.
    pub fn compile_synchronously(
        &self,
        section: &Arc<Section>,
        snapshot: Option<RegionSnapshot>,
    ) -> TaskOutcome {
        let task = section.create_compile_task(snapshot, self.camera(), true);
        section.set_not_dirty();
        if self.shared.is_closed() {
            task.cancel();
            return TaskOutcome::Cancelled;
        }
        let mut pack = self.fixed_pack.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = exec::run_inline(&task, &mut pack, &self.shared);
        pack.clear_all();
        outcome
    }

    /// Runs the upload jobs queued at call time. Render thread only.
    pub fn upload_all_pending(&self) -> usize {
        let jobs = self.shared.uploads.take_all();
        let n = jobs.len();
        for job in jobs {
            job();
        }
        n
    }

    pub fn is_queue_empty(&self) -> bool {
        self.shared.queued.load(Ordering::Acquire) == 0 && self.shared.uploads.is_empty()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queued: self.shared.queued.load(Ordering::Acquire),
            pending_uploads: self.shared.uploads.len(),
            free_buffers: self.shared.pool.free_count(),
            in_flight: self.shared.in_flight.load(Ordering::Acquire),
        }
    }

    /// Stops scheduling, cancels queued work and waits for every in-flight pack.
    /// Must be called from the render thread, which drains the remaining uploads.
    pub fn dispose(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.uploads.close();
        let (ack_tx, ack_rx) = bounded::<()>(1);
        if self.shared.cmd_tx.send(Command::Dispose { ack: ack_tx }).is_ok() {
            loop {
                self.upload_all_pending();
                match ack_rx.recv_timeout(Duration::from_millis(2)) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => continue,
                }
            }
        }
        self.upload_all_pending();
        let handle = self
            .coordinator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!(target: "scheduler", "coordinator thread panicked");
            }
        }
        log::info!(target: "scheduler", "scheduler disposed: {}", self.stats());
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}
