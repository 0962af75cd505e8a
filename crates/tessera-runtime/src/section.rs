use std::mem;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tessera_blocks::RenderLayer;
use tessera_chunk::{BlockEntity, NeighborsLoaded, RegionSnapshot, SectionPos};
use tessera_geom::{Aabb, BlockPos, Vec3};
use tessera_mesh_cpu::{Face, StagingBuffer};

use crate::ColumnPresence;
use crate::compiled::CompiledResult;
use crate::device::{GpuBuffer, GpuDevice, UploadError};
use crate::globals::GlobalRenderables;
use crate::task::{CompileTask, TaskControl, TaskKind};

/// Within this squared distance of the camera a section builds without waiting for neighbours.
pub const NEIGHBOR_CHECK_DISTANCE_SQ: f64 = 24.0 * 24.0;
/// Cancelled first compiles after which the next rebuild is high priority and
/// no longer superseded by newer rebuilds.
pub const ESCALATE_AFTER_CANCELS: u32 = 3;

#[derive(Default)]
struct DirtyFlags {
    dirty: bool,
    from_player: bool,
}

#[derive(Default)]
struct PendingTasks {
    rebuild: Option<Arc<TaskControl>>,
    resort: Option<Arc<TaskControl>>,
    /// Superseded escalated rebuilds that keep running until they publish.
    escalated: Vec<Arc<TaskControl>>,
    initial_compile_cancels: u32,
    issued: u64,
    /// Generation of the rebuild whose result is currently published.
    published: u64,
}

impl PendingTasks {
    /// Cancels the pending resort and rebuild, except that a live escalated rebuild is
    /// kept running. Returns true when a rebuild was cancelled by this call.
    fn cancel_all(&mut self) -> bool {
        let mut rebuild = false;
        if let Some(c) = self.rebuild.take() {
            if c.is_uncancellable() && !c.is_cancelled() {
                self.escalated.push(c);
            } else {
                rebuild = c.cancel();
            }
        }
        self.escalated.retain(|c| !c.is_cancelled());
        self.cancel_resort();
        rebuild
    }

    /// Cancels everything, escalated rebuilds included.
    fn cancel_all_hard(&mut self) -> bool {
        let mut rebuild = self.rebuild.take().is_some_and(|c| c.cancel());
        for c in self.escalated.drain(..) {
            rebuild |= c.cancel();
        }
        self.cancel_resort();
        rebuild
    }

    fn cancel_resort(&mut self) {
        if let Some(c) = self.resort.take() {
            c.cancel();
        }
    }

    /// A rebuild older than the published one must neither upload nor publish.
    fn is_superseded(&self, control: &TaskControl) -> bool {
        control.generation() < self.published
    }
}

/// One 16³ volume of the render grid. Shared between the render thread,
/// the coordinator and workers; all state sits behind its own lock.
pub struct Section {
    index: usize,
    pos: RwLock<SectionPos>,
    dirty: Mutex<DirtyFlags>,
    tasks: Mutex<PendingTasks>,
    compiled: RwLock<Arc<CompiledResult>>,
    buffers: Mutex<[Option<Box<dyn GpuBuffer>>; RenderLayer::COUNT]>,
    global_entities: Mutex<Vec<BlockEntity>>,
    globals: Arc<GlobalRenderables>,
}

impl Section {
    pub fn new(index: usize, pos: SectionPos, globals: Arc<GlobalRenderables>) -> Arc<Self> {
        Arc::new(Self {
            index,
            pos: RwLock::new(pos),
            dirty: Mutex::new(DirtyFlags {
                dirty: true,
                from_player: false,
            }),
            tasks: Mutex::new(PendingTasks::default()),
            compiled: RwLock::new(Arc::new(CompiledResult::uncompiled())),
            buffers: Mutex::new(std::array::from_fn(|_| None)),
            global_entities: Mutex::new(Vec::new()),
            globals,
        })
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pos(&self) -> SectionPos {
        *self.pos.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn origin(&self) -> BlockPos {
        self.pos().origin()
    }

    /// Moves the section. A real move drops everything derived from the old position.
    /// Tasks are cancelled before the new position becomes visible, so a worker that
    /// reads the new position always sees its task cancelled.
    pub fn set_origin(&self, pos: SectionPos) -> bool {
        if self.pos() == pos {
            return false;
        }
        self.reset();
        *self.pos.write().unwrap_or_else(PoisonError::into_inner) = pos;
        self.mark_dirty(false);
        true
    }

    fn reset(&self) {
        {
            let mut tasks = self.lock_tasks();
            tasks.cancel_all_hard();
            tasks.initial_compile_cancels = 0;
            *self.compiled.write().unwrap_or_else(PoisonError::into_inner) =
                Arc::new(CompiledResult::uncompiled());
        }
        let old = mem::take(
            &mut *self
                .global_entities
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        self.globals.update(&old, &[]);
    }

    pub fn bounding_box(&self) -> Aabb {
        self.pos().bounds()
    }

    pub fn distance_sq(&self, camera: Vec3) -> f64 {
        self.pos().center().distance_sq_f64(camera)
    }

    pub fn compiled(&self) -> Arc<CompiledResult> {
        self.compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn visible_through(&self, a: Face, b: Face) -> bool {
        self.compiled().faces_can_see(a, b)
    }

    pub fn global_block_entities(&self) -> Vec<BlockEntity> {
        self.global_entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn mark_dirty(&self, from_player: bool) {
        let mut d = self.dirty.lock().unwrap_or_else(PoisonError::into_inner);
        let was_dirty = d.dirty;
        d.dirty = true;
        d.from_player = from_player || (was_dirty && d.from_player);
    }

    pub fn set_not_dirty(&self) {
        let mut d = self.dirty.lock().unwrap_or_else(PoisonError::into_inner);
        d.dirty = false;
        d.from_player = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.lock().unwrap_or_else(PoisonError::into_inner).dirty
    }

    pub fn is_dirty_from_player(&self) -> bool {
        let d = self.dirty.lock().unwrap_or_else(PoisonError::into_inner);
        d.dirty && d.from_player
    }

    pub fn initial_compile_cancels(&self) -> u32 {
        self.lock_tasks().initial_compile_cancels
    }

    /// True while a rebuild issued by this section is still live.
    pub fn has_pending_rebuild(&self) -> bool {
        self.lock_tasks()
            .rebuild
            .as_ref()
            .is_some_and(|c| !c.is_cancelled())
    }

    /// Near sections always build; far ones wait until all four lateral columns are loaded.
    pub fn has_all_neighbors(&self, camera: Vec3, columns: &dyn ColumnPresence) -> bool {
        if self.distance_sq(camera) <= NEIGHBOR_CHECK_DISTANCE_SQ {
            return true;
        }
        let p = self.pos();
        NeighborsLoaded::horizontal(
            columns.is_column_loaded(p.sx - 1, p.sz),
            columns.is_column_loaded(p.sx + 1, p.sz),
            columns.is_column_loaded(p.sx, p.sz - 1),
            columns.is_column_loaded(p.sx, p.sz + 1),
        )
        .all()
    }

    /// Replaces any pending work with a new rebuild. Once the first compile has been
    /// cancelled `ESCALATE_AFTER_CANCELS` times the rebuild is escalated: it goes to the
    /// high tier and later rebuilds no longer cancel it.
    pub fn create_compile_task(
        self: &Arc<Self>,
        snapshot: Option<RegionSnapshot>,
        camera: Vec3,
        player_caused: bool,
    ) -> CompileTask {
        let (control, cancelled_rebuild, escalated) = {
            let mut tasks = self.lock_tasks();
            let had_rebuild = tasks.rebuild.is_some();
            let cancelled_rebuild = tasks.cancel_all();
            if had_rebuild && !self.compiled().is_compiled() {
                tasks.initial_compile_cancels += 1;
            }
            let escalated = tasks.initial_compile_cancels >= ESCALATE_AFTER_CANCELS;
            tasks.issued += 1;
            let control = TaskControl::rebuild(snapshot, tasks.issued, escalated);
            tasks.rebuild = Some(control.clone());
            (control, cancelled_rebuild, escalated)
        };
        if cancelled_rebuild {
            self.mark_dirty(false);
        }
        if escalated && !player_caused {
            log::debug!(target: "scheduler", "section {} escalated after repeated initial cancels", self.index);
        }
        CompileTask::new(
            self.clone(),
            control,
            TaskKind::Rebuild,
            camera,
            player_caused || escalated,
        )
    }

    /// Replaces a pending resort. Returns `None` when the current result has nothing to sort.
    pub fn create_resort_task(self: &Arc<Self>, camera: Vec3) -> Option<CompileTask> {
        let mut tasks = self.lock_tasks();
        tasks.cancel_resort();
        let base = self.compiled();
        if !base.can_resort() {
            return None;
        }
        let control = TaskControl::new(None);
        tasks.resort = Some(control.clone());
        drop(tasks);
        Some(CompileTask::new(
            self.clone(),
            control,
            TaskKind::Resort { base },
            camera,
            true,
        ))
    }

    /// Cancels the in-flight work of this section. An escalated rebuild keeps running;
    /// only `release_buffers`, `set_origin` and scheduler disposal stop it.
    pub fn cancel_tasks(&self) -> bool {
        let cancelled_rebuild = self.lock_tasks().cancel_all();
        if cancelled_rebuild {
            self.mark_dirty(false);
        }
        cancelled_rebuild
    }

    pub(crate) fn cancel_task(&self, control: &TaskControl, rebuild: bool) {
        let first = {
            let _tasks = self.lock_tasks();
            control.cancel()
        };
        if first && rebuild {
            self.mark_dirty(false);
        }
    }

    /// Swaps in a rebuild result unless the task was cancelled. Runs under the task lock so
    /// a concurrent cancel either happens before (no publish) or after (publish stands).
    pub(crate) fn publish_rebuild(
        &self,
        control: &Arc<TaskControl>,
        result: Arc<CompiledResult>,
        global_entities: Vec<BlockEntity>,
    ) -> bool {
        let mut tasks = self.lock_tasks();
        if control.is_cancelled() {
            return false;
        }
        if tasks.is_superseded(control) {
            control.cancel();
            return false;
        }
        *self.compiled.write().unwrap_or_else(PoisonError::into_inner) = result;
        tasks.published = control.generation();
        tasks.initial_compile_cancels = 0;
        if tasks
            .rebuild
            .as_ref()
            .is_some_and(|c| Arc::ptr_eq(c, control))
        {
            tasks.rebuild = None;
        }
        tasks.escalated.retain(|c| !Arc::ptr_eq(c, control));
        // A pending resort reorders the replaced geometry.
        tasks.cancel_resort();
        let old = mem::replace(
            &mut *self
                .global_entities
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            global_entities.clone(),
        );
        self.globals.update(&old, &global_entities);
        true
    }

    /// Publishes a resorted copy of `base`, but only while `base` is still current.
    pub(crate) fn publish_resort(
        &self,
        control: &Arc<TaskControl>,
        base: &Arc<CompiledResult>,
        eye: Vec3,
    ) -> bool {
        let mut tasks = self.lock_tasks();
        if control.is_cancelled() {
            return false;
        }
        let mut current = self.compiled.write().unwrap_or_else(PoisonError::into_inner);
        if !Arc::ptr_eq(&*current, base) {
            return false;
        }
        *current = Arc::new(base.resorted(eye));
        if tasks
            .resort
            .as_ref()
            .is_some_and(|c| Arc::ptr_eq(c, control))
        {
            tasks.resort = None;
        }
        true
    }

    /// Uploads rebuilt geometry unless the rebuild was cancelled or a newer one has
    /// already published. A superseded rebuild is cancelled here.
    pub(crate) fn upload_layer(
        &self,
        control: &TaskControl,
        device: &dyn GpuDevice,
        layer: RenderLayer,
        staging: &StagingBuffer,
    ) -> Result<(), UploadError> {
        let tasks = self.lock_tasks();
        if control.is_cancelled() {
            return Ok(());
        }
        if tasks.is_superseded(control) {
            control.cancel();
            return Ok(());
        }
        self.with_buffer(device, layer, |buf| buf.upload(staging))
    }

    /// Uploads resorted indices, but only onto the geometry of `base`. Indices of a
    /// replaced result would point past the vertices now in the buffer.
    pub(crate) fn upload_sorted_indices(
        &self,
        control: &TaskControl,
        base: &Arc<CompiledResult>,
        device: &dyn GpuDevice,
        layer: RenderLayer,
        indices: &[u32],
    ) -> Result<(), UploadError> {
        let _tasks = self.lock_tasks();
        if control.is_cancelled() {
            return Ok(());
        }
        if !Arc::ptr_eq(&self.compiled(), base) {
            control.cancel();
            return Ok(());
        }
        self.with_buffer(device, layer, |buf| buf.upload_indices(indices))
    }

    fn with_buffer(
        &self,
        device: &dyn GpuDevice,
        layer: RenderLayer,
        f: impl FnOnce(&mut dyn GpuBuffer) -> Result<(), UploadError>,
    ) -> Result<(), UploadError> {
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = &mut buffers[layer.index()];
        let mut buf = match slot.take() {
            Some(buf) => buf,
            None => device.create_buffer(layer)?,
        };
        let res = f(buf.as_mut());
        *slot = Some(buf);
        res
    }

    pub fn has_buffer(&self, layer: RenderLayer) -> bool {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)[layer.index()].is_some()
    }

    /// Cancels work, forgets the compiled result and closes the GPU buffers. Render thread only.
    pub fn release_buffers(&self) {
        self.reset();
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        for (i, slot) in buffers.iter_mut().enumerate() {
            if let Some(mut buf) = slot.take() {
                if let Err(e) = buf.close() {
                    log::warn!(
                        target: "scheduler",
                        "closing {} buffer of section {} failed: {}",
                        RenderLayer::ALL[i].name(),
                        self.index,
                        e
                    );
                }
            }
        }
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, PendingTasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Section")
            .field("index", &self.index)
            .field("pos", &self.pos())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
