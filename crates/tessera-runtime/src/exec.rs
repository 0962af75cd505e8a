use std::any::Any;
use std::mem;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};

use tessera_blocks::RenderLayer;
use tessera_chunk::BlockEntity;
use tessera_geom::Vec3;
use tessera_mesh_cpu::{BuildError, LayerBuffers, mesh_section};

use crate::Shared;
use crate::compiled::CompiledResult;
use crate::crash::CrashReport;
use crate::device::UploadError;
use crate::task::{CompileTask, TaskKind, TaskOutcome};
use crate::upload::UploadJob;

#[derive(Clone, Copy, Debug)]
enum UploadStep {
    Geometry(RenderLayer),
    Indices(RenderLayer),
}

enum PublishPlan {
    Rebuild {
        result: Arc<CompiledResult>,
        global_entities: Vec<BlockEntity>,
    },
    Resort {
        base: Arc<CompiledResult>,
        eye: Vec3,
    },
}

enum Prepared {
    Cancelled,
    Publish(PublishPlan),
    Upload {
        steps: Vec<UploadStep>,
        plan: PublishPlan,
    },
}

/// Off-thread part of a task: fills `pack` and decides what has to be uploaded.
fn prepare(task: &CompileTask, pack: &mut LayerBuffers, shared: &Shared) -> Result<Prepared, BuildError> {
    if task.is_cancelled() {
        return Ok(Prepared::Cancelled);
    }
    let section = task.section();
    match &task.kind {
        TaskKind::Rebuild => {
            if !section.has_all_neighbors(task.camera, shared.columns.as_ref()) {
                log::trace!(target: "scheduler", "section {} waits for neighbours", section.index());
                task.cancel();
                return Ok(Prepared::Cancelled);
            }
            let pos = section.pos();
            let snapshot = task.control.take_snapshot();
            if task.is_cancelled() {
                return Ok(Prepared::Cancelled);
            }
            let mut out = mesh_section(
                pos,
                snapshot.as_ref(),
                task.camera,
                pack,
                shared.generator.as_ref(),
            )?;
            drop(snapshot);
            if task.is_cancelled() {
                return Ok(Prepared::Cancelled);
            }
            let eye = task.camera - pos.origin().to_vec3();
            let global_entities = mem::take(&mut out.global_block_entities);
            let steps: Vec<UploadStep> = out.layers.iter().map(UploadStep::Geometry).collect();
            let plan = PublishPlan::Rebuild {
                result: Arc::new(CompiledResult::from_walk(out, eye)),
                global_entities,
            };
            if steps.is_empty() {
                Ok(Prepared::Publish(plan))
            } else {
                Ok(Prepared::Upload { steps, plan })
            }
        }
        TaskKind::Resort { base } => {
            let Some(state) = base.sort_state() else {
                return Ok(Prepared::Cancelled);
            };
            let eye = task.camera - section.origin().to_vec3();
            let order = state.order_for(eye);
            pack.get_mut(RenderLayer::Translucent).write_quad_order(&order);
            Ok(Prepared::Upload {
                steps: vec![UploadStep::Indices(RenderLayer::Translucent)],
                plan: PublishPlan::Resort {
                    base: base.clone(),
                    eye,
                },
            })
        }
    }
}

/// `prepare` with failures turned into crash reports.
fn prepare_guarded(task: &CompileTask, pack: &mut LayerBuffers, shared: &Shared) -> Prepared {
    match catch_unwind(AssertUnwindSafe(|| prepare(task, pack, shared))) {
        Ok(Ok(prepared)) => prepared,
        Ok(Err(e)) => {
            report_crash(shared, task, e.to_string());
            Prepared::Cancelled
        }
        Err(payload) => {
            report_crash(shared, task, panic_message(&*payload));
            Prepared::Cancelled
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with unknown payload".to_string()
    }
}

fn report_crash(shared: &Shared, task: &CompileTask, message: String) {
    let report = CrashReport {
        section: task.section().pos(),
        task: task.name(),
        message,
    };
    log::error!(target: "scheduler", "{}", report);
    shared.crash_sink.report(report);
}

fn run_step(
    shared: &Shared,
    task: &CompileTask,
    pack: &LayerBuffers,
    step: UploadStep,
) -> Result<(), UploadError> {
    let device = shared.device.as_ref();
    let section = task.section();
    match (step, &task.kind) {
        (UploadStep::Geometry(layer), _) => {
            section.upload_layer(&task.control, device, layer, pack.get(layer))
        }
        (UploadStep::Indices(layer), TaskKind::Resort { base }) => {
            section.upload_sorted_indices(&task.control, base, device, layer, &pack.get(layer).idx)
        }
        (UploadStep::Indices(_), TaskKind::Rebuild) => Ok(()),
    }
}

fn publish(task: &CompileTask, plan: PublishPlan) -> bool {
    match plan {
        PublishPlan::Rebuild {
            result,
            global_entities,
        } => task
            .section()
            .publish_rebuild(&task.control, result, global_entities),
        PublishPlan::Resort { base, eye } => task.section().publish_resort(&task.control, &base, eye),
    }
}

/// Hands the pack back to the coordinator. Anything short of success leaves the task cancelled.
fn finish(shared: &Shared, task: &CompileTask, pack: LayerBuffers, outcome: TaskOutcome) {
    if outcome == TaskOutcome::Cancelled {
        task.cancel();
    }
    log::trace!(
        target: "scheduler",
        "{} of section {} finished: {:?}",
        task.name(),
        task.section().index(),
        outcome
    );
    shared.complete(pack, outcome);
}

struct BatchState {
    pack: Option<LayerBuffers>,
    plan: Option<PublishPlan>,
    remaining: usize,
    failed: bool,
}

/// Uploads of one task. The last step to run publishes and returns the pack.
struct UploadBatch {
    task: CompileTask,
    state: Mutex<BatchState>,
}

impl UploadBatch {
    fn run(&self, step: UploadStep, shared: &Shared) {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !st.failed && !self.task.is_cancelled() && !shared.is_closed() {
            let res = st
                .pack
                .as_ref()
                .map(|pack| run_step(shared, &self.task, pack, step));
            if let Some(Err(e)) = res {
                report_crash(shared, &self.task, format!("{:?} upload failed: {}", step, e));
                st.failed = true;
            }
        }
        st.remaining -= 1;
        if st.remaining > 0 {
            return;
        }
        let pack = st.pack.take();
        let plan = st.plan.take();
        let failed = st.failed;
        drop(st);

        let published =
            !failed && !shared.is_closed() && plan.is_some_and(|plan| publish(&self.task, plan));
        let outcome = if published {
            TaskOutcome::Successful
        } else {
            TaskOutcome::Cancelled
        };
        if let Some(pack) = pack {
            finish(shared, &self.task, pack, outcome);
        }
    }

    fn take_pack(&self) -> Option<LayerBuffers> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pack
            .take()
    }
}

/// Worker entry point. Always ends with exactly one completion for `pack`.
pub(crate) fn run_task(task: CompileTask, mut pack: LayerBuffers, shared: Arc<Shared>) {
    match prepare_guarded(&task, &mut pack, &shared) {
        Prepared::Cancelled => finish(&shared, &task, pack, TaskOutcome::Cancelled),
        Prepared::Publish(plan) => {
            let outcome = if !shared.is_closed() && publish(&task, plan) {
                TaskOutcome::Successful
            } else {
                TaskOutcome::Cancelled
            };
            finish(&shared, &task, pack, outcome);
        }
        Prepared::Upload { steps, plan } => {
            let batch = Arc::new(UploadBatch {
                task,
                state: Mutex::new(BatchState {
                    pack: Some(pack),
                    plan: Some(plan),
                    remaining: steps.len(),
                    failed: false,
                }),
            });
            let jobs: Vec<UploadJob> = steps
                .into_iter()
                .map(|step| {
                    let batch = batch.clone();
                    let shared = shared.clone();
                    Box::new(move || batch.run(step, &shared)) as UploadJob
                })
                .collect();
            if let Err(rejected) = shared.uploads.push_all(jobs) {
                drop(rejected);
                if let Some(pack) = batch.take_pack() {
                    finish(&shared, &batch.task, pack, TaskOutcome::Cancelled);
                }
            }
        }
    }
}

/// Runs a task to completion on the calling thread, uploading inline.
pub(crate) fn run_inline(task: &CompileTask, pack: &mut LayerBuffers, shared: &Shared) -> TaskOutcome {
    let outcome = match prepare_guarded(task, pack, shared) {
        Prepared::Cancelled => TaskOutcome::Cancelled,
        Prepared::Publish(plan) => {
            if publish(task, plan) {
                TaskOutcome::Successful
            } else {
                TaskOutcome::Cancelled
            }
        }
        Prepared::Upload { steps, plan } => {
            let mut ok = true;
            for step in steps {
                if task.is_cancelled() {
                    ok = false;
                    break;
                }
                if let Err(e) = run_step(shared, task, pack, step) {
                    report_crash(shared, task, format!("{:?} upload failed: {}", step, e));
                    ok = false;
                    break;
                }
            }
            if ok && publish(task, plan) {
                TaskOutcome::Successful
            } else {
                TaskOutcome::Cancelled
            }
        }
    };
    if outcome == TaskOutcome::Cancelled {
        task.cancel();
    }
    outcome
}
