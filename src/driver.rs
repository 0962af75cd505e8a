use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hashbrown::HashSet;
use tessera_blocks::{Block, BlockRegistry};
use tessera_chunk::{RegionSnapshot, SECTION_SIZE_I32, SectionPos};
use tessera_geom::{BlockPos, Vec3};
use tessera_mesh_cpu::CubeGenerator;
use tessera_runtime::{
    Collaborators, DeferredCrashSink, Scheduler, SchedulerConfig, Section, TaskOutcome,
};

use crate::config::DriverConfig;
use crate::gpu::HeadlessDevice;
use crate::grid::SectionGrid;
use crate::world::{DemoWorld, SEA_LEVEL};

/// Player-caused rebuilds closer than this (squared blocks) run on the render thread.
const SYNC_COMPILE_DISTANCE_SQ: f64 = 768.0;
const RESORT_BUDGET: usize = 15;
const RESORT_MIN_MOVE_SQ: f32 = 1.0;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
/// Eye height in blocks, a little above the terrain band.
const CAMERA_HEIGHT: i32 = SEA_LEVEL + 2 * SECTION_SIZE_I32 - 6;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub ticks: u32,
    pub loaded_columns: usize,
    pub scheduled: usize,
    pub sync_compiles: usize,
    pub resorts: usize,
    pub compiled_sections: usize,
    pub empty_sections: usize,
    pub buffer_uploads: u64,
    pub index_uploads: u64,
    pub bytes_uploaded: u64,
    pub global_entities: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ticks:             {}", self.ticks)?;
        writeln!(f, "loaded columns:    {}", self.loaded_columns)?;
        writeln!(f, "scheduled builds:  {}", self.scheduled)?;
        writeln!(f, "sync compiles:     {}", self.sync_compiles)?;
        writeln!(f, "resorts:           {}", self.resorts)?;
        writeln!(
            f,
            "sections:          {} with geometry, {} empty",
            self.compiled_sections, self.empty_sections
        )?;
        writeln!(
            f,
            "uploads:           {} buffers, {} index sets, {} bytes",
            self.buffer_uploads, self.index_uploads, self.bytes_uploaded
        )?;
        write!(f, "global entities:   {}", self.global_entities)
    }
}

#[derive(Default)]
struct Counters {
    scheduled: usize,
    sync_compiles: usize,
    resorts: usize,
}

pub struct Driver {
    cfg: DriverConfig,
    world: Arc<DemoWorld>,
    device: HeadlessDevice,
    crash_sink: Arc<DeferredCrashSink>,
    sched: Scheduler,
    grid: SectionGrid,
    camera: Vec3,
    last_resort_eye: Vec3,
    glass: Block,
    counters: Counters,
}

impl Driver {
    pub fn new(cfg: DriverConfig, reg: Arc<BlockRegistry>) -> Result<Self, Box<dyn Error>> {
        let world = Arc::new(DemoWorld::new(cfg.seed, &reg));
        let device = HeadlessDevice::new();
        let crash_sink = Arc::new(DeferredCrashSink::new());
        let mut sched_cfg = SchedulerConfig::default();
        if cfg.workers > 0 {
            sched_cfg.workers = cfg.workers;
        }
        sched_cfg.buffer_packs = if cfg.buffer_packs > 0 {
            cfg.buffer_packs
        } else {
            sched_cfg.workers
        };
        let glass = reg.block("glass").unwrap_or(Block::AIR);
        let sched = Scheduler::with_config(
            sched_cfg,
            Collaborators {
                generator: Arc::new(CubeGenerator::new(reg)),
                columns: world.clone(),
                device: Arc::new(device.clone()),
                crash_sink: crash_sink.clone(),
            },
        )?;
        let camera = Vec3::new(8.0, CAMERA_HEIGHT as f32, 8.0);
        sched.set_camera(camera);
        let grid = SectionGrid::new(&sched, cfg.view_radius, cfg.height_sections, camera);
        log::info!(target: "driver", "section grid: {} sections", grid.len());
        Ok(Self {
            cfg,
            world,
            device,
            crash_sink,
            sched,
            grid,
            camera,
            last_resort_eye: camera,
            glass,
            counters: Counters::default(),
        })
    }

    /// Runs the configured number of ticks, then drains and shuts the scheduler down.
    pub fn run(mut self) -> Result<Summary, Box<dyn Error>> {
        let tick_sleep = Duration::from_millis(self.cfg.tick_ms);
        for tick in 0..self.cfg.ticks {
            self.tick(tick)?;
            if !tick_sleep.is_zero() {
                thread::sleep(tick_sleep);
            }
        }
        self.drain()?;
        self.sched.dispose();
        self.grid.release_all();
        Ok(self.summary())
    }

    fn tick(&mut self, tick: u32) -> Result<(), Box<dyn Error>> {
        self.camera.x += self.cfg.camera_speed;
        self.sched.set_camera(self.camera);

        let loaded = self.world.stream_around(
            self.camera,
            self.cfg.view_radius,
            self.cfg.stream_columns_per_tick,
        );
        for (cx, cz) in loaded {
            self.dirty_around_column(cx, cz);
        }
        let moved = self.grid.reposition(self.camera);
        if moved > 0 {
            log::debug!(target: "driver", "grid recentred, {} sections moved", moved);
        }

        if self.cfg.edit_every > 0 && tick > 0 && tick % self.cfg.edit_every == 0 {
            self.player_edit();
        }

        self.compile_dirty();
        self.resort_near();
        self.sched.upload_all_pending();
        self.check_crash()?;

        if self.cfg.stats_every > 0 && tick % self.cfg.stats_every == 0 {
            log::info!(
                target: "driver",
                "tick {} camera=({:.1}, {:.1}) columns={} {}",
                tick,
                self.camera.x,
                self.camera.z,
                self.world.loaded_columns(),
                self.sched.stats()
            );
        }
        Ok(())
    }

    /// A new column changes the border of every section next to it.
    fn dirty_around_column(&self, cx: i32, cz: i32) {
        for dz in -1..=1 {
            for dx in -1..=1 {
                for sy in 0..self.cfg.height_sections {
                    if let Some(s) = self.grid.section_at(SectionPos::new(cx + dx, sy, cz + dz)) {
                        self.sched.mark_dirty(s, false);
                    }
                }
            }
        }
    }

    fn player_edit(&self) {
        let eye = BlockPos::new(
            self.camera.x.floor() as i32,
            self.camera.y.floor() as i32,
            self.camera.z.floor() as i32,
        );
        let pos = eye.offset(3, -2, 1);
        self.world.set_block(pos, self.glass);
        let mut touched = HashSet::new();
        for dy in -1..=1 {
            for dz in -1..=1 {
                for dx in -1..=1 {
                    touched.insert(SectionPos::from_block(pos.offset(dx, dy, dz)));
                }
            }
        }
        for sp in touched {
            if let Some(s) = self.grid.section_at(sp) {
                self.sched.mark_dirty(s, true);
            }
        }
        log::debug!(target: "driver", "placed glass at {:?}", pos);
    }

    fn by_distance(&self) -> Vec<Arc<Section>> {
        let mut sections = self.grid.sections().to_vec();
        let eye = self.camera;
        sections.sort_by(|a, b| a.distance_sq(eye).total_cmp(&b.distance_sq(eye)));
        sections
    }

    fn compile_dirty(&mut self) {
        for section in self.by_distance() {
            if !section.is_dirty() || !section.has_all_neighbors(self.camera, &*self.world) {
                continue;
            }
            let snapshot = RegionSnapshot::capture(&*self.world, section.pos());
            if section.is_dirty_from_player()
                && section.distance_sq(self.camera) < SYNC_COMPILE_DISTANCE_SQ
            {
                self.counters.sync_compiles += 1;
                if self.sched.compile_synchronously(&section, snapshot) == TaskOutcome::Cancelled {
                    log::debug!(
                        target: "driver",
                        "synchronous compile of {:?} cancelled",
                        section.pos()
                    );
                }
            } else {
                self.counters.scheduled += 1;
                self.sched.schedule(&section, snapshot);
            }
        }
    }

    fn resort_near(&mut self) {
        let delta = self.camera - self.last_resort_eye;
        if delta.length_sq() <= RESORT_MIN_MOVE_SQ {
            return;
        }
        self.last_resort_eye = self.camera;
        let mut budget = RESORT_BUDGET;
        for section in self.by_distance() {
            if budget == 0 {
                break;
            }
            if !section.compiled().can_resort() {
                continue;
            }
            if self.sched.schedule_resort(&section) {
                self.counters.resorts += 1;
                budget -= 1;
            }
        }
    }

    fn check_crash(&self) -> Result<(), Box<dyn Error>> {
        match self.crash_sink.take() {
            Some(report) => {
                log::error!(target: "driver", "mesh build crashed: {}", report);
                self.sched.dispose();
                Err(report.to_string().into())
            }
            None => Ok(()),
        }
    }

    /// Keeps uploading until no build is queued, running or waiting for the GPU.
    fn drain(&self) -> Result<(), Box<dyn Error>> {
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        loop {
            self.sched.upload_all_pending();
            self.check_crash()?;
            if self.sched.is_queue_empty() && self.sched.stats().in_flight == 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                log::warn!(
                    target: "driver",
                    "scheduler still busy after {:?}: {}",
                    DRAIN_TIMEOUT,
                    self.sched.stats()
                );
                return Ok(());
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn summary(&self) -> Summary {
        let mut compiled_sections = 0;
        let mut empty_sections = 0;
        for s in self.grid.sections() {
            let c = s.compiled();
            if !c.is_compiled() {
                continue;
            }
            if c.is_empty() {
                empty_sections += 1;
            } else {
                compiled_sections += 1;
            }
        }
        let dev = self.device.stats();
        Summary {
            ticks: self.cfg.ticks,
            loaded_columns: self.world.loaded_columns(),
            scheduled: self.counters.scheduled,
            sync_compiles: self.counters.sync_compiles,
            resorts: self.counters.resorts,
            compiled_sections,
            empty_sections,
            buffer_uploads: dev.uploads,
            index_uploads: dev.index_uploads,
            bytes_uploaded: dev.bytes,
            global_entities: self.sched.globals().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> DriverConfig {
        DriverConfig {
            workers: 2,
            buffer_packs: 2,
            view_radius: 2,
            height_sections: 3,
            ticks: 60,
            tick_ms: 0,
            stream_columns_per_tick: 4,
            stats_every: 0,
            edit_every: 20,
            ..DriverConfig::default()
        }
    }

    #[test]
    fn short_run_settles_every_section() {
        let _ = env_logger::builder().is_test(true).try_init();
        let cfg = small();
        let summary = Driver::new(cfg, Arc::new(BlockRegistry::builtin()))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(summary.ticks, 60);
        assert!(summary.loaded_columns >= 25);
        assert!(summary.scheduled > 0);
        assert!(summary.compiled_sections > 0);
        assert!(summary.buffer_uploads > 0);
        assert!(summary.sync_compiles > 0);
    }

    #[test]
    fn zero_ticks_still_shuts_down() {
        let cfg = DriverConfig {
            ticks: 0,
            ..small()
        };
        let summary = Driver::new(cfg, Arc::new(BlockRegistry::builtin()))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(summary.loaded_columns, 0);
        assert_eq!(summary.compiled_sections, 0);
        assert_eq!(summary.empty_sections, 0);
    }
}
