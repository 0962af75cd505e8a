use std::sync::Arc;

use tessera_chunk::SectionPos;
use tessera_geom::Vec3;
use tessera_runtime::{Scheduler, Section};

/// Fixed set of sections around the camera. Slots wrap: when the camera crosses a
/// section boundary only the slots that fell off one edge move to the other.
pub struct SectionGrid {
    radius: i32,
    height: i32,
    sections: Vec<Arc<Section>>,
    center: SectionPos,
}

impl SectionGrid {
    pub fn new(sched: &Scheduler, radius: i32, height: i32, camera: Vec3) -> Self {
        let side = radius * 2 + 1;
        let center = Self::center_for(camera);
        let mut sections = Vec::with_capacity((side * side * height) as usize);
        for sy in 0..height {
            for z in 0..side {
                for x in 0..side {
                    let index = sections.len();
                    let pos = Self::slot_target(center, radius, x, sy, z);
                    sections.push(sched.create_section(index, pos));
                }
            }
        }
        Self {
            radius,
            height,
            sections,
            center,
        }
    }

    fn center_for(camera: Vec3) -> SectionPos {
        let s = SectionPos::from_vec3(camera);
        SectionPos::new(s.sx, 0, s.sz)
    }

    #[inline]
    fn side(&self) -> i32 {
        self.radius * 2 + 1
    }

    /// World section that slot `(x, sy, z)` holds while the grid is centred on `center`.
    fn slot_target(center: SectionPos, radius: i32, x: i32, sy: i32, z: i32) -> SectionPos {
        let side = radius * 2 + 1;
        let min_x = center.sx - radius;
        let min_z = center.sz - radius;
        SectionPos::new(
            min_x + (x - min_x).rem_euclid(side),
            sy,
            min_z + (z - min_z).rem_euclid(side),
        )
    }

    /// Recentres on the camera. Returns how many sections moved.
    pub fn reposition(&mut self, camera: Vec3) -> usize {
        let center = Self::center_for(camera);
        if center == self.center {
            return 0;
        }
        self.center = center;
        let side = self.side();
        let mut moved = 0;
        for (i, section) in self.sections.iter().enumerate() {
            let i = i as i32;
            let x = i % side;
            let z = (i / side) % side;
            let sy = i / (side * side);
            if section.set_origin(Self::slot_target(center, self.radius, x, sy, z)) {
                moved += 1;
            }
        }
        moved
    }

    pub fn section_at(&self, pos: SectionPos) -> Option<&Arc<Section>> {
        if pos.sy < 0 || pos.sy >= self.height {
            return None;
        }
        let side = self.side();
        let x = pos.sx.rem_euclid(side);
        let z = pos.sz.rem_euclid(side);
        let i = (pos.sy * side * side + z * side + x) as usize;
        self.sections.get(i).filter(|s| s.pos() == pos)
    }

    pub fn sections(&self) -> &[Arc<Section>] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn release_all(&self) {
        for s in &self.sections {
            s.release_buffers();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessDevice;
    use hashbrown::HashSet;
    use tessera_blocks::BlockRegistry;
    use tessera_mesh_cpu::CubeGenerator;
    use tessera_runtime::{Collaborators, ColumnPresence, DeferredCrashSink, SchedulerConfig};

    struct NoColumns;

    impl ColumnPresence for NoColumns {
        fn is_column_loaded(&self, _cx: i32, _cz: i32) -> bool {
            false
        }
    }

    fn scheduler() -> Scheduler {
        let reg = Arc::new(BlockRegistry::builtin());
        Scheduler::with_config(
            SchedulerConfig {
                workers: 1,
                buffer_packs: 1,
                ..SchedulerConfig::default()
            },
            Collaborators {
                generator: Arc::new(CubeGenerator::new(reg)),
                columns: Arc::new(NoColumns),
                device: Arc::new(HeadlessDevice::new()),
                crash_sink: Arc::new(DeferredCrashSink::new()),
            },
        )
        .unwrap()
    }

    fn positions(grid: &SectionGrid) -> HashSet<SectionPos> {
        grid.sections().iter().map(|s| s.pos()).collect()
    }

    fn expected(center_x: i32, center_z: i32, radius: i32, height: i32) -> HashSet<SectionPos> {
        let mut out = HashSet::new();
        for sy in 0..height {
            for sz in center_z - radius..=center_z + radius {
                for sx in center_x - radius..=center_x + radius {
                    out.insert(SectionPos::new(sx, sy, sz));
                }
            }
        }
        out
    }

    #[test]
    fn covers_the_view_volume() {
        let sched = scheduler();
        let grid = SectionGrid::new(&sched, 2, 3, Vec3::new(40.0, 20.0, -10.0));
        assert_eq!(grid.len(), 75);
        assert_eq!(positions(&grid), expected(2, -1, 2, 3));
        for s in grid.sections() {
            assert_eq!(grid.section_at(s.pos()).map(|g| g.index()), Some(s.index()));
        }
        assert!(grid.section_at(SectionPos::new(10, 0, 0)).is_none());
    }

    #[test]
    fn crossing_a_boundary_moves_one_slab() {
        let sched = scheduler();
        let mut grid = SectionGrid::new(&sched, 2, 2, Vec3::new(8.0, 8.0, 8.0));
        assert_eq!(grid.reposition(Vec3::new(9.0, 8.0, 8.0)), 0);
        let moved = grid.reposition(Vec3::new(17.0, 8.0, 8.0));
        assert_eq!(moved, 5 * 2);
        assert_eq!(positions(&grid), expected(1, 0, 2, 2));
        let moved_far = grid.reposition(Vec3::new(17.0 + 160.0, 8.0, 8.0));
        assert_eq!(moved_far, grid.len());
    }
}
