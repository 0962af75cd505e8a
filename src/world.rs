use std::sync::{PoisonError, RwLock};

use fastnoise_lite::{FastNoiseLite, NoiseType};
use hashbrown::{HashMap, HashSet};
use tessera_blocks::{Block, BlockEntityRender, BlockRegistry};
use tessera_chunk::{BlockEntity, BlockSource, SECTION_SIZE_I32, SectionPos};
use tessera_geom::{BlockPos, Vec3};
use tessera_runtime::ColumnPresence;

pub const SEA_LEVEL: i32 = 18;
const BASE_HEIGHT: f32 = 22.0;
const HEIGHT_AMPLITUDE: f32 = 12.0;

#[derive(Clone, Copy, Debug)]
struct Palette {
    stone: Block,
    dirt: Block,
    grass: Block,
    sand: Block,
    water: Block,
    leaves: Block,
    glass: Block,
    beacon: Block,
}

impl Palette {
    fn from_registry(reg: &BlockRegistry) -> Self {
        let pick = |name: &str| reg.block(name).unwrap_or(Block::AIR);
        Self {
            stone: pick("stone"),
            dirt: pick("dirt"),
            grass: pick("grass"),
            sand: pick("sand"),
            water: pick("water"),
            leaves: pick("leaves"),
            glass: pick("glass"),
            beacon: pick("beacon"),
        }
    }
}

/// Noise terrain whose columns become visible one at a time, the way a server streams them.
pub struct DemoWorld {
    seed: i32,
    terrain: FastNoiseLite,
    palette: Palette,
    loaded: RwLock<HashSet<(i32, i32)>>,
    edits: RwLock<HashMap<BlockPos, Block>>,
}

fn column_hash(x: i32, z: i32, seed: i32) -> u32 {
    let mut h = (x as u32).wrapping_mul(0x9E37_79B1) ^ (z as u32).wrapping_mul(0x85EB_CA77);
    h ^= seed as u32;
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^= h >> 12;
    h
}

impl DemoWorld {
    pub fn new(seed: i32, reg: &BlockRegistry) -> Self {
        let mut terrain = FastNoiseLite::with_seed(seed);
        terrain.set_noise_type(Some(NoiseType::OpenSimplex2));
        terrain.set_frequency(Some(0.018));
        Self {
            seed,
            terrain,
            palette: Palette::from_registry(reg),
            loaded: RwLock::new(HashSet::new()),
            edits: RwLock::new(HashMap::new()),
        }
    }

    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let n = self.terrain.get_noise_2d(x as f32, z as f32);
        (BASE_HEIGHT + n * HEIGHT_AMPLITUDE).round() as i32
    }

    fn seed_hash(&self, x: i32, z: i32) -> u32 {
        column_hash(x, z, self.seed)
    }

    fn generated(&self, pos: BlockPos) -> Block {
        let p = self.palette;
        let h = self.surface_height(pos.x, pos.z);
        if pos.y < h - 3 {
            return p.stone;
        }
        if pos.y < h - 1 {
            return p.dirt;
        }
        if pos.y == h - 1 {
            return if h <= SEA_LEVEL + 1 { p.sand } else { p.grass };
        }
        if pos.y < SEA_LEVEL {
            return p.water;
        }
        let roll = self.seed_hash(pos.x, pos.z);
        if roll % 211 == 0 && pos.y < h + 4 {
            return p.glass;
        }
        if roll % 53 == 0 && pos.y == h {
            return p.leaves;
        }
        if roll % 997 == 0 && pos.y == h {
            return p.beacon;
        }
        Block::AIR
    }

    pub fn set_block(&self, pos: BlockPos, block: Block) {
        self.edits
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pos, block);
    }

    pub fn load_column(&self, cx: i32, cz: i32) -> bool {
        self.loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((cx, cz))
    }

    pub fn loaded_columns(&self) -> usize {
        self.loaded.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Loads up to `budget` missing columns within `radius` of the camera, nearest first.
    pub fn stream_around(&self, camera: Vec3, radius: i32, budget: usize) -> Vec<(i32, i32)> {
        let center = SectionPos::from_vec3(camera);
        let mut missing: Vec<(i32, i32)> = {
            let loaded = self.loaded.read().unwrap_or_else(PoisonError::into_inner);
            (center.sx - radius..=center.sx + radius)
                .flat_map(|cx| (center.sz - radius..=center.sz + radius).map(move |cz| (cx, cz)))
                .filter(|c| !loaded.contains(c))
                .collect()
        };
        missing.sort_by_key(|&(cx, cz)| {
            let dx = cx - center.sx;
            let dz = cz - center.sz;
            dx * dx + dz * dz
        });
        missing.truncate(budget);
        for &(cx, cz) in &missing {
            self.load_column(cx, cz);
        }
        missing
    }
}

impl BlockSource for DemoWorld {
    fn block_at(&self, pos: BlockPos) -> Block {
        let section = SectionPos::from_block(pos);
        if !self.is_column_loaded(section.sx, section.sz) {
            return Block::AIR;
        }
        if let Some(b) = self
            .edits
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pos)
        {
            return *b;
        }
        self.generated(pos)
    }

    fn block_entities_in(&self, section: SectionPos) -> Vec<BlockEntity> {
        let origin = section.origin();
        let mut out = Vec::new();
        for dz in 0..SECTION_SIZE_I32 {
            for dx in 0..SECTION_SIZE_I32 {
                let x = origin.x + dx;
                let z = origin.z + dz;
                if self.seed_hash(x, z) % 997 != 0 {
                    continue;
                }
                let y = self.surface_height(x, z);
                if SectionPos::from_block(BlockPos::new(x, y, z)) != section {
                    continue;
                }
                let pos = BlockPos::new(x, y, z);
                if self.block_at(pos) == self.palette.beacon {
                    out.push(BlockEntity {
                        pos,
                        block: self.palette.beacon,
                        render: BlockEntityRender::OffScreen,
                    });
                }
            }
        }
        out
    }
}

impl ColumnPresence for DemoWorld {
    fn is_column_loaded(&self, cx: i32, cz: i32) -> bool {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(cx, cz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_chunk::RegionSnapshot;

    fn world() -> (DemoWorld, BlockRegistry) {
        let reg = BlockRegistry::builtin();
        (DemoWorld::new(42, &reg), reg)
    }

    #[test]
    fn unloaded_columns_read_as_air() {
        let (w, _) = world();
        assert!(w.block_at(BlockPos::new(3, 0, 3)).is_air());
        assert!(w.load_column(0, 0));
        assert!(!w.load_column(0, 0));
        assert!(!w.block_at(BlockPos::new(3, 0, 3)).is_air());
    }

    #[test]
    fn streaming_is_nearest_first_and_bounded() {
        let (w, _) = world();
        let first = w.stream_around(Vec3::new(8.0, 30.0, 8.0), 2, 1);
        assert_eq!(first, vec![(0, 0)]);
        let rest = w.stream_around(Vec3::new(8.0, 30.0, 8.0), 2, 100);
        assert_eq!(rest.len(), 24);
        assert_eq!(w.loaded_columns(), 25);
        assert!(w.stream_around(Vec3::new(8.0, 30.0, 8.0), 2, 100).is_empty());
    }

    #[test]
    fn edits_override_generation() {
        let (w, reg) = world();
        w.load_column(0, 0);
        let glass = reg.block("glass").unwrap();
        let pos = BlockPos::new(1, 60, 1);
        assert!(w.block_at(pos).is_air());
        w.set_block(pos, glass);
        assert_eq!(w.block_at(pos), glass);
    }

    #[test]
    fn sky_sections_capture_nothing() {
        let (w, _) = world();
        w.load_column(0, 0);
        assert!(RegionSnapshot::capture(&w, SectionPos::new(0, 8, 0)).is_none());
        assert!(RegionSnapshot::capture(&w, SectionPos::new(0, 0, 0)).is_some());
    }
}
