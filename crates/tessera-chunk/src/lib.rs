//! Section coordinates and immutable region snapshots handed to mesh builds.
#![forbid(unsafe_code)]

mod neighbors;
mod snapshot;

pub use neighbors::NeighborsLoaded;
pub use snapshot::{REGION_EDGE, RegionSnapshot};

use tessera_blocks::{Block, BlockEntityRender};
use tessera_geom::{Aabb, BlockPos, Vec3};

/// Edge length of a section in blocks.
pub const SECTION_SIZE: usize = 16;
pub const SECTION_SIZE_I32: i32 = SECTION_SIZE as i32;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionPos {
    pub sx: i32,
    pub sy: i32,
    pub sz: i32,
}

impl SectionPos {
    #[inline]
    pub const fn new(sx: i32, sy: i32, sz: i32) -> Self {
        Self { sx, sy, sz }
    }

    #[inline]
    pub fn from_block(pos: BlockPos) -> Self {
        Self {
            sx: pos.x.div_euclid(SECTION_SIZE_I32),
            sy: pos.y.div_euclid(SECTION_SIZE_I32),
            sz: pos.z.div_euclid(SECTION_SIZE_I32),
        }
    }

    #[inline]
    pub fn from_vec3(v: Vec3) -> Self {
        Self::from_block(BlockPos::new(
            v.x.floor() as i32,
            v.y.floor() as i32,
            v.z.floor() as i32,
        ))
    }

    /// Min corner of the section in block coordinates.
    #[inline]
    pub fn origin(self) -> BlockPos {
        BlockPos::new(
            self.sx * SECTION_SIZE_I32,
            self.sy * SECTION_SIZE_I32,
            self.sz * SECTION_SIZE_I32,
        )
    }

    #[inline]
    pub fn center(self) -> Vec3 {
        let half = SECTION_SIZE as f32 * 0.5;
        self.origin().to_vec3() + Vec3::new(half, half, half)
    }

    #[inline]
    pub fn bounds(self) -> Aabb {
        let min = self.origin().to_vec3();
        let s = SECTION_SIZE as f32;
        Aabb::new(min, min + Vec3::new(s, s, s))
    }

    #[inline]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.sx + dx, self.sy + dy, self.sz + dz)
    }
}

/// A block with a dedicated renderer outside the static section mesh.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockEntity {
    pub pos: BlockPos,
    pub block: Block,
    pub render: BlockEntityRender,
}

impl BlockEntity {
    #[inline]
    pub fn renders_off_screen(&self) -> bool {
        self.render == BlockEntityRender::OffScreen
    }
}

/// Read access to live world data, used only to capture snapshots.
pub trait BlockSource {
    fn block_at(&self, pos: BlockPos) -> Block;

    fn block_entities_in(&self, _section: SectionPos) -> Vec<BlockEntity> {
        Vec::new()
    }
}
