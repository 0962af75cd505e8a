use tessera_blocks::Block;
use tessera_geom::BlockPos;

use crate::{BlockEntity, BlockSource, SECTION_SIZE, SectionPos};

/// Edge of the captured region: the section plus a one-block border.
pub const REGION_EDGE: usize = SECTION_SIZE + 2;

/// Read-only copy of one section and its one-block border, taken on the
/// thread that owns the world and moved into a build task.
#[derive(Clone, Debug)]
pub struct RegionSnapshot {
    pub section: SectionPos,
    blocks: Vec<Block>,
    block_entities: Vec<BlockEntity>,
}

impl RegionSnapshot {
    /// Copies the padded region around `section`. Returns `None` when the region holds
    /// nothing but air, so callers can skip the build entirely.
    pub fn capture<S: BlockSource + ?Sized>(source: &S, section: SectionPos) -> Option<Self> {
        let origin = section.origin();
        let mut blocks = Vec::with_capacity(REGION_EDGE * REGION_EDGE * REGION_EDGE);
        let mut has_blocks = false;
        for y in 0..REGION_EDGE as i32 {
            for z in 0..REGION_EDGE as i32 {
                for x in 0..REGION_EDGE as i32 {
                    let b = source.block_at(origin.offset(x - 1, y - 1, z - 1));
                    has_blocks |= !b.is_air();
                    blocks.push(b);
                }
            }
        }
        let block_entities = source.block_entities_in(section);
        if !has_blocks && block_entities.is_empty() {
            return None;
        }
        Some(Self {
            section,
            blocks,
            block_entities,
        })
    }

    /// Builds a snapshot from blocks laid out in padded local order; pads or truncates
    /// to the expected length.
    pub fn from_blocks_local(
        section: SectionPos,
        blocks: Vec<Block>,
        block_entities: Vec<BlockEntity>,
    ) -> Self {
        let mut b = blocks;
        let expect = REGION_EDGE * REGION_EDGE * REGION_EDGE;
        if b.len() != expect {
            b.resize(expect, Block::AIR);
        }
        Self {
            section,
            blocks: b,
            block_entities,
        }
    }

    #[inline]
    pub fn origin(&self) -> BlockPos {
        self.section.origin()
    }

    /// Index of padded local coordinates, each in `0..REGION_EDGE`.
    #[inline]
    pub fn idx(x: usize, y: usize, z: usize) -> usize {
        (y * REGION_EDGE + z) * REGION_EDGE + x
    }

    /// Block at section-local coordinates; `-1` and `16` address the border.
    #[inline]
    pub fn get_local(&self, x: i32, y: i32, z: i32) -> Block {
        let edge = REGION_EDGE as i32;
        let (px, py, pz) = (x + 1, y + 1, z + 1);
        if px < 0 || py < 0 || pz < 0 || px >= edge || py >= edge || pz >= edge {
            return Block::AIR;
        }
        self.blocks[Self::idx(px as usize, py as usize, pz as usize)]
    }

    #[inline]
    pub fn contains_world(&self, pos: BlockPos) -> bool {
        let o = self.origin();
        let lo = -1;
        let hi = SECTION_SIZE as i32;
        let (x, y, z) = (pos.x - o.x, pos.y - o.y, pos.z - o.z);
        (lo..=hi).contains(&x) && (lo..=hi).contains(&y) && (lo..=hi).contains(&z)
    }

    #[inline]
    pub fn get_world(&self, pos: BlockPos) -> Option<Block> {
        if !self.contains_world(pos) {
            return None;
        }
        let o = self.origin();
        Some(self.get_local(pos.x - o.x, pos.y - o.y, pos.z - o.z))
    }

    #[inline]
    pub fn block_entities(&self) -> &[BlockEntity] {
        &self.block_entities
    }

    #[inline]
    pub fn has_non_air(&self) -> bool {
        self.blocks.iter().any(|b| !b.is_air())
    }
}
