use std::sync::Arc;

use tessera_blocks::{Block, BlockRegistry, RenderLayer};
use tessera_chunk::RegionSnapshot;
use tessera_geom::Vec3;

use crate::error::BuildError;
use crate::face::Face;
use crate::staging::StagingBuffer;

/// Height of a fluid surface that has no fluid above it.
const FLUID_SURFACE: f32 = 0.875;

/// Produces geometry for single blocks and fluids. Coordinates passed in are
/// section-local; `-1` and `16` reach into the snapshot border for culling.
pub trait GeometryGenerator: Send + Sync {
    fn is_opaque(&self, block: Block) -> bool;

    fn block_layer(&self, block: Block) -> Option<RenderLayer>;

    fn fluid_layer(&self, block: Block) -> Option<RenderLayer>;

    fn emit_block(
        &self,
        region: &RegionSnapshot,
        local: (i32, i32, i32),
        block: Block,
        out: &mut StagingBuffer,
    ) -> Result<(), BuildError>;

    fn emit_fluid(
        &self,
        region: &RegionSnapshot,
        local: (i32, i32, i32),
        block: Block,
        out: &mut StagingBuffer,
    ) -> Result<(), BuildError>;
}

/// Unit-cube generator driven by the block registry, with per-face neighbour culling.
pub struct CubeGenerator {
    reg: Arc<BlockRegistry>,
}

impl CubeGenerator {
    pub fn new(reg: Arc<BlockRegistry>) -> Self {
        Self { reg }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.reg
    }

    fn face_hidden(&self, block: Block, neighbor: Block) -> bool {
        self.reg.is_opaque(neighbor) || neighbor == block
    }
}

impl GeometryGenerator for CubeGenerator {
    fn is_opaque(&self, block: Block) -> bool {
        self.reg.is_opaque(block)
    }

    fn block_layer(&self, block: Block) -> Option<RenderLayer> {
        self.reg.block_layer(block)
    }

    fn fluid_layer(&self, block: Block) -> Option<RenderLayer> {
        self.reg.fluid_layer(block)
    }

    fn emit_block(
        &self,
        region: &RegionSnapshot,
        local: (i32, i32, i32),
        block: Block,
        out: &mut StagingBuffer,
    ) -> Result<(), BuildError> {
        let (x, y, z) = local;
        let rgba = self.reg.color(block);
        let min = Vec3::new(x as f32, y as f32, z as f32);
        for face in Face::ALL {
            let (dx, dy, dz) = face.delta();
            let neighbor = region.get_local(x + dx, y + dy, z + dz);
            if self.face_hidden(block, neighbor) {
                continue;
            }
            out.add_box_face(face, min, 1.0, rgba);
        }
        Ok(())
    }

    fn emit_fluid(
        &self,
        region: &RegionSnapshot,
        local: (i32, i32, i32),
        block: Block,
        out: &mut StagingBuffer,
    ) -> Result<(), BuildError> {
        let (x, y, z) = local;
        let rgba = self.reg.color(block);
        let above = region.get_local(x, y + 1, z);
        let height = if above == block { 1.0 } else { FLUID_SURFACE };
        let min = Vec3::new(x as f32, y as f32, z as f32);
        for face in Face::ALL {
            let (dx, dy, dz) = face.delta();
            let neighbor = region.get_local(x + dx, y + dy, z + dz);
            if self.face_hidden(block, neighbor) {
                continue;
            }
            out.add_box_face(face, min, height, rgba);
        }
        Ok(())
    }
}
