use std::fmt;

use tessera_blocks::Block;
use tessera_chunk::SectionPos;
use tessera_geom::BlockPos;

#[derive(Debug)]
pub enum BuildError {
    /// A geometry generator refused a block.
    Generator {
        block: Block,
        pos: BlockPos,
        reason: String,
    },
    /// The snapshot was captured for a different section than the one being built.
    SnapshotMismatch {
        expected: SectionPos,
        found: SectionPos,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Generator { block, pos, reason } => write!(
                f,
                "geometry for block {}:{} at ({},{},{}) failed: {}",
                block.id, block.state, pos.x, pos.y, pos.z, reason
            ),
            BuildError::SnapshotMismatch { expected, found } => write!(
                f,
                "snapshot for section ({},{},{}) used to build ({},{},{})",
                found.sx, found.sy, found.sz, expected.sx, expected.sy, expected.sz
            ),
        }
    }
}

impl std::error::Error for BuildError {}
