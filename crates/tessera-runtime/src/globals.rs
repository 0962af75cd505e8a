use std::sync::{Mutex, PoisonError};

use hashbrown::HashSet;
use tessera_chunk::BlockEntity;

/// Block entities that render even when their section is culled, across all sections.
#[derive(Default)]
pub struct GlobalRenderables {
    entities: Mutex<HashSet<BlockEntity>>,
}

impl GlobalRenderables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one section's change from `old` to `new`.
    pub fn update(&self, old: &[BlockEntity], new: &[BlockEntity]) {
        if old.is_empty() && new.is_empty() {
            return;
        }
        let mut set = self.entities.lock().unwrap_or_else(PoisonError::into_inner);
        for be in old {
            if !new.contains(be) {
                set.remove(be);
            }
        }
        for be in new {
            set.insert(be.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, be: &BlockEntity) -> bool {
        self.entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(be)
    }

    pub fn to_vec(&self) -> Vec<BlockEntity> {
        self.entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_blocks::{Block, BlockEntityRender};
    use tessera_geom::BlockPos;

    fn beacon(x: i32) -> BlockEntity {
        BlockEntity {
            pos: BlockPos::new(x, 0, 0),
            block: Block::new(9),
            render: BlockEntityRender::OffScreen,
        }
    }

    #[test]
    fn update_applies_diff() {
        let g = GlobalRenderables::new();
        g.update(&[], &[beacon(1), beacon(2)]);
        assert_eq!(g.len(), 2);
        g.update(&[beacon(1), beacon(2)], &[beacon(2), beacon(3)]);
        assert!(!g.contains(&beacon(1)));
        assert!(g.contains(&beacon(2)));
        assert!(g.contains(&beacon(3)));
        g.update(&[beacon(2), beacon(3)], &[]);
        assert!(g.is_empty());
    }
}
