use tessera_blocks::{LayerSet, RenderLayer};
use tessera_chunk::BlockEntity;
use tessera_geom::Vec3;
use tessera_mesh_cpu::{Face, SortState, VisibilitySet, WalkOutput};

/// What a finished build made visible for one section. Never mutated after
/// construction; sections swap whole results.
#[derive(Clone, Debug)]
pub struct CompiledResult {
    occupied_layers: LayerSet,
    block_entities: Vec<BlockEntity>,
    visibility: VisibilitySet,
    sort_state: Option<SortState>,
    /// Camera position (section-local) the translucent indices were last ordered for.
    sorted_from: Option<Vec3>,
    compiled: bool,
}

impl CompiledResult {
    /// Placeholder of a section that was never built. Nothing can be seen through it.
    pub fn uncompiled() -> Self {
        Self {
            occupied_layers: LayerSet::EMPTY,
            block_entities: Vec::new(),
            visibility: VisibilitySet::NONE,
            sort_state: None,
            sorted_from: None,
            compiled: false,
        }
    }

    /// A built section without geometry. Every face sees every other.
    pub fn empty() -> Self {
        Self {
            visibility: VisibilitySet::ALL,
            compiled: true,
            ..Self::uncompiled()
        }
    }

    pub(crate) fn from_walk(out: WalkOutput, eye: Vec3) -> Self {
        let sorted_from = out.sort_state.as_ref().map(|_| eye);
        Self {
            occupied_layers: out.layers,
            block_entities: out.block_entities,
            visibility: out.visibility,
            sort_state: out.sort_state,
            sorted_from,
            compiled: true,
        }
    }

    /// Copy of this result re-sorted for `eye`; only the sort data differs.
    pub(crate) fn resorted(&self, eye: Vec3) -> Self {
        Self {
            sorted_from: Some(eye),
            ..self.clone()
        }
    }

    #[inline]
    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied_layers.is_empty()
    }

    #[inline]
    pub fn has_layer(&self, layer: RenderLayer) -> bool {
        self.occupied_layers.contains(layer)
    }

    #[inline]
    pub fn occupied_layers(&self) -> LayerSet {
        self.occupied_layers
    }

    pub fn block_entities(&self) -> &[BlockEntity] {
        &self.block_entities
    }

    #[inline]
    pub fn visibility(&self) -> VisibilitySet {
        self.visibility
    }

    pub fn faces_can_see(&self, a: Face, b: Face) -> bool {
        self.visibility.visibility_between(a, b)
    }

    pub fn sort_state(&self) -> Option<&SortState> {
        self.sort_state.as_ref()
    }

    pub fn sorted_from(&self) -> Option<Vec3> {
        self.sorted_from
    }

    /// True when a resort task has something to reorder.
    pub fn can_resort(&self) -> bool {
        self.has_layer(RenderLayer::Translucent) && self.sort_state.is_some()
    }
}

impl Default for CompiledResult {
    fn default() -> Self {
        Self::uncompiled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_differ_in_visibility() {
        let never = CompiledResult::uncompiled();
        let empty = CompiledResult::empty();
        assert!(!never.is_compiled());
        assert!(empty.is_compiled());
        for a in Face::ALL {
            for b in Face::ALL {
                assert!(!never.faces_can_see(a, b));
                assert!(empty.faces_can_see(a, b));
            }
        }
        assert!(!empty.can_resort());
    }
}
