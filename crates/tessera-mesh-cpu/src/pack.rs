use tessera_blocks::RenderLayer;

use crate::staging::StagingBuffer;

/// One staging buffer per render layer; the unit the buffer pool hands out.
#[derive(Default, Clone, Debug)]
pub struct LayerBuffers {
    layers: [StagingBuffer; RenderLayer::COUNT],
}

impl LayerBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, layer: RenderLayer) -> &StagingBuffer {
        &self.layers[layer.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, layer: RenderLayer) -> &mut StagingBuffer {
        &mut self.layers[layer.index()]
    }

    /// Empties every layer, keeping allocations for the next build.
    pub fn clear_all(&mut self) {
        for layer in &mut self.layers {
            layer.clear_keep_capacity();
        }
    }

    /// Throws away every layer including its allocations.
    pub fn discard_all(&mut self) {
        for layer in &mut self.layers {
            layer.discard();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(StagingBuffer::is_empty)
    }

    pub fn byte_len(&self) -> usize {
        self.layers.iter().map(StagingBuffer::byte_len).sum()
    }
}
