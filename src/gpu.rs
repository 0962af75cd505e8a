use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tessera_blocks::RenderLayer;
use tessera_mesh_cpu::StagingBuffer;
use tessera_runtime::{GpuBuffer, GpuDevice, UploadError};

#[derive(Default)]
struct Counters {
    live_buffers: AtomicUsize,
    uploads: AtomicU64,
    index_uploads: AtomicU64,
    bytes: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub live_buffers: usize,
    pub uploads: u64,
    pub index_uploads: u64,
    pub bytes: u64,
}

/// Device without a GPU: it only accounts for what would have been transferred.
#[derive(Clone, Default)]
pub struct HeadlessDevice {
    counters: Arc<Counters>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DeviceStats {
        let c = &self.counters;
        DeviceStats {
            live_buffers: c.live_buffers.load(Ordering::Relaxed),
            uploads: c.uploads.load(Ordering::Relaxed),
            index_uploads: c.index_uploads.load(Ordering::Relaxed),
            bytes: c.bytes.load(Ordering::Relaxed),
        }
    }
}

struct HeadlessBuffer {
    layer: RenderLayer,
    counters: Arc<Counters>,
    vertices: usize,
    closed: bool,
}

impl GpuBuffer for HeadlessBuffer {
    fn upload(&mut self, staging: &StagingBuffer) -> Result<(), UploadError> {
        if self.closed {
            return Err(UploadError::BufferClosed(self.layer));
        }
        self.vertices = staging.vertex_count();
        self.counters.uploads.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes
            .fetch_add(staging.byte_len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn upload_indices(&mut self, indices: &[u32]) -> Result<(), UploadError> {
        if self.closed {
            return Err(UploadError::BufferClosed(self.layer));
        }
        if indices.iter().any(|&i| i as usize >= self.vertices) {
            return Err(UploadError::Backend(format!(
                "index out of range for {} vertices",
                self.vertices
            )));
        }
        self.counters.index_uploads.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes
            .fetch_add((indices.len() * 4) as u64, Ordering::Relaxed);
        Ok(())
    }

    fn close(&mut self) -> Result<(), UploadError> {
        if self.closed {
            return Err(UploadError::BufferClosed(self.layer));
        }
        self.closed = true;
        self.counters.live_buffers.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_buffer(&self, layer: RenderLayer) -> Result<Box<dyn GpuBuffer>, UploadError> {
        self.counters.live_buffers.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(HeadlessBuffer {
            layer,
            counters: self.counters.clone(),
            vertices: 0,
            closed: false,
        }))
    }
}
