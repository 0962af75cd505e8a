use std::error::Error;
use std::fmt;

use tessera_blocks::RenderLayer;
use tessera_mesh_cpu::StagingBuffer;

/// Failure while moving staged geometry to the GPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    DeviceLost,
    OutOfMemory { requested: usize },
    BufferClosed(RenderLayer),
    Backend(String),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::DeviceLost => write!(f, "gpu device lost"),
            UploadError::OutOfMemory { requested } => {
                write!(f, "out of gpu memory ({} bytes requested)", requested)
            }
            UploadError::BufferClosed(layer) => {
                write!(f, "{} buffer used after close", layer.name())
            }
            UploadError::Backend(msg) => write!(f, "gpu backend error: {}", msg),
        }
    }
}

impl Error for UploadError {}

/// One layer's vertex and index storage on the GPU. Only touched from the render thread.
pub trait GpuBuffer: Send {
    fn upload(&mut self, staging: &StagingBuffer) -> Result<(), UploadError>;

    /// Replaces only the index data, keeping the vertices in place.
    fn upload_indices(&mut self, indices: &[u32]) -> Result<(), UploadError>;

    fn close(&mut self) -> Result<(), UploadError>;
}

pub trait GpuDevice: Send + Sync {
    fn create_buffer(&self, layer: RenderLayer) -> Result<Box<dyn GpuBuffer>, UploadError>;
}
