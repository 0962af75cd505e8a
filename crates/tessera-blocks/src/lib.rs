//! Block types, render layers, and the block registry.
#![forbid(unsafe_code)]

pub mod config;
pub mod layer;
pub mod registry;
pub mod types;

pub use layer::{LayerSet, RenderLayer};
pub use registry::{BlockRegistry, BlockType, RegistryError};
pub use types::{Block, BlockEntityRender, BlockId, BlockState};
