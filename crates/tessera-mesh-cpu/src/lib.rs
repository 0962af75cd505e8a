//! CPU meshing for one section: staging buffers, visibility and translucency sorting.
#![forbid(unsafe_code)]

mod error;
mod face;
mod generator;
mod pack;
mod sort;
mod staging;
mod visgraph;
mod walk;

pub use error::BuildError;
pub use face::Face;
pub use generator::{CubeGenerator, GeometryGenerator};
pub use pack::LayerBuffers;
pub use sort::SortState;
pub use staging::StagingBuffer;
pub use visgraph::{VisGraph, VisibilitySet};
pub use walk::{WalkOutput, mesh_section};
