use serde::Deserialize;

use crate::layer::RenderLayer;
use crate::types::BlockEntityRender;

#[derive(Clone, Debug, Deserialize)]
pub struct BlocksConfig {
    pub blocks: Vec<BlockDef>,
}

// blocks.toml:
// [[blocks]]
// name = "water"
// fluid = "translucent"
// color = [64, 96, 220, 160]
#[derive(Clone, Debug, Deserialize)]
pub struct BlockDef {
    pub name: String,
    /// Full cube that hides neighbours and blocks visibility.
    pub opaque: Option<bool>,
    /// Layer of the block model; absent for blocks without a model.
    pub layer: Option<RenderLayer>,
    /// Layer of the fluid carried by this block, if any.
    pub fluid: Option<RenderLayer>,
    pub block_entity: Option<BlockEntityRender>,
    pub color: Option<[u8; 4]>,
}
