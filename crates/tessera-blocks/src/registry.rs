use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::config::{BlockDef, BlocksConfig};
use crate::layer::RenderLayer;
use crate::types::{Block, BlockEntityRender, BlockId};

const BUILTIN_BLOCKS: &str = include_str!("builtin_blocks.toml");

#[derive(Clone, Debug)]
pub struct BlockType {
    pub id: BlockId,
    pub name: String,
    pub opaque: bool,
    pub layer: Option<RenderLayer>,
    pub fluid: Option<RenderLayer>,
    pub block_entity: Option<BlockEntityRender>,
    pub color: [u8; 4],
}

#[derive(Debug)]
pub enum RegistryError {
    DuplicateName(String),
    ReservedName(String),
    TooManyBlocks(usize),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateName(name) => write!(f, "duplicate block name '{}'", name),
            RegistryError::ReservedName(name) => write!(f, "block name '{}' is reserved", name),
            RegistryError::TooManyBlocks(n) => write!(f, "{} blocks exceed the id space", n),
        }
    }
}

impl Error for RegistryError {}

#[derive(Clone, Debug)]
pub struct BlockRegistry {
    pub blocks: Vec<BlockType>,
    pub by_name: HashMap<String, BlockId>,
}

impl BlockRegistry {
    /// Registry holding only air.
    pub fn new() -> Self {
        let air = BlockType {
            id: 0,
            name: "air".into(),
            opaque: false,
            layer: None,
            fluid: None,
            block_entity: None,
            color: [0, 0, 0, 0],
        };
        let mut by_name = HashMap::new();
        by_name.insert(air.name.clone(), 0);
        Self {
            blocks: vec![air],
            by_name,
        }
    }

    pub fn builtin() -> Self {
        // The embedded table is validated by the test suite.
        Self::from_toml_str(BUILTIN_BLOCKS).unwrap_or_else(|_| Self::new())
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: BlocksConfig = toml::from_str(toml_str)?;
        Ok(Self::from_config(cfg)?)
    }

    pub fn from_config(cfg: BlocksConfig) -> Result<Self, RegistryError> {
        let mut reg = Self::new();
        if cfg.blocks.len() >= usize::from(BlockId::MAX) {
            return Err(RegistryError::TooManyBlocks(cfg.blocks.len()));
        }
        for def in cfg.blocks {
            reg.register(def)?;
        }
        Ok(reg)
    }

    fn register(&mut self, def: BlockDef) -> Result<BlockId, RegistryError> {
        if def.name == "air" {
            return Err(RegistryError::ReservedName(def.name));
        }
        if self.by_name.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        let id = self.blocks.len() as BlockId;
        let opaque = def.opaque.unwrap_or(true);
        // Opaque blocks without an explicit layer render as solid cubes.
        let layer = def.layer.or(if opaque { Some(RenderLayer::Solid) } else { None });
        self.by_name.insert(def.name.clone(), id);
        self.blocks.push(BlockType {
            id,
            name: def.name,
            opaque,
            layer,
            fluid: def.fluid,
            block_entity: def.block_entity,
            color: def.color.unwrap_or([255, 255, 255, 255]),
        });
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.blocks.get(id as usize)
    }

    pub fn id_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    pub fn block(&self, name: &str) -> Option<Block> {
        self.id_by_name(name).map(Block::new)
    }

    #[inline]
    pub fn is_opaque(&self, b: Block) -> bool {
        self.get(b.id).is_some_and(|ty| ty.opaque)
    }

    #[inline]
    pub fn block_layer(&self, b: Block) -> Option<RenderLayer> {
        self.get(b.id).and_then(|ty| ty.layer)
    }

    #[inline]
    pub fn fluid_layer(&self, b: Block) -> Option<RenderLayer> {
        self.get(b.id).and_then(|ty| ty.fluid)
    }

    #[inline]
    pub fn block_entity(&self, b: Block) -> Option<BlockEntityRender> {
        self.get(b.id).and_then(|ty| ty.block_entity)
    }

    #[inline]
    pub fn color(&self, b: Block) -> [u8; 4] {
        self.get(b.id).map_or([255, 0, 255, 255], |ty| ty.color)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
