pub type BlockId = u16;
pub type BlockState = u16;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Block {
    pub id: BlockId,
    pub state: BlockState,
}

impl Block {
    pub const AIR: Block = Block { id: 0, state: 0 };

    #[inline]
    pub const fn new(id: BlockId) -> Self {
        Self { id, state: 0 }
    }

    #[inline]
    pub fn is_air(self) -> bool {
        self.id == 0
    }
}

/// How a block entity's renderer wants to be drawn.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockEntityRender {
    /// Drawn only while its section is on screen.
    Screen,
    /// Drawn even when its section is culled (beacon beams and the like).
    OffScreen,
}
