/// Which lateral neighbour columns of a section are loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NeighborsLoaded {
    pub neg_x: bool,
    pub pos_x: bool,
    pub neg_z: bool,
    pub pos_z: bool,
}

impl NeighborsLoaded {
    #[inline]
    pub const fn horizontal(neg_x: bool, pos_x: bool, neg_z: bool, pos_z: bool) -> Self {
        Self {
            neg_x,
            pos_x,
            neg_z,
            pos_z,
        }
    }

    #[inline]
    pub const fn all(self) -> bool {
        self.neg_x && self.pos_x && self.neg_z && self.pos_z
    }
}
