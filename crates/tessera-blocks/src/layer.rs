use serde::Deserialize;

/// GPU pipeline grouping that geometry is bucketed into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderLayer {
    Solid = 0,
    Cutout = 1,
    Translucent = 2,
}

impl RenderLayer {
    pub const COUNT: usize = 3;
    pub const ALL: [RenderLayer; Self::COUNT] = [
        RenderLayer::Solid,
        RenderLayer::Cutout,
        RenderLayer::Translucent,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            RenderLayer::Solid => "solid",
            RenderLayer::Cutout => "cutout",
            RenderLayer::Translucent => "translucent",
        }
    }
}

/// Small bitset over [`RenderLayer`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayerSet(u8);

impl LayerSet {
    pub const EMPTY: LayerSet = LayerSet(0);

    #[inline]
    pub fn insert(&mut self, layer: RenderLayer) -> bool {
        let bit = 1u8 << layer.index();
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    #[inline]
    pub fn contains(self, layer: RenderLayer) -> bool {
        self.0 & (1u8 << layer.index()) != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = RenderLayer> {
        RenderLayer::ALL
            .into_iter()
            .filter(move |layer| self.contains(*layer))
    }
}

impl FromIterator<RenderLayer> for LayerSet {
    fn from_iter<I: IntoIterator<Item = RenderLayer>>(iter: I) -> Self {
        let mut set = LayerSet::EMPTY;
        for layer in iter {
            set.insert(layer);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_first_time_only() {
        let mut set = LayerSet::EMPTY;
        assert!(set.insert(RenderLayer::Translucent));
        assert!(!set.insert(RenderLayer::Translucent));
        assert!(set.contains(RenderLayer::Translucent));
        assert!(!set.contains(RenderLayer::Solid));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn iter_follows_layer_order() {
        let set: LayerSet = [RenderLayer::Translucent, RenderLayer::Solid]
            .into_iter()
            .collect();
        let order: Vec<_> = set.iter().collect();
        assert_eq!(order, vec![RenderLayer::Solid, RenderLayer::Translucent]);
    }
}
