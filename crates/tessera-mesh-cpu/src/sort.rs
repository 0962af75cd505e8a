use std::sync::Arc;

use tessera_geom::Vec3;

use crate::staging::StagingBuffer;

/// Resumable ordering state of a translucent layer: the centroid of every quad in
/// section-local space. The vertex data itself stays on the GPU; re-sorting only
/// produces a new index order.
#[derive(Clone, Debug, PartialEq)]
pub struct SortState {
    centroids: Arc<[Vec3]>,
}

impl SortState {
    pub fn capture(buf: &StagingBuffer) -> Self {
        let centroids: Vec<Vec3> = (0..buf.quad_count()).map(|q| buf.quad_centroid(q)).collect();
        Self {
            centroids: centroids.into(),
        }
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.centroids.len()
    }

    /// Back-to-front quad order as seen from `eye` (section-local). Ties keep emission order.
    pub fn order_for(&self, eye: Vec3) -> Vec<u32> {
        let mut keyed: Vec<(f32, u32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(q, c)| ((*c - eye).length_sq(), q as u32))
            .collect();
        keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
        keyed.into_iter().map(|(_, q)| q).collect()
    }

    /// Sorts `buf` for `eye` in place.
    pub fn apply(&self, buf: &mut StagingBuffer, eye: Vec3) {
        let order = self.order_for(eye);
        buf.write_quad_order(&order);
    }
}
