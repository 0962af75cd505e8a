use tessera_geom::Vec3;

use crate::face::Face;

/// CPU-side scratch for one render layer. Geometry is always appended as quads:
/// four vertices and six indices each.
#[derive(Default, Clone, Debug)]
pub struct StagingBuffer {
    pub pos: Vec<f32>,
    pub norm: Vec<f32>,
    pub uv: Vec<f32>,
    pub col: Vec<u8>,
    pub idx: Vec<u32>,
}

impl StagingBuffer {
    /// Clears all arrays but retains capacity for reuse across builds.
    #[inline]
    pub fn clear_keep_capacity(&mut self) {
        self.pos.clear();
        self.norm.clear();
        self.uv.clear();
        self.col.clear();
        self.idx.clear();
    }

    /// Drops contents and allocations.
    #[inline]
    pub fn discard(&mut self) {
        *self = StagingBuffer::default();
    }

    /// Pre-reserve capacity for approximately `n_quads` quads worth of data.
    #[inline]
    pub fn reserve_quads(&mut self, n_quads: usize) {
        self.pos.reserve(n_quads * 4 * 3);
        self.norm.reserve(n_quads * 4 * 3);
        self.uv.reserve(n_quads * 4 * 2);
        self.col.reserve(n_quads * 4 * 4);
        self.idx.reserve(n_quads * 6);
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.vertex_count() / 4
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    /// Bytes a full upload of this buffer would transfer.
    pub fn byte_len(&self) -> usize {
        (self.pos.len() + self.norm.len() + self.uv.len()) * 4 + self.col.len() + self.idx.len() * 4
    }

    /// Appends a quad; the winding is flipped when needed so it faces along `n`.
    pub fn add_quad(&mut self, a: Vec3, b: Vec3, c: Vec3, d: Vec3, n: Vec3, rgba: [u8; 4]) {
        let base = self.vertex_count() as u32;
        let mut vs = [a, b, c, d];
        let mut uvs = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let e1 = vs[1] - vs[0];
        let e2 = vs[2] - vs[0];
        if e1.cross(e2).dot(n) < 0.0 {
            vs.swap(1, 3);
            uvs.swap(1, 3);
        }
        for i in 0..4 {
            self.pos.extend_from_slice(&[vs[i].x, vs[i].y, vs[i].z]);
            self.norm.extend_from_slice(&[n.x, n.y, n.z]);
            self.uv.extend_from_slice(&[uvs[i].0, uvs[i].1]);
            self.col.extend_from_slice(&rgba);
        }
        self.idx
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Appends one face of the box spanning `min .. min + (1, height, 1)`.
    pub fn add_box_face(&mut self, face: Face, min: Vec3, height: f32, rgba: [u8; 4]) {
        let (x0, y0, z0) = (min.x, min.y, min.z);
        let (x1, y1, z1) = (min.x + 1.0, min.y + height, min.z + 1.0);
        let v = Vec3::new;
        let (a, b, c, d) = match face {
            Face::PosY => (v(x0, y1, z0), v(x1, y1, z0), v(x1, y1, z1), v(x0, y1, z1)),
            Face::NegY => (v(x0, y0, z1), v(x1, y0, z1), v(x1, y0, z0), v(x0, y0, z0)),
            Face::PosX => (v(x1, y0, z0), v(x1, y1, z0), v(x1, y1, z1), v(x1, y0, z1)),
            Face::NegX => (v(x0, y0, z1), v(x0, y1, z1), v(x0, y1, z0), v(x0, y0, z0)),
            Face::PosZ => (v(x1, y0, z1), v(x1, y1, z1), v(x0, y1, z1), v(x0, y0, z1)),
            Face::NegZ => (v(x0, y0, z0), v(x0, y1, z0), v(x1, y1, z0), v(x1, y0, z0)),
        };
        let s = face.shade();
        let shaded = [
            (f32::from(rgba[0]) * s) as u8,
            (f32::from(rgba[1]) * s) as u8,
            (f32::from(rgba[2]) * s) as u8,
            rgba[3],
        ];
        self.add_quad(a, b, c, d, face.normal(), shaded);
    }

    /// Average of the four corners of quad `q`.
    pub fn quad_centroid(&self, q: usize) -> Vec3 {
        let mut sum = Vec3::ZERO;
        for v in q * 4..q * 4 + 4 {
            sum += Vec3::new(self.pos[v * 3], self.pos[v * 3 + 1], self.pos[v * 3 + 2]);
        }
        sum * 0.25
    }

    /// Rewrites the index array so quads are drawn in `order`.
    pub fn write_quad_order(&mut self, order: &[u32]) {
        self.idx.clear();
        self.idx.reserve(order.len() * 6);
        for &q in order {
            let base = q * 4;
            self.idx
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(buf: &StagingBuffer, v: usize) -> Vec3 {
        Vec3::new(buf.pos[v * 3], buf.pos[v * 3 + 1], buf.pos[v * 3 + 2])
    }

    #[test]
    fn quads_wind_towards_their_normal() {
        let mut buf = StagingBuffer::default();
        let v = Vec3::new;
        // Clockwise seen from +Y, so the winding has to be flipped.
        buf.add_quad(
            v(0.0, 0.0, 0.0),
            v(1.0, 0.0, 0.0),
            v(1.0, 0.0, 1.0),
            v(0.0, 0.0, 1.0),
            Vec3::UP,
            [255; 4],
        );
        assert_eq!(vertex(&buf, 1), Vec3::new(0.0, 0.0, 1.0));
        let e1 = vertex(&buf, 1) - vertex(&buf, 0);
        let e2 = vertex(&buf, 2) - vertex(&buf, 0);
        assert!(e1.cross(e2).dot(Vec3::UP) > 0.0);
        assert_eq!(buf.idx, vec![0, 1, 2, 0, 2, 3]);
    }
}
