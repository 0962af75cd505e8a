use std::collections::VecDeque;

use tessera_chunk::SECTION_SIZE;

use crate::face::Face;

const CELLS: usize = SECTION_SIZE * SECTION_SIZE * SECTION_SIZE;
/// Below this many opaque cells a section cannot block any line of sight worth tracking.
const MIN_OPAQUE_FOR_FLOOD: usize = 256;

/// Symmetric 6×6 relation: can face `a` see face `b` through the section.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct VisibilitySet(u64);

impl VisibilitySet {
    pub const NONE: VisibilitySet = VisibilitySet(0);
    pub const ALL: VisibilitySet = VisibilitySet((1u64 << 36) - 1);

    #[inline]
    fn bit(a: Face, b: Face) -> u64 {
        1u64 << (a.index() * 6 + b.index())
    }

    #[inline]
    pub fn set(&mut self, a: Face, b: Face, visible: bool) {
        let mask = Self::bit(a, b) | Self::bit(b, a);
        if visible {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// Marks every pair within `faces` as mutually visible.
    pub fn add_all(&mut self, faces: &[Face]) {
        for &a in faces {
            for &b in faces {
                self.set(a, b, true);
            }
        }
    }

    #[inline]
    pub fn visibility_between(self, a: Face, b: Face) -> bool {
        self.0 & Self::bit(a, b) != 0
    }
}

/// Opaque-cell bitmap of one section, resolved into a [`VisibilitySet`] by flood fill.
pub struct VisGraph {
    opaque: Vec<u64>,
    opaque_count: usize,
}

impl Default for VisGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl VisGraph {
    pub fn new() -> Self {
        Self {
            opaque: vec![0; CELLS / 64],
            opaque_count: 0,
        }
    }

    #[inline]
    fn index(x: usize, y: usize, z: usize) -> usize {
        (y * SECTION_SIZE + z) * SECTION_SIZE + x
    }

    #[inline]
    fn is_opaque_idx(&self, i: usize) -> bool {
        self.opaque[i >> 6] & (1u64 << (i & 63)) != 0
    }

    #[inline]
    fn mark_idx(&mut self, i: usize) {
        self.opaque[i >> 6] |= 1u64 << (i & 63);
    }

    pub fn set_opaque(&mut self, x: usize, y: usize, z: usize) {
        let i = Self::index(x, y, z);
        if !self.is_opaque_idx(i) {
            self.mark_idx(i);
            self.opaque_count += 1;
        }
    }

    pub fn opaque_count(&self) -> usize {
        self.opaque_count
    }

    pub fn resolve(&self) -> VisibilitySet {
        if self.opaque_count < MIN_OPAQUE_FOR_FLOOD {
            return VisibilitySet::ALL;
        }
        if self.opaque_count == CELLS {
            return VisibilitySet::NONE;
        }
        let mut result = VisibilitySet::NONE;
        let mut visited = self.opaque.clone();
        let last = SECTION_SIZE - 1;
        for y in 0..SECTION_SIZE {
            for z in 0..SECTION_SIZE {
                for x in 0..SECTION_SIZE {
                    let on_edge = x == 0 || y == 0 || z == 0 || x == last || y == last || z == last;
                    if !on_edge {
                        continue;
                    }
                    let i = Self::index(x, y, z);
                    if visited[i >> 6] & (1u64 << (i & 63)) != 0 {
                        continue;
                    }
                    let faces = flood_fill(&mut visited, (x, y, z));
                    result.add_all(&faces);
                }
            }
        }
        result
    }
}

fn faces_touched(x: usize, y: usize, z: usize, out: &mut [bool; 6]) {
    let last = SECTION_SIZE - 1;
    out[Face::NegX.index()] |= x == 0;
    out[Face::PosX.index()] |= x == last;
    out[Face::NegY.index()] |= y == 0;
    out[Face::PosY.index()] |= y == last;
    out[Face::NegZ.index()] |= z == 0;
    out[Face::PosZ.index()] |= z == last;
}

fn flood_fill(visited: &mut [u64], start: (usize, usize, usize)) -> Vec<Face> {
    let mut touched = [false; 6];
    let mut queue = VecDeque::new();
    let start_idx = VisGraph::index(start.0, start.1, start.2);
    visited[start_idx >> 6] |= 1u64 << (start_idx & 63);
    queue.push_back(start);
    while let Some((x, y, z)) = queue.pop_front() {
        faces_touched(x, y, z, &mut touched);
        for face in Face::ALL {
            let (dx, dy, dz) = face.delta();
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            let nz = z as i32 + dz;
            let edge = SECTION_SIZE as i32;
            if nx < 0 || ny < 0 || nz < 0 || nx >= edge || ny >= edge || nz >= edge {
                continue;
            }
            let (nx, ny, nz) = (nx as usize, ny as usize, nz as usize);
            let ni = VisGraph::index(nx, ny, nz);
            if visited[ni >> 6] & (1u64 << (ni & 63)) != 0 {
                continue;
            }
            visited[ni >> 6] |= 1u64 << (ni & 63);
            queue.push_back((nx, ny, nz));
        }
    }
    Face::ALL
        .into_iter()
        .filter(|f| touched[f.index()])
        .collect()
}
