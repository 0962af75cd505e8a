use std::sync::Arc;

use tessera_blocks::{Block, BlockEntityRender, BlockRegistry, RenderLayer};
use tessera_chunk::{BlockEntity, BlockSource, RegionSnapshot, SectionPos};
use tessera_geom::{BlockPos, Vec3};
use tessera_mesh_cpu::{BuildError, CubeGenerator, Face, LayerBuffers, VisibilitySet, mesh_section};

struct FnSource<F: Fn(BlockPos) -> Block> {
    f: F,
    entities: Vec<BlockEntity>,
}

impl<F: Fn(BlockPos) -> Block> BlockSource for FnSource<F> {
    fn block_at(&self, pos: BlockPos) -> Block {
        (self.f)(pos)
    }

    fn block_entities_in(&self, _section: SectionPos) -> Vec<BlockEntity> {
        self.entities.clone()
    }
}

fn registry() -> Arc<BlockRegistry> {
    Arc::new(BlockRegistry::builtin())
}

fn snapshot<F: Fn(BlockPos) -> Block>(section: SectionPos, f: F) -> RegionSnapshot {
    RegionSnapshot::capture(
        &FnSource {
            f,
            entities: Vec::new(),
        },
        section,
    )
    .expect("non-empty region")
}

#[test]
fn lone_cube_emits_six_faces() {
    let reg = registry();
    let stone = reg.block("stone").unwrap();
    let section = SectionPos::new(0, 0, 0);
    let snap = snapshot(section, |p| if p == BlockPos::new(8, 8, 8) { stone } else { Block::AIR });
    let generator = CubeGenerator::new(reg.clone());
    let mut pack = LayerBuffers::new();
    let out = mesh_section(section, Some(&snap), Vec3::ZERO, &mut pack, &generator).unwrap();
    assert!(out.layers.contains(RenderLayer::Solid));
    assert_eq!(out.layers.len(), 1);
    assert_eq!(pack.get(RenderLayer::Solid).quad_count(), 6);
    assert_eq!(out.visibility, VisibilitySet::ALL);
    assert!(out.sort_state.is_none());
}

#[test]
fn shared_faces_are_culled_including_border() {
    let reg = registry();
    let stone = reg.block("stone").unwrap();
    let section = SectionPos::new(2, 0, -1);
    let o = section.origin();
    // Two blocks at the +X edge; the second lives in the neighbour section.
    let a = o.offset(15, 4, 4);
    let b = o.offset(16, 4, 4);
    let snap = snapshot(section, move |p| if p == a || p == b { stone } else { Block::AIR });
    let generator = CubeGenerator::new(reg.clone());
    let mut pack = LayerBuffers::new();
    mesh_section(section, Some(&snap), Vec3::ZERO, &mut pack, &generator).unwrap();
    assert_eq!(pack.get(RenderLayer::Solid).quad_count(), 5);
}

#[test]
fn solid_floor_hides_bottom_face() {
    let reg = registry();
    let stone = reg.block("stone").unwrap();
    let section = SectionPos::new(0, 0, 0);
    let snap = snapshot(section, |p| if p.y <= 0 { stone } else { Block::AIR });
    let generator = CubeGenerator::new(reg.clone());
    let mut pack = LayerBuffers::new();
    let out = mesh_section(section, Some(&snap), Vec3::ZERO, &mut pack, &generator).unwrap();
    assert!(!out.visibility.visibility_between(Face::NegY, Face::PosY));
    assert!(out.visibility.visibility_between(Face::PosY, Face::PosX));
    // Only the top of the floor is exposed: below it is more stone at y = -1.
    assert_eq!(pack.get(RenderLayer::Solid).quad_count(), 256);
}

#[test]
fn translucent_layer_is_sorted_back_to_front() {
    let reg = registry();
    let glass = reg.block("glass").unwrap();
    let section = SectionPos::new(0, 0, 0);
    let snap = snapshot(section, |p| {
        if p.y == 2 && p.z == 2 && (p.x == 1 || p.x == 12) {
            glass
        } else {
            Block::AIR
        }
    });
    let generator = CubeGenerator::new(reg.clone());
    let mut pack = LayerBuffers::new();
    let camera = Vec3::new(-4.0, 2.5, 2.5);
    let out = mesh_section(section, Some(&snap), camera, &mut pack, &generator).unwrap();
    let state = out.sort_state.expect("sort state");
    let buf = pack.get(RenderLayer::Translucent);
    assert_eq!(state.quad_count(), buf.quad_count());
    assert_eq!(buf.idx.len(), buf.quad_count() * 6);
    let first_quad = (buf.idx[0] / 4) as usize;
    let last_quad = (buf.idx[buf.idx.len() - 1] / 4) as usize;
    // The block at x = 12 is farther from a camera sitting at x = -4.
    assert!(buf.quad_centroid(first_quad).x > 12.0);
    assert!(buf.quad_centroid(last_quad).x < 2.5);
}

#[test]
fn fluids_land_in_their_layer() {
    let reg = registry();
    let water = reg.block("water").unwrap();
    let section = SectionPos::new(0, 0, 0);
    let snap = snapshot(section, |p| if p.y <= 3 { water } else { Block::AIR });
    let generator = CubeGenerator::new(reg.clone());
    let mut pack = LayerBuffers::new();
    let out = mesh_section(section, Some(&snap), Vec3::ZERO, &mut pack, &generator).unwrap();
    assert!(out.layers.contains(RenderLayer::Translucent));
    assert!(!out.layers.contains(RenderLayer::Solid));
    // Only the surface at y = 3 is exposed.
    assert_eq!(pack.get(RenderLayer::Translucent).quad_count(), 256);
    assert_eq!(out.visibility, VisibilitySet::ALL);
}

#[test]
fn block_entities_are_classified() {
    let reg = registry();
    let chest = reg.block("chest").unwrap();
    let beacon = reg.block("beacon").unwrap();
    let section = SectionPos::new(0, 0, 0);
    let source = FnSource {
        f: |_p| Block::AIR,
        entities: vec![
            BlockEntity {
                pos: BlockPos::new(1, 1, 1),
                block: chest,
                render: BlockEntityRender::Screen,
            },
            BlockEntity {
                pos: BlockPos::new(2, 2, 2),
                block: beacon,
                render: BlockEntityRender::OffScreen,
            },
            BlockEntity {
                pos: BlockPos::new(40, 2, 2),
                block: chest,
                render: BlockEntityRender::Screen,
            },
        ],
    };
    let snap = RegionSnapshot::capture(&source, section).unwrap();
    let generator = CubeGenerator::new(reg.clone());
    let mut pack = LayerBuffers::new();
    let out = mesh_section(section, Some(&snap), Vec3::ZERO, &mut pack, &generator).unwrap();
    assert_eq!(out.block_entities.len(), 2);
    assert_eq!(out.global_block_entities.len(), 1);
    assert_eq!(out.global_block_entities[0].block, beacon);
}

#[test]
fn missing_region_builds_empty() {
    let generator = CubeGenerator::new(registry());
    let mut pack = LayerBuffers::new();
    pack.get_mut(RenderLayer::Solid)
        .add_box_face(Face::PosY, Vec3::ZERO, 1.0, [1, 2, 3, 4]);
    let out = mesh_section(SectionPos::new(0, 0, 0), None, Vec3::ZERO, &mut pack, &generator).unwrap();
    assert!(out.layers.is_empty());
    assert!(pack.is_empty());
    assert_eq!(out.visibility, VisibilitySet::ALL);
}

#[test]
fn mismatched_snapshot_is_rejected() {
    let reg = registry();
    let stone = reg.block("stone").unwrap();
    let snap = snapshot(SectionPos::new(1, 0, 0), move |_| stone);
    let generator = CubeGenerator::new(reg);
    let mut pack = LayerBuffers::new();
    let err = mesh_section(SectionPos::new(0, 0, 0), Some(&snap), Vec3::ZERO, &mut pack, &generator)
        .unwrap_err();
    assert!(matches!(err, BuildError::SnapshotMismatch { .. }));
}
