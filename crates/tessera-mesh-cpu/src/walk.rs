use tessera_blocks::{LayerSet, RenderLayer};
use tessera_chunk::{BlockEntity, RegionSnapshot, SECTION_SIZE, SectionPos};
use tessera_geom::Vec3;

use crate::error::BuildError;
use crate::generator::GeometryGenerator;
use crate::pack::LayerBuffers;
use crate::sort::SortState;
use crate::visgraph::{VisGraph, VisibilitySet};

/// Everything a section walk produces besides the vertex data left in the pack.
#[derive(Clone, Debug)]
pub struct WalkOutput {
    /// Layers whose staging buffer holds geometry.
    pub layers: LayerSet,
    pub visibility: VisibilitySet,
    pub block_entities: Vec<BlockEntity>,
    /// Subset of `block_entities` that must be drawn even when the section is culled.
    pub global_block_entities: Vec<BlockEntity>,
    pub sort_state: Option<SortState>,
}

/// Walks every position of `section` once and fills `pack` with per-layer geometry.
///
/// `region == None` stands for an all-air region and yields an empty result. The
/// translucent layer, when present, is left sorted back-to-front for `camera`.
pub fn mesh_section(
    section: SectionPos,
    region: Option<&RegionSnapshot>,
    camera: Vec3,
    pack: &mut LayerBuffers,
    generator: &dyn GeometryGenerator,
) -> Result<WalkOutput, BuildError> {
    pack.clear_all();
    let mut graph = VisGraph::new();
    let mut touched = LayerSet::EMPTY;
    let mut block_entities = Vec::new();
    let mut global_block_entities = Vec::new();

    if let Some(region) = region {
        if region.section != section {
            return Err(BuildError::SnapshotMismatch {
                expected: section,
                found: region.section,
            });
        }
        let n = SECTION_SIZE as i32;
        for y in 0..n {
            for z in 0..n {
                for x in 0..n {
                    let block = region.get_local(x, y, z);
                    if block.is_air() {
                        continue;
                    }
                    if generator.is_opaque(block) {
                        graph.set_opaque(x as usize, y as usize, z as usize);
                    }
                    if let Some(layer) = generator.fluid_layer(block) {
                        touched.insert(layer);
                        generator.emit_fluid(region, (x, y, z), block, pack.get_mut(layer))?;
                    }
                    if let Some(layer) = generator.block_layer(block) {
                        touched.insert(layer);
                        generator.emit_block(region, (x, y, z), block, pack.get_mut(layer))?;
                    }
                }
            }
        }
        let bounds = section.bounds();
        for be in region.block_entities() {
            if !bounds.contains(be.pos.to_vec3()) {
                continue;
            }
            if be.renders_off_screen() {
                global_block_entities.push(be.clone());
            }
            block_entities.push(be.clone());
        }
    }

    let mut sort_state = None;
    if touched.contains(RenderLayer::Translucent) {
        let buf = pack.get_mut(RenderLayer::Translucent);
        if !buf.is_empty() {
            let eye = camera - section.origin().to_vec3();
            let state = SortState::capture(buf);
            state.apply(buf, eye);
            sort_state = Some(state);
        }
    }

    let layers: LayerSet = touched
        .iter()
        .filter(|layer| !pack.get(*layer).is_empty())
        .collect();
    log::trace!(
        "walked section ({},{},{}): layers={:?} entities={}",
        section.sx,
        section.sy,
        section.sz,
        layers,
        block_entities.len()
    );
    Ok(WalkOutput {
        layers,
        visibility: graph.resolve(),
        block_entities,
        global_block_entities,
        sort_state,
    })
}
