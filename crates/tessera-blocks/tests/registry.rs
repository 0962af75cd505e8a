use tessera_blocks::{Block, BlockEntityRender, BlockRegistry, RenderLayer};

#[test]
fn builtin_table_parses() {
    let src = include_str!("../src/builtin_blocks.toml");
    let reg = BlockRegistry::from_toml_str(src).expect("builtin blocks");
    assert_eq!(reg.get(0).map(|t| t.name.as_str()), Some("air"));
    let water = reg.block("water").unwrap();
    assert_eq!(reg.fluid_layer(water), Some(RenderLayer::Translucent));
    assert_eq!(reg.block_layer(water), None);
    assert!(!reg.is_opaque(water));
    let beacon = reg.block("beacon").unwrap();
    assert_eq!(reg.block_entity(beacon), Some(BlockEntityRender::OffScreen));
    assert_eq!(BlockRegistry::builtin().len(), reg.len());
}

#[test]
fn opaque_defaults_to_solid_layer() {
    let reg = BlockRegistry::from_toml_str(
        r#"
        [[blocks]]
        name = "rock"
        "#,
    )
    .unwrap();
    let rock = reg.block("rock").unwrap();
    assert!(reg.is_opaque(rock));
    assert_eq!(reg.block_layer(rock), Some(RenderLayer::Solid));
}

#[test]
fn duplicate_names_are_rejected() {
    let err = BlockRegistry::from_toml_str(
        r#"
        [[blocks]]
        name = "rock"
        [[blocks]]
        name = "rock"
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn air_is_reserved() {
    assert!(
        BlockRegistry::from_toml_str(
            r#"
            [[blocks]]
            name = "air"
            "#,
        )
        .is_err()
    );
}

#[test]
fn unknown_ids_are_not_opaque() {
    let reg = BlockRegistry::new();
    assert!(!reg.is_opaque(Block::new(999)));
    assert!(!reg.is_opaque(Block::AIR));
}
