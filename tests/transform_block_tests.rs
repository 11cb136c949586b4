//! Transform-block packing tests: scene matrix slots, per-draw packing,
//! multi-block overflow and the direct-upload fallback.

mod common;

use common::*;
use glam::{Mat4, Vec3};
use lumen::render::headless::{Command, HeadlessBackend};
use lumen::render::sorter::CurrentState;
use lumen::render::state::{MatrixSlot, NUM_SCENE_MATRICES};
use lumen::{
    FrameContext, RenderSorter, RenderState, RenderStats, Scene, ShaderFlags, ShaderManager,
    UniformBlock,
};

fn mat4_at(block: &UniformBlock, slot: usize) -> Mat4 {
    let bytes = block.data_at(slot).unwrap();
    let mut floats = [0f32; 16];
    for (i, f) in floats.iter_mut().enumerate() {
        *f = f32::from_ne_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
    }
    Mat4::from_cols_array(&floats)
}

fn mat_approx_eq(a: &Mat4, b: &Mat4) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| (x - y).abs() < 1e-4)
}

fn run_frame(
    scene: &mut Scene,
    shaders: &mut ShaderManager,
    sorter: &mut RenderSorter,
    state: &mut RenderState,
) -> HeadlessBackend {
    let mut backend = HeadlessBackend::new();
    let mut stats = RenderStats::default();
    let mut current = CurrentState::new();
    {
        let mut ctx = FrameContext {
            scene,
            shaders,
            bridge: None,
            backend: &mut backend,
            stats: &mut stats,
        };
        sorter.cull(state, &mut ctx);
        sorter.sort(state, &mut ctx);
        sorter.render(state, &mut ctx, &mut current);
    }
    backend
}

#[test]
fn scene_matrices_fill_reserved_slots() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let shader = shaders
        .add_shader(
            "MVP",
            ShaderFlags::MATRIX_UNIFORMS,
            Some("left_view_proj * model"),
        )
        .unwrap();
    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    let position = Vec3::new(1.0, 2.0, -5.0);
    add_object(&mut scene, mesh, material, Some(shader), position);
    scene.update_hierarchy();

    let mut sorter = RenderSorter::main_scene();
    let mut state = RenderState::new(camera_at_origin());
    let backend = run_frame(&mut scene, &mut shaders, &mut sorter, &mut state);

    let blocks = sorter.transform_blocks();
    assert_eq!(blocks.len(), 1);
    let block = &blocks[0];

    // Slots [0, 7) hold the global scene matrices
    for slot in 0..NUM_SCENE_MATRICES {
        assert!(
            mat_approx_eq(&mat4_at(block, slot), &state.u_matrices[slot]),
            "scene matrix slot {slot} mismatch"
        );
    }
    // Slot 7 holds the draw's MVP
    let expected_mvp =
        state.u_matrices[MatrixSlot::VIEW_PROJ] * Mat4::from_translation(position);
    assert!(mat_approx_eq(&mat4_at(block, NUM_SCENE_MATRICES), &expected_mvp));

    // The used range [0, 8) was uploaded in one piece
    let uploaded = backend.commands.iter().any(|c| {
        matches!(c, Command::UpdateBlock { name, offset, len, .. }
            if name == "Transform_ubo" && *offset == 0 && *len == (NUM_SCENE_MATRICES + 1) * 64)
    });
    assert!(uploaded);
}

#[test]
fn packing_overflows_into_second_block() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let shader = shaders
        .add_shader(
            "MVP",
            ShaderFlags::MATRIX_UNIFORMS,
            Some("left_view_proj * model"),
        )
        .unwrap();
    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    let count = 50;
    for i in 0..count {
        add_object(
            &mut scene,
            mesh,
            material,
            Some(shader),
            Vec3::new(i as f32 * 0.01, 0.0, -5.0),
        );
    }
    scene.update_hierarchy();

    let mut sorter = RenderSorter::main_scene();
    let mut state = RenderState::new(camera_at_origin());
    let backend = run_frame(&mut scene, &mut shaders, &mut sorter, &mut state);

    // 50 single-matrix draws exceed one 45-slot block
    assert_eq!(sorter.transform_blocks().len(), 2);

    // Total slot occupancy minus the reserved scene slots equals the
    // number of packed matrices.
    let upload_slots: usize = backend
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::UpdateBlock { name, len, .. } if name == "Transform_ubo" => Some(len / 64),
            _ => None,
        })
        .sum();
    let active_blocks = 2;
    assert_eq!(upload_slots - NUM_SCENE_MATRICES * active_blocks, count);
    assert_eq!(state.u_matrices.len(), MatrixSlot::MAX_MATRIX);
}

#[test]
fn shader_without_expression_uses_direct_path() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let shader = shaders
        .add_shader("Direct", ShaderFlags::MATRIX_UNIFORMS, None)
        .unwrap();
    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    add_object(&mut scene, mesh, material, Some(shader), Vec3::new(0.0, 0.0, -5.0));
    scene.update_hierarchy();

    let mut sorter = RenderSorter::main_scene();
    let mut state = RenderState::new(camera_at_origin());
    let backend = run_frame(&mut scene, &mut shaders, &mut sorter, &mut state);

    // No transform block traffic; the MVP travels in the matrix
    // metadata block instead.
    assert!(!backend.commands.iter().any(|c| {
        matches!(c, Command::UpdateBlock { name, .. } if name == "Transform_ubo")
    }));
    assert!(backend.commands.iter().any(|c| {
        matches!(c, Command::UpdateBlock { name, .. } if name == "Matrix_ubo")
    }));
    assert_eq!(backend.draws().len(), 1);
}

#[test]
fn forced_transform_block_packs_plain_mvp() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let shader = shaders
        .add_shader("Forced", ShaderFlags::MATRIX_UNIFORMS, None)
        .unwrap();
    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    let position = Vec3::new(0.0, 0.0, -5.0);
    add_object(&mut scene, mesh, material, Some(shader), position);
    scene.update_hierarchy();

    let mut sorter = RenderSorter::new("ForcedSorter", 0, true);
    let mut state = RenderState::new(camera_at_origin());
    run_frame(&mut scene, &mut shaders, &mut sorter, &mut state);

    let blocks = sorter.transform_blocks();
    assert_eq!(blocks.len(), 1);
    let expected_mvp =
        state.u_matrices[MatrixSlot::VIEW_PROJ] * Mat4::from_translation(position);
    assert!(mat_approx_eq(
        &mat4_at(&blocks[0], NUM_SCENE_MATRICES),
        &expected_mvp
    ));
}
