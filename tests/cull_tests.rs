//! Frustum culling tests: inclusion, subtree pruning, the culling toggle
//! and the per-frame pool discipline.

mod common;

use common::*;
use glam::Vec3;
use lumen::render::headless::HeadlessBackend;
use lumen::{FrameContext, RenderSorter, RenderState, RenderStats, Scene, ShaderManager};

fn cull(
    scene: &mut Scene,
    shaders: &mut ShaderManager,
    sorter: &mut RenderSorter,
    state: &mut RenderState,
) {
    let mut backend = HeadlessBackend::new();
    let mut stats = RenderStats::default();
    let mut ctx = FrameContext {
        scene,
        shaders,
        bridge: None,
        backend: &mut backend,
        stats: &mut stats,
    };
    sorter.cull(state, &mut ctx);
}

#[test]
fn node_in_frustum_is_visible() {
    init_logging();
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    let (inside, _) = add_object(&mut scene, mesh, material, None, Vec3::new(0.0, 0.0, -5.0));
    let (behind, _) = add_object(&mut scene, mesh, material, None, Vec3::new(0.0, 0.0, 5.0));
    scene.update_hierarchy();

    let mut sorter = RenderSorter::main_scene();
    let mut state = RenderState::new(camera_at_origin());
    cull(&mut scene, &mut shaders, &mut sorter, &mut state);

    assert_eq!(sorter.visible_count(), 1);
    assert!(scene.nodes[inside].visible());
    assert!(!scene.nodes[inside].culled());
    assert!(scene.nodes[behind].culled());
    assert!(!scene.nodes[behind].visible());
}

#[test]
fn outside_node_prunes_descendants() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    let (parent, _) = add_object(&mut scene, mesh, material, None, Vec3::new(0.0, 0.0, 8.0));
    let (child, _) = add_object(&mut scene, mesh, material, None, Vec3::ZERO);
    scene.attach(parent, child);
    scene.update_hierarchy();

    let mut sorter = RenderSorter::main_scene();
    let mut state = RenderState::new(camera_at_origin());
    cull(&mut scene, &mut shaders, &mut sorter, &mut state);

    assert_eq!(sorter.visible_count(), 0);
    assert!(scene.nodes[parent].culled());
    assert!(!scene.nodes[child].visible());
}

#[test]
fn fully_inside_parent_still_visits_children() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    let (parent, _) = add_object(&mut scene, mesh, material, None, Vec3::new(0.0, 0.0, -5.0));
    let (child, _) = add_object(&mut scene, mesh, material, None, Vec3::new(0.2, 0.0, 0.0));
    scene.attach(parent, child);
    scene.update_hierarchy();

    let mut sorter = RenderSorter::main_scene();
    let mut state = RenderState::new(camera_at_origin());
    cull(&mut scene, &mut shaders, &mut sorter, &mut state);

    assert_eq!(sorter.visible_count(), 2);
    assert!(scene.nodes[child].visible());
}

#[test]
fn culling_toggle_visits_everything() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    add_object(&mut scene, mesh, material, None, Vec3::new(0.0, 0.0, -5.0));
    add_object(&mut scene, mesh, material, None, Vec3::new(0.0, 0.0, 50000.0));
    scene.set_frustum_culling(false);
    scene.update_hierarchy();

    let mut sorter = RenderSorter::main_scene();
    let mut state = RenderState::new(camera_at_origin());
    cull(&mut scene, &mut shaders, &mut sorter, &mut state);

    assert_eq!(sorter.visible_count(), 2);
}

#[test]
fn disabled_node_skips_subtree() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    let (parent, _) = add_object(&mut scene, mesh, material, None, Vec3::new(0.0, 0.0, -5.0));
    let (child, _) = add_object(&mut scene, mesh, material, None, Vec3::ZERO);
    scene.attach(parent, child);
    scene.set_enabled(parent, false);
    scene.update_hierarchy();

    let mut sorter = RenderSorter::main_scene();
    let mut state = RenderState::new(camera_at_origin());
    cull(&mut scene, &mut shaders, &mut sorter, &mut state);

    assert_eq!(sorter.visible_count(), 0);
}

#[test]
fn zero_render_mask_pass_is_skipped() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    let (_, rdata) = add_object(&mut scene, mesh, material, None, Vec3::new(0.0, 0.0, -5.0));
    scene.render_data_pool[rdata]
        .pass_mut(0)
        .unwrap()
        .modes_mut()
        .set_render_mask(0);
    scene.update_hierarchy();

    let mut sorter = RenderSorter::main_scene();
    let mut state = RenderState::new(camera_at_origin());
    cull(&mut scene, &mut shaders, &mut sorter, &mut state);

    assert_eq!(sorter.visible_count(), 0);
}

// ============================================================================
// Pool discipline
// ============================================================================

#[test]
fn pool_resets_each_frame() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    scene.update_hierarchy();

    let mut sorter = RenderSorter::main_scene();
    let mut state = RenderState::new(camera_at_origin());
    cull(&mut scene, &mut shaders, &mut sorter, &mut state);
    // Only the render tree root occupies the pool
    assert_eq!(sorter.pool_allocated(), 1);
    assert_eq!(sorter.visible_count(), 0);
}

#[test]
fn pool_grows_once_then_reuses_blocks() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    for i in 0..300 {
        add_object(
            &mut scene,
            mesh,
            material,
            None,
            Vec3::new(i as f32 * 0.001, 0.0, -5.0),
        );
    }
    scene.update_hierarchy();

    let mut sorter = RenderSorter::main_scene();
    let mut state = RenderState::new(camera_at_origin());
    cull(&mut scene, &mut shaders, &mut sorter, &mut state);
    assert_eq!(sorter.visible_count(), 300);
    // 300 visible + tree root: at least ceil(301 / 128) blocks
    assert!(sorter.pool_block_count() >= 3);
    let blocks_after_first_frame = sorter.pool_block_count();

    for _ in 0..3 {
        cull(&mut scene, &mut shaders, &mut sorter, &mut state);
    }
    assert_eq!(sorter.visible_count(), 300);
    assert_eq!(sorter.pool_block_count(), blocks_after_first_frame);
}
