//! Render-tree ordering tests: opaque lexicographic order, far-first
//! transparents, transparent promotion and state-change elision.

mod common;

use common::*;
use glam::Vec3;
use lumen::render::headless::{Command, HeadlessBackend};
use lumen::render::sorter::CurrentState;
use lumen::{
    FrameContext, RenderModes, RenderSorter, RenderState, RenderStats, Scene, ShaderFlags,
    ShaderManager,
};

/// Culls, sorts and submits the scene through a fresh main sorter, returning
/// the recorded command log.
fn run_frame(scene: &mut Scene, shaders: &mut ShaderManager) -> (HeadlessBackend, RenderStats) {
    let mut backend = HeadlessBackend::new();
    let mut stats = RenderStats::default();
    let mut sorter = RenderSorter::main_scene();
    let mut state = RenderState::new(camera_at_origin());
    let mut current = CurrentState::new();
    {
        let mut ctx = FrameContext {
            scene,
            shaders,
            bridge: None,
            backend: &mut backend,
            stats: &mut stats,
        };
        sorter.cull(&mut state, &mut ctx);
        sorter.sort(&mut state, &mut ctx);
        sorter.render(&mut state, &mut ctx, &mut current);
    }
    (backend, stats)
}

#[test]
fn opaque_order_is_lexicographic() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let shader_a = Some(shaders.add_shader("A", ShaderFlags::empty(), None).unwrap());
    let shader_b = Some(shaders.add_shader("B", ShaderFlags::empty(), None).unwrap());
    let material = color_material(&mut scene);
    let m3 = scene.add_mesh(mesh_with_indices(3));
    let m6 = scene.add_mesh(mesh_with_indices(6));
    let m9 = scene.add_mesh(mesh_with_indices(9));
    let m12 = scene.add_mesh(mesh_with_indices(12));

    // Insert scrambled; identify draws by index count.
    add_object(&mut scene, m12, material, shader_b, Vec3::new(0.0, 0.0, -5.0));
    add_object(&mut scene, m9, material, shader_a, Vec3::new(0.1, 0.0, -5.0));
    let (_, bg) = add_object(&mut scene, m3, material, shader_b, Vec3::new(0.2, 0.0, -5.0));
    add_object(&mut scene, m6, material, shader_a, Vec3::new(0.3, 0.0, -5.0));
    scene.render_data_pool[bg]
        .pass_mut(0)
        .unwrap()
        .modes_mut()
        .set_render_order(RenderModes::BACKGROUND);
    scene.update_hierarchy();

    let (backend, stats) = run_frame(&mut scene, &mut shaders);
    // Background first, then geometry by (shader, mesh)
    assert_eq!(draw_counts(&backend), vec![3, 6, 9, 12]);
    assert_eq!(stats.draw_calls, 4);
    assert_eq!(stats.triangles, 30);
}

#[test]
fn transparents_draw_far_to_near() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let shader = Some(shaders.add_shader("A", ShaderFlags::empty(), None).unwrap());
    let material = color_material(&mut scene);
    let far_mesh = scene.add_mesh(mesh_with_indices(6));
    let near_mesh = scene.add_mesh(mesh_with_indices(3));

    // Near object inserted first; far object must still draw first.
    let (_, near) = add_object(&mut scene, near_mesh, material, shader, Vec3::new(0.0, 0.0, -2.0));
    let (_, far) = add_object(&mut scene, far_mesh, material, shader, Vec3::new(0.0, 0.0, -5.0));
    for key in [near, far] {
        scene.render_data_pool[key]
            .pass_mut(0)
            .unwrap()
            .modes_mut()
            .set_render_order(RenderModes::TRANSPARENT);
    }
    scene.update_hierarchy();

    let (backend, _) = run_frame(&mut scene, &mut shaders);
    assert_eq!(draw_counts(&backend), vec![6, 3]);
}

#[test]
fn transparents_draw_after_opaques() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let shader = Some(shaders.add_shader("A", ShaderFlags::empty(), None).unwrap());
    let material = color_material(&mut scene);
    let transparent_mesh = scene.add_mesh(mesh_with_indices(3));
    let opaque_mesh = scene.add_mesh(mesh_with_indices(6));

    let (_, t) = add_object(
        &mut scene,
        transparent_mesh,
        material,
        shader,
        Vec3::new(0.0, 0.0, -3.0),
    );
    scene.render_data_pool[t]
        .pass_mut(0)
        .unwrap()
        .modes_mut()
        .set_render_order(RenderModes::TRANSPARENT);
    add_object(&mut scene, opaque_mesh, material, shader, Vec3::new(0.0, 0.0, -5.0));
    scene.update_hierarchy();

    let (backend, _) = run_frame(&mut scene, &mut shaders);
    assert_eq!(draw_counts(&backend), vec![6, 3]);
}

#[test]
fn transparent_material_promotes_geometry_pass() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let shader = Some(shaders.add_shader("A", ShaderFlags::empty(), None).unwrap());
    let translucent = color_material(&mut scene);
    scene.material_pool[translucent].set_float("u_opacity", 0.5);
    let opaque_material = color_material(&mut scene);
    scene.material_pool[opaque_material].set_float("u_opacity", 1.0);

    let translucent_mesh = scene.add_mesh(mesh_with_indices(3));
    let opaque_mesh = scene.add_mesh(mesh_with_indices(6));

    // Both passes start at the Geometry order; the translucent material's
    // pass must be promoted behind the opaque one.
    add_object(
        &mut scene,
        translucent_mesh,
        translucent,
        shader,
        Vec3::new(0.0, 0.0, -3.0),
    );
    add_object(
        &mut scene,
        opaque_mesh,
        opaque_material,
        shader,
        Vec3::new(0.0, 0.0, -5.0),
    );
    scene.update_hierarchy();

    let (backend, _) = run_frame(&mut scene, &mut shaders);
    assert_eq!(draw_counts(&backend), vec![6, 3]);
    // The promoted pass blends
    assert!(
        backend
            .commands
            .iter()
            .any(|c| matches!(c, Command::SetModes(_)))
    );
}

#[test]
fn equal_state_draws_elide_all_bindings() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let shader = Some(shaders.add_shader("A", ShaderFlags::empty(), None).unwrap());
    let material = color_material(&mut scene);
    let mesh = scene.add_mesh(mesh_with_indices(6));

    add_object(&mut scene, mesh, material, shader, Vec3::new(-0.5, 0.0, -5.0));
    add_object(&mut scene, mesh, material, shader, Vec3::new(0.5, 0.0, -5.0));
    scene.update_hierarchy();

    let (backend, stats) = run_frame(&mut scene, &mut shaders);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(backend.count(|c| matches!(c, Command::UseShader(_))), 1);
    assert_eq!(backend.count(|c| matches!(c, Command::BindMesh { .. })), 1);
    // Nothing at all between two identical draws
    assert!(commands_between_draws(&backend, 0).is_empty());
}

#[test]
fn custom_sort_options_reorder_levels() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let shader_a = Some(shaders.add_shader("A", ShaderFlags::empty(), None).unwrap());
    let shader_b = Some(shaders.add_shader("B", ShaderFlags::empty(), None).unwrap());
    let material = color_material(&mut scene);
    let m3 = scene.add_mesh(mesh_with_indices(3));
    let m6 = scene.add_mesh(mesh_with_indices(6));

    // Mesh-major ordering: m3 before m6 regardless of shader.
    add_object(&mut scene, m6, material, shader_a, Vec3::new(0.0, 0.0, -5.0));
    add_object(&mut scene, m3, material, shader_b, Vec3::new(0.1, 0.0, -5.0));
    scene.update_hierarchy();

    let mut backend = HeadlessBackend::new();
    let mut stats = RenderStats::default();
    let mut sorter = RenderSorter::main_scene();
    sorter.set_sort_options(&[lumen::SortKey::Mesh, lumen::SortKey::Shader]);
    let mut state = RenderState::new(camera_at_origin());
    let mut current = CurrentState::new();
    {
        let mut ctx = FrameContext {
            scene: &mut scene,
            shaders: &mut shaders,
            bridge: None,
            backend: &mut backend,
            stats: &mut stats,
        };
        sorter.cull(&mut state, &mut ctx);
        sorter.sort(&mut state, &mut ctx);
        sorter.render(&mut state, &mut ctx, &mut current);
    }
    assert_eq!(draw_counts(&backend), vec![3, 6]);
}
