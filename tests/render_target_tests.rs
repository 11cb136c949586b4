//! End-to-end driver scenarios: empty scene, single draw, shader
//! regeneration on light changes, the post-effect ping-pong chain and
//! shadow-map generation.

mod common;

use common::*;
use glam::{Vec3, Vec4};
use lumen::render::backend::{SHADOW_TEXTURE_UNIT, TextureId, Viewport};
use lumen::render::headless::{Command, HeadlessBackend};
use lumen::{
    Camera, Light, RenderData, RenderPass, RenderSorter, RenderTarget, RenderTexture, Renderer,
    Scene, ShaderFlags, ShaderManager, ShadowMap,
};

const LIGHT_DESC: &str = "float4 color; float intensity; int shadow_map_index";

fn main_target(camera: Camera) -> RenderTarget {
    RenderTarget::new(None, camera, RenderSorter::main_scene(), false, false)
}

// ============================================================================
// S1 — empty scene
// ============================================================================

#[test]
fn empty_scene_clears_and_draws_nothing() {
    init_logging();
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let mut renderer = Renderer::new(Box::new(HeadlessBackend::new()));
    let background = Vec4::new(0.2, 0.3, 0.4, 1.0);
    let mut camera = camera_at_origin();
    camera.background = Some(background);
    let mut target = main_target(camera.clone());
    scene.update_hierarchy();

    renderer.cull_from_camera(&mut scene, &mut shaders, None, &mut target, &camera);
    renderer
        .render_render_target(&mut scene, &mut shaders, None, &mut target, None, None)
        .unwrap();

    assert_eq!(renderer.stats.draw_calls, 0);
    assert_eq!(renderer.stats.triangles, 0);
    let backend = headless(&mut renderer);
    assert!(backend.draws().is_empty());
    assert!(backend.commands.iter().any(|c| {
        matches!(c, Command::Clear { color: Some(c), depth: true, .. } if *c == background)
    }));
    // The post-effect path never ran
    assert!(
        !backend
            .commands
            .iter()
            .any(|c| matches!(c, Command::BindFramebuffer(Some(_))))
    );
}

// ============================================================================
// S2 — one opaque quad
// ============================================================================

#[test]
fn single_quad_draws_once() {
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
    add_object(&mut scene, mesh, material, Some(shader), Vec3::new(0.0, 0.0, -5.0));
    scene.update_hierarchy();

    let mut renderer = Renderer::new(Box::new(HeadlessBackend::new()));
    let camera = camera_at_origin();
    let mut target = main_target(camera.clone());

    renderer.cull_from_camera(&mut scene, &mut shaders, None, &mut target, &camera);
    renderer
        .render_render_target(&mut scene, &mut shaders, None, &mut target, None, None)
        .unwrap();

    assert_eq!(renderer.stats.draw_calls, 1);
    assert_eq!(renderer.stats.triangles, 6);
    assert_eq!(target.sorter.transform_blocks().len(), 1);
}

// ============================================================================
// S4 — shader signature mismatch on light change
// ============================================================================

#[test]
fn light_change_regenerates_stale_shader() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let mut bridge = TestBridge::new(ShaderFlags::USE_LIGHTS, None);
    scene.lights.add_light(Light::new("DirectLight", LIGHT_DESC).unwrap());

    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    let (_, rdata) = add_object(&mut scene, mesh, material, None, Vec3::new(0.0, 0.0, -5.0));
    scene.update_hierarchy();

    let mut renderer = Renderer::new(Box::new(HeadlessBackend::new()));
    let camera = camera_at_origin();
    let mut target = main_target(camera.clone());

    renderer.cull_from_camera(
        &mut scene,
        &mut shaders,
        Some(&mut bridge),
        &mut target,
        &camera,
    );
    assert_eq!(
        bridge.regenerations.last().unwrap().2,
        "TestShader$DirectLight1"
    );

    // The light set changes between frames; the cached shader's signature
    // no longer matches and must be regenerated.
    scene.lights.add_light(Light::new("PointLight", LIGHT_DESC).unwrap());
    renderer.cull_from_camera(
        &mut scene,
        &mut shaders,
        Some(&mut bridge),
        &mut target,
        &camera,
    );
    assert_eq!(
        bridge.regenerations.last().unwrap().2,
        "TestShader$DirectLight1PointLight1"
    );
    let new_shader = shaders.find("TestShader$DirectLight1PointLight1").unwrap();
    assert_eq!(
        scene.render_data_pool[rdata].pass(0).unwrap().shader(),
        Some(new_shader)
    );
}

// ============================================================================
// S5 — post-effect chain of three passes
// ============================================================================

#[test]
fn post_effect_chain_ping_pongs() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let shader = shaders.add_shader("Post", ShaderFlags::empty(), None).unwrap();

    let mut effects = RenderData::new();
    for _ in 0..3 {
        let material = color_material(&mut scene);
        let mut pass = RenderPass::new(material);
        pass.set_shader(Some(shader));
        effects.add_pass(pass);
    }
    let effects_key = scene.add_render_data(effects);

    let mut camera = camera_at_origin();
    camera.post_effects = Some(effects_key);
    scene.update_hierarchy();

    let mut renderer = Renderer::new(Box::new(HeadlessBackend::new()));
    let default_viewport = Viewport::new(0, 0, 800, 600);
    renderer.set_default_viewport(default_viewport);

    let post_a = RenderTexture::new(TextureId(101), 11, 256, 256);
    let post_b = RenderTexture::new(TextureId(102), 12, 256, 256);
    let mut target = main_target(camera.clone());

    renderer.cull_from_camera(&mut scene, &mut shaders, None, &mut target, &camera);
    renderer
        .render_render_target(
            &mut scene,
            &mut shaders,
            None,
            &mut target,
            Some(&post_a),
            Some(&post_b),
        )
        .unwrap();

    let backend = headless(&mut renderer);

    // Scene -> postA, pass0 -> postB, pass1 -> postA, final -> default.
    let framebuffers: Vec<Option<u32>> = backend
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::BindFramebuffer(fbo) => Some(*fbo),
            _ => None,
        })
        .collect();
    assert_eq!(
        framebuffers,
        vec![None, Some(11), Some(12), Some(11), None]
    );

    // Each pass reads the texture the previous one wrote.
    let inputs: Vec<TextureId> = backend
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::BindTexture {
                texture,
                location: 0,
                ..
            } => Some(*texture),
            _ => None,
        })
        .collect();
    assert_eq!(inputs, vec![TextureId(101), TextureId(102), TextureId(101)]);

    // Three full-screen quads
    assert_eq!(draw_counts(backend), vec![6, 6, 6]);

    // The viewport ends where it started.
    let last_viewport = backend
        .commands
        .iter()
        .rev()
        .find_map(|c| match c {
            Command::SetViewport(v) => Some(*v),
            _ => None,
        })
        .unwrap();
    assert_eq!(last_viewport, default_viewport);
}

// ============================================================================
// S6 — shadow maps
// ============================================================================

#[test]
fn shadow_maps_render_casters_only() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let mut bridge = TestBridge::new(
        ShaderFlags::MATRIX_UNIFORMS | ShaderFlags::USE_LIGHTS,
        Some("left_view_proj * model"),
    );

    // One caster (6 indices), one non-caster (3 indices).
    let caster_mesh = scene.add_mesh(mesh_with_indices(6));
    let other_mesh = scene.add_mesh(mesh_with_indices(3));
    let material = color_material(&mut scene);
    add_object(&mut scene, caster_mesh, material, None, Vec3::new(0.0, 0.0, -5.0));
    let (_, non_caster) =
        add_object(&mut scene, other_mesh, material, None, Vec3::new(0.5, 0.0, -5.0));
    scene.render_data_pool[non_caster]
        .pass_mut(0)
        .unwrap()
        .modes_mut()
        .set_cast_shadows(false);

    // A directional light with an attached shadow map.
    let mut light_camera = Camera::new_orthographic(10.0, 1.0, 0.1, 50.0);
    light_camera.look_at(
        Vec3::new(0.0, 10.0, -5.0),
        Vec3::new(0.0, 0.0, -5.0),
        Vec3::new(0.0, 0.0, -1.0),
    );
    let shadow_texture = RenderTexture::new(TextureId(900), 90, 512, 512).with_layers(4);
    let mut light = Light::new("DirectLight", LIGHT_DESC).unwrap();
    light.set_shadow_map(Some(ShadowMap::new(light_camera, shadow_texture.clone())));
    let light_key = scene.lights.add_light(light);

    let mut plain = Light::new("DirectLight", LIGHT_DESC).unwrap();
    plain.set_shadow_map(None);
    let plain_key = scene.lights.add_light(plain);

    scene.update_hierarchy();

    let mut renderer = Renderer::new(Box::new(HeadlessBackend::new()));
    renderer.make_shadow_maps(&mut scene, &mut shaders, Some(&mut bridge));

    // Layer assignment: the mapped light gets layer 0, the other -1.
    assert_eq!(
        scene.lights.get(light_key).unwrap().get_int("shadow_map_index"),
        Some(0)
    );
    assert_eq!(
        scene.lights.get(plain_key).unwrap().get_int("shadow_map_index"),
        Some(-1)
    );
    assert_eq!(scene.lights.shadow_map_count(), 1);

    {
        let backend = headless(&mut renderer);
        assert!(backend.commands.iter().any(|c| {
            matches!(c, Command::SetTextureLayer { texture, layer: 0 } if *texture == TextureId(900))
        }));
        // Only the caster reached the shadow pass.
        assert_eq!(draw_counts(backend), vec![6]);
        backend.clear_commands();
    }

    // Main pass: the light-reading shader binds the shadow map sampler.
    let camera = camera_at_origin();
    let mut target = main_target(camera.clone());
    renderer.cull_from_camera(
        &mut scene,
        &mut shaders,
        Some(&mut bridge),
        &mut target,
        &camera,
    );
    renderer
        .render_render_target(
            &mut scene,
            &mut shaders,
            Some(&mut bridge),
            &mut target,
            None,
            None,
        )
        .unwrap();

    assert_eq!(renderer.stats.draw_calls, 2);
    let backend = headless(&mut renderer);
    assert!(backend.commands.iter().any(|c| {
        matches!(c, Command::BindTexture { texture, location, .. }
            if *texture == TextureId(900) && *location == SHADOW_TEXTURE_UNIT)
    }));
}

// ============================================================================
// Fatal framebuffer errors
// ============================================================================

#[test]
fn incomplete_framebuffer_aborts_frame() {
    let mut scene = Scene::new();
    let mut shaders = ShaderManager::new();
    let mut backend = HeadlessBackend::new();
    backend.fail_framebuffer = true;
    let mut renderer = Renderer::new(Box::new(backend));

    let camera = camera_at_origin();
    let texture = RenderTexture::new(TextureId(1), 5, 64, 64);
    let mut target = RenderTarget::new(
        Some(texture),
        camera.clone(),
        RenderSorter::main_scene(),
        false,
        false,
    );
    scene.update_hierarchy();

    renderer.cull_from_camera(&mut scene, &mut shaders, None, &mut target, &camera);
    let result =
        renderer.render_render_target(&mut scene, &mut shaders, None, &mut target, None, None);
    assert!(result.is_err());
    assert!(headless(&mut renderer).draws().is_empty());
}
