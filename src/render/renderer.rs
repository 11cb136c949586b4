//! The per-frame driver.
//!
//! `Renderer` owns the backend, the frame statistics, the shared shadow and
//! post-effect sorters, and the current-state cache. Hosts call
//! [`Renderer::make_shadow_maps`], then per target
//! [`Renderer::cull_from_camera`] and [`Renderer::render_render_target`].
//! Scene-graph mutation (including [`Scene::update_hierarchy`]) happens
//! between frames, outside these calls.

use crate::errors::Result;
use crate::render::backend::{RenderBackend, TextureId, Viewport};
use crate::render::modes::CullFace;
use crate::render::sorter::{CurrentState, FrameContext, HostBridge, RenderSorter};
use crate::render::state::RenderState;
use crate::render::target::RenderTarget;
use crate::render::{MeshKey, RenderDataKey};
use crate::render::data::RenderData;
use crate::render::mesh::Mesh;
use crate::scene::Scene;
use crate::scene::camera::{Camera, RENDER_MASK_BOTH, RENDER_MASK_RIGHT};
use crate::shader::ShaderManager;
use log::error;

/// Frame counters, reset at the start of every target.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenderStats {
    pub draw_calls: u32,
    pub triangles: u32,
}

impl RenderStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Reborrows a host bridge for one call without moving the caller's option.
///
/// `Option::as_deref_mut` forces the reborrow to live as long as the
/// original `&mut dyn HostBridge`, which breaks repeated per-pass use; this
/// matches it field-for-field via an explicit reborrow instead.
fn reborrow_bridge<'s>(
    bridge: &'s mut Option<&mut dyn HostBridge>,
) -> Option<&'s mut dyn HostBridge> {
    match bridge {
        Some(b) => Some(&mut **b),
        None => None,
    }
}

/// Top-level per-frame driver.
pub struct Renderer {
    backend: Box<dyn RenderBackend>,
    pub stats: RenderStats,
    current: CurrentState,
    shadow_sorter: RenderSorter,
    post_sorter: RenderSorter,
    post_effect_mesh: Option<(u32, MeshKey)>,
    bound_fbo: Option<u32>,
    bound_viewport: Viewport,
}

impl Renderer {
    #[must_use]
    pub fn new(backend: Box<dyn RenderBackend>) -> Self {
        Self {
            backend,
            stats: RenderStats::default(),
            current: CurrentState::new(),
            shadow_sorter: RenderSorter::shadow(),
            post_sorter: RenderSorter::post_effect(),
            post_effect_mesh: None,
            bound_fbo: None,
            bound_viewport: Viewport::new(0, 0, 0, 0),
        }
    }

    pub fn backend_mut(&mut self) -> &mut dyn RenderBackend {
        &mut *self.backend
    }

    /// Tells the driver which viewport the default framebuffer uses, so the
    /// post-effect chain can restore it.
    pub fn set_default_viewport(&mut self, viewport: Viewport) {
        self.bound_viewport = viewport;
        self.backend.set_viewport(viewport);
    }

    // ========================================================================
    // Per-target steps
    // ========================================================================

    /// Culls and sorts the scene for a target from the given camera.
    pub fn cull_from_camera(
        &mut self,
        scene: &mut Scene,
        shaders: &mut ShaderManager,
        mut bridge: Option<&mut dyn HostBridge>,
        target: &mut RenderTarget,
        camera: &Camera,
    ) {
        let mut ctx = FrameContext {
            scene,
            shaders,
            bridge: reborrow_bridge(&mut bridge),
            backend: &mut *self.backend,
            stats: &mut self.stats,
        };
        target.cull_from_camera(&mut ctx, camera);
    }

    /// Renders a culled target, including its post-effect chain.
    pub fn render_render_target(
        &mut self,
        scene: &mut Scene,
        shaders: &mut ShaderManager,
        mut bridge: Option<&mut dyn HostBridge>,
        target: &mut RenderTarget,
        post_a: Option<&crate::render::target::RenderTexture>,
        post_b: Option<&crate::render::target::RenderTexture>,
    ) -> Result<()> {
        self.stats.reset();
        target.begin_rendering(&mut *self.backend)?;
        if let Some(tex) = &target.texture {
            self.bound_fbo = Some(tex.fbo);
            self.bound_viewport = Viewport::new(0, 0, tex.width as i32, tex.height as i32);
        } else {
            self.bound_fbo = None;
        }
        self.current.reset();

        // Eye selection for this target.
        let state = &mut target.state;
        if state.is_multiview {
            state.u_render_mask = RENDER_MASK_BOTH;
            state.u_right = 1;
        } else {
            state.u_render_mask = state.camera.render_mask;
            state.u_right =
                u8::from(state.is_stereo && (state.u_render_mask & RENDER_MASK_RIGHT) != 0);
        }

        // Default pipeline state, matching what restore_render_modes
        // returns to.
        self.backend.set_render_modes(&self.current.modes);

        let camera_background = target.state.camera.background;
        let clear_depth = target.state.camera.clear_depth;
        let clear_stencil = target.state.camera.clear_stencil;
        let post_effects = target.state.camera.post_effects;
        let pass_count = post_effects
            .and_then(|key| scene.render_data_pool.get(key))
            .map(RenderData::pass_count)
            .unwrap_or(0);

        match (post_effects, post_a) {
            (Some(post_effects), Some(post_a)) if pass_count > 0 => {
                let npost = pass_count - 1;
                let saved_fbo = self.bound_fbo;
                let saved_viewport = self.bound_viewport;

                // Scene renders into the first ping-pong texture.
                self.bind_framebuffer(
                    Some(post_a.fbo),
                    Viewport::new(0, 0, post_a.width as i32, post_a.height as i32),
                );
                self.backend
                    .clear(camera_background, clear_depth, clear_stencil);
                {
                    let mut ctx = FrameContext {
                        scene,
                        shaders,
                        bridge: reborrow_bridge(&mut bridge),
                        backend: &mut *self.backend,
                        stats: &mut self.stats,
                    };
                    target.render(&mut ctx, &mut self.current);
                }

                // Intermediate passes ping-pong between the two textures.
                let mut input = post_a.id;
                for i in 0..npost {
                    let tex = if i % 2 == 0 { post_b } else { Some(post_a) };
                    let Some(tex) = tex else {
                        error!("RENDER: post-effect chain of {pass_count} passes needs both ping-pong textures");
                        break;
                    };
                    self.bind_framebuffer(
                        Some(tex.fbo),
                        Viewport::new(0, 0, tex.width as i32, tex.height as i32),
                    );
                    self.backend.clear(camera_background, true, false);
                    self.render_post_effect_data(
                        &mut target.state,
                        scene,
                        shaders,
                        reborrow_bridge(&mut bridge),
                        input,
                        post_effects,
                        i,
                    );
                    input = tex.id;
                }

                // Final pass lands in the saved framebuffer and viewport.
                self.bind_framebuffer(saved_fbo, saved_viewport);
                self.backend.clear(camera_background, true, false);
                self.render_post_effect_data(
                    &mut target.state,
                    scene,
                    shaders,
                    reborrow_bridge(&mut bridge),
                    input,
                    post_effects,
                    npost,
                );
            }
            _ => {
                self.backend
                    .clear(camera_background, clear_depth, clear_stencil);
                let mut ctx = FrameContext {
                    scene,
                    shaders,
                    bridge: reborrow_bridge(&mut bridge),
                    backend: &mut *self.backend,
                    stats: &mut self.stats,
                };
                target.render(&mut ctx, &mut self.current);
            }
        }
        target.end_rendering(&mut *self.backend);
        Ok(())
    }

    fn bind_framebuffer(&mut self, fbo: Option<u32>, viewport: Viewport) {
        self.backend.bind_framebuffer(fbo);
        self.backend.set_viewport(viewport);
        self.bound_fbo = fbo;
        self.bound_viewport = viewport;
    }

    // ========================================================================
    // Post effects
    // ========================================================================

    /// Renders one post-effect pass: the input texture is assigned to the
    /// pass material's `u_texture` and a single synthetic Renderable is
    /// drawn through the post-effect sorter.
    pub fn render_post_effect_data(
        &mut self,
        state: &mut RenderState,
        scene: &mut Scene,
        shaders: &mut ShaderManager,
        bridge: Option<&mut dyn HostBridge>,
        input_texture: TextureId,
        post_effects: RenderDataKey,
        pass: usize,
    ) -> bool {
        {
            let Some(rdata) = scene.render_data_pool.get(post_effects) else {
                return false;
            };
            if rdata.pass(pass).is_none() {
                return false;
            }
        }
        if scene.render_data_pool[post_effects].mesh().is_none() {
            let mesh = self.update_post_effect_mesh(scene);
            scene.render_data_pool[post_effects].set_mesh(Some(mesh));
        }
        let material = scene.render_data_pool[post_effects]
            .pass(pass)
            .map(crate::render::pass::RenderPass::material);
        if let Some(m) = material.and_then(|m| scene.material_pool.get_mut(m)) {
            m.set_texture("u_texture", input_texture);
        }

        let mut ctx = FrameContext {
            scene,
            shaders,
            bridge,
            backend: &mut *self.backend,
            stats: &mut self.stats,
        };
        self.post_sorter.init(state, &mut ctx);
        if let Some(id) = self
            .post_sorter
            .add_renderable(state, &mut ctx, post_effects, pass)
        {
            let r = self.post_sorter.renderable_mut(id);
            r.modes.set_use_lights(false);
            r.modes.set_depth_test(false);
            r.modes.set_cull_face(CullFace::None);
        }
        self.post_sorter.sort(state, &mut ctx);
        self.post_sorter.render(state, &mut ctx, &mut self.current);
        true
    }

    /// Provides the shared clip-space quad mesh post effects draw with.
    pub fn update_post_effect_mesh(&mut self, scene: &mut Scene) -> MeshKey {
        if let Some((scene_id, key)) = self.post_effect_mesh {
            if scene_id == scene.id && scene.mesh_pool.contains_key(key) {
                return key;
            }
        }
        let mut mesh = Mesh::new();
        let positions = vec![
            -1.0, -1.0, 0.0, //
            1.0, -1.0, 0.0, //
            -1.0, 1.0, 0.0, //
            1.0, 1.0, 0.0,
        ];
        let texcoords = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        // Infallible: the first attribute fixes the vertex count.
        let _ = mesh.set_attribute("a_position", 3, positions);
        let _ = mesh.set_attribute("a_texcoord", 2, texcoords);
        let _ = mesh.set_indices_u16(vec![0, 1, 2, 1, 3, 2]);
        let key = scene.add_mesh(mesh);
        self.post_effect_mesh = Some((scene.id, key));
        key
    }

    // ========================================================================
    // Shadow maps
    // ========================================================================

    /// Generates shadow maps for every enabled light that carries one.
    ///
    /// Each light's scene is culled and sorted with the shadow sorter from
    /// the light's camera and rendered into its layer of the layered depth
    /// texture. Lights without a map get `shadow_map_index == -1`.
    pub fn make_shadow_maps(
        &mut self,
        scene: &mut Scene,
        shaders: &mut ShaderManager,
        mut bridge: Option<&mut dyn HostBridge>,
    ) {
        let keys = scene.lights.keys_in_order();
        let mut layer: i32 = 0;
        let mut last = None;

        for key in keys {
            let eligible = scene
                .lights
                .get(key)
                .is_some_and(|l| l.enabled && l.shadow_map().is_some());
            if !eligible {
                if let Some(light) = scene.lights.get_mut(key) {
                    light.set_int("shadow_map_index", -1);
                }
                continue;
            }
            let Some((camera, texture)) = scene.lights.get_mut(key).and_then(|light| {
                light.shadow_map_mut().map(|map| {
                    map.layer = layer;
                    (map.camera.clone(), map.texture.clone())
                })
            }) else {
                continue;
            };
            self.backend.set_texture_layer(&texture, layer as u32);

            let mut state = RenderState::new(camera);
            state.is_shadow = true;
            state.u_render_mask = 1;
            state.sample_count = texture.sample_count;
            {
                let mut ctx = FrameContext {
                    scene: &mut *scene,
                    shaders: &mut *shaders,
                    bridge: reborrow_bridge(&mut bridge),
                    backend: &mut *self.backend,
                    stats: &mut self.stats,
                };
                self.shadow_sorter.cull(&mut state, &mut ctx);
                self.shadow_sorter.sort(&mut state, &mut ctx);
            }
            if let Err(status) = self.backend.begin_render_texture(&texture) {
                error!("RENDER: shadow framebuffer incomplete, status {status:#x}");
                continue;
            }
            self.backend.bind_framebuffer(Some(texture.fbo));
            self.backend.set_viewport(Viewport::new(
                0,
                0,
                texture.width as i32,
                texture.height as i32,
            ));
            self.backend.clear(None, true, false);
            self.current.reset();
            {
                let mut ctx = FrameContext {
                    scene: &mut *scene,
                    shaders: &mut *shaders,
                    bridge: reborrow_bridge(&mut bridge),
                    backend: &mut *self.backend,
                    stats: &mut self.stats,
                };
                self.shadow_sorter.render(&mut state, &mut ctx, &mut self.current);
            }
            self.backend.end_render_texture(&texture);

            if let Some(light) = scene.lights.get_mut(key) {
                light.set_int("shadow_map_index", layer);
            }
            last = Some(key);
            layer += 1;
        }
        scene.lights.set_num_shadow_maps(layer as u32);
        scene.lights.set_active_shadow(last);
    }

    /// The shadow sorter, exposed for tests and diagnostics.
    #[must_use]
    pub fn shadow_sorter(&self) -> &RenderSorter {
        &self.shadow_sorter
    }
}
