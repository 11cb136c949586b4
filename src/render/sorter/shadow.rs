//! Shadow-pass sort policy.
//!
//! Shadow maps render depth only: Renderables that do not cast shadows are
//! rejected, every accepted one is rewritten to a shared shadow material and
//! fixed render modes, and one of two cached depth shaders is selected by
//! whether the mesh has bones. Missing depth shaders are generated once
//! through the host bridge.

use crate::render::material::Material;
use crate::render::modes::RenderModes;
use crate::render::renderable::Renderable;
use crate::render::sorter::FrameContext;
use crate::render::MaterialKey;
use crate::render::data::RenderData;
use crate::shader::ShaderId;
use log::error;

/// Signature of the depth shader for unskinned meshes.
pub const DEPTH_SHADER_SIGNATURE: &str = "DepthShader";
/// Signature of the depth shader for skinned meshes.
pub const DEPTH_SHADER_BONES_SIGNATURE: &str = "DepthShader$a_bone_weights$a_bone_indices";

/// State of the shadow sort policy.
#[derive(Debug)]
pub struct ShadowState {
    /// Cached depth shaders, indexed by has-bones
    depth_shaders: [Option<ShaderId>; 2],
    /// Shared material substituted into every shadow Renderable,
    /// created once per scene
    shadow_material: Option<(u32, MaterialKey)>,
    shadow_modes: RenderModes,
}

impl ShadowState {
    #[must_use]
    pub fn new() -> Self {
        let mut shadow_modes = RenderModes::new();
        shadow_modes.set_alpha_blend(false);
        shadow_modes.set_use_lights(false);
        shadow_modes.clear_dirty();
        Self {
            depth_shaders: [None, None],
            shadow_material: None,
            shadow_modes,
        }
    }

    /// Picks the depth shader for a mesh, generating the pair through the
    /// bridge the first time they are needed.
    pub(super) fn select_shader(
        &mut self,
        ctx: &mut FrameContext,
        has_bones: bool,
    ) -> Option<ShaderId> {
        let index = usize::from(has_bones);
        if let Some(id) = self.depth_shaders[index] {
            if ctx.shaders.get(id).is_some() {
                return Some(id);
            }
        }
        let signature = if has_bones {
            DEPTH_SHADER_BONES_SIGNATURE
        } else {
            DEPTH_SHADER_SIGNATURE
        };
        let mut shader = ctx.shaders.find(signature);
        if shader.is_none() {
            let FrameContext {
                scene,
                shaders,
                bridge,
                ..
            } = &mut *ctx;
            if let Some(bridge) = bridge.as_deref_mut() {
                if bridge.make_depth_shaders(shaders, scene) {
                    shader = shaders.find(signature);
                }
            }
            if shader.is_none() {
                error!("RENDER: cannot find depth shader {signature}");
            }
        }
        self.depth_shaders[index] = shader;
        shader
    }

    /// Shadow validation: reject non-casters, then substitute the depth
    /// shader, shared shadow material and shadow render modes.
    pub(super) fn validate_renderable(
        &mut self,
        ctx: &mut FrameContext,
        r: &Renderable,
    ) -> (bool, Option<ShaderId>, Option<MaterialKey>, RenderModes) {
        let casts = r
            .render_data
            .and_then(|k| ctx.scene.render_data_pool.get(k))
            .is_some_and(RenderData::cast_shadows);
        if !casts {
            return (false, None, None, self.shadow_modes);
        }
        let shader = self.select_shader(ctx, r.has_bones);
        let material = self.ensure_material(ctx);
        (true, shader, material, self.shadow_modes)
    }

    fn ensure_material(&mut self, ctx: &mut FrameContext) -> Option<MaterialKey> {
        if let Some((scene_id, key)) = self.shadow_material {
            if scene_id == ctx.scene.id && ctx.scene.material_pool.contains_key(key) {
                return Some(key);
            }
        }
        let material = Material::new("float4 u_color", "").ok()?;
        let key = ctx.scene.add_material(material);
        self.shadow_material = Some((ctx.scene.id, key));
        Some(key)
    }
}

impl Default for ShadowState {
    fn default() -> Self {
        Self::new()
    }
}
