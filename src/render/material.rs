//! Materials: a uniform block plus named textures.

use crate::errors::Result;
use crate::render::backend::{RenderBackend, TextureId};
use crate::render::uniform_block::{MATERIAL_UBO_INDEX, UniformBlock};
use crate::shader::ShaderId;
use bitflags::bitflags;
use glam::{Vec2, Vec3, Vec4};
use std::collections::BTreeMap;

bitflags! {
    /// Material dirty state observed by the sorter during validate.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct MaterialDirty: u32 {
        /// A texture slot went from unset to set; the shader must be rebuilt.
        const NEW_TEXTURE = 1 << 0;
        /// An already-set texture was replaced.
        const MOD_TEXTURE = 1 << 1;
        /// Uniform data changed and needs a GPU upload.
        const MAT_DATA    = 1 << 2;
    }
}

/// Shader parameter data: one uniform block and a name-to-texture mapping
/// whose keys are enumerated by the texture descriptor.
///
/// Materials are shared by reference between passes; the sorter only mutates
/// them during validate, never during submit.
#[derive(Debug)]
pub struct Material {
    uniforms: UniformBlock,
    textures: BTreeMap<String, Option<TextureId>>,
    dirty: MaterialDirty,
}

impl Material {
    /// Creates a material from a uniform descriptor and a texture descriptor
    /// (`"sampler2D u_texture; sampler2D u_normal_map"`).
    pub fn new(uniform_descriptor: &str, texture_descriptor: &str) -> Result<Self> {
        let mut uniforms = UniformBlock::new(uniform_descriptor, MATERIAL_UBO_INDEX, "Material_ubo")?;
        uniforms.set_use_gpu_buffer(true);
        let textures = texture_descriptor
            .split([';', ',', '\n'])
            .filter_map(|decl| decl.split_whitespace().last())
            .map(|name| (name.to_string(), None))
            .collect();
        Ok(Self {
            uniforms,
            textures,
            dirty: MaterialDirty::empty(),
        })
    }

    #[must_use]
    pub fn uniforms(&self) -> &UniformBlock {
        &self.uniforms
    }

    // ========================================================================
    // Dirty tracking
    // ========================================================================

    #[must_use]
    pub fn is_dirty(&self, bits: MaterialDirty) -> bool {
        self.dirty.intersects(bits)
    }

    pub fn mark_dirty(&mut self, bits: MaterialDirty) {
        self.dirty |= bits;
    }

    pub fn clear_dirty(&mut self, bits: MaterialDirty) {
        self.dirty -= bits;
    }

    // ========================================================================
    // Textures
    // ========================================================================

    /// Assigns a texture by descriptor name. Unknown names are rejected.
    pub fn set_texture(&mut self, name: &str, texture: TextureId) -> bool {
        match self.textures.get_mut(name) {
            Some(slot) => {
                let bit = if slot.is_none() {
                    MaterialDirty::NEW_TEXTURE
                } else {
                    MaterialDirty::MOD_TEXTURE
                };
                *slot = Some(texture);
                self.dirty |= bit;
                true
            }
            None => {
                log::warn!("MATERIAL: texture '{name}' not in descriptor");
                false
            }
        }
    }

    #[must_use]
    pub fn texture(&self, name: &str) -> Option<TextureId> {
        self.textures.get(name).copied().flatten()
    }

    /// Bound texture slots in deterministic (name) order.
    pub fn textures(&self) -> impl Iterator<Item = (&str, TextureId)> {
        self.textures
            .iter()
            .filter_map(|(name, tex)| tex.map(|t| (name.as_str(), t)))
    }

    // ========================================================================
    // Uniform forwarding (marks MAT_DATA)
    // ========================================================================

    pub fn set_int(&mut self, name: &str, val: i32) -> bool {
        let ok = self.uniforms.set_int(name, val);
        if ok {
            self.dirty |= MaterialDirty::MAT_DATA;
        }
        ok
    }

    pub fn set_float(&mut self, name: &str, val: f32) -> bool {
        let ok = self.uniforms.set_float(name, val);
        if ok {
            self.dirty |= MaterialDirty::MAT_DATA;
        }
        ok
    }

    pub fn set_vec2(&mut self, name: &str, val: Vec2) -> bool {
        let ok = self.uniforms.set_vec2(name, val);
        if ok {
            self.dirty |= MaterialDirty::MAT_DATA;
        }
        ok
    }

    pub fn set_vec3(&mut self, name: &str, val: Vec3) -> bool {
        let ok = self.uniforms.set_vec3(name, val);
        if ok {
            self.dirty |= MaterialDirty::MAT_DATA;
        }
        ok
    }

    pub fn set_vec4(&mut self, name: &str, val: Vec4) -> bool {
        let ok = self.uniforms.set_vec4(name, val);
        if ok {
            self.dirty |= MaterialDirty::MAT_DATA;
        }
        ok
    }

    pub fn set_float_vec(&mut self, name: &str, val: &[f32]) -> bool {
        let ok = self.uniforms.set_float_vec(name, val);
        if ok {
            self.dirty |= MaterialDirty::MAT_DATA;
        }
        ok
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// True when the material's color or opacity uniforms request blending.
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        if self.uniforms.has_uniform("u_opacity") {
            if let Some(opacity) = self.uniforms.get_float("u_opacity") {
                if opacity < 1.0 {
                    return true;
                }
            }
        }
        for name in ["diffuse_color", "u_color"] {
            if self.uniforms.has_uniform(name) {
                if let Some(color) = self.uniforms.get_vec4(name) {
                    if color.w < 1.0 {
                        return true;
                    }
                }
            }
        }
        false
    }

    // ========================================================================
    // GPU interface
    // ========================================================================

    /// Pushes pending uniform data to the GPU.
    pub fn update_gpu(&mut self, backend: &mut dyn RenderBackend) {
        if self.dirty.intersects(MaterialDirty::MAT_DATA) || self.uniforms.is_dirty() {
            self.uniforms.update_gpu(backend, 0, 0);
        }
        self.dirty -= MaterialDirty::MAT_DATA | MaterialDirty::MOD_TEXTURE;
    }

    /// Binds the uniform block and every assigned texture for a draw.
    pub fn bind(&self, backend: &mut dyn RenderBackend, shader: ShaderId) {
        self.uniforms.bind_buffer(backend, shader, 0);
        for (unit, (_, texture)) in self.textures().enumerate() {
            backend.bind_texture(texture, unit as u32, unit as u32);
        }
    }
}
