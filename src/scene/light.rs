//! Light sources.
//!
//! A light is a bag of uniforms plus a light class (`"DirectLight"`,
//! `"PointLight"`, ...). All lights of a class share one uniform struct
//! layout; the [`LightList`](crate::scene::lights::LightList) packs every
//! light into a single shared block, one class array after another.

use crate::errors::Result;
use crate::render::target::RenderTexture;
use crate::render::uniform_block::{LIGHT_UBO_INDEX, UniformBlock};
use crate::scene::camera::Camera;
use glam::{Mat4, Vec3, Vec4};
use uuid::Uuid;

/// A depth render target attached to a light.
///
/// All shadow maps render into slices of one layered depth texture; the
/// layer index is assigned each frame by the shadow-map loop.
#[derive(Debug, Clone)]
pub struct ShadowMap {
    /// Viewpoint the scene is rendered from for this light
    pub camera: Camera,
    /// Layered depth texture slice target
    pub texture: RenderTexture,
    /// Assigned layer, -1 before the first shadow frame
    pub layer: i32,
}

impl ShadowMap {
    #[must_use]
    pub fn new(camera: Camera, texture: RenderTexture) -> Self {
        Self {
            camera,
            texture,
            layer: -1,
        }
    }
}

/// One light source.
#[derive(Debug)]
pub struct Light {
    uuid: Uuid,
    name: String,
    class: String,
    light_index: i32,
    block_offset: i32,
    pub enabled: bool,
    uniforms: UniformBlock,
    shadow_map: Option<ShadowMap>,
    dirty: bool,
}

impl Light {
    /// Creates a light of the given class from a uniform descriptor.
    pub fn new(class: &str, uniform_descriptor: &str) -> Result<Self> {
        let uuid = Uuid::new_v4();
        Ok(Self {
            uuid,
            name: format!("light_{}", uuid.simple()),
            class: class.to_string(),
            light_index: -1,
            block_offset: 0,
            enabled: true,
            uniforms: UniformBlock::new(uniform_descriptor, LIGHT_UBO_INDEX, class)?,
            shadow_map: None,
            dirty: true,
        })
    }

    #[inline]
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Unique light name usable from shader code.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The light class; lights of one class share a struct layout.
    #[inline]
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Zero-based index of this light within its class.
    #[inline]
    #[must_use]
    pub fn light_index(&self) -> i32 {
        self.light_index
    }

    pub(crate) fn set_light_index(&mut self, index: i32) {
        self.light_index = index;
    }

    /// Offset of this light in the shared light block, in floats.
    #[inline]
    #[must_use]
    pub fn block_offset(&self) -> i32 {
        self.block_offset
    }

    pub(crate) fn set_block_offset(&mut self, offset: i32) {
        self.block_offset = offset;
    }

    /// Byte size of this light's uniforms.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.uniforms.total_size()
    }

    #[must_use]
    pub fn uniforms(&self) -> &UniformBlock {
        &self.uniforms
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    // ========================================================================
    // Uniform forwarding (marks the light for re-sync into the shared block)
    // ========================================================================

    pub fn set_int(&mut self, name: &str, val: i32) -> bool {
        let ok = self.uniforms.set_int(name, val);
        self.dirty |= ok;
        ok
    }

    pub fn set_float(&mut self, name: &str, val: f32) -> bool {
        let ok = self.uniforms.set_float(name, val);
        self.dirty |= ok;
        ok
    }

    pub fn set_vec3(&mut self, name: &str, val: Vec3) -> bool {
        let ok = self.uniforms.set_vec3(name, val);
        self.dirty |= ok;
        ok
    }

    pub fn set_vec4(&mut self, name: &str, val: Vec4) -> bool {
        let ok = self.uniforms.set_vec4(name, val);
        self.dirty |= ok;
        ok
    }

    pub fn set_mat4(&mut self, name: &str, val: &Mat4) -> bool {
        let ok = self.uniforms.set_mat4(name, val);
        self.dirty |= ok;
        ok
    }

    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i32> {
        self.uniforms.get_int(name)
    }

    #[must_use]
    pub fn get_float(&self, name: &str) -> Option<f32> {
        self.uniforms.get_float(name)
    }

    // ========================================================================
    // Shadow mapping
    // ========================================================================

    #[must_use]
    pub fn cast_shadow(&self) -> bool {
        self.shadow_map.is_some()
    }

    #[must_use]
    pub fn shadow_map(&self) -> Option<&ShadowMap> {
        self.shadow_map.as_ref()
    }

    pub fn shadow_map_mut(&mut self) -> Option<&mut ShadowMap> {
        self.shadow_map.as_mut()
    }

    pub fn set_shadow_map(&mut self, shadow_map: Option<ShadowMap>) {
        self.shadow_map = shadow_map;
        self.dirty = true;
    }

    /// Emits the shader struct layout for this light's class.
    #[must_use]
    pub fn make_shader_layout(&self) -> String {
        let mut out = format!("struct U{} {{\n", self.class);
        for e in self.uniforms.entries() {
            if e.count > 1 {
                out.push_str(&format!("    {} {}[{}];\n", e.ty.shader_type(), e.name, e.count));
            } else {
                out.push_str(&format!("    {} {};\n", e.ty.shader_type(), e.name));
            }
        }
        out.push_str("};\n");
        out
    }
}
