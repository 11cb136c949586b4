//! The per-scene light set.
//!
//! Lights are grouped by class; class order (and therefore block layout and
//! the descriptor string) is deterministic regardless of insertion order.
//! All light uniforms live in one shared `Lights_ubo` block that is
//! reallocated when lights are added and re-synced when lights change.

use crate::render::backend::{RenderBackend, TextureId};
use crate::render::uniform_block::{LIGHT_UBO_INDEX, UniformBlock};
use crate::scene::LightKey;
use crate::scene::light::Light;
use crate::shader::ShaderId;
use bitflags::bitflags;
use log::warn;
use slotmap::SlotMap;
use std::collections::BTreeMap;

/// A light class never contributes more than 9 instances to the descriptor.
const MAX_LIGHTS_PER_CLASS_IN_DESC: usize = 9;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct LightListDirty: u32 {
        const LIGHT_ADDED   = 1 << 0;
        const LIGHT_REMOVED = 1 << 1;
    }
}

/// Ordered set of lights keyed by light class.
#[derive(Debug)]
pub struct LightList {
    lights: SlotMap<LightKey, Light>,
    classes: BTreeMap<String, Vec<LightKey>>,
    block: Option<UniformBlock>,
    use_uniform_block: bool,
    descriptor: String,
    dirty: LightListDirty,
    /// Light owning the most recently generated shadow map
    active_shadow: Option<LightKey>,
    num_shadow_maps: u32,
}

impl Default for LightList {
    fn default() -> Self {
        Self::new()
    }
}

impl LightList {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lights: SlotMap::with_key(),
            classes: BTreeMap::new(),
            block: None,
            use_uniform_block: true,
            descriptor: String::new(),
            dirty: LightListDirty::empty(),
            active_shadow: None,
            num_shadow_maps: 0,
        }
    }

    /// Selects between the shared uniform block and standalone uniforms
    /// for the shader declaration.
    pub fn set_use_uniform_block(&mut self, flag: bool) {
        self.use_uniform_block = flag;
    }

    #[must_use]
    pub fn uses_uniform_block(&self) -> bool {
        self.use_uniform_block
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// Adds a light, assigning its index within its class.
    pub fn add_light(&mut self, light: Light) -> LightKey {
        let class = light.class().to_string();
        let key = self.lights.insert(light);
        let members = self.classes.entry(class).or_default();
        members.push(key);
        let index = members.len() as i32 - 1;
        self.lights[key].set_light_index(index);
        self.dirty |= LightListDirty::LIGHT_ADDED;
        key
    }

    /// Removes a light; remaining lights of the class are re-indexed.
    pub fn remove_light(&mut self, key: LightKey) -> bool {
        let Some(light) = self.lights.remove(key) else {
            return false;
        };
        if let Some(members) = self.classes.get_mut(light.class()) {
            members.retain(|&k| k != key);
            for (i, &k) in members.iter().enumerate() {
                self.lights[k].set_light_index(i as i32);
            }
            if members.is_empty() {
                self.classes.remove(light.class());
            }
        }
        self.dirty |= LightListDirty::LIGHT_REMOVED;
        true
    }

    pub fn clear(&mut self) {
        self.lights.clear();
        self.classes.clear();
        self.block = None;
        self.descriptor.clear();
        self.dirty |= LightListDirty::LIGHT_REMOVED;
    }

    #[must_use]
    pub fn get(&self, key: LightKey) -> Option<&Light> {
        self.lights.get(key)
    }

    pub fn get_mut(&mut self, key: LightKey) -> Option<&mut Light> {
        self.lights.get_mut(key)
    }

    #[must_use]
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Light keys in class order (the block packing order).
    #[must_use]
    pub fn keys_in_order(&self) -> Vec<LightKey> {
        self.classes.values().flatten().copied().collect()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    // ========================================================================
    // Descriptor and block layout
    // ========================================================================

    /// The canonical `<ClassName><Count>...` string identifying the current
    /// set of light classes and counts.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    fn rebuild_descriptor(&mut self) {
        self.descriptor.clear();
        for (class, members) in &self.classes {
            let count = members.len().min(MAX_LIGHTS_PER_CLASS_IN_DESC);
            self.descriptor.push_str(class);
            self.descriptor.push_str(&count.to_string());
        }
    }

    /// The shared uniform block holding every light, if built.
    #[must_use]
    pub fn ubo(&self) -> Option<&UniformBlock> {
        self.block.as_ref()
    }

    /// Emits the shader declaration for the light set: per-class struct
    /// layouts followed by the `Lights_ubo` block with one array per class,
    /// or the equivalent standalone uniforms when the block is disabled.
    #[must_use]
    pub fn make_shader_block(&self) -> String {
        let mut out = String::new();
        for members in self.classes.values() {
            if let Some(&first) = members.first() {
                out.push_str(&self.lights[first].make_shader_layout());
            }
        }
        if self.use_uniform_block {
            out.push_str("layout (std140) uniform Lights_ubo {\n");
            for (class, members) in &self.classes {
                out.push_str(&format!("    U{} {}s[{}];\n", class, class, members.len()));
            }
            out.push_str("};\n");
        } else {
            for (class, members) in &self.classes {
                out.push_str(&format!("uniform U{} {}s[{}];\n", class, class, members.len()));
            }
        }
        out
    }

    // ========================================================================
    // Per-frame update
    // ========================================================================

    /// Recomputes the descriptor, reallocates the shared block if lights
    /// were added, and re-syncs changed light uniforms to the GPU.
    ///
    /// Returns the layered depth texture of the active shadow map, if any.
    pub fn update_lights(&mut self, backend: &mut dyn RenderBackend) -> Option<TextureId> {
        self.rebuild_descriptor();

        if self.dirty.contains(LightListDirty::LIGHT_ADDED) || self.block.is_none() {
            self.allocate_block();
        }
        let added = self.dirty.contains(LightListDirty::LIGHT_ADDED);
        let keys = self.keys_in_order();
        for key in keys {
            let (offset_bytes, nbytes, dirty) = {
                let light = &self.lights[key];
                (
                    light.block_offset() as usize * 4,
                    light.total_size(),
                    light.is_dirty(),
                )
            };
            if !(dirty || added) {
                continue;
            }
            let data = self.lights[key].uniforms().data().to_vec();
            if let Some(block) = &mut self.block {
                if block.set_range(offset_bytes / 4, &data, nbytes.div_ceil(4)) {
                    block.update_gpu(backend, offset_bytes, nbytes);
                }
            }
            self.lights[key].clear_dirty();
        }
        self.dirty = LightListDirty::empty();

        self.active_shadow
            .and_then(|k| self.lights.get(k))
            .and_then(|l| l.shadow_map().map(|m| m.texture.id))
    }

    fn allocate_block(&mut self) {
        let mut total_floats = 0usize;
        for members in self.classes.values() {
            for &key in members {
                self.lights[key].set_block_offset(total_floats as i32);
                total_floats += self.lights[key].total_size().div_ceil(4);
            }
        }
        if total_floats == 0 {
            self.block = None;
            return;
        }
        match UniformBlock::with_elems("float lightdata", LIGHT_UBO_INDEX, "Lights_ubo", total_floats)
        {
            Ok(mut block) => {
                block.set_use_gpu_buffer(true);
                self.block = Some(block);
            }
            Err(e) => {
                warn!("LIGHT: cannot allocate light block: {e}");
                self.block = None;
            }
        }
    }

    /// Binds the shared light block for a shader that uses lights.
    pub fn bind(&self, backend: &mut dyn RenderBackend, shader: ShaderId) {
        if let Some(block) = &self.block {
            block.bind_buffer(backend, shader, 0);
        }
    }

    // ========================================================================
    // Shadow bookkeeping (driven by the renderer's shadow-map loop)
    // ========================================================================

    pub(crate) fn set_active_shadow(&mut self, light: Option<LightKey>) {
        self.active_shadow = light;
    }

    pub(crate) fn set_num_shadow_maps(&mut self, count: u32) {
        self.num_shadow_maps = count;
    }

    /// Number of shadow map layers generated last frame.
    #[must_use]
    pub fn shadow_map_count(&self) -> u32 {
        self.num_shadow_maps
    }

    /// The light owning the active (most recently generated) shadow map.
    #[must_use]
    pub fn active_shadow(&self) -> Option<LightKey> {
        self.active_shadow
    }
}
