use crate::render::MaterialKey;
use crate::render::modes::RenderModes;
use crate::shader::ShaderId;

/// One draw configuration: a material, a shader selection and the render
/// modes to draw with. Pass 0 of a RenderData is the primary pass.
///
/// A pass is dirty when its material, shader id or modes change; a dirty
/// pass asks the host bridge to regenerate its shader during validate.
#[derive(Debug, Clone)]
pub struct RenderPass {
    material: MaterialKey,
    shader: Option<ShaderId>,
    modes: RenderModes,
    dirty: bool,
}

impl RenderPass {
    #[must_use]
    pub fn new(material: MaterialKey) -> Self {
        Self {
            material,
            shader: None,
            modes: RenderModes::new(),
            dirty: true,
        }
    }

    #[must_use]
    pub fn material(&self) -> MaterialKey {
        self.material
    }

    pub fn set_material(&mut self, material: MaterialKey) {
        if self.material != material {
            self.material = material;
            self.dirty = true;
        }
    }

    #[must_use]
    pub fn shader(&self) -> Option<ShaderId> {
        self.shader
    }

    pub fn set_shader(&mut self, shader: Option<ShaderId>) {
        if self.shader != shader {
            self.shader = shader;
            self.dirty = true;
        }
    }

    #[must_use]
    pub fn modes(&self) -> &RenderModes {
        &self.modes
    }

    pub fn modes_mut(&mut self) -> &mut RenderModes {
        &mut self.modes
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Dirty when the pass itself or its modes changed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty || self.modes.is_dirty()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
        self.modes.clear_dirty();
    }
}
