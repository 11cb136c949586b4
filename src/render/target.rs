//! Render targets: a destination texture, a camera, a sorter and a state.

use crate::errors::{LumenError, Result};
use crate::render::backend::{RenderBackend, TextureId, Viewport};
use crate::render::sorter::{CurrentState, FrameContext, RenderSorter};
use crate::render::state::RenderState;
use crate::scene::camera::Camera;
use log::error;

/// A host-owned texture that can be rendered into.
///
/// `layer_count > 1` describes a layered (array) texture; shadow maps render
/// into one slice per light.
#[derive(Debug, Clone)]
pub struct RenderTexture {
    pub id: TextureId,
    pub fbo: u32,
    pub width: u32,
    pub height: u32,
    pub sample_count: u8,
    pub layer_count: u32,
}

impl RenderTexture {
    #[must_use]
    pub fn new(id: TextureId, fbo: u32, width: u32, height: u32) -> Self {
        Self {
            id,
            fbo,
            width,
            height,
            sample_count: 1,
            layer_count: 1,
        }
    }

    #[must_use]
    pub fn with_layers(mut self, layer_count: u32) -> Self {
        self.layer_count = layer_count;
        self
    }
}

/// One logical frame destination: a render texture (None for the default
/// back buffer), a RenderState, a sorter and a camera. Targets can chain,
/// e.g. left eye to right eye.
pub struct RenderTarget {
    pub texture: Option<RenderTexture>,
    pub state: RenderState,
    pub sorter: RenderSorter,
    pub next: Option<Box<RenderTarget>>,
}

impl RenderTarget {
    /// Stereo and multiview are fixed at construction.
    #[must_use]
    pub fn new(
        texture: Option<RenderTexture>,
        camera: Camera,
        sorter: RenderSorter,
        is_stereo: bool,
        is_multiview: bool,
    ) -> Self {
        let mut state = RenderState::new(camera);
        state.is_stereo = is_stereo;
        state.is_multiview = is_multiview;
        if let Some(tex) = &texture {
            state.sample_count = tex.sample_count;
        }
        Self {
            texture,
            state,
            sorter,
            next: None,
        }
    }

    /// Binds the target's framebuffer and viewport.
    pub fn begin_rendering(&self, backend: &mut dyn RenderBackend) -> Result<()> {
        match &self.texture {
            Some(tex) => {
                if let Err(status) = backend.begin_render_texture(tex) {
                    error!("RENDER: framebuffer incomplete, status {status:#x}");
                    return Err(LumenError::FramebufferIncomplete(status));
                }
                backend.bind_framebuffer(Some(tex.fbo));
                backend.set_viewport(Viewport::new(0, 0, tex.width as i32, tex.height as i32));
            }
            None => backend.bind_framebuffer(None),
        }
        Ok(())
    }

    /// Snapshots the camera, then culls and sorts the scene for this target.
    pub fn cull_from_camera(&mut self, ctx: &mut FrameContext, camera: &Camera) {
        self.state.camera = camera.clone();
        self.sorter.cull(&mut self.state, ctx);
        self.sorter.sort(&mut self.state, ctx);
    }

    /// Submits the sorted render tree.
    pub fn render(&mut self, ctx: &mut FrameContext, current: &mut CurrentState) {
        self.sorter.render(&mut self.state, ctx, current);
    }

    /// Releases the target's framebuffer.
    pub fn end_rendering(&self, backend: &mut dyn RenderBackend) {
        if let Some(tex) = &self.texture {
            backend.end_render_texture(tex);
        }
    }
}
