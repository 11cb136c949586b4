//! The graphics-API boundary.
//!
//! The core never constructs GPU resources; it drives a [`RenderBackend`]
//! that a host implements on top of its graphics API. Commands are issued in
//! submission order, after all uniform uploads for the frame, so a backend
//! may translate them directly into API calls.

use crate::render::MeshKey;
use crate::render::mesh::Mesh;
use crate::render::modes::RenderModes;
use crate::render::target::RenderTexture;
use crate::render::uniform_block::UniformBlock;
use crate::shader::ShaderId;
use glam::Vec4;
use wgpu::PrimitiveTopology;

/// Opaque handle to a host-owned texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// Texture unit reserved for the layered shadow-map sampler.
pub const SHADOW_TEXTURE_UNIT: u32 = 15;

/// Viewport rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    #[must_use]
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Index selection for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawIndices {
    /// Non-indexed draw of `vertex_count` vertices
    Array { vertex_count: u32 },
    /// 16-bit indexed draw
    U16 { index_count: u32 },
    /// 32-bit indexed draw
    U32 { index_count: u32 },
}

/// One draw submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub topology: PrimitiveTopology,
    pub indices: DrawIndices,
}

/// Graphics primitives the core consumes from its host.
///
/// Implementations translate these calls into their graphics API. The
/// [`HeadlessBackend`](crate::render::headless::HeadlessBackend) records them
/// for tests.
pub trait RenderBackend {
    /// Concrete-type access for hosts and tests.
    fn as_any(&self) -> &dyn std::any::Any;

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;

    // ========================================================================
    // Device limits
    // ========================================================================

    /// Maximum byte size of one uniform block.
    fn max_uniform_block_size(&self) -> usize {
        16384
    }

    /// Maximum number of floats in a uniform array.
    fn max_array_floats(&self) -> usize {
        2048
    }

    // ========================================================================
    // Resource updates
    // ========================================================================

    /// Uploads `len` bytes of the block's CPU buffer starting at `offset`.
    fn update_uniform_block(&mut self, block: &UniformBlock, offset: usize, len: usize);

    /// Binds the block (or the subrange starting at `location_offset` bytes)
    /// to the shader's matching binding point.
    fn bind_uniform_block(&mut self, block: &UniformBlock, shader: ShaderId, location_offset: usize);

    /// Pushes mesh vertex/index data to the GPU if stale.
    fn update_mesh(&mut self, mesh: MeshKey, data: &Mesh);

    // ========================================================================
    // Draw-time bindings
    // ========================================================================

    fn use_shader(&mut self, shader: ShaderId, multiview: bool);

    fn bind_mesh(&mut self, mesh: MeshKey, shader: ShaderId);

    fn bind_texture(&mut self, texture: TextureId, location: u32, unit: u32);

    /// Applies the pipeline state selected by `modes`.
    fn set_render_modes(&mut self, modes: &RenderModes);

    /// Restores the default pipeline state from `modes`' deviations.
    fn restore_render_modes(&mut self, modes: &RenderModes);

    fn draw(&mut self, call: &DrawCall);

    // ========================================================================
    // Framebuffer control
    // ========================================================================

    /// Binds a framebuffer object; None selects the default back buffer.
    fn bind_framebuffer(&mut self, fbo: Option<u32>);

    fn set_viewport(&mut self, viewport: Viewport);

    /// Clears the bound framebuffer. A color of None leaves the color
    /// buffer untouched.
    fn clear(&mut self, color: Option<Vec4>, depth: bool, stencil: bool);

    /// Prepares a render texture for drawing. An incomplete framebuffer
    /// reports its status code and aborts the frame cleanly.
    fn begin_render_texture(&mut self, texture: &RenderTexture) -> Result<(), u32>;

    fn end_render_texture(&mut self, texture: &RenderTexture);

    /// Selects the destination layer of a layered (array) render texture.
    fn set_texture_layer(&mut self, texture: &RenderTexture, layer: u32);
}
