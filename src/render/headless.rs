//! A backend that records commands instead of talking to a GPU.
//!
//! Used by the test suite to assert submission order, state-change elision
//! and upload ranges, and usable by hosts for CI runs without a device.

use crate::render::MeshKey;
use crate::render::backend::{DrawCall, RenderBackend, TextureId, Viewport};
use crate::render::mesh::Mesh;
use crate::render::modes::RenderModes;
use crate::render::target::RenderTexture;
use crate::render::uniform_block::{BlockId, UniformBlock};
use crate::shader::ShaderId;
use glam::Vec4;

/// One recorded backend command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    UpdateBlock {
        block: BlockId,
        name: String,
        offset: usize,
        len: usize,
    },
    BindBlock {
        block: BlockId,
        shader: ShaderId,
        location_offset: usize,
    },
    UpdateMesh(MeshKey),
    UseShader(ShaderId),
    BindMesh {
        mesh: MeshKey,
        shader: ShaderId,
    },
    BindTexture {
        texture: TextureId,
        location: u32,
        unit: u32,
    },
    SetModes(u64),
    RestoreModes(u64),
    Draw(DrawCall),
    BindFramebuffer(Option<u32>),
    SetViewport(Viewport),
    Clear {
        color: Option<Vec4>,
        depth: bool,
        stencil: bool,
    },
    BeginRenderTexture(TextureId),
    EndRenderTexture(TextureId),
    SetTextureLayer {
        texture: TextureId,
        layer: u32,
    },
}

/// Command-recording [`RenderBackend`] with fixed device limits.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    pub commands: Vec<Command>,
    /// Overrides the uniform block size limit when set.
    pub uniform_block_limit: Option<usize>,
    /// Makes `begin_render_texture` report an incomplete framebuffer.
    pub fail_framebuffer: bool,
}

impl HeadlessBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// All recorded draw calls, in submission order.
    #[must_use]
    pub fn draws(&self) -> Vec<DrawCall> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw(call) => Some(*call),
                _ => None,
            })
            .collect()
    }

    /// Number of commands of the given discriminant-matching predicate.
    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }
}

impl RenderBackend for HeadlessBackend {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn max_uniform_block_size(&self) -> usize {
        self.uniform_block_limit.unwrap_or(16384)
    }

    fn update_uniform_block(&mut self, block: &UniformBlock, offset: usize, len: usize) {
        self.commands.push(Command::UpdateBlock {
            block: block.id(),
            name: block.block_name().to_string(),
            offset,
            len,
        });
    }

    fn bind_uniform_block(
        &mut self,
        block: &UniformBlock,
        shader: ShaderId,
        location_offset: usize,
    ) {
        self.commands.push(Command::BindBlock {
            block: block.id(),
            shader,
            location_offset,
        });
    }

    fn update_mesh(&mut self, mesh: MeshKey, _data: &Mesh) {
        self.commands.push(Command::UpdateMesh(mesh));
    }

    fn use_shader(&mut self, shader: ShaderId, _multiview: bool) {
        self.commands.push(Command::UseShader(shader));
    }

    fn bind_mesh(&mut self, mesh: MeshKey, shader: ShaderId) {
        self.commands.push(Command::BindMesh { mesh, shader });
    }

    fn bind_texture(&mut self, texture: TextureId, location: u32, unit: u32) {
        self.commands.push(Command::BindTexture {
            texture,
            location,
            unit,
        });
    }

    fn set_render_modes(&mut self, modes: &RenderModes) {
        self.commands.push(Command::SetModes(modes.render_flags()));
    }

    fn restore_render_modes(&mut self, modes: &RenderModes) {
        self.commands
            .push(Command::RestoreModes(modes.render_flags()));
    }

    fn draw(&mut self, call: &DrawCall) {
        self.commands.push(Command::Draw(*call));
    }

    fn bind_framebuffer(&mut self, fbo: Option<u32>) {
        self.commands.push(Command::BindFramebuffer(fbo));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(Command::SetViewport(viewport));
    }

    fn clear(&mut self, color: Option<Vec4>, depth: bool, stencil: bool) {
        self.commands.push(Command::Clear {
            color,
            depth,
            stencil,
        });
    }

    fn begin_render_texture(&mut self, texture: &RenderTexture) -> Result<(), u32> {
        if self.fail_framebuffer {
            return Err(0x8CD6); // incomplete attachment
        }
        self.commands.push(Command::BeginRenderTexture(texture.id));
        Ok(())
    }

    fn end_render_texture(&mut self, texture: &RenderTexture) {
        self.commands.push(Command::EndRenderTexture(texture.id));
    }

    fn set_texture_layer(&mut self, texture: &RenderTexture, layer: u32) {
        self.commands.push(Command::SetTextureLayer {
            texture: texture.id,
            layer,
        });
    }
}
