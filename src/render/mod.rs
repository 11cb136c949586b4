//! Rendering: per-pass state, per-frame sorting and draw submission.

pub mod backend;
pub mod data;
pub mod headless;
pub mod material;
pub mod mesh;
pub mod modes;
pub mod pass;
pub mod renderable;
pub mod renderer;
pub mod sorter;
pub mod state;
pub mod target;
pub mod uniform_block;

pub use backend::{DrawCall, DrawIndices, RenderBackend, TextureId, Viewport};
pub use data::RenderData;
pub use material::{Material, MaterialDirty};
pub use mesh::Mesh;
pub use modes::{CullFace, RenderModes};
pub use pass::RenderPass;
pub use renderer::{RenderStats, Renderer};
pub use sorter::{FrameContext, HostBridge, RenderSorter, SortKey};
pub use state::{MatrixSlot, RenderState};
pub use target::{RenderTarget, RenderTexture};
pub use uniform_block::{BlockId, UniformBlock, UniformType};

slotmap::new_key_type! {
    /// Handle to a [`Mesh`] in the scene's mesh pool.
    pub struct MeshKey;
    /// Handle to a [`Material`] in the scene's material pool.
    pub struct MaterialKey;
    /// Handle to a [`RenderData`] in the scene's render data pool.
    pub struct RenderDataKey;
}
