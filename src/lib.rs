#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Retained-mode scene renderer core for VR/XR runtimes.
//!
//! Each frame, a scene graph plus a camera viewpoint is converted into an
//! ordered tree of draw submissions: frustum cull, validate (regenerating
//! stale shaders through the host bridge), multi-level merge sort, then
//! submit behind a render-state cache. The GPU itself sits behind the
//! [`render::RenderBackend`] trait.

pub mod errors;
pub mod render;
pub mod scene;
pub mod shader;

pub use errors::{LumenError, Result};
pub use render::{
    CullFace, FrameContext, HostBridge, Material, MaterialKey, Mesh, MeshKey, RenderBackend,
    RenderData, RenderDataKey, RenderModes, RenderPass, RenderSorter, RenderStats, RenderState,
    RenderTarget, RenderTexture, Renderer, SortKey, TextureId, UniformBlock,
};
pub use scene::{
    BoundingVolume, Camera, CameraRig, Frustum, Light, LightKey, LightList, Node, NodeHandle,
    Scene, ShadowMap, Transform,
};
pub use shader::{MatrixCalc, Shader, ShaderFlags, ShaderId, ShaderManager};
