//! Per-target render state exchanged between the driver and the sorters.

use crate::render::backend::TextureId;
use crate::render::uniform_block::BlockId;
use crate::scene::camera::Camera;
use glam::{Mat4, Vec3};

/// Fixed slot assignments into [`RenderState::u_matrices`].
///
/// Stereo pairs occupy two consecutive slots (left eye first). Slots `0..10`
/// double as the input matrices of the shader matrix-calculation language.
pub struct MatrixSlot;

impl MatrixSlot {
    pub const VIEW_PROJ: usize = 0;
    pub const PROJECTION: usize = 2;
    pub const VIEW: usize = 3;
    pub const VIEW_INVERSE: usize = 5;
    pub const MODEL: usize = 7;
    pub const MVP: usize = 8;
    pub const MAX_MATRIX: usize = 12;
}

/// Global scene matrices copied into slots `[0, NUM_SCENE_MATRICES)` of every
/// transform block: view-proj pair, projection, view pair, view-inverse pair.
pub const NUM_SCENE_MATRICES: usize = MatrixSlot::MODEL;

/// Per-target state: the camera snapshot, the global matrix slots, eye
/// selection and the currently bound transform block.
#[derive(Debug, Clone)]
pub struct RenderState {
    /// Camera snapshot for this target (shadow maps use the light's camera)
    pub camera: Camera,
    /// World-space camera position captured during cull
    pub camera_position: Vec3,
    /// Identity of the transform block bound for the current draw
    pub transform_block: Option<BlockId>,
    /// Layered depth texture of the active shadow map, if any
    pub shadow_map: Option<TextureId>,
    /// 1 = left eye, 2 = right, 3 = both
    pub u_render_mask: u8,
    /// 1 when rendering the right eye of a stereo pair
    pub u_right: u8,
    pub is_shadow: bool,
    pub is_multiview: bool,
    pub is_stereo: bool,
    pub sample_count: u8,
    /// Global and per-draw matrices, indexed by [`MatrixSlot`]
    pub u_matrices: [Mat4; MatrixSlot::MAX_MATRIX],
}

impl RenderState {
    #[must_use]
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            camera_position: Vec3::ZERO,
            transform_block: None,
            shadow_map: None,
            u_render_mask: 3,
            u_right: 0,
            is_shadow: false,
            is_multiview: false,
            is_stereo: false,
            sample_count: 1,
            u_matrices: [Mat4::IDENTITY; MatrixSlot::MAX_MATRIX],
        }
    }
}
