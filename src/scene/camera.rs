use crate::render::RenderDataKey;
use crate::scene::bounds::Frustum;
use glam::{Affine3A, Mat4, Vec3, Vec4};
use std::borrow::Cow;
use uuid::Uuid;

/// Render mask bit selecting the left eye.
pub const RENDER_MASK_LEFT: u8 = 1;
/// Render mask bit selecting the right eye.
pub const RENDER_MASK_RIGHT: u8 = 2;
/// Render mask selecting both eyes.
pub const RENDER_MASK_BOTH: u8 = RENDER_MASK_LEFT | RENDER_MASK_RIGHT;

#[derive(Debug, Clone, Copy)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

/// A viewpoint into the scene.
///
/// Cameras are value types: render targets and shadow maps hold their own
/// copy and snapshot it into the RenderState each frame. The camera also
/// carries the per-target clear configuration (background color, depth and
/// stencil clears) and the optional post-effect pass chain applied after the
/// scene renders.
#[derive(Debug, Clone)]
pub struct Camera {
    pub uuid: Uuid,
    pub name: Cow<'static, str>,

    // === Projection ===
    pub projection_type: ProjectionType,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub ortho_size: f32,

    // === Per-target configuration ===
    /// Eye selection mask (1 = left, 2 = right, 3 = both)
    pub render_mask: u8,
    /// Clear color; None leaves the color buffer untouched
    pub background: Option<Vec4>,
    pub clear_depth: bool,
    pub clear_stencil: bool,
    /// Screen-space effect chain; passes are applied through ping-pong
    /// textures after the scene renders
    pub post_effects: Option<RenderDataKey>,

    // Cached matrices, refreshed from the rig transform
    pub(crate) world_matrix: Affine3A,
    pub(crate) view_matrix: Mat4,
    pub(crate) projection_matrix: Mat4,
}

impl Camera {
    #[must_use]
    pub fn new_perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            uuid: Uuid::new_v4(),
            name: Cow::Borrowed("Camera"),
            projection_type: ProjectionType::Perspective,
            fov: fov_degrees.to_radians(),
            aspect,
            near,
            far,
            ortho_size: 10.0,
            render_mask: RENDER_MASK_BOTH,
            background: Some(Vec4::new(0.0, 0.0, 0.0, 1.0)),
            clear_depth: true,
            clear_stencil: false,
            post_effects: None,
            world_matrix: Affine3A::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
        };
        cam.update_projection_matrix();
        cam
    }

    #[must_use]
    pub fn new_orthographic(size: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self::new_perspective(45.0, aspect, near, far);
        cam.projection_type = ProjectionType::Orthographic;
        cam.ortho_size = size;
        cam.update_projection_matrix();
        cam
    }

    /// Recomputes the projection matrix from the projection parameters.
    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = match self.projection_type {
            ProjectionType::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
            }
            ProjectionType::Orthographic => {
                let w = self.ortho_size * self.aspect;
                let h = self.ortho_size;
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        };
    }

    /// Refreshes the view matrix from the camera's world transform.
    pub fn update_view(&mut self, world_transform: &Affine3A) {
        self.world_matrix = *world_transform;
        self.view_matrix = Mat4::from(*world_transform).inverse();
    }

    /// Places the camera at `eye` looking at `target`.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.view_matrix = Mat4::look_at_rh(eye, target, up);
        self.world_matrix = Affine3A::from_mat4(self.view_matrix.inverse());
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }

    /// World-space camera position, from the inverse view matrix.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.view_matrix.inverse().w_axis.truncate()
    }

    /// Frustum planes for the current view and projection.
    #[must_use]
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_proj(&self.view_projection())
    }
}

/// A stereo pair of cameras for the main eye buffers.
///
/// Mono targets use only the left camera.
#[derive(Debug, Clone)]
pub struct CameraRig {
    pub left: Camera,
    pub right: Camera,
}

impl CameraRig {
    #[must_use]
    pub fn new(left: Camera, right: Camera) -> Self {
        Self { left, right }
    }

    /// A rig with two copies of the same camera (mono fallback).
    #[must_use]
    pub fn mono(camera: Camera) -> Self {
        let right = camera.clone();
        Self {
            left: camera,
            right,
        }
    }
}
