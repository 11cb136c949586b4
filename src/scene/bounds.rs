//! Bounding volumes and view-frustum classification.
//!
//! The cull traversal classifies each node's hierarchical axis-aligned
//! bounding volume against the six frustum planes. A plane the volume lies
//! entirely inside of is recorded in a plane mask inherited by descendants,
//! which then skip the redundant test.

use glam::{Affine3A, Mat4, Vec3, Vec4};

/// Mask with all six frustum planes set.
pub const ALL_PLANES: u8 = 0x3f;

/// Axis-aligned bounding volume with a center/radius convenience view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingVolume {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingVolume {
    /// An empty volume: grows to fit the first point merged into it.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    #[must_use]
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// True when no point has been merged yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn radius(&self) -> f32 {
        if self.is_empty() {
            0.0
        } else {
            (self.max - self.min).length() * 0.5
        }
    }

    /// Grows the volume to include a point.
    pub fn expand_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Grows the volume to include another volume.
    pub fn expand(&mut self, other: &BoundingVolume) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// The eight corners of the volume.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let (mn, mx) = (self.min, self.max);
        [
            Vec3::new(mn.x, mn.y, mn.z),
            Vec3::new(mx.x, mn.y, mn.z),
            Vec3::new(mn.x, mx.y, mn.z),
            Vec3::new(mx.x, mx.y, mn.z),
            Vec3::new(mn.x, mn.y, mx.z),
            Vec3::new(mx.x, mn.y, mx.z),
            Vec3::new(mn.x, mx.y, mx.z),
            Vec3::new(mx.x, mx.y, mx.z),
        ]
    }

    /// Transforms the volume by an affine matrix, returning the axis-aligned
    /// volume of the transformed corners.
    #[must_use]
    pub fn transformed(&self, m: &Affine3A) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = Self::empty();
        for corner in self.corners() {
            out.expand_point(m.transform_point3(corner));
        }
        out
    }
}

impl Default for BoundingVolume {
    fn default() -> Self {
        Self::empty()
    }
}

/// Result of classifying a volume against the frustum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullResult {
    /// Entirely on the negative side of some plane: prune the subtree.
    Outside,
    /// Straddles at least one plane: keep, continue testing descendants.
    Intersect,
    /// Entirely inside every remaining plane: keep, descendants skip tests.
    Inside,
}

/// Six view-frustum plane equations extracted from a view-projection matrix.
///
/// Plane order is right, left, bottom, top, far, near; each plane is
/// normalized by the length of its normal.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Builds the frustum from a view-projection matrix using the
    /// Gribb-Hartmann row combinations.
    #[must_use]
    pub fn from_view_proj(vp: &Mat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];
        let mut planes = [
            rows[3] - rows[0], // right
            rows[3] + rows[0], // left
            rows[3] + rows[1], // bottom
            rows[3] - rows[1], // top
            rows[3] - rows[2], // far
            rows[3] + rows[2], // near
        ];
        for plane in &mut planes {
            let len = Vec3::new(plane.x, plane.y, plane.z).length();
            if len > 1e-6 {
                *plane /= len;
            }
        }
        Self { planes }
    }

    /// Classifies a volume against the planes not yet masked off.
    ///
    /// `plane_mask` carries the planes an ancestor volume was already fully
    /// inside of; those are skipped. The returned mask adds any plane this
    /// volume is fully inside of, for use by descendants.
    #[must_use]
    pub fn classify(&self, volume: &BoundingVolume, plane_mask: u8) -> (CullResult, u8) {
        if volume.is_empty() {
            return (CullResult::Intersect, plane_mask);
        }
        let corners = volume.corners();
        let mut mask = plane_mask;

        for (i, plane) in self.planes.iter().enumerate() {
            if mask & (1 << i) != 0 {
                continue;
            }
            let mut inside = 0;
            for corner in &corners {
                let dist =
                    plane.x * corner.x + plane.y * corner.y + plane.z * corner.z + plane.w;
                if dist >= 0.0 {
                    inside += 1;
                }
            }
            if inside == 0 {
                return (CullResult::Outside, mask);
            }
            if inside == corners.len() {
                mask |= 1 << i;
            }
        }
        if mask == ALL_PLANES {
            (CullResult::Inside, mask)
        } else {
            (CullResult::Intersect, mask)
        }
    }
}
