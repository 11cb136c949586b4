//! Scene graph: nodes, transforms, cameras, lights and bounds.

pub mod bounds;
pub mod camera;
pub mod light;
pub mod lights;
pub mod node;
pub mod scene;
pub mod transform;

pub use bounds::{BoundingVolume, CullResult, Frustum};
pub use camera::{Camera, CameraRig};
pub use light::{Light, ShadowMap};
pub use lights::LightList;
pub use node::Node;
pub use scene::Scene;
pub use transform::Transform;

slotmap::new_key_type! {
    /// Handle to a [`Node`] in the scene arena.
    pub struct NodeHandle;
    /// Handle to a [`Light`] in the scene's light list.
    pub struct LightKey;
}
