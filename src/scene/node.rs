use crate::scene::NodeHandle;
use crate::scene::bounds::BoundingVolume;
use crate::scene::transform::Transform;
use glam::Affine3A;

/// A scene node containing only the data traversed every frame.
///
/// # Design Principles
///
/// - Only keeps data that must be touched during cull (hierarchy, transform,
///   world bounds); attached components (RenderData, Light) live in the
///   Scene's component maps.
/// - Parent links are arena handles, never owning pointers, so the graph has
///   no reference cycles.
///
/// # Visibility Snapshot
///
/// `cull_status` and `visible` are written only by the cull step; readers on
/// other threads (e.g. picking) see a stale-but-consistent snapshot of the
/// previous frame.
#[derive(Debug, Clone)]
pub struct Node {
    // === Core Hierarchy ===
    /// Parent node handle (None for the root)
    pub(crate) parent: Option<NodeHandle>,
    /// Child node handles, visited in declaration order
    pub(crate) children: Vec<NodeHandle>,

    // === Core Spatial Data ===
    /// Transform component (hot data accessed every frame)
    pub transform: Transform,
    /// Cached hierarchical world bounds (own mesh plus all descendants)
    pub(crate) world_bounds: BoundingVolume,
    pub(crate) bounds_dirty: bool,

    // === Core State ===
    /// Disabled nodes are pruned with their whole subtree
    pub enabled: bool,
    /// True when the last cull classified this node outside the frustum
    pub(crate) cull_status: bool,
    /// True when the last cull produced a Renderable for this node
    pub(crate) visible: bool,
}

impl Node {
    /// Creates a new enabled node with an identity transform.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            world_bounds: BoundingVolume::empty(),
            bounds_dirty: true,
            enabled: true,
            cull_status: false,
            visible: false,
        }
    }

    /// Returns the parent node handle, if any.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Returns a read-only slice of child node handles.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    /// Returns a reference to the world transformation matrix.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.transform.world_matrix
    }

    /// Returns the cached hierarchical world bounds.
    #[inline]
    #[must_use]
    pub fn world_bounds(&self) -> &BoundingVolume {
        &self.world_bounds
    }

    /// True when the last cull step pruned this node.
    #[inline]
    #[must_use]
    pub fn culled(&self) -> bool {
        self.cull_status
    }

    /// True when the last cull step emitted this node for drawing.
    #[inline]
    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}
