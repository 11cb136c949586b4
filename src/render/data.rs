use crate::render::MeshKey;
use crate::render::pass::RenderPass;
use smallvec::SmallVec;

/// Drawable component attached to a node: a mesh reference plus an ordered
/// list of render passes.
///
/// Invariant: every pass references a live material; the mesh must be
/// non-null for the node to produce Renderables during cull.
#[derive(Debug, Clone, Default)]
pub struct RenderData {
    mesh: Option<MeshKey>,
    passes: SmallVec<[RenderPass; 2]>,
    dirty: bool,
}

impl RenderData {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mesh: None,
            passes: SmallVec::new(),
            dirty: true,
        }
    }

    #[must_use]
    pub fn with_mesh(mesh: MeshKey) -> Self {
        let mut data = Self::new();
        data.mesh = Some(mesh);
        data
    }

    #[must_use]
    pub fn mesh(&self) -> Option<MeshKey> {
        self.mesh
    }

    pub fn set_mesh(&mut self, mesh: Option<MeshKey>) {
        if self.mesh != mesh {
            self.mesh = mesh;
            self.dirty = true;
        }
    }

    pub fn add_pass(&mut self, pass: RenderPass) {
        self.passes.push(pass);
        self.dirty = true;
    }

    #[must_use]
    pub fn pass(&self, index: usize) -> Option<&RenderPass> {
        self.passes.get(index)
    }

    pub fn pass_mut(&mut self, index: usize) -> Option<&mut RenderPass> {
        self.passes.get_mut(index)
    }

    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// True when any pass is flagged to cast shadows.
    #[must_use]
    pub fn cast_shadows(&self) -> bool {
        self.passes.iter().any(|p| p.modes().cast_shadows())
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
