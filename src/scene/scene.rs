use std::borrow::Cow;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::Affine3A;
use slotmap::{SecondaryMap, SlotMap};

use crate::render::data::RenderData;
use crate::render::material::Material;
use crate::render::mesh::Mesh;
use crate::render::{MaterialKey, MeshKey, RenderDataKey};
use crate::scene::bounds::BoundingVolume;
use crate::scene::camera::CameraRig;
use crate::scene::lights::LightList;
use crate::scene::node::Node;
use crate::scene::{LightKey, NodeHandle};

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

/// The scene graph and its resource pools.
///
/// Nodes live in a slotmap arena; parent links are handles, so the tree has
/// no ownership cycles. Components attach through secondary maps keyed by
/// node handle, at most one per component type. Meshes, materials and render
/// data are pooled so passes and cameras can share them by key.
pub struct Scene {
    pub id: u32,

    // === Node storage ===
    pub nodes: SlotMap<NodeHandle, Node>,
    root: NodeHandle,

    // === Components ===
    /// Optional node names, used in logs
    pub names: SecondaryMap<NodeHandle, Cow<'static, str>>,
    /// Drawable component (at most one per node)
    pub render_datas: SecondaryMap<NodeHandle, RenderDataKey>,
    /// Light component (at most one per node)
    pub node_lights: SecondaryMap<NodeHandle, LightKey>,

    // === Resource pools ===
    pub render_data_pool: SlotMap<RenderDataKey, RenderData>,
    pub mesh_pool: SlotMap<MeshKey, Mesh>,
    pub material_pool: SlotMap<MaterialKey, Material>,

    // === Global state ===
    pub lights: LightList,
    pub main_camera_rig: Option<CameraRig>,
    frustum_culling: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new());
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            nodes,
            root,
            names: SecondaryMap::new(),
            render_datas: SecondaryMap::new(),
            node_lights: SecondaryMap::new(),
            render_data_pool: SlotMap::with_key(),
            mesh_pool: SlotMap::with_key(),
            material_pool: SlotMap::with_key(),
            lights: LightList::new(),
            main_camera_rig: None,
            frustum_culling: true,
        }
    }

    // ========================================================================
    // Node management
    // ========================================================================

    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    /// Creates a detached node; attach it with [`Scene::attach`].
    pub fn create_node(&mut self) -> NodeHandle {
        self.nodes.insert(Node::new())
    }

    pub fn create_node_with_name(&mut self, name: &str) -> NodeHandle {
        let handle = self.nodes.insert(Node::new());
        self.names.insert(handle, Cow::Owned(name.to_string()));
        handle
    }

    /// Creates a node attached to the root.
    pub fn add_node(&mut self) -> NodeHandle {
        let handle = self.create_node();
        self.attach(self.root, handle);
        handle
    }

    /// Attaches `child` under `parent`, keeping both ends of the link in
    /// sync and dirtying the parent's bounds chain.
    pub fn attach(&mut self, parent: NodeHandle, child: NodeHandle) {
        if let Some(old_parent) = self.nodes.get(child).and_then(Node::parent) {
            if let Some(p) = self.nodes.get_mut(old_parent) {
                p.children.retain(|&c| c != child);
            }
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
        self.mark_bounds_dirty(parent);
    }

    /// Detaches a node from its parent; the subtree stays alive but is no
    /// longer reached by the cull traversal.
    pub fn detach(&mut self, child: NodeHandle) {
        let Some(parent) = self.nodes.get(child).and_then(Node::parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }
        self.mark_bounds_dirty(parent);
    }

    pub fn set_enabled(&mut self, node: NodeHandle, enabled: bool) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.enabled = enabled;
        }
    }

    /// Dirties the world bounds of `node` and every ancestor.
    pub fn mark_bounds_dirty(&mut self, node: NodeHandle) {
        let mut cur = Some(node);
        while let Some(handle) = cur {
            let Some(n) = self.nodes.get_mut(handle) else {
                break;
            };
            n.bounds_dirty = true;
            cur = n.parent;
        }
    }

    // ========================================================================
    // Components and resources
    // ========================================================================

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshKey {
        self.mesh_pool.insert(mesh)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialKey {
        self.material_pool.insert(material)
    }

    pub fn add_render_data(&mut self, data: RenderData) -> RenderDataKey {
        self.render_data_pool.insert(data)
    }

    /// Attaches a drawable component to a node.
    pub fn set_render_data(&mut self, node: NodeHandle, data: RenderData) -> RenderDataKey {
        let key = self.render_data_pool.insert(data);
        self.render_datas.insert(node, key);
        self.mark_bounds_dirty(node);
        key
    }

    #[must_use]
    pub fn render_data_of(&self, node: NodeHandle) -> Option<RenderDataKey> {
        self.render_datas.get(node).copied()
    }

    /// Attaches a light component to a node.
    pub fn attach_light(&mut self, node: NodeHandle, light: LightKey) {
        self.node_lights.insert(node, light);
    }

    #[must_use]
    pub fn frustum_culling(&self) -> bool {
        self.frustum_culling
    }

    /// Disables or re-enables frustum culling; when off, every enabled node
    /// is visited.
    pub fn set_frustum_culling(&mut self, enabled: bool) {
        self.frustum_culling = enabled;
    }

    // ========================================================================
    // Hierarchy update
    // ========================================================================

    /// Refreshes mesh bounds, world matrices and hierarchical world bounds.
    ///
    /// Called once per frame before culling; collaborators mutating
    /// transforms between frames are picked up here.
    pub fn update_hierarchy(&mut self) {
        let mesh_keys: Vec<MeshKey> = self.mesh_pool.keys().collect();
        for key in mesh_keys {
            self.mesh_pool[key].update_bounds();
        }
        let root = self.root;
        self.update_node(root, Affine3A::IDENTITY, false);
    }

    /// Returns this node's world bounds and whether anything in the subtree
    /// changed. Unchanged subtrees keep their cached bounds.
    fn update_node(
        &mut self,
        handle: NodeHandle,
        parent_world: Affine3A,
        parent_changed: bool,
    ) -> (BoundingVolume, bool) {
        let (world_changed, bounds_dirty, children) = {
            let Some(node) = self.nodes.get_mut(handle) else {
                return (BoundingVolume::empty(), false);
            };
            let changed = node.transform.update_local_matrix();
            if changed || parent_changed {
                node.transform.world_matrix = parent_world * node.transform.local_matrix;
            }
            (
                changed || parent_changed,
                node.bounds_dirty,
                node.children.clone(),
            )
        };

        let world = self.nodes[handle].transform.world_matrix;
        let mut subtree_changed = world_changed || bounds_dirty;
        let mut bounds = self.local_mesh_bounds(handle).transformed(&world);
        for child in children {
            let (child_bounds, child_changed) = self.update_node(child, world, world_changed);
            subtree_changed |= child_changed;
            bounds.expand(&child_bounds);
        }
        let node = &mut self.nodes[handle];
        if subtree_changed {
            node.world_bounds = bounds;
            node.bounds_dirty = false;
        }
        (node.world_bounds, subtree_changed)
    }

    fn local_mesh_bounds(&self, handle: NodeHandle) -> BoundingVolume {
        self.render_datas
            .get(handle)
            .and_then(|&key| self.render_data_pool.get(key))
            .and_then(RenderData::mesh)
            .and_then(|mesh| self.mesh_pool.get(mesh))
            .map_or_else(BoundingVolume::empty, |m| *m.bounds())
    }
}
