//! The cull / validate / sort / submit engine.
//!
//! Each frame a sorter walks the scene graph from the root, testing
//! hierarchical bounds against the view frustum and allocating a
//! [`Renderable`] per visible pass. Validation regenerates stale shaders
//! through the host bridge, packs per-draw matrices into transform blocks,
//! and merge-inserts each Renderable into a multi-level render tree. Submit
//! walks the tree in order behind a current-state cache that elides
//! redundant shader, material, mesh and pipeline-state bindings.
//!
//! Sorter flavors differ only in policy (how to sort, which Renderables are
//! valid, which shader to select); the machinery here is shared.

mod merge;
mod shadow;

pub use merge::SortKey;
pub use shadow::ShadowState;

use crate::render::backend::{DrawCall, DrawIndices, RenderBackend, SHADOW_TEXTURE_UNIT};
use crate::render::modes::RenderModes;
use crate::render::renderable::{Renderable, RenderableId, RenderablePool};
use crate::render::renderer::RenderStats;
use crate::render::state::{MatrixSlot, NUM_SCENE_MATRICES, RenderState};
use crate::render::uniform_block::{BlockId, TRANSFORM_UBO_INDEX, UniformBlock};
use crate::render::{MaterialKey, RenderDataKey};
use crate::scene::bounds::{CullResult, Frustum};
use crate::scene::{NodeHandle, Scene};
use crate::shader::{ShaderFlags, ShaderId, ShaderManager};
use glam::Mat4;
use log::{debug, warn};
use smallvec::SmallVec;

/// Hard cap on matrices per transform block, regardless of device limits.
pub const MAX_MATRICES_PER_BLOCK: usize = 45;

/// Host callbacks invoked synchronously from inside the frame.
pub trait HostBridge {
    /// Regenerate the shader for a dirty render pass. The host updates the
    /// pass's shader id through `scene`; returns false when generation
    /// failed (the Renderable is skipped for this frame).
    fn bind_shader(
        &mut self,
        shaders: &mut ShaderManager,
        scene: &mut Scene,
        render_data: RenderDataKey,
        pass_index: usize,
        light_descriptor: &str,
    ) -> bool;

    /// Generate the two depth shaders used for shadow mapping. Called once,
    /// the first frame a shadow map is rendered.
    fn make_depth_shaders(&mut self, shaders: &mut ShaderManager, scene: &mut Scene) -> bool;
}

/// Everything a sorter borrows for one frame step.
pub struct FrameContext<'a, 'b> {
    pub scene: &'a mut Scene,
    pub shaders: &'a mut ShaderManager,
    pub bridge: Option<&'b mut dyn HostBridge>,
    pub backend: &'a mut dyn RenderBackend,
    pub stats: &'a mut RenderStats,
}

/// Sort policy selection.
#[derive(Debug)]
pub enum SorterKind {
    /// Insertion by shader id only (post-effect and other simple targets)
    Simple,
    /// Programmable multi-level sort for the main scene
    Main {
        sort_options: SmallVec<[SortKey; 8]>,
    },
    /// Depth-only policy for shadow maps
    Shadow(ShadowState),
}

/// Cache of the bindings in effect during submit; equal consecutive draws
/// emit no redundant state changes.
#[derive(Debug)]
pub struct CurrentState {
    pub shader: Option<ShaderId>,
    pub material: Option<MaterialKey>,
    pub mesh: Option<crate::render::MeshKey>,
    pub transform_block: Option<BlockId>,
    pub modes: RenderModes,
}

impl CurrentState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shader: None,
            material: None,
            mesh: None,
            transform_block: None,
            modes: RenderModes::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for CurrentState {
    fn default() -> Self {
        Self::new()
    }
}

/// The cull / validate / merge-sort / submit engine.
pub struct RenderSorter {
    name: &'static str,
    kind: SorterKind,
    pub(crate) pool: RenderablePool,
    root: Option<RenderableId>,
    transform_blocks: Vec<UniformBlock>,
    max_matrices_per_block: usize,
    trans_block_index: usize,
    num_matrices_in_block: usize,
    /// Requested block capacity; 0 picks the device maximum
    requested_matrices: usize,
    force_transform_block: bool,
    visible_elems: usize,
    frame_num: u64,
    output_matrices: [Mat4; 10],
}

impl RenderSorter {
    /// Creates a sorter with the default (shader-only) sort policy.
    #[must_use]
    pub fn new(name: &'static str, num_matrices: usize, force_transform_block: bool) -> Self {
        Self {
            name,
            kind: SorterKind::Simple,
            pool: RenderablePool::new(),
            root: None,
            transform_blocks: Vec::new(),
            max_matrices_per_block: 0,
            trans_block_index: 0,
            num_matrices_in_block: NUM_SCENE_MATRICES,
            requested_matrices: num_matrices,
            force_transform_block,
            visible_elems: 0,
            frame_num: 0,
            output_matrices: [Mat4::IDENTITY; 10],
        }
    }

    /// The main-scene sorter with the default level order
    /// (render order, distance, shader, mesh, material).
    #[must_use]
    pub fn main_scene() -> Self {
        let mut sorter = Self::new("MainSorter", 0, false);
        sorter.kind = SorterKind::Main {
            sort_options: SmallVec::from_slice(&[
                SortKey::RenderOrder,
                SortKey::Distance,
                SortKey::Shader,
                SortKey::Mesh,
                SortKey::Material,
            ]),
        };
        sorter
    }

    /// The depth-only sorter used for shadow maps.
    #[must_use]
    pub fn shadow() -> Self {
        let mut sorter = Self::new("ShadowSorter", 0, false);
        sorter.kind = SorterKind::Shadow(ShadowState::new());
        sorter
    }

    /// The lightweight sorter driving post-effect passes. The block only
    /// ever packs one draw past the scene matrices.
    #[must_use]
    pub fn post_effect() -> Self {
        Self::new("PostEffectSorter", NUM_SCENE_MATRICES + 9, true)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Reprograms the main sorter's level order. Ignored for other kinds.
    pub fn set_sort_options(&mut self, options: &[SortKey]) {
        if let SorterKind::Main { sort_options } = &mut self.kind {
            sort_options.clear();
            sort_options.extend_from_slice(options);
        } else {
            warn!("RENDER: {} does not take sort options", self.name);
        }
    }

    /// Visible Renderables allocated by the last cull.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.visible_elems
    }

    /// Pool slabs created so far (slabs are reused, never freed).
    #[must_use]
    pub fn pool_block_count(&self) -> usize {
        self.pool.block_count()
    }

    /// Pool entries allocated this frame (visible items plus list heads).
    #[must_use]
    pub fn pool_allocated(&self) -> usize {
        self.pool.allocated_count()
    }

    /// Transform blocks created so far (never freed).
    #[must_use]
    pub fn transform_blocks(&self) -> &[UniformBlock] {
        &self.transform_blocks
    }

    // ========================================================================
    // init
    // ========================================================================

    /// Captures the camera matrices for this target and resets the
    /// per-frame pool. Called at the start of cull, and directly by the
    /// post-effect path.
    pub fn init(&mut self, state: &mut RenderState, ctx: &mut FrameContext) {
        let m = &mut state.u_matrices;
        if state.is_stereo {
            if let Some(rig) = &ctx.scene.main_camera_rig {
                m[MatrixSlot::PROJECTION] = rig.left.projection_matrix();
                m[MatrixSlot::VIEW] = rig.left.view_matrix();
                m[MatrixSlot::VIEW + 1] = rig.right.view_matrix();
            }
        } else {
            m[MatrixSlot::PROJECTION] = state.camera.projection_matrix();
            m[MatrixSlot::VIEW] = state.camera.view_matrix();
            m[MatrixSlot::VIEW + 1] = state.camera.view_matrix();
            state.is_multiview = false;
        }
        m[MatrixSlot::VIEW_PROJ] = m[MatrixSlot::PROJECTION] * m[MatrixSlot::VIEW];
        m[MatrixSlot::VIEW_PROJ + 1] = m[MatrixSlot::PROJECTION] * m[MatrixSlot::VIEW + 1];
        m[MatrixSlot::VIEW_INVERSE] = m[MatrixSlot::VIEW].inverse();
        m[MatrixSlot::VIEW_INVERSE + 1] = m[MatrixSlot::VIEW + 1].inverse();
        state.transform_block = None;
        self.frame_num += 1;
        self.clear();
    }

    /// Resets the pool bump pointer and re-creates the render tree root.
    fn clear(&mut self) {
        self.pool.clear();
        self.visible_elems = 0;
        let root = self.pool.alloc();
        self.root = Some(root);
    }

    // ========================================================================
    // cull
    // ========================================================================

    /// View-frustum culls the scene from this target's camera, allocating a
    /// Renderable per visible pass.
    pub fn cull(&mut self, state: &mut RenderState, ctx: &mut FrameContext) {
        self.init(state, ctx);
        let camera = state.camera.clone();
        state.camera_position = camera.position();
        let frustum = camera.frustum();
        let need_cull = ctx.scene.frustum_culling();
        let root = ctx.scene.root();
        debug!("FRUSTUM: {} frame {} cull start", self.name, self.frame_num);
        self.frustum_cull(state, ctx, root, &frustum, need_cull, 0);
    }

    fn frustum_cull(
        &mut self,
        state: &mut RenderState,
        ctx: &mut FrameContext,
        node: NodeHandle,
        frustum: &Frustum,
        mut need_cull: bool,
        mut plane_mask: u8,
    ) {
        let Some(n) = ctx.scene.nodes.get(node) else {
            return;
        };
        if !n.enabled {
            return;
        }
        if need_cull {
            let (result, mask) = frustum.classify(&n.world_bounds, plane_mask);
            match result {
                CullResult::Outside => {
                    ctx.scene.nodes[node].cull_status = true;
                    ctx.scene.nodes[node].visible = false;
                    return;
                }
                CullResult::Inside => {
                    need_cull = false;
                    plane_mask = mask;
                }
                CullResult::Intersect => plane_mask = mask,
            }
        }
        ctx.scene.nodes[node].cull_status = false;
        self.add(state, ctx, node);

        let children = ctx.scene.nodes[node].children().to_vec();
        for child in children {
            self.frustum_cull(state, ctx, child, frustum, need_cull, plane_mask);
        }
    }

    /// Adds a visible node's drawable passes to the pool.
    fn add(&mut self, state: &mut RenderState, ctx: &mut FrameContext, node: NodeHandle) {
        let Some(rdata_key) = ctx.scene.render_data_of(node) else {
            return;
        };
        let Some(rdata) = ctx.scene.render_data_pool.get(rdata_key) else {
            return;
        };
        let Some(mesh_key) = rdata.mesh() else {
            return;
        };
        let pass_range = match self.kind {
            SorterKind::Main { .. } => 0..rdata.pass_count(),
            _ => 0..rdata.pass_count().min(1),
        };
        let world = ctx.scene.nodes[node].transform.world_matrix_as_mat4();
        let center = ctx.scene.nodes[node].world_bounds.center();
        let distance = center.distance(state.camera_position);
        let has_bones = ctx
            .scene
            .mesh_pool
            .get(mesh_key)
            .is_some_and(crate::render::mesh::Mesh::has_bones);

        let mut added = false;
        for pass_index in pass_range {
            let (material, modes, shader_id) = {
                let rdata = &ctx.scene.render_data_pool[rdata_key];
                let Some(pass) = rdata.pass(pass_index) else {
                    continue;
                };
                (pass.material(), *pass.modes(), pass.shader())
            };
            if modes.render_mask() == 0 {
                continue;
            }
            let shader = self.select_shader(ctx, shader_id, has_bones);
            let id = self.pool.alloc();
            let r = self.pool.get_mut(id);
            r.node = Some(node);
            r.render_data = Some(rdata_key);
            r.pass_index = pass_index as i32;
            r.material = Some(material);
            r.modes = modes;
            r.mesh = Some(mesh_key);
            r.mvp = world;
            r.distance_from_camera = distance;
            r.has_bones = has_bones;
            r.shader = shader;
            self.visible_elems += 1;
            added = true;
        }
        ctx.scene.nodes[node].visible = added;
    }

    /// Adds one externally built Renderable (the post-effect path).
    pub fn add_renderable(
        &mut self,
        _state: &mut RenderState,
        ctx: &mut FrameContext,
        rdata_key: RenderDataKey,
        pass_index: usize,
    ) -> Option<RenderableId> {
        let rdata = ctx.scene.render_data_pool.get(rdata_key)?;
        let mesh_key = rdata.mesh()?;
        let pass = rdata.pass(pass_index)?;
        let (material, modes, shader_id) = (pass.material(), *pass.modes(), pass.shader());
        let has_bones = ctx
            .scene
            .mesh_pool
            .get(mesh_key)
            .is_some_and(crate::render::mesh::Mesh::has_bones);
        let shader = self.select_shader(ctx, shader_id, has_bones);
        let id = self.pool.alloc();
        let r = self.pool.get_mut(id);
        r.render_data = Some(rdata_key);
        r.pass_index = pass_index as i32;
        r.material = Some(material);
        r.modes = modes;
        r.mesh = Some(mesh_key);
        r.has_bones = has_bones;
        r.shader = shader;
        self.visible_elems += 1;
        Some(id)
    }

    /// Access a pooled Renderable (mutable, for post-effect mode rewrites).
    pub fn renderable_mut(&mut self, id: RenderableId) -> &mut Renderable {
        self.pool.get_mut(id)
    }

    fn select_shader(
        &mut self,
        ctx: &mut FrameContext,
        pass_shader: Option<ShaderId>,
        has_bones: bool,
    ) -> Option<ShaderId> {
        match &mut self.kind {
            SorterKind::Shadow(shadow) => shadow.select_shader(ctx, has_bones),
            _ => pass_shader.filter(|&id| ctx.shaders.get(id).is_some()),
        }
    }

    // ========================================================================
    // validate and transform packing
    // ========================================================================

    /// Validates every culled Renderable, packs its matrices and merges it
    /// into the render tree, then uploads the transform blocks.
    pub fn sort(&mut self, state: &mut RenderState, ctx: &mut FrameContext) {
        self.validate(state, ctx);

        // Refresh the global scene matrices in every block touched this
        // frame and push the used range to the GPU.
        let scene_matrices = &state.u_matrices[..NUM_SCENE_MATRICES];
        for block in &mut self.transform_blocks {
            if block.num_elems() > NUM_SCENE_MATRICES {
                block.set_range_mat4(0, scene_matrices);
                let nbytes = block.num_elems() * block.elem_size();
                block.update_gpu(ctx.backend, 0, nbytes);
                block.set_num_elems(NUM_SCENE_MATRICES);
            }
        }
        self.trans_block_index = 0;
        self.num_matrices_in_block = NUM_SCENE_MATRICES;
    }

    fn validate(&mut self, state: &mut RenderState, ctx: &mut FrameContext) {
        if let SorterKind::Main { .. } = self.kind {
            // Light data must be in place before any light-reading shader
            // can be considered valid.
            state.shadow_map = ctx.scene.lights.update_lights(ctx.backend);
        }
        let ids = self.pool.allocated_ids();
        for id in ids {
            if !self.pool.get(id).has_pass() {
                continue; // tree root
            }
            if !self.is_valid(state, ctx, id) {
                continue;
            }
            let flags = self
                .pool
                .get(id)
                .shader
                .and_then(|s| ctx.shaders.get(s))
                .map(|s| s.flags())
                .unwrap_or_default();
            if flags.contains(ShaderFlags::MATRIX_UNIFORMS) {
                self.update_transform(state, ctx, id);
            }
            self.push_gpu_updates(ctx, id);
            self.merge(id);
        }
    }

    /// Pushes material and mesh data for a validated Renderable to the GPU.
    fn push_gpu_updates(&mut self, ctx: &mut FrameContext, id: RenderableId) {
        let r = self.pool.get(id);
        if let Some(material) = r.material {
            if let Some(m) = ctx.scene.material_pool.get_mut(material) {
                m.update_gpu(ctx.backend);
            }
        }
        if let Some(mesh_key) = r.mesh {
            if let Some(mesh) = ctx.scene.mesh_pool.get_mut(mesh_key) {
                if mesh.is_gpu_dirty() {
                    ctx.backend.update_mesh(mesh_key, mesh);
                    mesh.clear_gpu_dirty();
                }
            }
        }
    }

    fn is_valid(&mut self, state: &mut RenderState, ctx: &mut FrameContext, id: RenderableId) -> bool {
        if matches!(self.kind, SorterKind::Shadow(_)) {
            let (valid, shader, material, modes) = {
                let SorterKind::Shadow(shadow) = &mut self.kind else {
                    unreachable!()
                };
                shadow.validate_renderable(ctx, self.pool.get(id))
            };
            if !valid {
                return false;
            }
            let r = self.pool.get_mut(id);
            r.shader = shader;
            r.material = material;
            r.modes = modes;
            return shader.is_some();
        }
        if matches!(self.kind, SorterKind::Main { .. }) {
            self.apply_main_policies(ctx, id);
        }
        self.base_is_valid(state, ctx, id)
    }

    /// Main-scene validation policies: transparent materials promote their
    /// Geometry passes to Transparent, and a changed light signature marks
    /// the pass dirty so its shader is regenerated.
    fn apply_main_policies(&mut self, ctx: &mut FrameContext, id: RenderableId) {
        let r = self.pool.get(id);
        let Some(shader_id) = r.shader else {
            return;
        };
        let light_desc = ctx.scene.lights.descriptor().to_string();
        let mut mark_dirty = false;
        if let Some(shader) = ctx.shaders.get(shader_id) {
            if shader.use_lights() != !light_desc.is_empty() {
                mark_dirty = true;
            } else if shader.use_lights() && !shader.signature().ends_with(&light_desc) {
                mark_dirty = true;
            }
        }
        let transparent_material = r
            .material
            .and_then(|m| ctx.scene.material_pool.get(m))
            .is_some_and(crate::render::material::Material::is_transparent);

        if let (Some(rdata_key), pass_index) = (r.render_data, r.pass_index as usize) {
            if let Some(rdata) = ctx.scene.render_data_pool.get_mut(rdata_key) {
                if let Some(pass) = rdata.pass_mut(pass_index) {
                    if mark_dirty {
                        pass.mark_dirty();
                    }
                    if transparent_material
                        && pass.modes().render_order() == RenderModes::GEOMETRY
                    {
                        pass.modes_mut().set_render_order(RenderModes::TRANSPARENT);
                    }
                }
            }
        }
        if transparent_material {
            let r = self.pool.get_mut(id);
            if r.modes.render_order() == RenderModes::GEOMETRY {
                r.modes.set_render_order(RenderModes::TRANSPARENT);
            }
        }
    }

    /// A Renderable is valid iff its pass yields a usable shader; dirty
    /// passes get one regeneration attempt through the host bridge.
    fn base_is_valid(
        &mut self,
        _state: &mut RenderState,
        ctx: &mut FrameContext,
        id: RenderableId,
    ) -> bool {
        let (rdata_key, pass_index, material_key, mut shader) = {
            let r = self.pool.get(id);
            (
                r.render_data,
                r.pass_index as usize,
                r.material,
                r.shader,
            )
        };
        let Some(rdata_key) = rdata_key else {
            return false;
        };

        let new_texture = material_key
            .and_then(|m| ctx.scene.material_pool.get(m))
            .is_some_and(|m| m.is_dirty(crate::render::material::MaterialDirty::NEW_TEXTURE));
        let dirty = {
            let Some(rdata) = ctx.scene.render_data_pool.get_mut(rdata_key) else {
                return false;
            };
            let pass_dirty = rdata.pass(pass_index).is_some_and(|p| p.is_dirty());
            let dirty = shader.is_none() || rdata.is_dirty() || pass_dirty || new_texture;
            if let Some(pass) = rdata.pass_mut(pass_index) {
                pass.clear_dirty();
            }
            dirty
        };

        if dirty {
            let FrameContext {
                scene,
                shaders,
                bridge,
                ..
            } = &mut *ctx;
            if let Some(bridge) = bridge.as_deref_mut() {
                let light_desc = scene.lights.descriptor().to_string();
                bridge.bind_shader(shaders, scene, rdata_key, pass_index, &light_desc);
                shader = scene
                    .render_data_pool
                    .get(rdata_key)
                    .and_then(|rd| rd.pass(pass_index))
                    .and_then(crate::render::pass::RenderPass::shader)
                    .filter(|&s| shaders.get(s).is_some());
                self.pool.get_mut(id).shader = shader;
            }
        }
        if shader.is_some() {
            if let Some(rdata) = ctx.scene.render_data_pool.get_mut(rdata_key) {
                rdata.clear_dirty();
            }
            if new_texture {
                if let Some(m) = material_key.and_then(|m| ctx.scene.material_pool.get_mut(m)) {
                    m.clear_dirty(crate::render::material::MaterialDirty::NEW_TEXTURE);
                }
            }
            true
        } else {
            false
        }
    }

    /// Computes and packs the matrices a Renderable's shader wants.
    fn update_transform(&mut self, state: &mut RenderState, ctx: &mut FrameContext, id: RenderableId) {
        let (world, shader_id) = {
            let r = self.pool.get(id);
            (r.mvp, r.shader)
        };
        // r.mvp still holds the world matrix from the cull step
        state.u_matrices[MatrixSlot::MODEL] = world;
        state.u_matrices[MatrixSlot::MVP] =
            state.u_matrices[MatrixSlot::VIEW_PROJ] * state.u_matrices[MatrixSlot::MODEL];
        state.u_matrices[MatrixSlot::MVP + 1] =
            state.u_matrices[MatrixSlot::VIEW_PROJ + 1] * state.u_matrices[MatrixSlot::MODEL];
        {
            let r = self.pool.get_mut(id);
            r.transform_block = None;
            r.matrix_offset = -1;
        }
        let mut num_matrices = 0;
        if let Some(shader) = shader_id.and_then(|s| ctx.shaders.get(s)) {
            num_matrices = shader.calc_matrix(
                &state.u_matrices[..MatrixSlot::MVP + 2],
                &mut self.output_matrices,
            );
        }
        if num_matrices == 0 {
            if self.force_transform_block {
                num_matrices = 1;
                self.output_matrices[0] = state.u_matrices[MatrixSlot::MVP];
            } else {
                self.pool.get_mut(id).mvp = state.u_matrices[MatrixSlot::MVP];
                return;
            }
        }
        self.update_transform_block(ctx, id, num_matrices);
    }

    /// Reserves `num_matrices` slots in the active transform block,
    /// advancing to the next block when the active one is exhausted.
    fn update_transform_block(
        &mut self,
        ctx: &mut FrameContext,
        id: RenderableId,
        num_matrices: usize,
    ) {
        self.ensure_transform_block(ctx);
        if self.transform_blocks.is_empty() {
            return; // no block available: stay on the direct upload path
        }
        if num_matrices + self.num_matrices_in_block >= self.max_matrices_per_block {
            self.trans_block_index += 1;
            if self.trans_block_index >= self.transform_blocks.len() {
                let capacity = self.max_matrices_per_block;
                match Self::create_transform_block(ctx.backend, capacity) {
                    Some(block) => self.transform_blocks.push(block),
                    None => {
                        // No block: fall back to the direct upload path.
                        self.trans_block_index -= 1;
                        return;
                    }
                }
            }
            self.num_matrices_in_block = NUM_SCENE_MATRICES;
        }
        let offset = self.num_matrices_in_block;
        self.num_matrices_in_block += num_matrices;
        let block_index = self.trans_block_index;
        self.transform_blocks[block_index]
            .set_range_mat4(offset, &self.output_matrices[..num_matrices]);
        let r = self.pool.get_mut(id);
        r.matrix_offset = offset as i16;
        r.transform_block = Some(block_index);
    }

    fn ensure_transform_block(&mut self, ctx: &mut FrameContext) {
        if !self.transform_blocks.is_empty() {
            return;
        }
        let device_max = ctx.backend.max_uniform_block_size() / std::mem::size_of::<Mat4>();
        let mut capacity = if self.requested_matrices > 0 {
            self.requested_matrices
        } else {
            device_max
        };
        capacity = capacity.min(device_max).min(MAX_MATRICES_PER_BLOCK);
        if let Some(block) = Self::create_transform_block(ctx.backend, capacity) {
            self.max_matrices_per_block = block.max_elems();
            self.transform_blocks.push(block);
        }
    }

    fn create_transform_block(
        backend: &mut dyn RenderBackend,
        num_matrices: usize,
    ) -> Option<UniformBlock> {
        let max = (backend.max_uniform_block_size() / std::mem::size_of::<Mat4>())
            .min(MAX_MATRICES_PER_BLOCK);
        let num_matrices = if num_matrices > max {
            warn!("TRANSFORM: clamping transform block from {num_matrices} to {max} matrices");
            max
        } else {
            num_matrices
        };
        match UniformBlock::with_elems(
            "mat4 u_matrices",
            TRANSFORM_UBO_INDEX,
            "Transform_ubo",
            num_matrices,
        ) {
            Ok(mut block) => {
                block.set_use_gpu_buffer(true);
                Some(block)
            }
            Err(e) => {
                warn!("TRANSFORM: cannot create transform block: {e}");
                None
            }
        }
    }

    // ========================================================================
    // merge
    // ========================================================================

    fn merge(&mut self, item: RenderableId) {
        let Some(root) = self.root else {
            return;
        };
        match &self.kind {
            SorterKind::Main { sort_options } => {
                let options = sort_options.clone();
                self.merge_level(root, item, 0, &options);
            }
            _ => {
                self.merge_level(root, item, 0, &[SortKey::Shader]);
            }
        }
    }

    // ========================================================================
    // submit
    // ========================================================================

    /// Walks the render tree in order, issuing draws through the backend
    /// behind the current-state cache.
    pub fn render(
        &self,
        state: &mut RenderState,
        ctx: &mut FrameContext,
        current: &mut CurrentState,
    ) {
        if let Some(root) = self.root {
            self.render_item(state, ctx, current, root);
        }
    }

    fn render_item(
        &self,
        state: &mut RenderState,
        ctx: &mut FrameContext,
        current: &mut CurrentState,
        id: RenderableId,
    ) {
        let r = self.pool.get(id);
        if r.has_pass() {
            self.render_one(state, ctx, current, *r);
        } else {
            // List head: nextLevel first, then its sibling chain.
            let mut next = r.next_level;
            while let Some(child) = next {
                self.render_item(state, ctx, current, child);
                next = self.pool.get(child).next_sibling;
            }
        }
    }

    fn render_one(
        &self,
        state: &mut RenderState,
        ctx: &mut FrameContext,
        current: &mut CurrentState,
        r: Renderable,
    ) {
        let Some(shader_id) = r.shader else {
            return;
        };
        let flags = match ctx.shaders.get(shader_id) {
            Some(s) => s.flags(),
            None => return,
        };

        // 1. Shader change invalidates every downstream binding.
        let shader_changed = current.shader != Some(shader_id);
        if shader_changed {
            ctx.backend.use_shader(shader_id, state.is_multiview);
            current.shader = Some(shader_id);
            current.material = None;
            current.mesh = None;
            current.transform_block = None;
            if flags.contains(ShaderFlags::USE_LIGHTS) {
                ctx.scene.lights.bind(ctx.backend, shader_id);
                if let Some(shadow_texture) = state.shadow_map {
                    ctx.backend.bind_texture(
                        shadow_texture,
                        SHADOW_TEXTURE_UNIT,
                        SHADOW_TEXTURE_UNIT,
                    );
                }
            }
        }

        // 2. Matrix sourcing: transform block slot or direct upload.
        if flags.contains(ShaderFlags::MATRIX_UNIFORMS) {
            if let Some(block_index) = r.transform_block {
                let block = &self.transform_blocks[block_index];
                if current.transform_block != Some(block.id()) {
                    block.bind_buffer(ctx.backend, shader_id, 0);
                    current.transform_block = Some(block.id());
                    state.transform_block = Some(block.id());
                }
            }
            if let Some(shader) = ctx.shaders.get_mut(shader_id) {
                let ubo = shader.matrix_ubo_mut();
                if r.transform_block.is_some() {
                    ubo.set_uint("u_matrix_offset", r.matrix_offset.max(0) as u32);
                } else {
                    ubo.set_mat4("u_matrices", &r.mvp);
                    ubo.set_uint("u_matrix_offset", 0);
                }
                if shader_changed {
                    ubo.set_uint("u_right", u32::from(state.u_right));
                    ubo.set_uint("u_render_mask", u32::from(state.u_render_mask));
                }
                ubo.update_gpu(ctx.backend, 0, 0);
                ubo.bind_buffer(ctx.backend, shader_id, 0);
            }
        }

        // 3. Material bindings.
        if current.material != r.material {
            if let Some(material) = r.material.and_then(|m| ctx.scene.material_pool.get(m)) {
                material.bind(ctx.backend, shader_id);
            }
            current.material = r.material;
        }

        // 4. Pipeline state diff.
        if current.modes != r.modes {
            ctx.backend.restore_render_modes(&current.modes);
            ctx.backend.set_render_modes(&r.modes);
            current.modes = r.modes;
        }

        // 5. Mesh bind and draw.
        let Some(mesh_key) = r.mesh else {
            return;
        };
        let Some(mesh) = ctx.scene.mesh_pool.get(mesh_key) else {
            return;
        };
        if current.mesh != r.mesh {
            ctx.backend.bind_mesh(mesh_key, shader_id);
            current.mesh = r.mesh;
        }
        let indices = match mesh.index_size() {
            2 => DrawIndices::U16 {
                index_count: mesh.index_count() as u32,
            },
            4 => DrawIndices::U32 {
                index_count: mesh.index_count() as u32,
            },
            _ => DrawIndices::Array {
                vertex_count: mesh.vertex_count() as u32,
            },
        };
        ctx.backend.draw(&DrawCall {
            topology: r.modes.draw_mode(),
            indices,
        });
        ctx.stats.draw_calls += 1;
        ctx.stats.triangles += match indices {
            DrawIndices::U16 { index_count } | DrawIndices::U32 { index_count } => index_count,
            DrawIndices::Array { vertex_count } => vertex_count,
        };
    }

}
