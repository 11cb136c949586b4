//! Per-frame draw records and their memory pool.
//!
//! A [`Renderable`] flattens everything one draw needs; the cull step
//! allocates them from a pool of fixed-capacity slabs that is bump-reset at
//! the start of the next frame, never freed. The sorted render tree links
//! Renderables by pool index (`next_level` / `next_sibling`), not by
//! pointer, so the whole frame is plain data.

use crate::render::modes::RenderModes;
use crate::render::{MaterialKey, MeshKey, RenderDataKey};
use crate::scene::NodeHandle;
use crate::shader::ShaderId;
use glam::Mat4;

/// Renderables per pool slab.
pub const BLOCK_CAPACITY: usize = 128;

/// Index of a Renderable in its sorter's pool: `block * capacity + slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderableId(u32);

impl RenderableId {
    #[inline]
    fn new(block: usize, slot: usize) -> Self {
        Self((block * BLOCK_CAPACITY + slot) as u32)
    }

    #[inline]
    fn block(self) -> usize {
        self.0 as usize / BLOCK_CAPACITY
    }

    #[inline]
    fn slot(self) -> usize {
        self.0 as usize % BLOCK_CAPACITY
    }
}

/// One draw call's flattened inputs.
///
/// Internal nodes of the render tree ("list heads") carry links but no draw
/// data; they are recognized by `pass_index < 0`.
#[derive(Debug, Clone, Copy)]
pub struct Renderable {
    /// Owner node, for logs and distance bookkeeping
    pub node: Option<NodeHandle>,
    pub render_data: Option<RenderDataKey>,
    /// Pass index within the render data; -1 marks a list head
    pub pass_index: i32,
    pub material: Option<MaterialKey>,
    pub shader: Option<ShaderId>,
    pub mesh: Option<MeshKey>,
    pub modes: RenderModes,
    /// World matrix after cull; the final MVP on the direct-upload path
    pub mvp: Mat4,
    /// Index of the transform block in the sorter's pool, if packed
    pub transform_block: Option<usize>,
    /// Matrix slot offset within the transform block, -1 if direct
    pub matrix_offset: i16,
    pub distance_from_camera: f32,
    pub has_bones: bool,
    pub next_level: Option<RenderableId>,
    pub next_sibling: Option<RenderableId>,
}

impl Renderable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            node: None,
            render_data: None,
            pass_index: -1,
            material: None,
            shader: None,
            mesh: None,
            modes: RenderModes::new(),
            mvp: Mat4::IDENTITY,
            transform_block: None,
            matrix_offset: -1,
            distance_from_camera: 0.0,
            has_bones: false,
            next_level: None,
            next_sibling: None,
        }
    }

    /// True for drawable leaves, false for list heads.
    #[inline]
    #[must_use]
    pub fn has_pass(&self) -> bool {
        self.pass_index >= 0
    }
}

impl Default for Renderable {
    fn default() -> Self {
        Self::new()
    }
}

/// Bump allocator over fixed-capacity slabs, reused frame to frame.
#[derive(Debug)]
pub struct RenderablePool {
    blocks: Vec<Vec<Renderable>>,
    cur: usize,
}

impl RenderablePool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: vec![Vec::with_capacity(BLOCK_CAPACITY)],
            cur: 0,
        }
    }

    /// Resets the bump pointer to the first slab. Slabs are kept.
    pub fn clear(&mut self) {
        self.cur = 0;
        self.blocks[0].clear();
    }

    /// Allocates a fresh Renderable, growing by one slab when the current
    /// one is full and no reusable slab follows.
    pub fn alloc(&mut self) -> RenderableId {
        if self.blocks[self.cur].len() >= BLOCK_CAPACITY {
            self.cur += 1;
            if self.cur == self.blocks.len() {
                log::debug!("RENDER: pool grows to {} blocks", self.blocks.len() + 1);
                self.blocks.push(Vec::with_capacity(BLOCK_CAPACITY));
            }
            self.blocks[self.cur].clear();
        }
        let slot = self.blocks[self.cur].len();
        self.blocks[self.cur].push(Renderable::new());
        RenderableId::new(self.cur, slot)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: RenderableId) -> &Renderable {
        &self.blocks[id.block()][id.slot()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: RenderableId) -> &mut Renderable {
        &mut self.blocks[id.block()][id.slot()]
    }

    /// Ids of every allocation this frame, in allocation order.
    #[must_use]
    pub fn allocated_ids(&self) -> Vec<RenderableId> {
        let mut ids = Vec::new();
        for (b, block) in self.blocks.iter().enumerate().take(self.cur + 1) {
            for s in 0..block.len() {
                ids.push(RenderableId::new(b, s));
            }
        }
        ids
    }

    /// Number of allocations this frame.
    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.blocks
            .iter()
            .take(self.cur + 1)
            .map(Vec::len)
            .sum()
    }

    /// Total slabs ever created (never shrinks).
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Allocation count of one slab, for pool-discipline tests.
    #[must_use]
    pub fn block_len(&self, block: usize) -> usize {
        self.blocks.get(block).map(Vec::len).unwrap_or(0)
    }
}

impl Default for RenderablePool {
    fn default() -> Self {
        Self::new()
    }
}
