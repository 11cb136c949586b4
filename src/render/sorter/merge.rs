//! Merge insertion into the multi-level render tree.
//!
//! Each level of the tree orders siblings by one sort key. When an inserted
//! item's key equals an existing sibling's, that sibling is promoted to a
//! list head (an extra pool entry carrying the draw data) and the item
//! descends to the next level. Opaque buckets skip the DISTANCE level;
//! transparent buckets sort far-to-near through it.

use super::RenderSorter;
use crate::render::modes::RenderModes;
use crate::render::renderable::RenderableId;
use crate::shader::ShaderId;
use slotmap::Key;
use std::cmp::Ordering;

/// One sort criterion; the main sorter's level order is a sequence of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// `renderModes.renderOrder`, ascending
    RenderOrder,
    /// Distance from camera, descending (far first); transparent buckets only
    Distance,
    /// Shader id, ascending
    Shader,
    /// Mesh identity, ascending
    Mesh,
    /// Material identity, ascending
    Material,
    /// Packed render flags, descending
    Mode,
}

impl RenderSorter {
    pub(super) fn merge_level(
        &mut self,
        parent: RenderableId,
        item: RenderableId,
        level: usize,
        options: &[SortKey],
    ) {
        let key = options[level];
        if key == SortKey::RenderOrder {
            // Transparent and overlay buckets always blend and ignore depth.
            let r = self.pool.get_mut(item);
            if r.modes.render_order() >= RenderModes::TRANSPARENT {
                r.modes.set_alpha_blend(true);
                r.modes.set_depth_test(false);
            }
        }

        let front = self.pool.get(parent).next_level;
        let Some(first) = front else {
            self.pool.get_mut(item).next_sibling = None;
            self.pool.get_mut(parent).next_level = Some(item);
            return;
        };
        if self.compare(key, item, first) == Ordering::Less {
            self.pool.get_mut(item).next_sibling = Some(first);
            self.pool.get_mut(parent).next_level = Some(item);
            return;
        }

        let mut prev = first;
        let mut cur = Some(first);
        while let Some(c) = cur {
            match self.compare(key, item, c) {
                Ordering::Equal => {
                    if let Some(next_level) = self.descend_level(key, item, level, options) {
                        if self.pool.get(c).next_level.is_none() {
                            self.add_listhead(c);
                        }
                        self.merge_level(c, item, next_level, options);
                        return;
                    }
                    // Deepest level: equal keys stay adjacent siblings.
                }
                Ordering::Less => {
                    self.pool.get_mut(item).next_sibling = Some(c);
                    self.pool.get_mut(prev).next_sibling = Some(item);
                    return;
                }
                Ordering::Greater => {}
            }
            prev = c;
            cur = self.pool.get(c).next_sibling;
        }
        self.pool.get_mut(prev).next_sibling = Some(item);
        self.pool.get_mut(item).next_sibling = None;
    }

    /// Index of the level an equal-keyed item descends to, None at the
    /// deepest level. Opaque buckets hop over DISTANCE.
    fn descend_level(
        &self,
        key: SortKey,
        item: RenderableId,
        level: usize,
        options: &[SortKey],
    ) -> Option<usize> {
        let mut next = level + 1;
        if key == SortKey::RenderOrder
            && self.pool.get(item).modes.render_order() < RenderModes::TRANSPARENT
            && options.get(next) == Some(&SortKey::Distance)
        {
            next += 1;
        }
        (next < options.len()).then_some(next)
    }

    /// Less means `item` is visited before `cur` in the submit traversal.
    fn compare(&self, key: SortKey, item: RenderableId, cur: RenderableId) -> Ordering {
        let a = self.pool.get(item);
        let b = self.pool.get(cur);
        match key {
            SortKey::RenderOrder => a.modes.render_order().cmp(&b.modes.render_order()),
            SortKey::Distance => b
                .distance_from_camera
                .partial_cmp(&a.distance_from_camera)
                .unwrap_or(Ordering::Equal),
            SortKey::Shader => {
                let sa = a.shader.unwrap_or(ShaderId(u32::MAX));
                let sb = b.shader.unwrap_or(ShaderId(u32::MAX));
                sa.cmp(&sb)
            }
            SortKey::Mesh => {
                let ma = a.mesh.map(|k| k.data().as_ffi()).unwrap_or(u64::MAX);
                let mb = b.mesh.map(|k| k.data().as_ffi()).unwrap_or(u64::MAX);
                ma.cmp(&mb)
            }
            SortKey::Material => {
                let ma = a.material.map(|k| k.data().as_ffi()).unwrap_or(u64::MAX);
                let mb = b.material.map(|k| k.data().as_ffi()).unwrap_or(u64::MAX);
                ma.cmp(&mb)
            }
            SortKey::Mode => b.modes.render_flags().cmp(&a.modes.render_flags()),
        }
    }

    /// Demotes `cur` to a key-carrying list head whose first child is a copy
    /// of `cur` with the draw data.
    fn add_listhead(&mut self, cur: RenderableId) {
        let first = self.pool.alloc();
        let copy = *self.pool.get(cur);
        {
            let f = self.pool.get_mut(first);
            *f = copy;
            f.next_level = None;
            f.next_sibling = None;
        }
        let c = self.pool.get_mut(cur);
        c.pass_index = -1;
        c.render_data = None;
        c.modes.set_render_mask(0);
        c.next_level = Some(first);
    }
}
