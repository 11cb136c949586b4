//! Geometry: semantic vertex attributes and an optional index buffer.

use crate::errors::{LumenError, Result};
use crate::scene::bounds::BoundingVolume;
use glam::Vec3;
use rustc_hash::FxHashMap;

/// One named vertex attribute (`a_position`, `a_normal`, `a_texcoord`, ...).
#[derive(Debug, Clone)]
pub struct VertexAttribute {
    pub name: String,
    /// Floats per vertex
    pub components: usize,
    pub data: Vec<f32>,
}

/// 16- or 32-bit index storage.
#[derive(Debug, Clone)]
pub enum IndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexBuffer {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A vertex buffer of semantic attributes plus an optional index buffer.
///
/// Invariants: every attribute has exactly `vertex_count` rows; index values
/// lie in `[0, vertex_count)`. Both are enforced at mutation time so the
/// sorter can trust the counts during submit.
#[derive(Debug, Default)]
pub struct Mesh {
    attributes: Vec<VertexAttribute>,
    lookup: FxHashMap<String, usize>,
    vertex_count: usize,
    indices: Option<IndexBuffer>,
    bounds: BoundingVolume,
    bounds_dirty: bool,
    gpu_dirty: bool,
}

impl Mesh {
    #[must_use]
    pub fn new() -> Self {
        Self {
            attributes: Vec::new(),
            lookup: FxHashMap::default(),
            vertex_count: 0,
            indices: None,
            bounds: BoundingVolume::empty(),
            bounds_dirty: false,
            gpu_dirty: false,
        }
    }

    /// Adds or replaces a vertex attribute.
    ///
    /// The first attribute fixes the vertex count; later attributes must
    /// match it.
    pub fn set_attribute(&mut self, name: &str, components: usize, data: Vec<f32>) -> Result<()> {
        let rows = data.len() / components.max(1);
        if self.attributes.is_empty() {
            self.vertex_count = rows;
        } else if rows != self.vertex_count {
            return Err(LumenError::AttributeSizeMismatch {
                name: name.to_string(),
                rows,
                vertex_count: self.vertex_count,
            });
        }
        let attr = VertexAttribute {
            name: name.to_string(),
            components,
            data,
        };
        match self.lookup.get(name) {
            Some(&i) => self.attributes[i] = attr,
            None => {
                self.lookup.insert(name.to_string(), self.attributes.len());
                self.attributes.push(attr);
            }
        }
        if name == "a_position" {
            self.bounds_dirty = true;
        }
        self.gpu_dirty = true;
        Ok(())
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.lookup.get(name).map(|&i| &self.attributes[i])
    }

    #[must_use]
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn set_indices_u16(&mut self, indices: Vec<u16>) -> Result<()> {
        for &i in &indices {
            if usize::from(i) >= self.vertex_count {
                return Err(LumenError::IndexOutOfRange {
                    value: u32::from(i),
                    vertex_count: self.vertex_count,
                });
            }
        }
        self.indices = Some(IndexBuffer::U16(indices));
        self.gpu_dirty = true;
        Ok(())
    }

    pub fn set_indices_u32(&mut self, indices: Vec<u32>) -> Result<()> {
        for &i in &indices {
            if i as usize >= self.vertex_count {
                return Err(LumenError::IndexOutOfRange {
                    value: i,
                    vertex_count: self.vertex_count,
                });
            }
        }
        self.indices = Some(IndexBuffer::U32(indices));
        self.gpu_dirty = true;
        Ok(())
    }

    #[must_use]
    pub fn indices(&self) -> Option<&IndexBuffer> {
        self.indices.as_ref()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[must_use]
    pub fn index_count(&self) -> usize {
        self.indices.as_ref().map(IndexBuffer::len).unwrap_or(0)
    }

    /// Bytes per index: 0 (non-indexed), 2, or 4.
    #[must_use]
    pub fn index_size(&self) -> usize {
        match &self.indices {
            None => 0,
            Some(IndexBuffer::U16(_)) => 2,
            Some(IndexBuffer::U32(_)) => 4,
        }
    }

    /// True when the mesh carries skinning attributes.
    #[must_use]
    pub fn has_bones(&self) -> bool {
        self.lookup.contains_key("a_bone_weights") && self.lookup.contains_key("a_bone_indices")
    }

    /// Recomputes the cached bounding volume from `a_position` if stale.
    pub fn update_bounds(&mut self) {
        if !self.bounds_dirty {
            return;
        }
        let mut bounds = BoundingVolume::empty();
        if let Some(pos) = self.attribute("a_position") {
            for chunk in pos.data.chunks_exact(pos.components.max(1)) {
                let y = chunk.get(1).copied().unwrap_or(0.0);
                let z = chunk.get(2).copied().unwrap_or(0.0);
                bounds.expand_point(Vec3::new(chunk[0], y, z));
            }
        }
        self.bounds = bounds;
        self.bounds_dirty = false;
    }

    /// The cached local-space bounding volume.
    #[must_use]
    pub fn bounds(&self) -> &BoundingVolume {
        &self.bounds
    }

    #[must_use]
    pub fn is_gpu_dirty(&self) -> bool {
        self.gpu_dirty
    }

    pub fn clear_gpu_dirty(&mut self) {
        self.gpu_dirty = false;
    }
}
