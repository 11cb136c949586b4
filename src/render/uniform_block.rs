//! Packed CPU-to-GPU parameter blocks.
//!
//! A [`UniformBlock`] is described by a descriptor string of
//! `type name[count]` entries (`"vec4 diffuse_color; float u_opacity"`).
//! Offsets follow std140 packing so the CPU buffer can be uploaded to a GPU
//! uniform buffer verbatim. A block may also be sized as an array of its
//! struct (`max_elems > 1`), which is how transform blocks pack many `mat4`
//! values per draw batch.
//!
//! Every typed setter validates the name and stored type against the
//! descriptor; mismatches log a warning and return `false` so a bad uniform
//! never aborts a frame.

use crate::errors::{LumenError, Result};
use crate::render::backend::RenderBackend;
use crate::shader::ShaderId;
use glam::{Mat4, Vec2, Vec3, Vec4};
use log::warn;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Reserved uniform-block binding points.
pub const TRANSFORM_UBO_INDEX: u32 = 0;
pub const MATERIAL_UBO_INDEX: u32 = 1;
pub const BONES_UBO_INDEX: u32 = 2;
pub const LIGHT_UBO_INDEX: u32 = 3;
pub const MATRIX_UBO_INDEX: u32 = 4;
pub const SHADOW_UBO_INDEX: u32 = 5;

static NEXT_BLOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a uniform block, used by backends to track which
/// GPU buffer a block maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u64);

/// Shader-visible type of a descriptor entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    Int,
    Uint,
    Float,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    Mat3,
    Mat4,
}

impl UniformType {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "int" => Self::Int,
            "uint" => Self::Uint,
            "float" => Self::Float,
            "vec2" | "float2" => Self::Vec2,
            "vec3" | "float3" => Self::Vec3,
            "vec4" | "float4" => Self::Vec4,
            "ivec2" | "int2" => Self::IVec2,
            "ivec3" | "int3" => Self::IVec3,
            "ivec4" | "int4" => Self::IVec4,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            _ => return None,
        })
    }

    /// Byte size of a single value (unpadded).
    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            Self::Int | Self::Uint | Self::Float => 4,
            Self::Vec2 | Self::IVec2 => 8,
            Self::Vec3 | Self::IVec3 => 12,
            Self::Vec4 | Self::IVec4 => 16,
            Self::Mat3 => 48,
            Self::Mat4 => 64,
        }
    }

    /// std140 alignment of a single value.
    #[must_use]
    pub fn alignment(self) -> usize {
        match self {
            Self::Int | Self::Uint | Self::Float => 4,
            Self::Vec2 | Self::IVec2 => 8,
            _ => 16,
        }
    }

    /// Number of scalar components.
    #[must_use]
    pub fn components(self) -> usize {
        match self {
            Self::Int | Self::Uint | Self::Float => 1,
            Self::Vec2 | Self::IVec2 => 2,
            Self::Vec3 | Self::IVec3 => 3,
            Self::Vec4 | Self::IVec4 => 4,
            Self::Mat3 => 12,
            Self::Mat4 => 16,
        }
    }

    /// Type name as written in a shader.
    #[must_use]
    pub fn shader_type(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::IVec2 => "ivec2",
            Self::IVec3 => "ivec3",
            Self::IVec4 => "ivec4",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
        }
    }
}

/// One named entry in a uniform block descriptor.
#[derive(Debug, Clone)]
pub struct UniformEntry {
    pub name: String,
    pub ty: UniformType,
    /// Array element count (1 for scalars/vectors)
    pub count: usize,
    /// Byte offset within one block element
    pub offset: usize,
    /// Total byte size including array stride padding
    pub size: usize,
}

fn align_up(v: usize, align: usize) -> usize {
    (v + align - 1) & !(align - 1)
}

fn parse_descriptor(descriptor: &str) -> Result<Vec<UniformEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    for decl in descriptor.split([';', ',', '\n']) {
        let decl = decl.trim();
        if decl.is_empty() {
            continue;
        }
        let mut parts = decl.split_whitespace();
        let (Some(ty_str), Some(name_str)) = (parts.next(), parts.next()) else {
            return Err(LumenError::BadDescriptor(decl.to_string()));
        };
        let Some(ty) = UniformType::parse(ty_str) else {
            return Err(LumenError::BadDescriptor(decl.to_string()));
        };
        let (name, count) = match name_str.find('[') {
            Some(bracket) => {
                let close = name_str
                    .find(']')
                    .ok_or_else(|| LumenError::BadDescriptor(decl.to_string()))?;
                let count: usize = name_str[bracket + 1..close]
                    .parse()
                    .map_err(|_| LumenError::BadDescriptor(decl.to_string()))?;
                (name_str[..bracket].to_string(), count.max(1))
            }
            None => (name_str.to_string(), 1),
        };
        let (align, size) = if count > 1 {
            // std140 array: element stride rounds up to 16 bytes
            let stride = align_up(ty.byte_size(), 16);
            (16, stride * count)
        } else {
            (ty.alignment(), ty.byte_size())
        };
        offset = align_up(offset, align);
        entries.push(UniformEntry {
            name,
            ty,
            count,
            offset,
            size,
        });
        offset += size;
    }
    Ok(entries)
}

/// A uniform parameter block with a CPU-side byte buffer.
pub struct UniformBlock {
    id: BlockId,
    block_name: String,
    binding: u32,
    descriptor: String,
    entries: Vec<UniformEntry>,
    index: FxHashMap<String, usize>,
    data: Vec<u8>,
    elem_size: usize,
    max_elems: usize,
    num_elems: usize,
    use_gpu_buffer: bool,
    dirty: bool,
}

impl UniformBlock {
    /// Creates a single-struct block from a descriptor string.
    pub fn new(descriptor: &str, binding: u32, block_name: &str) -> Result<Self> {
        Self::with_elems(descriptor, binding, block_name, 1)
    }

    /// Creates a block holding `max_elems` copies of the descriptor struct.
    pub fn with_elems(
        descriptor: &str,
        binding: u32,
        block_name: &str,
        max_elems: usize,
    ) -> Result<Self> {
        let entries = parse_descriptor(descriptor)?;
        let raw_size: usize = entries
            .last()
            .map(|e| e.offset + e.size)
            .unwrap_or_default();
        // Struct elements take std140 array stride; scalar elements pack
        // tight so blocks like the light data bag address by float offset.
        let elem_size = if max_elems > 1 && raw_size > 4 {
            align_up(raw_size, 16)
        } else {
            align_up(raw_size, 4)
        };
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        Ok(Self {
            id: BlockId(NEXT_BLOCK_ID.fetch_add(1, Ordering::Relaxed)),
            block_name: block_name.to_string(),
            binding,
            descriptor: descriptor.to_string(),
            entries,
            index,
            data: vec![0u8; elem_size * max_elems.max(1)],
            elem_size,
            max_elems: max_elems.max(1),
            num_elems: 0,
            use_gpu_buffer: false,
            dirty: false,
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn block_name(&self) -> &str {
        &self.block_name
    }

    #[inline]
    #[must_use]
    pub fn binding(&self) -> u32 {
        self.binding
    }

    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Enables or disables use of a GPU-backed uniform buffer.
    pub fn set_use_gpu_buffer(&mut self, flag: bool) {
        self.use_gpu_buffer = flag;
    }

    #[inline]
    #[must_use]
    pub fn uses_gpu_buffer(&self) -> bool {
        self.use_gpu_buffer
    }

    /// Current logical element count (high-water of `set_range`/`set_at`).
    #[inline]
    #[must_use]
    pub fn num_elems(&self) -> usize {
        self.num_elems
    }

    /// Capacity in elements, fixed at construction.
    #[inline]
    #[must_use]
    pub fn max_elems(&self) -> usize {
        self.max_elems
    }

    /// Byte size of one element of the block.
    #[inline]
    #[must_use]
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Total byte size of the CPU buffer.
    #[inline]
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    /// Resets the logical element count without touching data.
    pub fn set_num_elems(&mut self, num_elems: usize) -> bool {
        if num_elems > self.max_elems {
            warn!(
                "UNIFORM: set_num_elems {} exceeds capacity {} of '{}'",
                num_elems, self.max_elems, self.block_name
            );
            return false;
        }
        self.num_elems = num_elems;
        true
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// The raw CPU buffer.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The bytes of the given element, or None if out of range.
    #[must_use]
    pub fn data_at(&self, elem_index: usize) -> Option<&[u8]> {
        if elem_index >= self.max_elems {
            return None;
        }
        let start = elem_index * self.elem_size;
        Some(&self.data[start..start + self.elem_size])
    }

    /// Number of bytes occupied by the named uniform, 0 if unknown.
    #[must_use]
    pub fn byte_size(&self, name: &str) -> usize {
        self.index
            .get(name)
            .map(|&i| self.entries[i].size)
            .unwrap_or(0)
    }

    #[must_use]
    pub fn has_uniform(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn entries(&self) -> &[UniformEntry] {
        &self.entries
    }

    fn entry(&self, name: &str, ty: UniformType) -> Option<&UniformEntry> {
        match self.index.get(name) {
            Some(&i) => {
                let e = &self.entries[i];
                if e.ty == ty {
                    Some(e)
                } else {
                    warn!(
                        "UNIFORM: '{}' is {} not {} in block '{}'",
                        name,
                        e.ty.shader_type(),
                        ty.shader_type(),
                        self.block_name
                    );
                    None
                }
            }
            None => {
                warn!(
                    "UNIFORM: '{}' not found in block '{}'",
                    name, self.block_name
                );
                None
            }
        }
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.dirty = true;
        if self.num_elems == 0 {
            self.num_elems = 1;
        }
    }

    // ========================================================================
    // Typed setters
    // ========================================================================

    pub fn set_int(&mut self, name: &str, val: i32) -> bool {
        let Some(e) = self.entry(name, UniformType::Int) else {
            return false;
        };
        let offset = e.offset;
        self.write_bytes(offset, &val.to_ne_bytes());
        true
    }

    pub fn set_uint(&mut self, name: &str, val: u32) -> bool {
        let Some(e) = self.entry(name, UniformType::Uint) else {
            return false;
        };
        let offset = e.offset;
        self.write_bytes(offset, &val.to_ne_bytes());
        true
    }

    pub fn set_float(&mut self, name: &str, val: f32) -> bool {
        let Some(e) = self.entry(name, UniformType::Float) else {
            return false;
        };
        let offset = e.offset;
        self.write_bytes(offset, &val.to_ne_bytes());
        true
    }

    pub fn set_vec2(&mut self, name: &str, val: Vec2) -> bool {
        let Some(e) = self.entry(name, UniformType::Vec2) else {
            return false;
        };
        let offset = e.offset;
        self.write_bytes(offset, bytemuck::bytes_of(&val));
        true
    }

    pub fn set_vec3(&mut self, name: &str, val: Vec3) -> bool {
        let Some(e) = self.entry(name, UniformType::Vec3) else {
            return false;
        };
        let offset = e.offset;
        self.write_bytes(offset, bytemuck::bytes_of(&val));
        true
    }

    pub fn set_vec4(&mut self, name: &str, val: Vec4) -> bool {
        let Some(e) = self.entry(name, UniformType::Vec4) else {
            return false;
        };
        let offset = e.offset;
        self.write_bytes(offset, bytemuck::bytes_of(&val));
        true
    }

    pub fn set_mat4(&mut self, name: &str, val: &Mat4) -> bool {
        let Some(e) = self.entry(name, UniformType::Mat4) else {
            return false;
        };
        let offset = e.offset;
        self.write_bytes(offset, bytemuck::bytes_of(val));
        true
    }

    /// Writes a float array; `val.len()` must equal the entry's total
    /// component count.
    pub fn set_float_vec(&mut self, name: &str, val: &[f32]) -> bool {
        let Some(&i) = self.index.get(name) else {
            warn!(
                "UNIFORM: '{}' not found in block '{}'",
                name, self.block_name
            );
            return false;
        };
        let e = self.entries[i].clone();
        let expected = e.ty.components() * e.count;
        if val.len() != expected {
            warn!(
                "UNIFORM: '{}' expects {} floats, got {}",
                name,
                expected,
                val.len()
            );
            return false;
        }
        if e.count > 1 {
            // honor std140 array stride
            let stride = align_up(e.ty.byte_size(), 16);
            let comp = e.ty.components();
            for (elem, chunk) in val.chunks(comp).enumerate() {
                let offset = e.offset + elem * stride;
                self.write_bytes(offset, bytemuck::cast_slice(chunk));
            }
        } else {
            self.write_bytes(e.offset, bytemuck::cast_slice(val));
        }
        true
    }

    pub fn set_int_vec(&mut self, name: &str, val: &[i32]) -> bool {
        let Some(&i) = self.index.get(name) else {
            warn!(
                "UNIFORM: '{}' not found in block '{}'",
                name, self.block_name
            );
            return false;
        };
        let e = self.entries[i].clone();
        let expected = e.ty.components() * e.count;
        if val.len() != expected {
            warn!(
                "UNIFORM: '{}' expects {} ints, got {}",
                name,
                expected,
                val.len()
            );
            return false;
        }
        self.write_bytes(e.offset, bytemuck::cast_slice(val));
        true
    }

    // ========================================================================
    // Typed getters
    // ========================================================================

    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i32> {
        let e = self.entry(name, UniformType::Int)?;
        let b = &self.data[e.offset..e.offset + 4];
        Some(i32::from_ne_bytes(b.try_into().ok()?))
    }

    #[must_use]
    pub fn get_float(&self, name: &str) -> Option<f32> {
        let e = self.entry(name, UniformType::Float)?;
        let b = &self.data[e.offset..e.offset + 4];
        Some(f32::from_ne_bytes(b.try_into().ok()?))
    }

    #[must_use]
    pub fn get_vec2(&self, name: &str) -> Option<Vec2> {
        let e = self.entry(name, UniformType::Vec2)?;
        Some(bytemuck::pod_read_unaligned(
            &self.data[e.offset..e.offset + 8],
        ))
    }

    #[must_use]
    pub fn get_vec3(&self, name: &str) -> Option<Vec3> {
        let e = self.entry(name, UniformType::Vec3)?;
        Some(bytemuck::pod_read_unaligned(
            &self.data[e.offset..e.offset + 12],
        ))
    }

    #[must_use]
    pub fn get_vec4(&self, name: &str) -> Option<Vec4> {
        let e = self.entry(name, UniformType::Vec4)?;
        Some(bytemuck::pod_read_unaligned(
            &self.data[e.offset..e.offset + 16],
        ))
    }

    #[must_use]
    pub fn get_mat4(&self, name: &str) -> Option<Mat4> {
        let e = self.entry(name, UniformType::Mat4)?;
        Some(bytemuck::pod_read_unaligned(
            &self.data[e.offset..e.offset + 64],
        ))
    }

    // ========================================================================
    // Array-of-struct operations
    // ========================================================================

    /// Copies `count` elements of raw struct data starting at `elem_index`.
    pub fn set_range(&mut self, elem_index: usize, src: &[u8], count: usize) -> bool {
        if elem_index + count > self.max_elems {
            warn!(
                "UNIFORM: set_range {}+{} exceeds capacity {} of '{}'",
                elem_index, count, self.max_elems, self.block_name
            );
            return false;
        }
        let nbytes = count * self.elem_size;
        if src.len() < nbytes {
            warn!(
                "UNIFORM: set_range source has {} bytes, needs {}",
                src.len(),
                nbytes
            );
            return false;
        }
        let start = elem_index * self.elem_size;
        self.data[start..start + nbytes].copy_from_slice(&src[..nbytes]);
        self.num_elems = self.num_elems.max(elem_index + count);
        self.dirty = true;
        true
    }

    /// `set_range` convenience for blocks whose element is a single `mat4`.
    pub fn set_range_mat4(&mut self, elem_index: usize, matrices: &[Mat4]) -> bool {
        self.set_range(elem_index, bytemuck::cast_slice(matrices), matrices.len())
    }

    /// Copies one element's worth of data from another block.
    pub fn set_at(&mut self, elem_index: usize, src: &UniformBlock) -> bool {
        if elem_index >= self.max_elems {
            warn!(
                "UNIFORM: set_at {} out of range for '{}'",
                elem_index, self.block_name
            );
            return false;
        }
        let n = self.elem_size.min(src.data.len());
        let start = elem_index * self.elem_size;
        self.data[start..start + n].copy_from_slice(&src.data[..n]);
        self.num_elems = self.num_elems.max(elem_index + 1);
        self.dirty = true;
        true
    }

    // ========================================================================
    // GPU interface
    // ========================================================================

    /// Pushes a byte subrange of the CPU buffer to the GPU.
    ///
    /// A zero `len` uploads the whole buffer.
    pub fn update_gpu(&mut self, backend: &mut dyn RenderBackend, offset: usize, len: usize) {
        let len = if len == 0 { self.data.len() } else { len };
        let len = len.min(self.data.len().saturating_sub(offset));
        backend.update_uniform_block(self, offset, len);
        self.dirty = false;
    }

    /// Binds the block (or a subrange starting at `location_offset` bytes)
    /// for the given shader.
    pub fn bind_buffer(
        &self,
        backend: &mut dyn RenderBackend,
        shader: ShaderId,
        location_offset: usize,
    ) {
        backend.bind_uniform_block(self, shader, location_offset);
    }

    /// Produces the shader declaration for this block.
    #[must_use]
    pub fn make_shader_layout(&self) -> String {
        let mut out = format!("layout (std140) uniform {} {{\n", self.block_name);
        for e in &self.entries {
            if e.count > 1 {
                out.push_str(&format!(
                    "    {} {}[{}];\n",
                    e.ty.shader_type(),
                    e.name,
                    e.count
                ));
            } else {
                out.push_str(&format!("    {} {};\n", e.ty.shader_type(), e.name));
            }
        }
        out.push_str("};\n");
        out
    }
}

impl std::fmt::Debug for UniformBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniformBlock")
            .field("name", &self.block_name)
            .field("binding", &self.binding)
            .field("elem_size", &self.elem_size)
            .field("max_elems", &self.max_elems)
            .field("num_elems", &self.num_elems)
            .finish_non_exhaustive()
    }
}
