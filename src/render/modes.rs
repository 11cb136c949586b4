//! Per-pass pipeline state, packed for fast compare and copy.
//!
//! All the render modes of a pass (ordering, culling, depth, blending,
//! stencil, polygon offset, coverage) pack into one 64-bit word plus three
//! floats. Equality and the sort key are bit-level; every mutating setter
//! that changes a field sets the dirty bit so the owning pass knows its
//! shader may need rebuilding.
//!
//! The public vocabulary uses wgpu's state enums; the packed codes are an
//! internal encoding.

use wgpu::{BlendFactor, CompareFunction, Face, PrimitiveTopology, StencilOperation};

/// Face culling selection for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullFace {
    Back,
    Front,
    None,
}

impl CullFace {
    /// The wgpu face to cull, None to disable culling.
    #[must_use]
    pub fn to_wgpu(self) -> Option<Face> {
        match self {
            Self::Back => Some(Face::Back),
            Self::Front => Some(Face::Front),
            Self::None => None,
        }
    }
}

// Packed field layout in `flags` (low to high):
//   source_blend:4  dest_blend:4  render_mask:2  cull_face:2  draw_mode:3
//   dirty:1  depth_test:1  alpha_blend:1  use_light:1  cast_shadows:1
//   depth_mask:1  alpha_to_coverage:1  use_lightmap:1  offset:1
//   invert_coverage_mask:1  stencil_test:1  stencil_func:3  stencil_fail:3
//   depth_fail:3  stencil_pass:3  stencil_func_mask:8  stencil_mask:8
//   stencil_ref:8
const SOURCE_BLEND: (u32, u64) = (0, 0xf);
const DEST_BLEND: (u32, u64) = (4, 0xf);
const RENDER_MASK: (u32, u64) = (8, 0x3);
const CULL_FACE: (u32, u64) = (10, 0x3);
const DRAW_MODE: (u32, u64) = (12, 0x7);
const DIRTY: (u32, u64) = (15, 0x1);
const DEPTH_TEST: (u32, u64) = (16, 0x1);
const ALPHA_BLEND: (u32, u64) = (17, 0x1);
const USE_LIGHT: (u32, u64) = (18, 0x1);
const CAST_SHADOWS: (u32, u64) = (19, 0x1);
const DEPTH_MASK: (u32, u64) = (20, 0x1);
const ALPHA_TO_COVERAGE: (u32, u64) = (21, 0x1);
const USE_LIGHTMAP: (u32, u64) = (22, 0x1);
const OFFSET: (u32, u64) = (23, 0x1);
const INVERT_COVERAGE_MASK: (u32, u64) = (24, 0x1);
const STENCIL_TEST: (u32, u64) = (25, 0x1);
const STENCIL_FUNC: (u32, u64) = (26, 0x7);
const STENCIL_FAIL: (u32, u64) = (29, 0x7);
const DEPTH_FAIL: (u32, u64) = (32, 0x7);
const STENCIL_PASS: (u32, u64) = (35, 0x7);
const STENCIL_FUNC_MASK: (u32, u64) = (38, 0xff);
const STENCIL_MASK: (u32, u64) = (46, 0xff);
const STENCIL_REF: (u32, u64) = (54, 0xff);

fn blend_code(f: BlendFactor) -> u64 {
    match f {
        BlendFactor::Zero => 0,
        BlendFactor::One => 1,
        BlendFactor::Src => 2,
        BlendFactor::OneMinusSrc => 3,
        BlendFactor::SrcAlpha => 4,
        BlendFactor::OneMinusSrcAlpha => 5,
        BlendFactor::DstAlpha => 6,
        BlendFactor::OneMinusDstAlpha => 7,
        BlendFactor::Dst => 8,
        BlendFactor::OneMinusDst => 9,
        _ => 10, // SrcAlphaSaturated and constants collapse to saturate
    }
}

fn blend_from_code(code: u64) -> BlendFactor {
    match code {
        0 => BlendFactor::Zero,
        1 => BlendFactor::One,
        2 => BlendFactor::Src,
        3 => BlendFactor::OneMinusSrc,
        4 => BlendFactor::SrcAlpha,
        5 => BlendFactor::OneMinusSrcAlpha,
        6 => BlendFactor::DstAlpha,
        7 => BlendFactor::OneMinusDstAlpha,
        8 => BlendFactor::Dst,
        9 => BlendFactor::OneMinusDst,
        _ => BlendFactor::SrcAlphaSaturated,
    }
}

fn compare_code(f: CompareFunction) -> u64 {
    match f {
        CompareFunction::Never => 0,
        CompareFunction::Less => 1,
        CompareFunction::Equal => 2,
        CompareFunction::LessEqual => 3,
        CompareFunction::Greater => 4,
        CompareFunction::NotEqual => 5,
        CompareFunction::GreaterEqual => 6,
        CompareFunction::Always => 7,
    }
}

fn compare_from_code(code: u64) -> CompareFunction {
    match code {
        0 => CompareFunction::Never,
        1 => CompareFunction::Less,
        2 => CompareFunction::Equal,
        3 => CompareFunction::LessEqual,
        4 => CompareFunction::Greater,
        5 => CompareFunction::NotEqual,
        6 => CompareFunction::GreaterEqual,
        _ => CompareFunction::Always,
    }
}

fn stencil_op_code(op: StencilOperation) -> u64 {
    match op {
        StencilOperation::Keep => 0,
        StencilOperation::Zero => 1,
        StencilOperation::Replace => 2,
        StencilOperation::Invert => 3,
        StencilOperation::IncrementClamp => 4,
        StencilOperation::DecrementClamp => 5,
        StencilOperation::IncrementWrap => 6,
        StencilOperation::DecrementWrap => 7,
    }
}

fn stencil_op_from_code(code: u64) -> StencilOperation {
    match code {
        1 => StencilOperation::Zero,
        2 => StencilOperation::Replace,
        3 => StencilOperation::Invert,
        4 => StencilOperation::IncrementClamp,
        5 => StencilOperation::DecrementClamp,
        6 => StencilOperation::IncrementWrap,
        7 => StencilOperation::DecrementWrap,
        _ => StencilOperation::Keep,
    }
}

fn topology_code(t: PrimitiveTopology) -> u64 {
    match t {
        PrimitiveTopology::PointList => 0,
        PrimitiveTopology::LineList => 1,
        PrimitiveTopology::LineStrip => 2,
        PrimitiveTopology::TriangleList => 3,
        PrimitiveTopology::TriangleStrip => 4,
    }
}

fn topology_from_code(code: u64) -> PrimitiveTopology {
    match code {
        0 => PrimitiveTopology::PointList,
        1 => PrimitiveTopology::LineList,
        2 => PrimitiveTopology::LineStrip,
        4 => PrimitiveTopology::TriangleStrip,
        _ => PrimitiveTopology::TriangleList,
    }
}

/// Compact encoding of all the pipeline state a pass can select.
#[derive(Debug, Clone, Copy)]
pub struct RenderModes {
    flags: u64,
    render_order: i32,
    offset_factor: f32,
    offset_units: f32,
    sample_coverage: f32,
}

impl RenderModes {
    pub const STENCIL: i32 = -1000;
    pub const BACKGROUND: i32 = 1000;
    pub const GEOMETRY: i32 = 2000;
    pub const TRANSPARENT: i32 = 3000;
    pub const OVERLAY: i32 = 4000;

    #[must_use]
    pub fn new() -> Self {
        let mut m = Self {
            flags: 0,
            render_order: Self::GEOMETRY,
            offset_factor: 0.0,
            offset_units: 0.0,
            sample_coverage: 1.0,
        };
        m.init_flags();
        m
    }

    /// Resets every field to the default pipeline state.
    pub fn init(&mut self) {
        *self = Self::new();
    }

    fn init_flags(&mut self) {
        self.flags = 0;
        self.put(SOURCE_BLEND, blend_code(BlendFactor::One));
        self.put(DEST_BLEND, blend_code(BlendFactor::OneMinusSrcAlpha));
        self.put(RENDER_MASK, 3);
        self.put(DRAW_MODE, topology_code(PrimitiveTopology::TriangleList));
        self.put(DEPTH_TEST, 1);
        self.put(DEPTH_MASK, 1);
        self.put(USE_LIGHT, 1);
        self.put(CAST_SHADOWS, 1);
        self.put(STENCIL_FUNC, compare_code(CompareFunction::Always));
        self.put(STENCIL_FUNC_MASK, 0xff);
        self.put(STENCIL_MASK, 0xff);
    }

    #[inline]
    fn get(&self, field: (u32, u64)) -> u64 {
        (self.flags >> field.0) & field.1
    }

    #[inline]
    fn put(&mut self, field: (u32, u64), value: u64) {
        self.flags = (self.flags & !(field.1 << field.0)) | ((value & field.1) << field.0);
    }

    fn change(&mut self, field: (u32, u64), value: u64) {
        if self.get(field) != value {
            self.put(field, value);
            self.mark_dirty();
        }
    }

    /// All mode bits (dirty excluded) as the MODE-level sort key.
    #[must_use]
    pub fn render_flags(&self) -> u64 {
        self.flags & !(DIRTY.1 << DIRTY.0)
    }

    pub fn mark_dirty(&mut self) {
        self.put(DIRTY, 1);
    }

    pub fn clear_dirty(&mut self) {
        self.put(DIRTY, 0);
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.get(DIRTY) != 0
    }

    // ========================================================================
    // Ordering and masks
    // ========================================================================

    #[must_use]
    pub fn render_order(&self) -> i32 {
        self.render_order
    }

    pub fn set_render_order(&mut self, order: i32) {
        if self.render_order != order {
            self.render_order = order;
            self.mark_dirty();
        }
    }

    #[must_use]
    pub fn render_mask(&self) -> u8 {
        self.get(RENDER_MASK) as u8
    }

    pub fn set_render_mask(&mut self, mask: u8) {
        self.change(RENDER_MASK, u64::from(mask));
    }

    #[must_use]
    pub fn cull_face(&self) -> CullFace {
        match self.get(CULL_FACE) {
            1 => CullFace::Front,
            2 => CullFace::None,
            _ => CullFace::Back,
        }
    }

    pub fn set_cull_face(&mut self, cull: CullFace) {
        let code = match cull {
            CullFace::Back => 0,
            CullFace::Front => 1,
            CullFace::None => 2,
        };
        self.change(CULL_FACE, code);
    }

    #[must_use]
    pub fn draw_mode(&self) -> PrimitiveTopology {
        topology_from_code(self.get(DRAW_MODE))
    }

    pub fn set_draw_mode(&mut self, topology: PrimitiveTopology) {
        self.change(DRAW_MODE, topology_code(topology));
    }

    // ========================================================================
    // Boolean state
    // ========================================================================

    #[must_use]
    pub fn depth_test(&self) -> bool {
        self.get(DEPTH_TEST) != 0
    }

    pub fn set_depth_test(&mut self, flag: bool) {
        self.change(DEPTH_TEST, u64::from(flag));
    }

    #[must_use]
    pub fn depth_mask(&self) -> bool {
        self.get(DEPTH_MASK) != 0
    }

    pub fn set_depth_mask(&mut self, flag: bool) {
        self.change(DEPTH_MASK, u64::from(flag));
    }

    #[must_use]
    pub fn alpha_blend(&self) -> bool {
        self.get(ALPHA_BLEND) != 0
    }

    pub fn set_alpha_blend(&mut self, flag: bool) {
        self.change(ALPHA_BLEND, u64::from(flag));
    }

    #[must_use]
    pub fn alpha_to_coverage(&self) -> bool {
        self.get(ALPHA_TO_COVERAGE) != 0
    }

    pub fn set_alpha_to_coverage(&mut self, flag: bool) {
        self.change(ALPHA_TO_COVERAGE, u64::from(flag));
    }

    #[must_use]
    pub fn use_lights(&self) -> bool {
        self.get(USE_LIGHT) != 0
    }

    pub fn set_use_lights(&mut self, flag: bool) {
        self.change(USE_LIGHT, u64::from(flag));
    }

    #[must_use]
    pub fn use_lightmap(&self) -> bool {
        self.get(USE_LIGHTMAP) != 0
    }

    pub fn set_use_lightmap(&mut self, flag: bool) {
        self.change(USE_LIGHTMAP, u64::from(flag));
    }

    #[must_use]
    pub fn cast_shadows(&self) -> bool {
        self.get(CAST_SHADOWS) != 0
    }

    pub fn set_cast_shadows(&mut self, flag: bool) {
        self.change(CAST_SHADOWS, u64::from(flag));
    }

    #[must_use]
    pub fn offset_enabled(&self) -> bool {
        self.get(OFFSET) != 0
    }

    pub fn set_offset(&mut self, flag: bool) {
        self.change(OFFSET, u64::from(flag));
    }

    #[must_use]
    pub fn invert_coverage_mask(&self) -> bool {
        self.get(INVERT_COVERAGE_MASK) != 0
    }

    pub fn set_invert_coverage_mask(&mut self, flag: bool) {
        self.change(INVERT_COVERAGE_MASK, u64::from(flag));
    }

    #[must_use]
    pub fn stencil_test(&self) -> bool {
        self.get(STENCIL_TEST) != 0
    }

    pub fn set_stencil_test(&mut self, flag: bool) {
        self.change(STENCIL_TEST, u64::from(flag));
    }

    // ========================================================================
    // Blend and stencil configuration
    // ========================================================================

    #[must_use]
    pub fn source_blend(&self) -> BlendFactor {
        blend_from_code(self.get(SOURCE_BLEND))
    }

    pub fn set_source_blend(&mut self, factor: BlendFactor) {
        self.change(SOURCE_BLEND, blend_code(factor));
    }

    #[must_use]
    pub fn dest_blend(&self) -> BlendFactor {
        blend_from_code(self.get(DEST_BLEND))
    }

    pub fn set_dest_blend(&mut self, factor: BlendFactor) {
        self.change(DEST_BLEND, blend_code(factor));
    }

    #[must_use]
    pub fn stencil_func(&self) -> CompareFunction {
        compare_from_code(self.get(STENCIL_FUNC))
    }

    pub fn set_stencil_func(&mut self, func: CompareFunction) {
        self.change(STENCIL_FUNC, compare_code(func));
    }

    #[must_use]
    pub fn stencil_fail(&self) -> StencilOperation {
        stencil_op_from_code(self.get(STENCIL_FAIL))
    }

    pub fn set_stencil_fail(&mut self, op: StencilOperation) {
        self.change(STENCIL_FAIL, stencil_op_code(op));
    }

    #[must_use]
    pub fn depth_fail(&self) -> StencilOperation {
        stencil_op_from_code(self.get(DEPTH_FAIL))
    }

    pub fn set_depth_fail(&mut self, op: StencilOperation) {
        self.change(DEPTH_FAIL, stencil_op_code(op));
    }

    #[must_use]
    pub fn stencil_pass(&self) -> StencilOperation {
        stencil_op_from_code(self.get(STENCIL_PASS))
    }

    pub fn set_stencil_pass(&mut self, op: StencilOperation) {
        self.change(STENCIL_PASS, stencil_op_code(op));
    }

    #[must_use]
    pub fn stencil_func_mask(&self) -> u8 {
        self.get(STENCIL_FUNC_MASK) as u8
    }

    pub fn set_stencil_func_mask(&mut self, mask: u8) {
        self.change(STENCIL_FUNC_MASK, u64::from(mask));
    }

    #[must_use]
    pub fn stencil_mask(&self) -> u8 {
        self.get(STENCIL_MASK) as u8
    }

    pub fn set_stencil_mask(&mut self, mask: u8) {
        self.change(STENCIL_MASK, u64::from(mask));
    }

    #[must_use]
    pub fn stencil_ref(&self) -> u8 {
        self.get(STENCIL_REF) as u8
    }

    pub fn set_stencil_ref(&mut self, reference: u8) {
        self.change(STENCIL_REF, u64::from(reference));
    }

    // ========================================================================
    // Float state
    // ========================================================================

    #[must_use]
    pub fn offset_factor(&self) -> f32 {
        self.offset_factor
    }

    pub fn set_offset_factor(&mut self, factor: f32) {
        if self.offset_factor != factor {
            self.offset_factor = factor;
            self.mark_dirty();
        }
    }

    #[must_use]
    pub fn offset_units(&self) -> f32 {
        self.offset_units
    }

    pub fn set_offset_units(&mut self, units: f32) {
        if self.offset_units != units {
            self.offset_units = units;
            self.mark_dirty();
        }
    }

    #[must_use]
    pub fn sample_coverage(&self) -> f32 {
        self.sample_coverage
    }

    pub fn set_sample_coverage(&mut self, coverage: f32) {
        if self.sample_coverage != coverage {
            self.sample_coverage = coverage;
            self.mark_dirty();
        }
    }
}

impl Default for RenderModes {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for RenderModes {
    fn eq(&self, other: &Self) -> bool {
        if self.render_order != other.render_order
            || self.render_flags() != other.render_flags()
        {
            return false;
        }
        if self.offset_enabled()
            && (self.offset_factor != other.offset_factor
                || self.offset_units != other.offset_units)
        {
            return false;
        }
        if self.alpha_to_coverage() && self.sample_coverage != other.sample_coverage {
            return false;
        }
        true
    }
}
