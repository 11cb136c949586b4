use crate::errors::Result;
use crate::render::uniform_block::{MATRIX_UBO_INDEX, UniformBlock};
use crate::shader::matrix_calc::MatrixCalc;
use bitflags::bitflags;
use glam::Mat4;

/// Identity of a compiled shader program, assigned by the [`ShaderManager`].
///
/// Ids are the SHADER-level sort key of the main sorter.
///
/// [`ShaderManager`]: crate::shader::ShaderManager
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShaderId(pub u32);

bitflags! {
    /// Capabilities computed from a shader's source by the host.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ShaderFlags: u32 {
        /// Reads per-draw matrices (transform block or direct `u_mvp`)
        const MATRIX_UNIFORMS     = 1 << 0;
        /// Reads the shared light uniform block
        const USE_LIGHTS          = 1 << 1;
        /// Samples the layered shadow-map texture
        const USE_SHADOW_MAPS     = 1 << 2;
        /// Consumes skinning matrices
        const HAS_BONES           = 1 << 3;
        /// Material data lives in a GPU buffer rather than loose uniforms
        const MATERIAL_GPU_BUFFER = 1 << 4;
    }
}

/// Descriptor of the per-shader matrix metadata block (binding 4). Serves
/// both as the pointer into the transform block (`u_matrix_offset`) and as
/// the direct-upload path (`u_matrices[0]`).
pub const MATRIX_METADATA_DESCRIPTOR: &str =
    "uint u_matrix_offset; uint u_right; uint u_render_mask; float u_proj_offset; mat4 u_matrices";

/// One shader program as the sorter sees it: an id, the signature it was
/// generated from, capability flags and an optional matrix program.
///
/// The signature encodes the material/light configuration the host generated
/// the source for; the main sorter compares its tail against the current
/// light descriptor to detect stale shaders.
#[derive(Debug)]
pub struct Shader {
    id: ShaderId,
    signature: String,
    flags: ShaderFlags,
    matrix_calc: Option<MatrixCalc>,
    matrix_ubo: UniformBlock,
}

impl Shader {
    pub(crate) fn new(
        id: ShaderId,
        signature: &str,
        flags: ShaderFlags,
        matrix_expression: Option<&str>,
    ) -> Result<Self> {
        // A bad expression degrades to the direct u_mvp path.
        let matrix_calc = matrix_expression.and_then(MatrixCalc::new);
        let matrix_ubo = UniformBlock::new(MATRIX_METADATA_DESCRIPTOR, MATRIX_UBO_INDEX, "Matrix_ubo")?;
        Ok(Self {
            id,
            signature: signature.to_string(),
            flags,
            matrix_calc,
            matrix_ubo,
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ShaderId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> ShaderFlags {
        self.flags
    }

    #[must_use]
    pub fn uses_matrix_uniforms(&self) -> bool {
        self.flags.contains(ShaderFlags::MATRIX_UNIFORMS)
    }

    #[must_use]
    pub fn use_lights(&self) -> bool {
        self.flags.contains(ShaderFlags::USE_LIGHTS)
    }

    #[must_use]
    pub fn use_shadow_maps(&self) -> bool {
        self.flags.contains(ShaderFlags::USE_SHADOW_MAPS)
    }

    #[must_use]
    pub fn has_bones(&self) -> bool {
        self.flags.contains(ShaderFlags::HAS_BONES)
    }

    /// Number of output matrices the shader wants per draw.
    #[must_use]
    pub fn output_buffer_size(&self) -> usize {
        self.matrix_calc
            .as_ref()
            .map(MatrixCalc::num_statements)
            .unwrap_or(0)
    }

    /// Evaluates the matrix program; returns the number of matrices written,
    /// 0 when the shader has no expression.
    pub fn calc_matrix(&self, inputs: &[Mat4], outputs: &mut [Mat4]) -> usize {
        match &self.matrix_calc {
            Some(calc) => calc.calculate(inputs, outputs),
            None => 0,
        }
    }

    /// The per-shader matrix metadata block (binding 4).
    #[must_use]
    pub fn matrix_ubo(&self) -> &UniformBlock {
        &self.matrix_ubo
    }

    pub fn matrix_ubo_mut(&mut self) -> &mut UniformBlock {
        &mut self.matrix_ubo
    }
}
