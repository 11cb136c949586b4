//! Error Types
//!
//! Fallible per-frame operations (uniform lookups, capacity clamps, shader
//! selection) report through return values and `log` so a frame always runs
//! to completion; [`LumenError`] is reserved for construction-time failures
//! that a host must handle.

use thiserror::Error;

/// The main error type for the Lumen renderer core.
#[derive(Error, Debug)]
pub enum LumenError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A uniform descriptor string could not be parsed.
    #[error("Bad uniform descriptor: {0}")]
    BadDescriptor(String),

    /// A uniform block exceeds the device uniform buffer limit.
    #[error("Uniform block '{name}' needs {requested} bytes, device limit is {limit}")]
    BlockTooLarge {
        /// Block name from the shader
        name: String,
        /// Bytes required by the descriptor
        requested: usize,
        /// Device uniform block size limit
        limit: usize,
    },

    // ========================================================================
    // Geometry Errors
    // ========================================================================
    /// Vertex attribute rows do not match the mesh vertex count.
    #[error("Attribute '{name}' has {rows} rows, mesh has {vertex_count} vertices")]
    AttributeSizeMismatch {
        /// Attribute name (`a_position`, ...)
        name: String,
        /// Rows supplied
        rows: usize,
        /// Expected vertex count
        vertex_count: usize,
    },

    /// An index value references a vertex outside the vertex buffer.
    #[error("Index value {value} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index value
        value: u32,
        /// Mesh vertex count
        vertex_count: usize,
    },

    // ========================================================================
    // Rendering Errors
    // ========================================================================
    /// The render texture's framebuffer is not complete.
    #[error("Framebuffer incomplete for render texture (status {0:#x})")]
    FramebufferIncomplete(u32),
}

/// Alias for `Result<T, LumenError>`.
pub type Result<T> = std::result::Result<T, LumenError>;
