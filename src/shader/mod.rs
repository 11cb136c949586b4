//! Shader records, lookup and the matrix-calculation language.

pub mod manager;
pub mod matrix_calc;
pub mod shader;

pub use manager::ShaderManager;
pub use matrix_calc::{INPUT_MATRIX_NAMES, MAX_OUTPUT_MATRICES, MatrixCalc};
pub use shader::{MATRIX_METADATA_DESCRIPTOR, Shader, ShaderFlags, ShaderId};
