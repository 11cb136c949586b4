use crate::errors::Result;
use crate::shader::shader::{Shader, ShaderFlags, ShaderId};
use log::warn;
use rustc_hash::FxHashMap;

/// Registry of compiled shaders, looked up by id during submit and by
/// signature by the host bridge and the shadow sorter.
#[derive(Debug, Default)]
pub struct ShaderManager {
    shaders: Vec<Shader>,
    by_signature: FxHashMap<String, ShaderId>,
}

impl ShaderManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shader and returns its id. A duplicate signature returns
    /// the existing id.
    pub fn add_shader(
        &mut self,
        signature: &str,
        flags: ShaderFlags,
        matrix_expression: Option<&str>,
    ) -> Result<ShaderId> {
        if let Some(&id) = self.by_signature.get(signature) {
            warn!("SHADER: '{signature}' already registered as {id:?}");
            return Ok(id);
        }
        let id = ShaderId(self.shaders.len() as u32);
        self.shaders
            .push(Shader::new(id, signature, flags, matrix_expression)?);
        self.by_signature.insert(signature.to_string(), id);
        Ok(id)
    }

    #[must_use]
    pub fn get(&self, id: ShaderId) -> Option<&Shader> {
        self.shaders.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: ShaderId) -> Option<&mut Shader> {
        self.shaders.get_mut(id.0 as usize)
    }

    /// Finds a shader id by the signature it was generated from.
    #[must_use]
    pub fn find(&self, signature: &str) -> Option<ShaderId> {
        self.by_signature.get(signature).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}
