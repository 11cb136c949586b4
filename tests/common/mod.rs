//! Shared fixtures: a recording backend host bridge, mesh/material/scene
//! builders and command-log helpers.

#![allow(dead_code)]

use glam::Vec3;
use lumen::render::headless::{Command, HeadlessBackend};
use lumen::{
    Camera, HostBridge, Material, MaterialKey, Mesh, MeshKey, NodeHandle, RenderData,
    RenderDataKey, RenderPass, Scene, ShaderFlags, ShaderId, ShaderManager,
};

/// Surfaces `log` output under `RUST_LOG` when a test runs.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Host bridge
// ============================================================================

/// Bridge that regenerates shaders with a light-aware signature and records
/// every regeneration request.
pub struct TestBridge {
    pub flags: ShaderFlags,
    pub expr: Option<String>,
    pub regenerations: Vec<(RenderDataKey, usize, String)>,
}

impl TestBridge {
    pub fn new(flags: ShaderFlags, expr: Option<&str>) -> Self {
        Self {
            flags,
            expr: expr.map(str::to_string),
            regenerations: Vec::new(),
        }
    }
}

impl HostBridge for TestBridge {
    fn bind_shader(
        &mut self,
        shaders: &mut ShaderManager,
        scene: &mut Scene,
        render_data: RenderDataKey,
        pass_index: usize,
        light_descriptor: &str,
    ) -> bool {
        let signature = if light_descriptor.is_empty() {
            "TestShader".to_string()
        } else {
            format!("TestShader${light_descriptor}")
        };
        let flags = if light_descriptor.is_empty() {
            self.flags - ShaderFlags::USE_LIGHTS
        } else {
            self.flags
        };
        let id = match shaders.find(&signature) {
            Some(id) => id,
            None => shaders
                .add_shader(&signature, flags, self.expr.as_deref())
                .unwrap(),
        };
        if let Some(rdata) = scene.render_data_pool.get_mut(render_data) {
            if let Some(pass) = rdata.pass_mut(pass_index) {
                pass.set_shader(Some(id));
            }
        }
        self.regenerations
            .push((render_data, pass_index, signature));
        true
    }

    fn make_depth_shaders(&mut self, shaders: &mut ShaderManager, _scene: &mut Scene) -> bool {
        let flags = ShaderFlags::MATRIX_UNIFORMS;
        let _ = shaders.add_shader("DepthShader", flags, Some("left_view_proj * model"));
        let _ = shaders.add_shader(
            "DepthShader$a_bone_weights$a_bone_indices",
            flags | ShaderFlags::HAS_BONES,
            Some("left_view_proj * model"),
        );
        true
    }
}

// ============================================================================
// Geometry and material builders
// ============================================================================

/// Unit quad around the origin: 4 vertices, 6 u16 indices.
pub fn quad_mesh() -> Mesh {
    let mut mesh = Mesh::new();
    mesh.set_attribute(
        "a_position",
        3,
        vec![
            -0.5, -0.5, 0.0, //
            0.5, -0.5, 0.0, //
            -0.5, 0.5, 0.0, //
            0.5, 0.5, 0.0,
        ],
    )
    .unwrap();
    mesh.set_attribute("a_texcoord", 2, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0])
        .unwrap();
    mesh.set_indices_u16(vec![0, 1, 2, 1, 3, 2]).unwrap();
    mesh
}

/// Quad-shaped mesh with an arbitrary (multiple of 3) index count, used to
/// identify individual draws in the command log.
pub fn mesh_with_indices(index_count: usize) -> Mesh {
    assert!(index_count % 3 == 0);
    let mut mesh = quad_mesh();
    let pattern = [0u16, 1, 2, 1, 3, 2];
    let indices: Vec<u16> = (0..index_count).map(|i| pattern[i % pattern.len()]).collect();
    mesh.set_indices_u16(indices).unwrap();
    mesh
}

pub fn color_material(scene: &mut Scene) -> MaterialKey {
    let material = Material::new("float4 u_color; float u_opacity", "sampler2D u_texture").unwrap();
    scene.add_material(material)
}

/// Adds a drawable node at `position` with a single pass.
pub fn add_object(
    scene: &mut Scene,
    mesh: MeshKey,
    material: MaterialKey,
    shader: Option<ShaderId>,
    position: Vec3,
) -> (NodeHandle, RenderDataKey) {
    let node = scene.add_node();
    scene.nodes[node].transform.set_position(position);
    let mut data = RenderData::with_mesh(mesh);
    let mut pass = RenderPass::new(material);
    pass.set_shader(shader);
    data.add_pass(pass);
    let key = scene.set_render_data(node, data);
    (node, key)
}

/// Perspective camera at the origin looking down -Z.
pub fn camera_at_origin() -> Camera {
    let mut camera = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
    camera.look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
    camera
}

// ============================================================================
// Command-log helpers
// ============================================================================

/// The recording backend inside a renderer.
pub fn headless(renderer: &mut lumen::Renderer) -> &mut HeadlessBackend {
    renderer
        .backend_mut()
        .as_any_mut()
        .downcast_mut::<HeadlessBackend>()
        .unwrap()
}

/// Index (or vertex) count of every draw, in submission order.
pub fn draw_counts(backend: &HeadlessBackend) -> Vec<u32> {
    backend
        .draws()
        .iter()
        .map(|d| match d.indices {
            lumen::render::backend::DrawIndices::U16 { index_count }
            | lumen::render::backend::DrawIndices::U32 { index_count } => index_count,
            lumen::render::backend::DrawIndices::Array { vertex_count } => vertex_count,
        })
        .collect()
}

/// Commands recorded strictly between the `n`th and `n+1`th draws.
pub fn commands_between_draws(backend: &HeadlessBackend, n: usize) -> Vec<Command> {
    let mut draw_index = 0;
    let mut collecting = false;
    let mut out = Vec::new();
    for command in &backend.commands {
        if let Command::Draw(_) = command {
            if draw_index == n {
                collecting = true;
            } else if draw_index == n + 1 {
                break;
            }
            draw_index += 1;
            continue;
        }
        if collecting {
            out.push(command.clone());
        }
    }
    out
}
