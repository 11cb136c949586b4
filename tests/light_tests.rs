//! LightList tests: class ordering, descriptor string, shared block layout
//! and shader block generation.

use glam::{Vec3, Vec4};
use lumen::render::headless::{Command, HeadlessBackend};
use lumen::{Light, LightList};

const LIGHT_DESC: &str = "float4 color; float intensity; int shadow_map_index";

fn direct_light() -> Light {
    Light::new("DirectLight", LIGHT_DESC).unwrap()
}

fn point_light() -> Light {
    Light::new("PointLight", LIGHT_DESC).unwrap()
}

#[test]
fn descriptor_is_insertion_order_independent() {
    let mut backend = HeadlessBackend::new();

    let mut a = LightList::new();
    a.add_light(point_light());
    a.add_light(direct_light());
    a.add_light(point_light());
    a.add_light(direct_light());
    a.add_light(point_light());
    a.update_lights(&mut backend);

    let mut b = LightList::new();
    b.add_light(direct_light());
    b.add_light(direct_light());
    b.add_light(point_light());
    b.add_light(point_light());
    b.add_light(point_light());
    b.update_lights(&mut backend);

    assert_eq!(a.descriptor(), "DirectLight2PointLight3");
    assert_eq!(a.descriptor(), b.descriptor());
}

#[test]
fn light_indices_are_per_class() {
    let mut lights = LightList::new();
    let d0 = lights.add_light(direct_light());
    let p0 = lights.add_light(point_light());
    let d1 = lights.add_light(direct_light());

    assert_eq!(lights.get(d0).unwrap().light_index(), 0);
    assert_eq!(lights.get(d1).unwrap().light_index(), 1);
    assert_eq!(lights.get(p0).unwrap().light_index(), 0);
}

#[test]
fn remove_reindexes_class_members() {
    let mut lights = LightList::new();
    let d0 = lights.add_light(direct_light());
    let d1 = lights.add_light(direct_light());
    let d2 = lights.add_light(direct_light());

    assert!(lights.remove_light(d1));
    assert_eq!(lights.get(d0).unwrap().light_index(), 0);
    assert_eq!(lights.get(d2).unwrap().light_index(), 1);
    assert!(!lights.remove_light(d1));

    let mut backend = HeadlessBackend::new();
    lights.update_lights(&mut backend);
    assert_eq!(lights.descriptor(), "DirectLight2");
}

#[test]
fn block_offsets_are_cumulative_and_in_bounds() {
    let mut lights = LightList::new();
    let keys = [
        lights.add_light(direct_light()),
        lights.add_light(direct_light()),
        lights.add_light(point_light()),
    ];
    let mut backend = HeadlessBackend::new();
    lights.update_lights(&mut backend);

    let block = lights.ubo().expect("light block allocated");
    let mut expected_offset = 0;
    for key in lights.keys_in_order() {
        let light = lights.get(key).unwrap();
        assert_eq!(light.block_offset(), expected_offset);
        assert!(
            light.block_offset() as usize * 4 + light.total_size() <= block.total_size(),
            "light data must fit the shared block"
        );
        expected_offset += (light.total_size() as i32).div_ceil(4);
    }
    assert_eq!(keys.len(), 3);
}

#[test]
fn light_data_syncs_into_shared_block() {
    let mut lights = LightList::new();
    let key = lights.add_light(direct_light());
    lights
        .get_mut(key)
        .unwrap()
        .set_vec4("color", Vec4::new(1.0, 0.5, 0.25, 1.0));
    let mut backend = HeadlessBackend::new();
    lights.update_lights(&mut backend);

    let block = lights.ubo().unwrap();
    let offset = lights.get(key).unwrap().block_offset() as usize * 4;
    let bytes = &block.data()[offset..offset + 16];
    let mut floats = [0f32; 4];
    for (i, f) in floats.iter_mut().enumerate() {
        *f = f32::from_ne_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
    }
    assert_eq!(floats, [1.0, 0.5, 0.25, 1.0]);

    // The sync uploaded the light's subrange
    assert!(
        backend
            .commands
            .iter()
            .any(|c| matches!(c, Command::UpdateBlock { name, .. } if name == "Lights_ubo"))
    );
}

#[test]
fn clean_lights_skip_reupload() {
    let mut lights = LightList::new();
    let key = lights.add_light(direct_light());
    let mut backend = HeadlessBackend::new();
    lights.update_lights(&mut backend);
    backend.clear_commands();

    // Nothing changed: no upload traffic.
    lights.update_lights(&mut backend);
    assert_eq!(backend.commands.len(), 0);

    // Dirtying one light re-syncs only it.
    lights.get_mut(key).unwrap().set_float("intensity", 2.0);
    lights.update_lights(&mut backend);
    assert_eq!(
        backend.count(|c| matches!(c, Command::UpdateBlock { name, .. } if name == "Lights_ubo")),
        1
    );
}

#[test]
fn shader_block_lists_class_arrays() {
    let mut lights = LightList::new();
    lights.add_light(direct_light());
    lights.add_light(direct_light());
    lights.add_light(point_light());
    let mut backend = HeadlessBackend::new();
    lights.update_lights(&mut backend);

    let layout = lights.make_shader_block();
    assert!(layout.contains("struct UDirectLight"));
    assert!(layout.contains("struct UPointLight"));
    assert!(layout.contains("layout (std140) uniform Lights_ubo"));
    assert!(layout.contains("UDirectLight DirectLights[2];"));
    assert!(layout.contains("UPointLight PointLights[1];"));
}

#[test]
fn light_uniform_setters_validate_names() {
    let mut light = direct_light();
    assert!(light.set_vec4("color", Vec4::ONE));
    assert!(light.set_float("intensity", 3.0));
    assert!(!light.set_vec3("color", Vec3::ONE));
    assert!(!light.set_float("missing", 1.0));
    assert_eq!(light.get_float("intensity"), Some(3.0));
}
