//! Scene graph tests: hierarchy links, transform propagation and
//! hierarchical world bounds.

mod common;

use common::*;
use glam::{Quat, Vec3};
use lumen::{Scene, Transform};

#[test]
fn attach_keeps_both_ends_in_sync() {
    let mut scene = Scene::new();
    let parent = scene.add_node();
    let child = scene.create_node();
    scene.attach(parent, child);

    assert_eq!(scene.nodes[child].parent(), Some(parent));
    assert!(scene.nodes[parent].children().contains(&child));

    scene.detach(child);
    assert_eq!(scene.nodes[child].parent(), None);
    assert!(!scene.nodes[parent].children().contains(&child));
}

#[test]
fn reattach_moves_between_parents() {
    let mut scene = Scene::new();
    let a = scene.add_node();
    let b = scene.add_node();
    let child = scene.create_node();
    scene.attach(a, child);
    scene.attach(b, child);

    assert_eq!(scene.nodes[child].parent(), Some(b));
    assert!(!scene.nodes[a].children().contains(&child));
}

#[test]
fn world_matrices_compose_down_the_tree() {
    let mut scene = Scene::new();
    let parent = scene.add_node();
    let child = scene.create_node();
    scene.attach(parent, child);

    scene.nodes[parent]
        .transform
        .set_position(Vec3::new(1.0, 0.0, 0.0));
    scene.nodes[child]
        .transform
        .set_position(Vec3::new(0.0, 2.0, 0.0));
    scene.update_hierarchy();

    let world = scene.nodes[child].world_matrix().translation;
    assert_eq!(Vec3::from(world), Vec3::new(1.0, 2.0, 0.0));
}

#[test]
fn transform_dirty_checking() {
    let mut t = Transform::new();
    assert!(t.update_local_matrix());
    assert!(!t.update_local_matrix());

    t.position = Vec3::new(1.0, 2.0, 3.0);
    assert!(t.update_local_matrix());
    assert!(!t.update_local_matrix());

    t.rotation = Quat::from_rotation_y(0.5);
    assert!(t.update_local_matrix());
}

#[test]
fn world_bounds_cover_descendants() {
    let mut scene = Scene::new();
    let mesh = scene.add_mesh(quad_mesh());
    let material = color_material(&mut scene);
    let (parent, _) = add_object(&mut scene, mesh, material, None, Vec3::ZERO);
    let (child, _) = add_object(&mut scene, mesh, material, None, Vec3::new(10.0, 0.0, 0.0));
    scene.attach(parent, child);
    scene.update_hierarchy();

    let bounds = scene.nodes[parent].world_bounds();
    assert!(bounds.min.x <= -0.5);
    assert!(bounds.max.x >= 10.5 - 0.1);
    // The child alone stays local
    let child_bounds = scene.nodes[child].world_bounds();
    assert!(child_bounds.min.x >= 9.0);
}

#[test]
fn mesh_bounds_follow_positions() {
    let mut scene = Scene::new();
    let key = scene.add_mesh(quad_mesh());
    scene.update_hierarchy();
    let bounds = scene.mesh_pool[key].bounds();
    assert_eq!(bounds.min, Vec3::new(-0.5, -0.5, 0.0));
    assert_eq!(bounds.max, Vec3::new(0.5, 0.5, 0.0));
}

#[test]
fn mesh_attribute_and_index_validation() {
    let mut mesh = quad_mesh();
    // Row count mismatch
    assert!(mesh.set_attribute("a_normal", 3, vec![0.0; 9]).is_err());
    assert!(mesh.set_attribute("a_normal", 3, vec![0.0; 12]).is_ok());
    // Out-of-range index
    assert!(mesh.set_indices_u16(vec![0, 1, 4]).is_err());
    assert!(mesh.set_indices_u32(vec![0, 1, 3]).is_ok());
    assert_eq!(mesh.index_size(), 4);
    assert_eq!(mesh.vertex_count(), 4);
}
