//! Rotating the body, its loads and its material frame together must rotate
//! the response with it: `u' = R u`, `σ' = R σ Rᵀ`.

mod common;

use approx::assert_relative_eq;
use common::{hex_block, nodes_on, quad_strip, solve};
use dfem_solver::materials::{axis_angle, rotation_z};
use dfem_solver::{
    Constraints, DesignState, FieldIntegrator, LinearElastic, LoadCase, Mesh, Model, Solution,
};
use nalgebra::{DVector, Matrix3, Vector3};

/// Voigt stress `[xx, yy, zz, xy, yz, zx]` (or `[xx, yy, xy]`) as a tensor
fn tensor(s: &DVector<f64>) -> Matrix3<f64> {
    if s.len() == 3 {
        Matrix3::new(s[0], s[2], 0.0, s[2], s[1], 0.0, 0.0, 0.0, 0.0)
    } else {
        Matrix3::new(s[0], s[3], s[5], s[3], s[1], s[4], s[5], s[4], s[2])
    }
}

fn rotated_mesh(mesh: &Mesh, r: &Matrix3<f64>) -> Mesh {
    let mut rotated = Mesh::new(mesh.dim);
    for node in &mesh.nodes {
        let x = r * node.position();
        rotated.add_node(x[0], x[1], x[2]);
    }
    for element in &mesh.elements {
        rotated
            .add_element(element.clone())
            .expect("Failed to copy element");
    }
    rotated
}

/// Clamp `clamped`, load `loaded` nodes with `force` rotated by `r`
fn build(
    mesh: Mesh,
    material: &LinearElastic,
    clamped: &[usize],
    loaded: &[usize],
    force: Vector3<f64>,
    r: &Matrix3<f64>,
) -> (Model, LoadCase) {
    let dim = mesh.dim;
    let mut constraints = Constraints::new(&mesh);
    for &node in clamped {
        constraints.fix_node(node).expect("Failed to clamp");
    }
    let f = r * force;
    let mut load = LoadCase::new("rotated", &mesh);
    for &node in loaded {
        load.add_nodal_force(node, &f.as_slice()[..dim])
            .expect("Failed to load");
    }
    let model = Model::new(mesh, material.clone(), constraints).expect("Failed to build model");
    (model, load)
}

fn assert_rotated(
    model: &Model,
    reference: &Solution,
    rotated_model: &Model,
    rotated: &Solution,
    r: &Matrix3<f64>,
) {
    let dim = model.mesh().dim;
    for node in 0..model.mesh().num_nodes() {
        let mut u = Vector3::zeros();
        for d in 0..dim {
            u[d] = reference.displacement[dim * node + d];
        }
        let expected = r * u;
        for d in 0..dim {
            assert_relative_eq!(
                rotated.displacement[dim * node + d],
                expected[d],
                epsilon = 1e-10,
                max_relative = 1e-8
            );
        }
    }

    let original = FieldIntegrator::new(model).expect("integrator");
    let turned = FieldIntegrator::new(rotated_model).expect("integrator");
    let s0 = original.element_stresses(reference).expect("stresses");
    let s1 = turned.element_stresses(rotated).expect("stresses");
    for (a, b) in s0.iter().zip(&s1) {
        let expected = r * tensor(a) * r.transpose();
        let actual = tensor(b);
        assert!(
            (expected - actual).amax() < 1e-8 * (1.0 + tensor(a).amax()),
            "stress not rotated: {expected} vs {actual}"
        );
    }
    assert_relative_eq!(
        original.strain_energy(reference).expect("energy"),
        turned.strain_energy(rotated).expect("energy"),
        max_relative = 1e-9
    );
}

#[test]
fn orthotropic_block_rotation() {
    let material = LinearElastic::orthotropic(1000.0, 400.0, 250.0, 0.25, 0.2, 0.3, 150.0, 120.0, 90.0)
        .expect("Failed to build material");
    let mesh = hex_block([3, 1, 1], [3.0, 1.0, 1.0]);
    let clamped = nodes_on(&mesh, 0, 0.0);
    let loaded = nodes_on(&mesh, 0, 3.0);
    let force = Vector3::new(0.2, -0.1, 0.3);
    let n = mesh.num_elements();

    let frame = axis_angle(Vector3::new(1.0, 1.0, 0.0), 0.4);
    let r = axis_angle(Vector3::new(0.3, -0.5, 0.8), 1.1);

    let (model, load) = build(mesh.clone(), &material, &clamped, &loaded, force, &Matrix3::identity());
    let design = DesignState::solid(n)
        .with_orientations(vec![frame; n])
        .expect("orientations");
    let reference = solve(&model, &design, &load);

    let (rotated_model, rotated_load) =
        build(rotated_mesh(&mesh, &r), &material, &clamped, &loaded, force, &r);
    let rotated_design = DesignState::solid(n)
        .with_orientations(vec![r * frame; n])
        .expect("orientations");
    let rotated = solve(&rotated_model, &rotated_design, &rotated_load);

    assert_rotated(&model, &reference, &rotated_model, &rotated, &r);
}

#[test]
fn orthotropic_plate_rotation_about_z() {
    let material = LinearElastic::orthotropic_plane_stress(800.0, 200.0, 0.3, 100.0)
        .expect("Failed to build material");
    let mesh = quad_strip(4, 2, 4.0, 1.0);
    let clamped = nodes_on(&mesh, 0, 0.0);
    let loaded = nodes_on(&mesh, 0, 4.0);
    let force = Vector3::new(0.5, -0.2, 0.0);
    let n = mesh.num_elements();

    let frame = rotation_z(0.5);
    let r = rotation_z(-2.0);

    let (model, load) = build(mesh.clone(), &material, &clamped, &loaded, force, &Matrix3::identity());
    let design = DesignState::solid(n)
        .with_orientations(vec![frame; n])
        .expect("orientations");
    let reference = solve(&model, &design, &load);

    let (rotated_model, rotated_load) =
        build(rotated_mesh(&mesh, &r), &material, &clamped, &loaded, force, &r);
    let rotated_design = DesignState::solid(n)
        .with_orientations(vec![r * frame; n])
        .expect("orientations");
    let rotated = solve(&rotated_model, &rotated_design, &rotated_load);

    assert_rotated(&model, &reference, &rotated_model, &rotated, &r);
}
