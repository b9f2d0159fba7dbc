//! Shared mesh builders for integration tests.
#![allow(dead_code)]

use dfem_solver::{
    Constraints, DesignState, Element, ElementType, LinearElastic, LoadCase, Mesh, Model,
    NonlinearConfig, NonlinearSolver, Solution,
};

/// Structured block of Hex8 elements over `[0, size]`, nodes numbered x fastest
pub fn hex_block(n: [usize; 3], size: [f64; 3]) -> Mesh {
    let mut mesh = Mesh::new(3);
    for k in 0..=n[2] {
        for j in 0..=n[1] {
            for i in 0..=n[0] {
                mesh.add_node(
                    size[0] * i as f64 / n[0] as f64,
                    size[1] * j as f64 / n[1] as f64,
                    size[2] * k as f64 / n[2] as f64,
                );
            }
        }
    }
    let id = |i: usize, j: usize, k: usize| i + (n[0] + 1) * (j + (n[1] + 1) * k);
    for k in 0..n[2] {
        for j in 0..n[1] {
            for i in 0..n[0] {
                let nodes = vec![
                    id(i, j, k),
                    id(i + 1, j, k),
                    id(i + 1, j + 1, k),
                    id(i, j + 1, k),
                    id(i, j, k + 1),
                    id(i + 1, j, k + 1),
                    id(i + 1, j + 1, k + 1),
                    id(i, j + 1, k + 1),
                ];
                mesh.add_element(Element::new(ElementType::Hex8, nodes))
                    .expect("Failed to add hex");
            }
        }
    }
    mesh
}

/// Structured strip of Quad4 elements over `[0, lx] × [0, ly]`
pub fn quad_strip(nx: usize, ny: usize, lx: f64, ly: f64) -> Mesh {
    let mut mesh = Mesh::new(2);
    for j in 0..=ny {
        for i in 0..=nx {
            mesh.add_node(lx * i as f64 / nx as f64, ly * j as f64 / ny as f64, 0.0);
        }
    }
    let id = |i: usize, j: usize| i + (nx + 1) * j;
    for j in 0..ny {
        for i in 0..nx {
            let nodes = vec![id(i, j), id(i + 1, j), id(i + 1, j + 1), id(i, j + 1)];
            mesh.add_element(Element::new(ElementType::Quad4, nodes))
                .expect("Failed to add quad");
        }
    }
    mesh
}

/// Nodes whose coordinate `dir` equals `value`
pub fn nodes_on(mesh: &Mesh, dir: usize, value: f64) -> Vec<usize> {
    mesh.nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| (n.coords()[dir] - value).abs() < 1e-9)
        .map(|(i, _)| i)
        .collect()
}

/// Symmetry rollers on the three coordinate planes through the origin
pub fn rollers(mesh: &Mesh) -> Constraints {
    let mut constraints = Constraints::new(mesh);
    for dir in 0..mesh.dim {
        for node in nodes_on(mesh, dir, 0.0) {
            constraints.fix(node, dir).expect("Failed to fix roller");
        }
    }
    constraints
}

/// Cantilever strip clamped at x = 0 with a downward tip load
pub fn cantilever(nx: usize, ny: usize) -> (Model, LoadCase) {
    let mesh = quad_strip(nx, ny, 4.0, 1.0);
    let mut constraints = Constraints::new(&mesh);
    for node in nodes_on(&mesh, 0, 0.0) {
        constraints.fix_node(node).expect("Failed to clamp");
    }
    let mut load = LoadCase::new("tip", &mesh);
    for node in nodes_on(&mesh, 0, 4.0) {
        load.add_force(node, 1, -1.0 / (ny + 1) as f64)
            .expect("Failed to load");
    }
    let material = LinearElastic::plane_stress(1000.0, 0.3).expect("Failed to build material");
    let model = Model::new(mesh, material, constraints).expect("Failed to build model");
    (model, load)
}

/// Solve with default settings
pub fn solve(model: &Model, design: &DesignState, load: &LoadCase) -> Solution {
    NonlinearSolver::new(model, design, NonlinearConfig::default())
        .expect("Failed to build solver")
        .solve(load)
        .expect("Failed to solve")
}
