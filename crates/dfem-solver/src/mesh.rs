//! Mesh data structures for finite element analysis.
//!
//! Nodes and elements are stored in insertion order; their position in the
//! mesh is their global index. DOFs are numbered `node * dim + direction`.

use crate::error::{FemError, Result};
use nalgebra::{DMatrix, Vector3};

/// A node in the finite element mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// Node index (0-based, equal to the position in [`Mesh::nodes`])
    pub id: usize,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate (zero for planar meshes)
    pub z: f64,
}

impl Node {
    /// Create a new node
    pub fn new(id: usize, x: f64, y: f64, z: f64) -> Self {
        Self { id, x, y, z }
    }

    /// Get coordinates as an array
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Coordinates as a vector
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// Kinematic family of an element type. Determines the strain measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementFamily {
    /// Axial bar, one strain component
    Truss,
    /// 2D continuum, `[εxx, εyy, γxy]`
    Planar,
    /// 3D continuum, `[εxx, εyy, εzz, γxy, γyz, γzx]`
    Solid,
    /// Flat membrane shell in 3D, `[ε11, ε22, γ12]` in the element frame
    Shell,
}

impl ElementFamily {
    /// Number of strain components (Voigt, engineering shear)
    pub fn n_strains(&self) -> usize {
        match self {
            ElementFamily::Truss => 1,
            ElementFamily::Planar | ElementFamily::Shell => 3,
            ElementFamily::Solid => 6,
        }
    }
}

/// Element type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 2-node bar (truss)
    Bar2,
    /// 3-node linear triangle
    Tri3,
    /// 6-node quadratic triangle
    Tri6,
    /// 4-node bilinear quadrilateral
    Quad4,
    /// 8-node serendipity quadrilateral
    Quad8,
    /// 4-node linear tetrahedron
    Tet4,
    /// 10-node quadratic tetrahedron
    Tet10,
    /// 8-node trilinear hexahedron
    Hex8,
    /// 20-node serendipity hexahedron
    Hex20,
    /// 3-node flat membrane shell
    Shell3,
}

impl ElementType {
    /// Get the number of nodes for this element type
    pub fn num_nodes(&self) -> usize {
        match self {
            ElementType::Bar2 => 2,
            ElementType::Tri3 => 3,
            ElementType::Tri6 => 6,
            ElementType::Quad4 => 4,
            ElementType::Quad8 => 8,
            ElementType::Tet4 => 4,
            ElementType::Tet10 => 10,
            ElementType::Hex8 => 8,
            ElementType::Hex20 => 20,
            ElementType::Shell3 => 3,
        }
    }

    /// Kinematic family
    pub fn family(&self) -> ElementFamily {
        match self {
            ElementType::Bar2 => ElementFamily::Truss,
            ElementType::Tri3 | ElementType::Tri6 | ElementType::Quad4 | ElementType::Quad8 => {
                ElementFamily::Planar
            }
            ElementType::Tet4 | ElementType::Tet10 | ElementType::Hex8 | ElementType::Hex20 => {
                ElementFamily::Solid
            }
            ElementType::Shell3 => ElementFamily::Shell,
        }
    }

    /// Dimension of the reference (natural) coordinate space
    pub fn reference_dim(&self) -> usize {
        match self.family() {
            ElementFamily::Truss => 1,
            ElementFamily::Planar | ElementFamily::Shell => 2,
            ElementFamily::Solid => 3,
        }
    }

    /// Whether this element type can live in a mesh of spatial dimension `dim`
    pub fn supports_dim(&self, dim: usize) -> bool {
        match self.family() {
            ElementFamily::Truss => dim == 2 || dim == 3,
            ElementFamily::Planar => dim == 2,
            ElementFamily::Solid | ElementFamily::Shell => dim == 3,
        }
    }
}

/// An element in the finite element mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element type
    pub element_type: ElementType,
    /// Node connectivity (node indices, ordering fixed per type)
    pub nodes: Vec<usize>,
}

impl Element {
    /// Create a new element
    pub fn new(element_type: ElementType, nodes: Vec<usize>) -> Self {
        Self {
            element_type,
            nodes,
        }
    }

    /// Validate that the element has the correct number of nodes
    pub fn validate(&self, index: usize) -> Result<()> {
        let expected = self.element_type.num_nodes();
        let actual = self.nodes.len();
        if actual != expected {
            return Err(FemError::config(format!(
                "element {} of type {:?} has {} nodes but expected {}",
                index, self.element_type, actual, expected
            )));
        }
        Ok(())
    }
}

/// Complete finite element mesh
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Spatial dimension (2 or 3)
    pub dim: usize,
    /// All nodes, indexed by node id
    pub nodes: Vec<Node>,
    /// All elements, indexed by element id
    pub elements: Vec<Element>,
}

impl Mesh {
    /// Create a new empty mesh of spatial dimension `dim`
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            nodes: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// Add a node and return its index
    pub fn add_node(&mut self, x: f64, y: f64, z: f64) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, x, y, z));
        id
    }

    /// Add an element after checking its connectivity
    pub fn add_element(&mut self, element: Element) -> Result<usize> {
        let id = self.elements.len();
        self.check_element(id, &element)?;
        self.elements.push(element);
        Ok(id)
    }

    /// Number of nodes
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of elements
    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Total number of degrees of freedom
    pub fn num_dofs(&self) -> usize {
        self.nodes.len() * self.dim
    }

    /// Global DOF id of a node direction
    pub fn dof(&self, node: usize, direction: usize) -> usize {
        node * self.dim + direction
    }

    /// Global DOF indices of an element, node-major
    pub fn element_dofs(&self, element: usize) -> Vec<usize> {
        let dim = self.dim;
        self.elements[element]
            .nodes
            .iter()
            .flat_map(|&node| (0..dim).map(move |d| node * dim + d))
            .collect()
    }

    /// Nodal coordinates of an element as a `num_nodes × dim` matrix
    pub fn element_coords(&self, element: usize) -> DMatrix<f64> {
        let elem = &self.elements[element];
        DMatrix::from_fn(elem.nodes.len(), self.dim, |a, d| {
            self.nodes[elem.nodes[a]].coords()[d]
        })
    }

    /// Element centroid
    pub fn centroid(&self, element: usize) -> Vector3<f64> {
        let elem = &self.elements[element];
        let sum = elem
            .nodes
            .iter()
            .fold(Vector3::zeros(), |acc, &n| acc + self.nodes[n].position());
        sum / elem.nodes.len() as f64
    }

    /// Check dimension, node ids and connectivity of the whole mesh
    pub fn validate(&self) -> Result<()> {
        if self.dim != 2 && self.dim != 3 {
            return Err(FemError::config(format!(
                "mesh dimension must be 2 or 3, got {}",
                self.dim
            )));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.id != i {
                return Err(FemError::config(format!(
                    "node at position {} carries id {}",
                    i, node.id
                )));
            }
            if self.dim == 2 && node.z != 0.0 {
                return Err(FemError::config(format!(
                    "node {} has z = {} in a planar mesh",
                    i, node.z
                )));
            }
        }
        for (i, element) in self.elements.iter().enumerate() {
            self.check_element(i, element)?;
        }
        Ok(())
    }

    fn check_element(&self, index: usize, element: &Element) -> Result<()> {
        element.validate(index)?;
        if !element.element_type.supports_dim(self.dim) {
            return Err(FemError::config(format!(
                "element {} of type {:?} cannot be used in a {}D mesh",
                index, element.element_type, self.dim
            )));
        }
        if let Some(&bad) = element.nodes.iter().find(|&&n| n >= self.nodes.len()) {
            return Err(FemError::config(format!(
                "element {} references node {} but the mesh has {} nodes",
                index,
                bad,
                self.nodes.len()
            )));
        }
        Ok(())
    }
}
