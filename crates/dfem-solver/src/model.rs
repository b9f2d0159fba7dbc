//! Analysis model: mesh, materials, sections, constraints and eigenstrains.
//!
//! A [`Model`] is validated once on construction so that dimension and
//! connectivity mismatches surface as configuration errors before any
//! assembly starts. Design variables are not part of the model; they are
//! combined with it per solve through [`Model::material_for`].

use crate::boundary_conditions::Constraints;
use crate::design::DesignState;
use crate::error::{FemError, Result};
use crate::materials::{Material, MaterialAssignment, ScaledMaterial};
use crate::mesh::Mesh;
use nalgebra::DVector;
use std::sync::Arc;
use tracing::debug;

/// Everything that defines the structure to analyse
#[derive(Debug, Clone)]
pub struct Model {
    mesh: Mesh,
    materials: MaterialAssignment,
    constraints: Constraints,
    sections: Vec<f64>,
    eigenstrain: Option<Vec<DVector<f64>>>,
}

impl Model {
    /// Build and validate a model; sections default to 1
    pub fn new(
        mesh: Mesh,
        materials: impl Into<MaterialAssignment>,
        constraints: Constraints,
    ) -> Result<Self> {
        let sections = vec![1.0; mesh.num_elements()];
        let model = Self {
            mesh,
            materials: materials.into(),
            constraints,
            sections,
            eigenstrain: None,
        };
        model.validate()?;
        debug!(
            nodes = model.mesh.num_nodes(),
            elements = model.mesh.num_elements(),
            dofs = model.mesh.num_dofs(),
            constrained = model.constraints.constrained_dofs().len(),
            "model validated"
        );
        Ok(model)
    }

    /// Same section (bar area or thickness) for every element
    pub fn with_section(self, section: f64) -> Result<Self> {
        let n = self.mesh.num_elements();
        self.with_sections(vec![section; n])
    }

    /// One section value per element
    pub fn with_sections(mut self, sections: Vec<f64>) -> Result<Self> {
        self.sections = sections;
        self.validate()?;
        Ok(self)
    }

    /// Same eigenstrain (Voigt, mechanical-strain free) in every element
    pub fn with_uniform_eigenstrain(self, eigenstrain: DVector<f64>) -> Result<Self> {
        let n = self.mesh.num_elements();
        self.with_eigenstrain(vec![eigenstrain; n])
    }

    /// One eigenstrain per element, applied proportionally to the load schedule
    pub fn with_eigenstrain(mut self, eigenstrain: Vec<DVector<f64>>) -> Result<Self> {
        self.eigenstrain = Some(eigenstrain);
        self.validate()?;
        Ok(self)
    }

    /// Replace the constraints
    pub fn with_constraints(mut self, constraints: Constraints) -> Result<Self> {
        self.constraints = constraints;
        self.validate()?;
        Ok(self)
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn materials(&self) -> &MaterialAssignment {
        &self.materials
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Section property of an element
    pub fn section(&self, element: usize) -> f64 {
        self.sections[element]
    }

    /// Eigenstrain of an element at load factor 1
    pub fn eigenstrain(&self, element: usize) -> Option<&DVector<f64>> {
        self.eigenstrain.as_ref().map(|e| &e[element])
    }

    /// Whether any element material depends on the loading history
    pub fn is_path_dependent(&self) -> bool {
        self.materials.is_path_dependent()
    }

    /// Unscaled, oriented material of `element` for this design
    pub fn oriented_material(&self, element: usize, design: &DesignState) -> Result<Arc<dyn Material>> {
        let base = self
            .materials
            .get(element)
            .ok_or_else(|| FemError::config(format!("element {element} has no material")))?;
        match design.orientation(element) {
            Some(r) => base.rotated(r),
            None => Ok(base.clone()),
        }
    }

    /// Oriented material of `element` scaled by the design stiffness scale
    pub fn material_for(&self, element: usize, design: &DesignState) -> Result<ScaledMaterial> {
        ScaledMaterial::new(
            self.oriented_material(element, design)?,
            design.stiffness_scale(element),
        )
    }

    /// Check a design against this model
    pub fn check_design(&self, design: &DesignState) -> Result<()> {
        design.validate(self.mesh.num_elements())
    }

    /// Check consistency of all parts
    pub fn validate(&self) -> Result<()> {
        self.mesh.validate()?;
        let n_elements = self.mesh.num_elements();
        if n_elements == 0 {
            return Err(FemError::config("mesh has no elements"));
        }

        if let Some(n) = self.materials.len() {
            if n != n_elements {
                return Err(FemError::config(format!(
                    "{n} materials assigned to {n_elements} elements"
                )));
            }
        }
        for (e, element) in self.mesh.elements.iter().enumerate() {
            let expected = element.element_type.family().n_strains();
            let material = self
                .materials
                .get(e)
                .ok_or_else(|| FemError::config(format!("element {e} has no material")))?;
            if material.n_strains() != expected {
                return Err(FemError::config(format!(
                    "element {e} ({:?}) needs a material with {expected} strain components, got {}",
                    element.element_type,
                    material.n_strains()
                )));
            }
            if let Some(eigen) = self.eigenstrain.as_ref().and_then(|v| v.get(e)) {
                if eigen.len() != expected {
                    return Err(FemError::config(format!(
                        "eigenstrain of element {e} has {} components, expected {expected}",
                        eigen.len()
                    )));
                }
            }
        }

        if self.sections.len() != n_elements {
            return Err(FemError::config(format!(
                "{} sections given for {n_elements} elements",
                self.sections.len()
            )));
        }
        if let Some((e, s)) = self
            .sections
            .iter()
            .enumerate()
            .find(|(_, s)| !(s.is_finite() && **s > 0.0))
        {
            return Err(FemError::config(format!(
                "section of element {e} must be positive, got {s}"
            )));
        }
        if let Some(eigen) = &self.eigenstrain {
            if eigen.len() != n_elements {
                return Err(FemError::config(format!(
                    "{} eigenstrains given for {n_elements} elements",
                    eigen.len()
                )));
            }
        }

        if self.constraints.dim() != self.mesh.dim
            || self.constraints.num_dofs() != self.mesh.num_dofs()
        {
            return Err(FemError::config(format!(
                "constraints cover {} DOFs ({}D) but the mesh has {} DOFs ({}D)",
                self.constraints.num_dofs(),
                self.constraints.dim(),
                self.mesh.num_dofs(),
                self.mesh.dim
            )));
        }
        Ok(())
    }
}
