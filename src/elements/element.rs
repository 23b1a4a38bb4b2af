//! Element definitions: truss, beam-column and shell

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of element formulations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    /// Two-node axial-force member
    Truss,
    /// Two-node 3D beam-column with bending, shear and torsion
    Beam,
    /// Four-node flat shell (membrane + plate bending)
    Shell,
}

impl ElementType {
    /// Number of nodes an element of this type connects
    pub fn node_count(self) -> usize {
        match self {
            ElementType::Truss | ElementType::Beam => 2,
            ElementType::Shell => 4,
        }
    }

    /// Size of the element DOF vector
    pub fn dof_count(self) -> usize {
        6 * self.node_count()
    }

    pub fn is_frame(self) -> bool {
        !matches!(self, ElementType::Shell)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Truss => f.write_str("truss"),
            ElementType::Beam => f.write_str("beam"),
            ElementType::Shell => f.write_str("shell"),
        }
    }
}

/// End releases for a frame element (local DOFs that transmit no force)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementReleases {
    /// i-node releases [DX, DY, DZ, RX, RY, RZ]
    pub i_node: [bool; 6],
    /// j-node releases [DX, DY, DZ, RX, RY, RZ]
    pub j_node: [bool; 6],
}

impl ElementReleases {
    /// Create releases with no end releases
    pub fn none() -> Self {
        Self::default()
    }

    /// Moment releases at the i-node
    pub fn pin_i() -> Self {
        Self {
            i_node: [false, false, false, false, true, true],
            j_node: [false; 6],
        }
    }

    /// Moment releases at the j-node
    pub fn pin_j() -> Self {
        Self {
            i_node: [false; 6],
            j_node: [false, false, false, false, true, true],
        }
    }

    /// Moment releases at both ends
    pub fn pin_both() -> Self {
        Self {
            i_node: [false, false, false, false, true, true],
            j_node: [false, false, false, false, true, true],
        }
    }

    /// Get combined releases as 12-element array
    pub fn as_array(&self) -> [bool; 12] {
        let mut arr = [false; 12];
        arr[0..6].copy_from_slice(&self.i_node);
        arr[6..12].copy_from_slice(&self.j_node);
        arr
    }

    pub fn any(&self) -> bool {
        self.as_array().iter().any(|&r| r)
    }
}

/// A structural element referencing nodes, a material and a section by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Formulation tag
    pub kind: ElementType,
    /// Ordered node names (i, j for frames; counter-clockwise i, j, m, n for shells)
    pub nodes: Vec<String>,
    /// Name of the material
    pub material: String,
    /// Name of the section
    pub section: String,
    /// Roll angle about the longitudinal axis (radians, frames only)
    #[serde(default)]
    pub rotation: f64,
    /// End releases (frames only)
    #[serde(default)]
    pub releases: ElementReleases,
}

impl Element {
    fn with_kind(kind: ElementType, nodes: &[&str], material: &str, section: &str) -> Self {
        Self {
            kind,
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            material: material.to_string(),
            section: section.to_string(),
            rotation: 0.0,
            releases: ElementReleases::none(),
        }
    }

    /// Create a beam-column between two nodes
    pub fn beam(i_node: &str, j_node: &str, material: &str, section: &str) -> Self {
        Self::with_kind(ElementType::Beam, &[i_node, j_node], material, section)
    }

    /// Create an axial-only truss member between two nodes
    pub fn truss(i_node: &str, j_node: &str, material: &str, section: &str) -> Self {
        Self::with_kind(ElementType::Truss, &[i_node, j_node], material, section)
    }

    /// Create a four-node shell; nodes are ordered around the perimeter
    pub fn shell(nodes: [&str; 4], material: &str, section: &str) -> Self {
        Self::with_kind(ElementType::Shell, &nodes, material, section)
    }

    /// Set member rotation about its longitudinal axis
    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set member end releases
    pub fn with_releases(mut self, releases: ElementReleases) -> Self {
        self.releases = releases;
        self
    }

    /// Name of the i-node (start)
    pub fn i_node(&self) -> Option<&str> {
        self.nodes.first().map(String::as_str)
    }

    /// Name of the j-node (end)
    pub fn j_node(&self) -> Option<&str> {
        self.nodes.get(1).map(String::as_str)
    }
}
