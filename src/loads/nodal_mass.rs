//! Lumped masses for dynamic analysis

use serde::{Deserialize, Serialize};

/// Lumped mass at a node. It contributes to the mass matrix only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodalMass {
    /// Node carrying the mass
    pub node: String,
    /// Translational mass, applied to DX, DY and DZ (kg)
    pub mass: f64,
    /// Rotary inertia about X, Y and Z (kg·m²)
    #[serde(default)]
    pub rotary: [f64; 3],
    /// Load case
    pub case: String,
}

impl NodalMass {
    pub fn new(node: &str, mass: f64, case: &str) -> Self {
        Self {
            node: node.to_string(),
            mass,
            rotary: [0.0; 3],
            case: case.to_string(),
        }
    }

    pub fn with_rotary_inertia(mut self, ixx: f64, iyy: f64, izz: f64) -> Self {
        self.rotary = [ixx, iyy, izz];
        self
    }

    /// Diagonal mass terms for the node [DX, DY, DZ, RX, RY, RZ]
    pub fn diagonal(&self) -> [f64; 6] {
        [
            self.mass,
            self.mass,
            self.mass,
            self.rotary[0],
            self.rotary[1],
            self.rotary[2],
        ]
    }
}
