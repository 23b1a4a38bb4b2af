//! Node element - represents a point in 3D space

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the six degrees of freedom carried by every node
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dof {
    DX,
    DY,
    DZ,
    RX,
    RY,
    RZ,
}

impl Dof {
    /// All DOFs in nodal order
    pub const ALL: [Dof; 6] = [Dof::DX, Dof::DY, Dof::DZ, Dof::RX, Dof::RY, Dof::RZ];

    /// Position of this DOF within a node's 6-vector
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Dof> {
        Self::ALL.get(index).copied()
    }

    pub fn is_rotation(self) -> bool {
        self.index() >= 3
    }
}

impl fmt::Display for Dof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dof::DX => "DX",
            Dof::DY => "DY",
            Dof::DZ => "DZ",
            Dof::RX => "RX",
            Dof::RY => "RY",
            Dof::RZ => "RZ",
        };
        f.write_str(name)
    }
}

/// A 3D node in the structural model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Node {
    /// Create a new node at the given coordinates
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Get the coordinates as an array
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Calculate distance to another node
    pub fn distance_to(&self, other: &Node) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_distance() {
        let n1 = Node::new(0.0, 0.0, 0.0);
        let n2 = Node::new(3.0, 4.0, 0.0);
        assert!((n1.distance_to(&n2) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_dof_ordering() {
        assert_eq!(Dof::RY.index(), 4);
        assert_eq!(Dof::from_index(2), Some(Dof::DZ));
        assert_eq!(Dof::from_index(6), None);
        assert!(Dof::RX.is_rotation());
        assert!(!Dof::DZ.is_rotation());
    }
}
