//! Boundary conditions at a node

use serde::{Deserialize, Serialize};

use super::Dof;

/// Resolved condition of a single DOF
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DofCondition {
    Free,
    /// Eliminated from the system at the given (usually zero) displacement
    Fixed(f64),
    /// Elastic support with the given stiffness
    Spring(f64),
}

/// Per-DOF boundary conditions at a node, in the order [DX, DY, DZ, RX, RY, RZ]
///
/// A DOF is free unless it is marked fixed or carries a spring. Marking the
/// same DOF both fixed and elastic is rejected by the validator rather than
/// resolved silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Support {
    /// Restrained DOFs
    #[serde(default)]
    pub fixed: [bool; 6],
    /// Spring stiffness per DOF (force/length or moment/radian)
    #[serde(default)]
    pub springs: [Option<f64>; 6],
    /// Prescribed displacement of a fixed DOF
    #[serde(default)]
    pub enforced: [Option<f64>; 6],
}

impl Support {
    /// Create a support with no restraints
    pub fn new() -> Self {
        Self::default()
    }

    /// All six DOFs restrained
    pub fn fixed() -> Self {
        Self::with_restraints(true, true, true, true, true, true)
    }

    /// Translations restrained, rotations free
    pub fn pinned() -> Self {
        Self::with_restraints(true, true, true, false, false, false)
    }

    /// Only the given translation restrained
    pub fn roller(dof: Dof) -> Self {
        Self::new().with_fixed(dof)
    }

    /// Create a support with specific restraints
    pub fn with_restraints(dx: bool, dy: bool, dz: bool, rx: bool, ry: bool, rz: bool) -> Self {
        Self {
            fixed: [dx, dy, dz, rx, ry, rz],
            ..Default::default()
        }
    }

    /// Restrain one more DOF
    pub fn with_fixed(mut self, dof: Dof) -> Self {
        self.fixed[dof.index()] = true;
        self
    }

    /// Add an elastic spring on a DOF
    pub fn with_spring(mut self, dof: Dof, stiffness: f64) -> Self {
        self.springs[dof.index()] = Some(stiffness);
        self
    }

    /// Prescribe a displacement; the DOF becomes fixed at that value
    pub fn with_enforced(mut self, dof: Dof, value: f64) -> Self {
        self.fixed[dof.index()] = true;
        self.enforced[dof.index()] = Some(value);
        self
    }

    /// Resolved condition of a DOF. Fixity takes precedence here; conflicts
    /// are reported during validation before this is ever consulted.
    pub fn condition(&self, dof: Dof) -> DofCondition {
        let i = dof.index();
        if self.fixed[i] {
            DofCondition::Fixed(self.enforced[i].unwrap_or(0.0))
        } else if let Some(k) = self.springs[i] {
            DofCondition::Spring(k)
        } else {
            DofCondition::Free
        }
    }

    /// DOFs declared both fixed and elastic
    pub fn conflicts(&self) -> Vec<Dof> {
        Dof::ALL
            .iter()
            .copied()
            .filter(|d| self.fixed[d.index()] && self.springs[d.index()].is_some())
            .collect()
    }

    /// Check if any DOF is restrained or elastically supported
    pub fn is_supported(&self) -> bool {
        self.fixed.iter().any(|&f| f) || self.springs.iter().any(|s| s.is_some())
    }

    /// Count number of fixed DOFs
    pub fn num_restrained(&self) -> usize {
        self.fixed.iter().filter(|&&f| f).count()
    }
}
