//! Result types for static, modal and response spectrum analysis

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NumericalAnomaly, SolverError, SolverResult};

/// Global translation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    X,
    Y,
    Z,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::X, Direction::Y, Direction::Z];

    /// Index of the matching translational DOF
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::X => "X",
            Direction::Y => "Y",
            Direction::Z => "Z",
        };
        f.write_str(name)
    }
}

/// Displacement results at a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDisplacement {
    /// Displacement in X direction
    pub dx: f64,
    /// Displacement in Y direction
    pub dy: f64,
    /// Displacement in Z direction
    pub dz: f64,
    /// Rotation about X axis
    pub rx: f64,
    /// Rotation about Y axis
    pub ry: f64,
    /// Rotation about Z axis
    pub rz: f64,
}

impl NodeDisplacement {
    /// Create from array [DX, DY, DZ, RX, RY, RZ]
    pub fn from_array(arr: [f64; 6]) -> Self {
        Self {
            dx: arr[0],
            dy: arr[1],
            dz: arr[2],
            rx: arr[3],
            ry: arr[4],
            rz: arr[5],
        }
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.dx, self.dy, self.dz, self.rx, self.ry, self.rz]
    }

    /// Get translation magnitude
    pub fn translation_magnitude(&self) -> f64 {
        (self.dx.powi(2) + self.dy.powi(2) + self.dz.powi(2)).sqrt()
    }

    /// Get rotation magnitude
    pub fn rotation_magnitude(&self) -> f64 {
        (self.rx.powi(2) + self.ry.powi(2) + self.rz.powi(2)).sqrt()
    }
}

/// Reaction forces at a supported node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reactions {
    /// Reaction force in X direction
    pub fx: f64,
    /// Reaction force in Y direction
    pub fy: f64,
    /// Reaction force in Z direction
    pub fz: f64,
    /// Reaction moment about X axis
    pub mx: f64,
    /// Reaction moment about Y axis
    pub my: f64,
    /// Reaction moment about Z axis
    pub mz: f64,
}

impl Reactions {
    /// Create from array [FX, FY, FZ, MX, MY, MZ]
    pub fn from_array(arr: [f64; 6]) -> Self {
        Self {
            fx: arr[0],
            fy: arr[1],
            fz: arr[2],
            mx: arr[3],
            my: arr[4],
            mz: arr[5],
        }
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.fx, self.fy, self.fz, self.mx, self.my, self.mz]
    }

    /// Get total force magnitude
    pub fn force_magnitude(&self) -> f64 {
        (self.fx.powi(2) + self.fy.powi(2) + self.fz.powi(2)).sqrt()
    }

    /// Get total moment magnitude
    pub fn moment_magnitude(&self) -> f64 {
        (self.mx.powi(2) + self.my.powi(2) + self.mz.powi(2)).sqrt()
    }
}

/// End forces of an element in its local axes
///
/// One entry per element node, each `[Fx, Fy, Fz, Mx, My, Mz]`, acting on the
/// element. A frame has two ends, a shell four corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementForces {
    pub ends: Vec<[f64; 6]>,
    /// Axial stress N/A of frame elements (tension positive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axial_stress: Option<f64>,
}

impl ElementForces {
    /// Internal forces at the i-node in the beam sign convention
    pub fn member_forces_i(&self) -> MemberForces {
        MemberForces::from_i_node_forces(&self.frame_forces())
    }

    /// Internal forces at the j-node in the beam sign convention
    pub fn member_forces_j(&self) -> MemberForces {
        MemberForces::from_j_node_forces(&self.frame_forces())
    }

    /// Axial force, tension positive
    pub fn axial(&self) -> f64 {
        self.ends.first().map(|f| -f[0]).unwrap_or(0.0)
    }

    fn frame_forces(&self) -> [f64; 12] {
        let mut forces = [0.0; 12];
        for (end, values) in self.ends.iter().take(2).enumerate() {
            forces[6 * end..6 * end + 6].copy_from_slice(values);
        }
        forces
    }
}

/// Internal forces in a member
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemberForces {
    /// Axial force (positive = tension)
    pub axial: f64,
    /// Shear force in local y direction
    pub shear_y: f64,
    /// Shear force in local z direction
    pub shear_z: f64,
    /// Torsion
    pub torsion: f64,
    /// Bending moment about local y axis
    pub moment_y: f64,
    /// Bending moment about local z axis
    pub moment_z: f64,
}

impl MemberForces {
    /// Create from local force array at i-node
    pub fn from_i_node_forces(forces: &[f64; 12]) -> Self {
        Self {
            axial: -forces[0],
            shear_y: forces[1],
            shear_z: forces[2],
            torsion: -forces[3],
            moment_y: forces[4],
            moment_z: forces[5],
        }
    }

    /// Create from local force array at j-node
    pub fn from_j_node_forces(forces: &[f64; 12]) -> Self {
        Self {
            axial: forces[6],
            shear_y: -forces[7],
            shear_z: -forces[8],
            torsion: forces[9],
            moment_y: forces[10],
            moment_z: forces[11],
        }
    }
}

/// In-plane stress state at a point of a shell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneStress {
    /// Normal stress in X direction
    pub sx: f64,
    /// Normal stress in Y direction
    pub sy: f64,
    /// Shear stress XY
    pub txy: f64,
    /// Von Mises equivalent stress
    pub von_mises: f64,
    /// Maximum principal stress
    pub s1: f64,
    /// Minimum principal stress
    pub s2: f64,
}

impl PlaneStress {
    /// Create from stress components
    pub fn from_components(sx: f64, sy: f64, txy: f64) -> Self {
        let von_mises = (sx.powi(2) - sx * sy + sy.powi(2) + 3.0 * txy.powi(2)).sqrt();

        // Principal stresses
        let s_avg = (sx + sy) / 2.0;
        let r = ((sx - sy).powi(2) / 4.0 + txy.powi(2)).sqrt();

        Self {
            sx,
            sy,
            txy,
            von_mises,
            s1: s_avg + r,
            s2: s_avg - r,
        }
    }
}

/// Centroid stresses and stress resultants of a shell, in its local axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShellStress {
    /// Membrane (mid-surface) stresses
    pub membrane: PlaneStress,
    /// Stresses at the +z face
    pub top: PlaneStress,
    /// Stresses at the -z face
    pub bottom: PlaneStress,
    /// Bending moments per unit width [Mx, My, Mxy]
    pub moments: [f64; 3],
    /// Transverse shear per unit width [Qx, Qy]
    pub shear: [f64; 2],
}

impl ShellStress {
    /// Combine membrane stresses and moments of a shell of thickness `t`
    pub fn new(membrane: [f64; 3], moments: [f64; 3], shear: [f64; 2], t: f64) -> Self {
        // Extreme-fibre bending stress is 6M/t²
        let s = 6.0 / (t * t);
        let face = |sign: f64| {
            PlaneStress::from_components(
                membrane[0] + sign * s * moments[0],
                membrane[1] + sign * s * moments[1],
                membrane[2] + sign * s * moments[2],
            )
        };
        Self {
            membrane: PlaneStress::from_components(membrane[0], membrane[1], membrane[2]),
            top: face(1.0),
            bottom: face(-1.0),
            moments,
            shear,
        }
    }

    /// Larger of the two face von Mises stresses
    pub fn max_von_mises(&self) -> f64 {
        self.top.von_mises.max(self.bottom.von_mises)
    }
}

/// Global force and moment balance of one load case or combination
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumCheck {
    /// Resultant of the applied loads [FX, FY, FZ, MX, MY, MZ], moments about the origin
    pub applied: [f64; 6],
    /// Resultant of the reactions
    pub reactions: [f64; 6],
    /// applied + reactions
    pub imbalance: [f64; 6],
    /// Whether moments were part of the check
    pub moments_checked: bool,
    pub balanced: bool,
}

/// Whether a static result belongs to a load case or a combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    LoadCase,
    Combination,
}

/// Static solution for one load case or combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticResult {
    pub name: String,
    pub source: ResultSource,
    pub displacements: BTreeMap<String, NodeDisplacement>,
    /// Reactions at nodes with any fixed or spring DOF
    pub reactions: BTreeMap<String, Reactions>,
    pub element_forces: BTreeMap<String, ElementForces>,
    pub shell_stresses: BTreeMap<String, ShellStress>,
    pub equilibrium: EquilibriumCheck,
    #[serde(default)]
    pub warnings: Vec<NumericalAnomaly>,
    /// P-Delta iterations used (zero for a linear solution)
    #[serde(default)]
    pub iterations: usize,
}

impl StaticResult {
    pub fn displacement(&self, node: &str) -> SolverResult<NodeDisplacement> {
        self.displacements
            .get(node)
            .copied()
            .ok_or_else(|| SolverError::NodeNotFound(node.to_string()))
    }

    pub fn reaction(&self, node: &str) -> SolverResult<Reactions> {
        self.reactions
            .get(node)
            .copied()
            .ok_or_else(|| SolverError::NodeNotFound(node.to_string()))
    }

    pub fn forces(&self, element: &str) -> SolverResult<&ElementForces> {
        self.element_forces
            .get(element)
            .ok_or_else(|| SolverError::ElementNotFound(element.to_string()))
    }
}

/// Summary of analysis results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Maximum displacement
    pub max_displacement: f64,
    /// Node with maximum displacement
    pub max_disp_node: String,
    /// Result (case or combination) governing the maximum displacement
    pub max_disp_result: String,
    /// Maximum reaction force
    pub max_reaction: f64,
    /// Node with maximum reaction
    pub max_reaction_node: String,
    /// Maximum member axial force (absolute)
    pub max_axial: f64,
    /// Member with maximum axial
    pub max_axial_member: String,
    /// Total number of nodes
    pub num_nodes: usize,
    /// Number of truss and beam elements
    pub num_members: usize,
    /// Number of shell elements
    pub num_shells: usize,
    /// Total DOFs
    pub total_dofs: usize,
    /// Free DOFs (unknown)
    pub free_dofs: usize,
}

/// Type of static analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    /// First-order linear static analysis
    #[default]
    Linear,
    /// Second-order P-Delta analysis
    PDelta,
}

/// Results of a static analysis run, keyed by case or combination name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticAnalysis {
    pub analysis_type: AnalysisType,
    pub results: BTreeMap<String, StaticResult>,
    pub summary: AnalysisSummary,
    /// Warnings that concern the whole run (conditioning)
    #[serde(default)]
    pub warnings: Vec<NumericalAnomaly>,
}

impl StaticAnalysis {
    pub fn result(&self, name: &str) -> SolverResult<&StaticResult> {
        self.results
            .get(name)
            .ok_or_else(|| SolverError::LoadCaseNotFound(name.to_string()))
    }

    /// Displacement of a node under a load case or combination
    pub fn node_displacement(&self, node: &str, name: &str) -> SolverResult<NodeDisplacement> {
        self.result(name)?.displacement(node)
    }

    pub fn node_reactions(&self, node: &str, name: &str) -> SolverResult<Reactions> {
        self.result(name)?.reaction(node)
    }

    pub fn element_forces(&self, element: &str, name: &str) -> SolverResult<&ElementForces> {
        self.result(name)?.forces(element)
    }

    /// Names of the solved cases and combinations
    pub fn names(&self) -> Vec<String> {
        self.results.keys().cloned().collect()
    }
}

/// One natural mode of vibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mode {
    /// 1-based mode number in ascending frequency order
    pub number: usize,
    /// Circular frequency (rad/s)
    pub omega: f64,
    /// Frequency (Hz)
    pub frequency: f64,
    /// Period (s)
    pub period: f64,
    /// Mass-normalized shape per node [DX, DY, DZ, RX, RY, RZ]
    pub shape: BTreeMap<String, [f64; 6]>,
    /// Participation factors Γ in X, Y, Z
    pub participation: [f64; 3],
    /// Effective modal masses in X, Y, Z
    pub effective_mass: [f64; 3],
    /// Effective mass over total mass in X, Y, Z
    pub mass_ratio: [f64; 3],
    /// Running sum of the mass ratios up to this mode
    pub cumulative_ratio: [f64; 3],
    /// Translation direction with the largest RMS shape component
    pub dominant_direction: Direction,
}

impl Mode {
    pub fn participation_in(&self, direction: Direction) -> f64 {
        self.participation[direction.index()]
    }
}

/// Natural frequencies and mode shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalResult {
    /// Modes in ascending frequency
    pub modes: Vec<Mode>,
    /// Mass on free DOFs per direction X, Y, Z
    pub total_mass: [f64; 3],
    /// Subspace iterations of the final extraction
    pub iterations: usize,
}

impl ModalResult {
    /// Period of the first mode
    pub fn fundamental_period(&self) -> Option<f64> {
        self.modes.first().map(|m| m.period)
    }

    /// Frequency (Hz) of the first mode
    pub fn fundamental_frequency(&self) -> Option<f64> {
        self.modes.first().map(|m| m.frequency)
    }

    pub fn frequencies(&self) -> Vec<f64> {
        self.modes.iter().map(|m| m.frequency).collect()
    }

    /// Cumulative mass ratio over all extracted modes
    pub fn cumulative_ratio(&self) -> [f64; 3] {
        self.modes.last().map(|m| m.cumulative_ratio).unwrap_or_default()
    }
}

/// Rule used to combine peak modal responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationRule {
    /// Square root of the sum of squares
    Srss,
    /// Complete quadratic combination
    Cqc,
}

impl fmt::Display for CombinationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombinationRule::Srss => f.write_str("SRSS"),
            CombinationRule::Cqc => f.write_str("CQC"),
        }
    }
}

/// Combined peak response for one combination rule
///
/// Envelopes are magnitudes: every entry is non-negative and carries no
/// direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumResult {
    pub rule: CombinationRule,
    pub damping: f64,
    pub direction: Direction,
    /// Spectral acceleration at each mode period, in mode order
    pub spectral_accelerations: Vec<f64>,
    pub displacements: BTreeMap<String, [f64; 6]>,
    pub reactions: BTreeMap<String, [f64; 6]>,
    /// Local end-force envelopes, one entry per element node
    pub element_forces: BTreeMap<String, Vec<[f64; 6]>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_von_mises_uniaxial() {
        let s = PlaneStress::from_components(100.0, 0.0, 0.0);
        assert_relative_eq!(s.von_mises, 100.0);
        assert_relative_eq!(s.s1, 100.0);
        assert_relative_eq!(s.s2, 0.0);
    }

    #[test]
    fn test_pure_shear_principal_stresses() {
        let s = PlaneStress::from_components(0.0, 0.0, 50.0);
        assert_relative_eq!(s.s1, 50.0);
        assert_relative_eq!(s.s2, -50.0);
        assert_relative_eq!(s.von_mises, 50.0 * 3.0_f64.sqrt());
    }

    #[test]
    fn test_shell_faces_from_moment() {
        // Pure bending: faces carry ±6M/t²
        let stress = ShellStress::new([0.0; 3], [1000.0, 0.0, 0.0], [0.0; 2], 0.1);
        assert_relative_eq!(stress.top.sx, 6.0e5);
        assert_relative_eq!(stress.bottom.sx, -6.0e5);
        assert_relative_eq!(stress.max_von_mises(), 6.0e5);
    }

    #[test]
    fn test_member_forces_sign_convention() {
        let forces = ElementForces {
            ends: vec![[-10.0, 2.0, 0.0, 0.0, 0.0, 5.0], [10.0, -2.0, 0.0, 0.0, 0.0, 3.0]],
            axial_stress: None,
        };
        assert_relative_eq!(forces.axial(), 10.0);
        assert_relative_eq!(forces.member_forces_i().axial, 10.0);
        assert_relative_eq!(forces.member_forces_j().axial, 10.0);
        assert_relative_eq!(forces.member_forces_j().shear_y, 2.0);
    }
}
