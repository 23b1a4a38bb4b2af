//! Point loads on frame elements

use serde::{Deserialize, Serialize};

/// Direction of an element load
///
/// Lower-case variants act along the element's local axes, upper-case
/// variants along the global axes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoadDirection {
    /// Force in member's local x direction (axial)
    Fx,
    /// Force in member's local y direction
    Fy,
    /// Force in member's local z direction
    Fz,
    /// Force in global X direction
    FX,
    /// Force in global Y direction
    FY,
    /// Force in global Z direction
    FZ,
}

impl LoadDirection {
    /// Unit vector of the load, together with whether it is in local axes
    pub fn unit_vector(self) -> ([f64; 3], bool) {
        match self {
            LoadDirection::Fx => ([1.0, 0.0, 0.0], true),
            LoadDirection::Fy => ([0.0, 1.0, 0.0], true),
            LoadDirection::Fz => ([0.0, 0.0, 1.0], true),
            LoadDirection::FX => ([1.0, 0.0, 0.0], false),
            LoadDirection::FY => ([0.0, 1.0, 0.0], false),
            LoadDirection::FZ => ([0.0, 0.0, 1.0], false),
        }
    }
}

/// A concentrated force on a frame element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointLoad {
    /// Loaded element
    pub element: String,
    /// Load magnitude
    pub magnitude: f64,
    /// Distance from i-node
    pub position: f64,
    /// Load direction
    pub direction: LoadDirection,
    /// Load case
    pub case: String,
}

impl PointLoad {
    /// Create a new point load
    pub fn new(element: &str, magnitude: f64, position: f64, direction: LoadDirection, case: &str) -> Self {
        Self {
            element: element.to_string(),
            magnitude,
            position,
            direction,
            case: case.to_string(),
        }
    }
}
