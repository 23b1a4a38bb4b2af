//! Pressure loads on shell elements

use serde::{Deserialize, Serialize};

/// A uniform pressure on a shell, positive along the shell's local z axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceLoad {
    /// Loaded shell
    pub element: String,
    /// Pressure magnitude (force per unit area)
    pub pressure: f64,
    /// Load case
    pub case: String,
}

impl SurfaceLoad {
    /// Create a new pressure load
    pub fn new(element: &str, pressure: f64, case: &str) -> Self {
        Self {
            element: element.to_string(),
            pressure,
            case: case.to_string(),
        }
    }
}
