//! Node loads - forces and moments applied directly to nodes

use serde::{Deserialize, Serialize};

/// A load applied directly to a node, in global axes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLoad {
    /// Loaded node
    pub node: String,
    /// Force in X direction (N)
    #[serde(default)]
    pub fx: f64,
    /// Force in Y direction (N)
    #[serde(default)]
    pub fy: f64,
    /// Force in Z direction (N)
    #[serde(default)]
    pub fz: f64,
    /// Moment about X axis (N·m)
    #[serde(default)]
    pub mx: f64,
    /// Moment about Y axis (N·m)
    #[serde(default)]
    pub my: f64,
    /// Moment about Z axis (N·m)
    #[serde(default)]
    pub mz: f64,
    /// Load case this load belongs to
    pub case: String,
}

impl NodeLoad {
    /// Create a new node load from its six components
    pub fn new(node: &str, components: [f64; 6], case: &str) -> Self {
        let [fx, fy, fz, mx, my, mz] = components;
        Self {
            node: node.to_string(),
            fx,
            fy,
            fz,
            mx,
            my,
            mz,
            case: case.to_string(),
        }
    }

    /// Create a force-only node load
    pub fn force(node: &str, fx: f64, fy: f64, fz: f64, case: &str) -> Self {
        Self::new(node, [fx, fy, fz, 0.0, 0.0, 0.0], case)
    }

    /// Create a moment-only node load
    pub fn moment(node: &str, mx: f64, my: f64, mz: f64, case: &str) -> Self {
        Self::new(node, [0.0, 0.0, 0.0, mx, my, mz], case)
    }

    /// Get the load as an array [FX, FY, FZ, MX, MY, MZ]
    pub fn as_array(&self) -> [f64; 6] {
        [self.fx, self.fy, self.fz, self.mx, self.my, self.mz]
    }

    pub fn has_moment(&self) -> bool {
        self.mx != 0.0 || self.my != 0.0 || self.mz != 0.0
    }
}
