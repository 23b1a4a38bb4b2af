//! Load cases

use serde::{Deserialize, Serialize};

/// A load case groups related loads under a common name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadCase {
    /// Name of the load case
    pub name: String,
    /// Description of the load case
    #[serde(default)]
    pub description: Option<String>,
    /// Gravity acceleration vector applied to the mass of every element
    #[serde(default)]
    pub self_weight: Option<[f64; 3]>,
}

impl LoadCase {
    /// Create a new load case
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            self_weight: None,
        }
    }

    /// Create a load case with description
    pub fn with_description(name: &str, description: &str) -> Self {
        Self {
            description: Some(description.to_string()),
            ..Self::new(name)
        }
    }

    /// Include element self-weight under the given acceleration (m/s²)
    pub fn with_self_weight(mut self, gx: f64, gy: f64, gz: f64) -> Self {
        self.self_weight = Some([gx, gy, gz]);
        self
    }

    /// Dead load case with self-weight acting along -Y
    pub fn dead() -> Self {
        Self::with_description("Dead", "Dead loads (self-weight and permanent loads)")
            .with_self_weight(0.0, -9.81, 0.0)
    }

    pub fn live() -> Self {
        Self::with_description("Live", "Live loads (occupancy, furniture, etc.)")
    }

    pub fn wind() -> Self {
        Self::with_description("Wind", "Wind loads")
    }
}

impl Default for LoadCase {
    fn default() -> Self {
        Self::new("Case 1")
    }
}
