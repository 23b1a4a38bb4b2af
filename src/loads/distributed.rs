//! Distributed loads on frame elements

use serde::{Deserialize, Serialize};

use super::point_load::LoadDirection;

/// A linearly varying line load on a truss or beam
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributedLoad {
    /// Loaded element
    pub element: String,
    /// Start magnitude (at start position)
    pub w1: f64,
    /// End magnitude (at end position)
    pub w2: f64,
    /// Start position (distance from i-node)
    #[serde(default)]
    pub x1: f64,
    /// End position (distance from i-node); `None` runs to the j-node
    #[serde(default)]
    pub x2: Option<f64>,
    /// Load direction
    pub direction: LoadDirection,
    /// Load case
    pub case: String,
}

impl DistributedLoad {
    /// Create a new partial-span distributed load
    pub fn new(element: &str, w1: f64, w2: f64, x1: f64, x2: f64, direction: LoadDirection, case: &str) -> Self {
        Self {
            element: element.to_string(),
            w1,
            w2,
            x1,
            x2: Some(x2),
            direction,
            case: case.to_string(),
        }
    }

    /// Create a uniform distributed load over the full member length
    pub fn uniform(element: &str, w: f64, direction: LoadDirection, case: &str) -> Self {
        Self {
            element: element.to_string(),
            w1: w,
            w2: w,
            x1: 0.0,
            x2: None,
            direction,
            case: case.to_string(),
        }
    }

    /// Loaded span resolved against the element length
    pub fn span(&self, length: f64) -> (f64, f64) {
        (self.x1, self.x2.unwrap_or(length))
    }

    /// Intensity at distance `x` from the i-node (zero outside the loaded span)
    pub fn intensity(&self, x: f64, length: f64) -> f64 {
        let (x1, x2) = self.span(length);
        if x < x1 || x > x2 || x2 <= x1 {
            return 0.0;
        }
        self.w1 + (self.w2 - self.w1) * (x - x1) / (x2 - x1)
    }

    /// Resultant of the load over its span
    pub fn total_force(&self, length: f64) -> f64 {
        let (x1, x2) = self.span(length);
        (self.w1 + self.w2) / 2.0 * (x2 - x1)
    }
}
