//! Section properties for frame and shell elements

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Cross-section properties
///
/// Frame elements read the area, inertias and torsion constant. When a
/// shear area is given the beam-column kernel includes shear deformation in
/// the corresponding bending plane. Shell elements only read `thickness`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Cross-sectional area in m²
    pub a: f64,
    /// Moment of inertia about local y-axis in m⁴
    pub iy: f64,
    /// Moment of inertia about local z-axis in m⁴
    pub iz: f64,
    /// Torsional constant in m⁴
    pub j: f64,
    /// Effective shear area for forces along local y in m²
    #[serde(default)]
    pub asy: Option<f64>,
    /// Effective shear area for forces along local z in m²
    #[serde(default)]
    pub asz: Option<f64>,
    /// Shell thickness in m
    #[serde(default)]
    pub thickness: Option<f64>,
}

impl Section {
    /// Create a new section with basic properties
    pub fn new(a: f64, iy: f64, iz: f64, j: f64) -> Self {
        Self {
            a,
            iy,
            iz,
            j,
            asy: None,
            asz: None,
            thickness: None,
        }
    }

    /// Section for a truss element, only the area matters
    pub fn axial(a: f64) -> Self {
        Self::new(a, 0.0, 0.0, 0.0)
    }

    /// Section for a shell element of uniform thickness
    pub fn shell(thickness: f64) -> Self {
        Self {
            thickness: Some(thickness),
            ..Self::new(0.0, 0.0, 0.0, 0.0)
        }
    }

    /// Include shear deformation with the given shear areas
    pub fn with_shear_areas(mut self, asy: f64, asz: f64) -> Self {
        self.asy = Some(asy);
        self.asz = Some(asz);
        self
    }

    /// Solid rectangle, `depth` measured along local y
    pub fn rectangular(width: f64, depth: f64) -> Self {
        let a = width * depth;
        // Depth along y means bending about z uses depth³
        let iz = width * depth.powi(3) / 12.0;
        let iy = depth * width.powi(3) / 12.0;
        let (long, short) = if width > depth { (width, depth) } else { (depth, width) };
        let j = long * short.powi(3) / 3.0 * (1.0 - 0.63 * short / long);
        Self::new(a, iy, iz, j).with_shear_areas(5.0 / 6.0 * a, 5.0 / 6.0 * a)
    }

    /// Solid circle
    pub fn circular(diameter: f64) -> Self {
        let r = diameter / 2.0;
        let a = PI * r.powi(2);
        let i = PI * r.powi(4) / 4.0;
        Self::new(a, i, i, 2.0 * i).with_shear_areas(0.9 * a, 0.9 * a)
    }

    /// Hollow circular (pipe) section
    pub fn pipe(outer_diameter: f64, wall_thickness: f64) -> Self {
        let r_o = outer_diameter / 2.0;
        let r_i = r_o - wall_thickness;
        let a = PI * (r_o.powi(2) - r_i.powi(2));
        let i = PI * (r_o.powi(4) - r_i.powi(4)) / 4.0;
        Self::new(a, i, i, 2.0 * i).with_shear_areas(0.5 * a, 0.5 * a)
    }

    /// Doubly symmetric I-section with the web along local y
    pub fn wide_flange(depth: f64, flange_width: f64, flange_thickness: f64, web_thickness: f64) -> Self {
        let (d, bf, tf, tw) = (depth, flange_width, flange_thickness, web_thickness);
        let hw = d - 2.0 * tf;
        let a = 2.0 * bf * tf + hw * tw;
        // Strong axis bending is about local z
        let iz = (bf * d.powi(3) - (bf - tw) * hw.powi(3)) / 12.0;
        let iy = (2.0 * tf * bf.powi(3) + hw * tw.powi(3)) / 12.0;
        let j = (2.0 * bf * tf.powi(3) + hw * tw.powi(3)) / 3.0;
        Self::new(a, iy, iz, j).with_shear_areas(d * tw, 5.0 / 6.0 * 2.0 * bf * tf)
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::rectangular(0.2, 0.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rectangular_section() {
        let section = Section::rectangular(0.3, 0.5);
        assert_relative_eq!(section.a, 0.15, epsilon = 1e-12);
        assert_relative_eq!(section.iz, 0.3 * 0.5_f64.powi(3) / 12.0, epsilon = 1e-12);
        assert_relative_eq!(section.asy.unwrap_or(0.0), 0.125, epsilon = 1e-12);
    }

    #[test]
    fn test_circular_section() {
        let section = Section::circular(0.5);
        assert_relative_eq!(section.a, PI * 0.0625, epsilon = 1e-12);
        assert_relative_eq!(section.iy, section.iz);
    }

    #[test]
    fn test_shell_section() {
        let section = Section::shell(0.2);
        assert_eq!(section.thickness, Some(0.2));
        assert_eq!(section.asy, None);
    }
}
