//! Material properties

use serde::{Deserialize, Serialize};

/// Linear elastic isotropic material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Modulus of elasticity (Young's modulus) in Pa
    pub e: f64,
    /// Shear modulus in Pa
    pub g: f64,
    /// Poisson's ratio
    pub nu: f64,
    /// Mass density in kg/m³
    pub rho: f64,
}

impl Material {
    /// Create a new material with given properties
    pub fn new(e: f64, g: f64, nu: f64, rho: f64) -> Self {
        Self { e, g, nu, rho }
    }

    /// Create a new isotropic material from E and nu
    /// G is calculated as E / (2 * (1 + nu))
    pub fn isotropic(e: f64, nu: f64, rho: f64) -> Self {
        let g = e / (2.0 * (1.0 + nu));
        Self::new(e, g, nu, rho)
    }

    /// Structural steel
    pub fn steel() -> Self {
        Self::new(200e9, 77e9, 0.3, 7850.0)
    }

    /// Normal weight concrete from its compressive strength in Pa
    pub fn concrete(fc: f64) -> Self {
        // ACI: E = 4700 sqrt(f'c) with f'c in MPa
        let e = 4700.0 * (fc / 1e6).sqrt() * 1e6;
        Self::isotropic(e, 0.2, 2400.0)
    }

    /// Aluminium 6061-T6
    pub fn aluminum() -> Self {
        Self::new(68.9e9, 26e9, 0.33, 2700.0)
    }

    /// Plane-stress constitutive factor E / (1 - nu²)
    pub fn plane_stress_modulus(&self) -> f64 {
        self.e / (1.0 - self.nu * self.nu)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::steel()
    }
}
