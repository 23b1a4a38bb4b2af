//! Load types, load cases and load combinations

mod distributed;
mod load_case;
mod load_combo;
mod nodal_mass;
mod node_load;
mod point_load;
mod surface_load;

pub use distributed::DistributedLoad;
pub use load_case::LoadCase;
pub use load_combo::LoadCombination;
pub use nodal_mass::NodalMass;
pub use node_load::NodeLoad;
pub use point_load::{LoadDirection, PointLoad};
pub use surface_load::SurfaceLoad;

use serde::{Deserialize, Serialize};

/// Any load that can be placed in the model, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Load {
    /// Force/moment applied at a node in global axes
    Nodal(NodeLoad),
    /// Line load along a truss or beam
    Distributed(DistributedLoad),
    /// Concentrated force part-way along a truss or beam
    MemberPoint(PointLoad),
    /// Uniform pressure on a shell
    Pressure(SurfaceLoad),
    /// Lumped mass participating in modal analysis
    Mass(NodalMass),
}

impl Load {
    /// Load case this load belongs to
    pub fn case(&self) -> &str {
        match self {
            Load::Nodal(l) => &l.case,
            Load::Distributed(l) => &l.case,
            Load::MemberPoint(l) => &l.case,
            Load::Pressure(l) => &l.case,
            Load::Mass(l) => &l.case,
        }
    }

    /// Short name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Load::Nodal(_) => "nodal",
            Load::Distributed(_) => "distributed",
            Load::MemberPoint(_) => "member point",
            Load::Pressure(_) => "pressure",
            Load::Mass(_) => "mass",
        }
    }
}

impl From<NodeLoad> for Load {
    fn from(load: NodeLoad) -> Self {
        Load::Nodal(load)
    }
}

impl From<DistributedLoad> for Load {
    fn from(load: DistributedLoad) -> Self {
        Load::Distributed(load)
    }
}

impl From<PointLoad> for Load {
    fn from(load: PointLoad) -> Self {
        Load::MemberPoint(load)
    }
}

impl From<SurfaceLoad> for Load {
    fn from(load: SurfaceLoad) -> Self {
        Load::Pressure(load)
    }
}

impl From<NodalMass> for Load {
    fn from(load: NodalMass) -> Self {
        Load::Mass(load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_serializes_with_tag() {
        let load: Load = NodeLoad::force("N2", 0.0, -10.0, 0.0, "Dead").into();
        let json = serde_json::to_string(&load).unwrap();
        assert!(json.contains("\"type\":\"nodal\""));
        let back: Load = serde_json::from_str(&json).unwrap();
        assert_eq!(back.case(), "Dead");
    }
}
