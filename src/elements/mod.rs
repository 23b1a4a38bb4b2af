//! Structural model building blocks

mod element;
mod material;
mod node;
mod section;
mod support;

pub use element::{Element, ElementReleases, ElementType};
pub use material::Material;
pub use node::{Dof, Node};
pub use section::Section;
pub use support::{DofCondition, Support};
