pub mod container;
pub mod half_space;

pub use container::{Container, WallId, BOUNDING_PLANES};
pub use half_space::HalfSpace;
