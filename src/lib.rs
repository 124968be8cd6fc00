pub mod adjacency;
pub mod complex;
pub mod error;
pub mod fracture;
pub mod geometry;
pub mod links;
pub mod math;
pub mod sim;
pub mod store;
pub mod voronoi;

pub use error::{FissuraError, Result};
