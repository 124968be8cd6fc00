//! Per-cell decomposition of a bounded point set.
//!
//! The link graph only needs, per generator point, a convex polygon mesh
//! and the id of whatever lies across each face. [`CellDecomposer`] is the
//! seam where that primitive plugs in; [`HalfSpaceClipper`] is the
//! built-in implementation.

mod clip;
mod clipper;

pub use clip::{ClipOutcome, ConvexPolyhedron, FaceTag};
pub use clipper::HalfSpaceClipper;

use crate::error::Result;
use crate::geometry::{Container, WallId};
use crate::math::Point3;

/// What lies across one face of a raw cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawNeighbor {
    /// Another generator's cell.
    Cell(usize),
    /// A container wall.
    Wall(WallId),
}

/// Unvalidated output of a decomposition for one generator point.
#[derive(Debug, Clone, Default)]
pub struct RawCell {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Face vertex loops, wound counter-clockwise seen from outside.
    pub faces: Vec<Vec<usize>>,
    /// One entry per face, in face order.
    pub neighbors: Vec<RawNeighbor>,
}

/// A cell decomposition primitive.
pub trait CellDecomposer {
    /// Computes one cell per generator point.
    ///
    /// Entry `i` is `None` when the cell for point `i` could not be built.
    /// `precision` is the absolute geometric tolerance used by the primitive.
    ///
    /// # Errors
    ///
    /// Returns an error only when the whole decomposition is impossible
    /// (e.g. the container does not bound a finite region).
    fn decompose(
        &self,
        points: &[Point3],
        container: &Container,
        precision: f64,
    ) -> Result<Vec<Option<RawCell>>>;
}
