use serde::{Deserialize, Serialize};

use crate::math::{Point3, Vector3};

use super::NeighborRef;

/// Whether a cell's geometry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Presence {
    /// Built and present.
    Found,
    /// Construction failed for this generator.
    Missing,
    /// Built, then removed by the host.
    Deleted,
}

/// Material state of a cell as seen by the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    /// Solid material touching at least one wall.
    Solid,
    /// Solid material with no wall face.
    Core,
    /// Open air (missing or deleted).
    Air,
}

/// Indexed polygon mesh of one convex cell.
#[derive(Debug, Clone, Default)]
pub struct CellMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Face vertex loops, wound counter-clockwise seen from outside.
    pub faces: Vec<Vec<usize>>,
}

impl CellMesh {
    /// Positions of one face's vertex loop.
    #[must_use]
    pub fn face_points(&self, face: usize) -> Vec<Point3> {
        self.faces
            .get(face)
            .map(|l| l.iter().map(|&i| self.vertices[i]).collect())
            .unwrap_or_default()
    }
}

/// Precomputed geometry of one face.
#[derive(Debug, Clone, Copy)]
pub struct FaceGeometry {
    /// Vertex-average centre.
    pub centroid: Point3,
    /// Unit outward normal (zero for degenerate faces).
    pub normal: Vector3,
    /// Planar area.
    pub area: f64,
}

/// One cell of the complex, indexed like its generator point.
#[derive(Debug, Clone)]
pub struct Cell {
    pub(super) index: usize,
    pub(super) generator: Point3,
    pub(super) presence: Presence,
    pub(super) state: CellState,
    pub(super) base_state: CellState,
    pub(super) mesh: CellMesh,
    pub(super) faces: Vec<FaceGeometry>,
    pub(super) neighbors: Vec<NeighborRef>,
    pub(super) matching: Vec<Option<usize>>,
    pub(super) centroid: Point3,
    pub(super) volume: f64,
}

impl Cell {
    pub(super) fn missing(index: usize, generator: Point3) -> Self {
        Self {
            index,
            generator,
            presence: Presence::Missing,
            state: CellState::Air,
            base_state: CellState::Air,
            mesh: CellMesh::default(),
            faces: Vec::new(),
            neighbors: Vec::new(),
            matching: Vec::new(),
            centroid: generator,
            volume: 0.0,
        }
    }

    /// Index of the cell (same as its generator point).
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The generator point.
    #[must_use]
    pub fn generator(&self) -> &Point3 {
        &self.generator
    }

    /// Presence status.
    #[must_use]
    pub fn presence(&self) -> Presence {
        self.presence
    }

    /// Current material state.
    #[must_use]
    pub fn state(&self) -> CellState {
        self.state
    }

    /// Returns `true` if the cell is built and not deleted.
    #[must_use]
    pub fn is_found(&self) -> bool {
        self.presence == Presence::Found
    }

    /// Polygon mesh (empty for missing cells).
    #[must_use]
    pub fn mesh(&self) -> &CellMesh {
        &self.mesh
    }

    /// Geometry of each face, in face order.
    #[must_use]
    pub fn faces(&self) -> &[FaceGeometry] {
        &self.faces
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Stored neighbour entries, without the deletion overlay.
    #[must_use]
    pub fn raw_neighbors(&self) -> &[NeighborRef] {
        &self.neighbors
    }

    /// Centre of the cell's vertices.
    #[must_use]
    pub fn centroid(&self) -> &Point3 {
        &self.centroid
    }

    /// Enclosed volume.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.volume
    }
}
