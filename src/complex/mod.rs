//! The cell complex: one convex cell per generator point.
//!
//! Raw decomposition output is validated and interpreted here. Every face
//! slot gets a [`NeighborRef`]; a face pointing at another cell is only a
//! usable neighbour if that cell exists and has a face pointing back.
//! Failures are tagged per entity, never raised.

mod build;
mod cell;
mod neighbor;

pub use build::{BuildComplex, DEFAULT_PRECISION};
pub use cell::{Cell, CellMesh, CellState, FaceGeometry, Presence};
pub use neighbor::{NeighborError, NeighborRef};

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::error::{BuildError, Result};
use crate::geometry::Container;
use crate::math::polygon_3d::{polygon_area_3d, polygon_centroid, polygon_normal, polyhedron_volume};
use crate::math::{Point3, Vector3};
use crate::voronoi::{RawCell, RawNeighbor};

/// Aggregated outcome counts of a complex construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplexReport {
    /// Number of generator points.
    pub cells: usize,
    /// Cells that were built.
    pub found: usize,
    /// Cells that failed to build.
    pub missing: usize,
    /// Face slots pointing at a missing cell.
    pub missing_entries: usize,
    /// Face slots whose neighbour has no face pointing back.
    pub asymmetry_entries: usize,
}

/// Snapshot of per-cell presence and state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellStates(Vec<(Presence, CellState)>);

/// A bounded decomposition of space into convex cells.
#[derive(Debug, Clone)]
pub struct CellComplex {
    container: Container,
    precision: f64,
    cells: Vec<Cell>,
    deleted: BTreeSet<usize>,
    report: ComplexReport,
}

impl CellComplex {
    /// Interprets raw decomposition output, one entry per generator point.
    ///
    /// Malformed raw cells (face/neighbour count mismatch, out-of-range
    /// indices) are downgraded to missing.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidInput`] if `raw` and `points` differ in
    /// length and [`BuildError::EmptyResult`] if no cell was built.
    pub fn from_raw_cells(
        points: &[Point3],
        container: Container,
        precision: f64,
        raw: Vec<Option<RawCell>>,
    ) -> Result<Self> {
        if raw.len() != points.len() {
            return Err(BuildError::InvalidInput(format!(
                "{} raw cells for {} generator points",
                raw.len(),
                points.len()
            ))
            .into());
        }

        let n = points.len();
        let wall_count = container.walls().len();
        let raw: Vec<Option<RawCell>> = raw
            .into_iter()
            .enumerate()
            .map(|(i, cell)| {
                cell.filter(|c| {
                    let ok = is_well_formed(i, c, n, wall_count);
                    if !ok {
                        warn!(cell = i, "malformed raw cell treated as missing");
                    }
                    ok
                })
            })
            .collect();

        let mut report = ComplexReport {
            cells: n,
            ..ComplexReport::default()
        };
        let mut cells = Vec::with_capacity(n);
        for (i, entry) in raw.iter().enumerate() {
            let Some(rc) = entry else {
                report.missing += 1;
                cells.push(Cell::missing(i, points[i]));
                continue;
            };
            report.found += 1;

            let mut neighbors = Vec::with_capacity(rc.neighbors.len());
            let mut matching = Vec::with_capacity(rc.neighbors.len());
            for &nb in &rc.neighbors {
                let (resolved, back) = resolve_neighbor(i, nb, &raw);
                match resolved {
                    NeighborRef::Error(NeighborError::Missing) => report.missing_entries += 1,
                    NeighborRef::Error(NeighborError::Asymmetry) => report.asymmetry_entries += 1,
                    _ => {}
                }
                neighbors.push(resolved);
                matching.push(back);
            }
            cells.push(found_cell(i, points[i], rc, neighbors, matching));
        }

        if report.found == 0 {
            return Err(BuildError::EmptyResult.into());
        }
        info!(
            found = report.found,
            missing = report.missing,
            missing_entries = report.missing_entries,
            asymmetry_entries = report.asymmetry_entries,
            "cell complex built"
        );

        Ok(Self {
            container,
            precision,
            cells,
            deleted: BTreeSet::new(),
            report,
        })
    }

    /// Number of cells (found or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the complex has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The container the cells were clipped to.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Geometric precision forwarded to the decomposition.
    #[must_use]
    pub fn precision(&self) -> f64 {
        self.precision
    }

    /// Construction counts.
    #[must_use]
    pub fn report(&self) -> &ComplexReport {
        &self.report
    }

    /// All cells in generator order.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Iterates over found (built and not deleted) cells.
    pub fn found_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| c.is_found())
    }

    /// Returns a cell by index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range.
    pub fn cell(&self, index: usize) -> Result<&Cell> {
        self.cells.get(index).ok_or_else(|| {
            BuildError::CellOutOfRange {
                index,
                count: self.cells.len(),
            }
            .into()
        })
    }

    /// Neighbour entries of a cell, one per face in face order.
    ///
    /// Entries pointing at a deleted cell read as
    /// [`NeighborError::Deleted`]; the stored data is not modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range.
    pub fn neighbors_of(&self, index: usize) -> Result<Vec<NeighborRef>> {
        let cell = self.cell(index)?;
        Ok(cell
            .neighbors
            .iter()
            .map(|&nb| self.with_deletion(nb))
            .collect())
    }

    /// Neighbour entry of one face, with the deletion overlay.
    #[must_use]
    pub fn neighbor(&self, index: usize, face: usize) -> Option<NeighborRef> {
        let nb = *self.cells.get(index)?.neighbors.get(face)?;
        Some(self.with_deletion(nb))
    }

    /// Index of the reciprocal face on the neighbouring cell.
    #[must_use]
    pub fn matching_face(&self, index: usize, face: usize) -> Option<usize> {
        *self.cells.get(index)?.matching.get(face)?
    }

    fn with_deletion(&self, nb: NeighborRef) -> NeighborRef {
        match nb {
            NeighborRef::Cell(j) if self.cells[j].presence == Presence::Deleted => {
                NeighborRef::Error(NeighborError::Deleted)
            }
            other => other,
        }
    }

    /// Marks found cells as deleted; their state becomes air.
    ///
    /// Missing cells are skipped, already deleted cells are left alone.
    /// Returns the cells that changed.
    ///
    /// # Errors
    ///
    /// Returns an error, without changing anything, if an index is out of range.
    pub fn mark_deleted(&mut self, indices: &[usize]) -> Result<Vec<usize>> {
        self.check_indices(indices)?;
        let mut changed = Vec::new();
        for &i in indices {
            let cell = &mut self.cells[i];
            match cell.presence {
                Presence::Found => {
                    cell.presence = Presence::Deleted;
                    cell.state = CellState::Air;
                    self.deleted.insert(i);
                    changed.push(i);
                }
                Presence::Missing => warn!(cell = i, "cannot delete a missing cell"),
                Presence::Deleted => {}
            }
        }
        Ok(changed)
    }

    /// Brings deleted cells back with their original state.
    ///
    /// Returns the cells that changed.
    ///
    /// # Errors
    ///
    /// Returns an error, without changing anything, if an index is out of range.
    pub fn restore_deleted(&mut self, indices: &[usize]) -> Result<Vec<usize>> {
        self.check_indices(indices)?;
        let mut changed = Vec::new();
        for &i in indices {
            let cell = &mut self.cells[i];
            if cell.presence == Presence::Deleted {
                cell.presence = Presence::Found;
                cell.state = cell.base_state;
                self.deleted.remove(&i);
                changed.push(i);
            }
        }
        Ok(changed)
    }

    /// Indices of deleted cells.
    #[must_use]
    pub fn deleted(&self) -> &BTreeSet<usize> {
        &self.deleted
    }

    /// Captures every cell's presence and state.
    #[must_use]
    pub fn cell_states(&self) -> CellStates {
        CellStates(self.cells.iter().map(|c| (c.presence, c.state)).collect())
    }

    /// Restores presence and state captured by [`Self::cell_states`].
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot has a different cell count.
    pub fn restore_cell_states(&mut self, states: &CellStates) -> Result<()> {
        if states.0.len() != self.cells.len() {
            return Err(BuildError::InvalidInput(format!(
                "cell state snapshot has {} cells, complex has {}",
                states.0.len(),
                self.cells.len()
            ))
            .into());
        }
        self.deleted.clear();
        for (cell, &(presence, state)) in self.cells.iter_mut().zip(&states.0) {
            cell.presence = presence;
            cell.state = state;
            if presence == Presence::Deleted {
                self.deleted.insert(cell.index);
            }
        }
        Ok(())
    }

    fn check_indices(&self, indices: &[usize]) -> Result<()> {
        if let Some(&index) = indices.iter().find(|&&i| i >= self.cells.len()) {
            return Err(BuildError::CellOutOfRange {
                index,
                count: self.cells.len(),
            }
            .into());
        }
        Ok(())
    }
}

fn is_well_formed(index: usize, cell: &RawCell, cell_count: usize, wall_count: usize) -> bool {
    cell.faces.len() == cell.neighbors.len()
        && !cell.faces.is_empty()
        && cell
            .faces
            .iter()
            .all(|f| f.len() >= 3 && f.iter().all(|&v| v < cell.vertices.len()))
        && cell.neighbors.iter().all(|nb| match *nb {
            RawNeighbor::Cell(j) => j < cell_count && j != index,
            RawNeighbor::Wall(w) => w.0 < wall_count,
        })
}

/// Resolves one raw face slot of `index` against the other cells.
fn resolve_neighbor(
    index: usize,
    nb: RawNeighbor,
    raw: &[Option<RawCell>],
) -> (NeighborRef, Option<usize>) {
    match nb {
        RawNeighbor::Wall(w) => (NeighborRef::Wall(w), None),
        RawNeighbor::Cell(j) => match &raw[j] {
            None => (NeighborRef::Error(NeighborError::Missing), None),
            Some(other) => match other
                .neighbors
                .iter()
                .position(|&back| back == RawNeighbor::Cell(index))
            {
                Some(face) => (NeighborRef::Cell(j), Some(face)),
                None => (NeighborRef::Error(NeighborError::Asymmetry), None),
            },
        },
    }
}

fn found_cell(
    index: usize,
    generator: Point3,
    raw: &RawCell,
    neighbors: Vec<NeighborRef>,
    matching: Vec<Option<usize>>,
) -> Cell {
    let mesh = CellMesh {
        vertices: raw.vertices.clone(),
        faces: raw.faces.clone(),
    };
    let faces = (0..mesh.faces.len())
        .map(|f| {
            let points = mesh.face_points(f);
            let normal = polygon_normal(&points).unwrap_or_else(Vector3::zeros);
            FaceGeometry {
                centroid: polygon_centroid(&points),
                normal,
                area: polygon_area_3d(&points, &normal),
            }
        })
        .collect();
    let state = if raw.neighbors.iter().any(|nb| matches!(nb, RawNeighbor::Wall(_))) {
        CellState::Solid
    } else {
        CellState::Core
    };
    Cell {
        index,
        generator,
        presence: Presence::Found,
        state,
        base_state: state,
        centroid: polygon_centroid(&mesh.vertices),
        volume: polyhedron_volume(&mesh.vertices, &mesh.faces),
        mesh,
        faces,
        neighbors,
        matching,
    }
}
