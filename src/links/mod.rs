//! The link graph: one [`Link`] per cell-cell or cell-wall adjacency.
//!
//! Links live in a single slotmap arena owned by [`LinkGraph`]; every other
//! structure refers to them by [`LinkId`]. Neighbour lists are resolved in
//! a second construction pass, so a graph handed to a caller is complete.

mod build;
mod components;
mod field;
mod link;

pub use build::BuildLinks;
pub use components::{CellGraph, ComponentChange, UnionFind};
pub use field::{ConstantField, NoiseField, ResistanceField};
pub use link::{Link, LinkEnds, LinkId, LinkKey, LinkNeighbors, LinkSnapshot};

use std::collections::{BTreeMap, BTreeSet, HashMap};

use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::complex::{CellComplex, CellState, NeighborError};
use crate::error::{LinkError, Result, SimulationError};
use crate::geometry::WallId;
use crate::math::Point3;

/// What one cell face carries in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceSlot {
    /// The face carries a link.
    Link(LinkId),
    /// The face could not form a link.
    Error(NeighborError),
}

/// Counts and geometric extents gathered while building a [`LinkGraph`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkStats {
    pub wall_links: usize,
    pub internal_links: usize,
    /// Face slots skipped because their neighbour entry is an error.
    pub error_slots: usize,
    pub min_area: f64,
    pub max_area: f64,
    /// Mean link area, computed once over all links.
    pub average_area: f64,
    /// Per-axis minimum of link positions.
    pub bounds_min: Point3,
    /// Per-axis maximum of link positions.
    pub bounds_max: Point3,
}

impl Default for LinkStats {
    fn default() -> Self {
        Self {
            wall_links: 0,
            internal_links: 0,
            error_slots: 0,
            min_area: 0.0,
            max_area: 0.0,
            average_area: 0.0,
            bounds_min: Point3::origin(),
            bounds_max: Point3::origin(),
        }
    }
}

/// All links of a fracture with their cached neighbour lists and the
/// cell connectivity graph.
#[derive(Debug, Clone)]
pub struct LinkGraph {
    links: SlotMap<LinkId, Link>,
    order: Vec<LinkId>,
    by_key: HashMap<LinkKey, LinkId>,
    external: Vec<LinkId>,
    internal: Vec<LinkId>,
    wall_links: BTreeMap<WallId, Vec<LinkId>>,
    slots: Vec<Vec<Option<FaceSlot>>>,
    cells: CellGraph,
    stats: LinkStats,
}

impl LinkGraph {
    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` if the graph has no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Returns a link by id.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotFound`] if the id is stale.
    pub fn link(&self, id: LinkId) -> Result<&Link> {
        self.links
            .get(id)
            .ok_or_else(|| LinkError::NotFound("link".into()).into())
    }

    pub(crate) fn link_mut(&mut self, id: LinkId) -> Result<&mut Link> {
        self.links
            .get_mut(id)
            .ok_or_else(|| LinkError::NotFound("link".into()).into())
    }

    /// Returns the link with the given key.
    #[must_use]
    pub fn link_by_key(&self, key: LinkKey) -> Option<&Link> {
        self.id_of(key).and_then(|id| self.links.get(id))
    }

    /// Id of the link with the given key.
    #[must_use]
    pub fn id_of(&self, key: LinkKey) -> Option<LinkId> {
        self.by_key.get(&key).copied()
    }

    /// Looks up a link by key, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotFound`] if no link has this key.
    pub fn require(&self, key: LinkKey) -> Result<&Link> {
        self.link_by_key(key)
            .ok_or_else(|| LinkError::NotFound(key.to_string()).into())
    }

    /// Iterates over links in construction order.
    pub fn iter(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.order.iter().map(|&id| (id, &self.links[id]))
    }

    /// Cell-wall links in construction order.
    #[must_use]
    pub fn external(&self) -> &[LinkId] {
        &self.external
    }

    /// Cell-cell links in construction order.
    #[must_use]
    pub fn internal(&self) -> &[LinkId] {
        &self.internal
    }

    /// Per-face slots of a cell, in face order.
    #[must_use]
    pub fn face_slots(&self, cell: usize) -> &[Option<FaceSlot>] {
        self.slots.get(cell).map_or(&[], Vec::as_slice)
    }

    /// Distinct links carried by a cell's faces.
    #[must_use]
    pub fn links_of_cell(&self, cell: usize) -> Vec<LinkId> {
        let mut seen = BTreeSet::new();
        self.face_slots(cell)
            .iter()
            .filter_map(|slot| match slot {
                Some(FaceSlot::Link(id)) => Some(*id),
                _ => None,
            })
            .filter(|&id| seen.insert(self.links[id].key()))
            .collect()
    }

    /// Links lying on a wall.
    #[must_use]
    pub fn wall_links_of(&self, wall: WallId) -> &[LinkId] {
        self.wall_links.get(&wall).map_or(&[], Vec::as_slice)
    }

    /// Links whose life is used up.
    #[must_use]
    pub fn exhausted_links(&self) -> Vec<LinkId> {
        self.iter()
            .filter(|(_, l)| l.life() <= 0.0)
            .map(|(id, _)| id)
            .collect()
    }

    /// Construction statistics.
    #[must_use]
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Cell connectivity graph.
    #[must_use]
    pub fn cell_graph(&self) -> &CellGraph {
        &self.cells
    }

    /// Number of connected components of the cell graph.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.cells.component_count()
    }

    /// Cells of every component, ordered by smallest member.
    #[must_use]
    pub fn components(&self) -> Vec<BTreeSet<usize>> {
        self.cells.components()
    }

    /// Component label of a cell.
    #[must_use]
    pub fn component_of(&self, cell: usize) -> Option<usize> {
        self.cells.component_of(cell)
    }

    /// Detaches deleted cells and re-attaches restored ones.
    ///
    /// Does nothing and returns `None` when `deleted` matches the previous
    /// call.
    pub fn sanitize(&mut self, deleted: &BTreeSet<usize>) -> Option<ComponentChange> {
        let change = self.cells.sanitize(deleted)?;
        log_change(change);
        Some(change)
    }

    /// Recomputes connected components from scratch.
    pub fn recompute_components(&mut self) -> ComponentChange {
        let change = self.cells.recompute();
        log_change(change);
        change
    }

    /// Re-reads every link's air flag from the cell states.
    pub fn refresh_air(&mut self, complex: &CellComplex) {
        for link in self.links.values_mut() {
            link.air = link
                .ends
                .cells()
                .iter()
                .any(|&c| complex.cells()[c].state() == CellState::Air);
        }
    }

    /// Captures the simulation-mutable state of every link.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LinkSnapshot> {
        self.iter().map(|(_, l)| l.snapshot()).collect()
    }

    /// Restores state captured by [`Self::snapshot`].
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::BackupMismatch`] if the snapshot has a
    /// different link count.
    pub fn restore_snapshot(&mut self, snapshot: &[LinkSnapshot]) -> Result<()> {
        if snapshot.len() != self.order.len() {
            return Err(SimulationError::BackupMismatch(format!(
                "{} link snapshots for {} links",
                snapshot.len(),
                self.order.len()
            ))
            .into());
        }
        for (&id, s) in self.order.iter().zip(snapshot) {
            self.links[id].restore(s);
        }
        Ok(())
    }
}

fn log_change(change: ComponentChange) {
    if change.new_split() {
        warn!(before = change.before, after = change.after, "component count changed");
    } else {
        debug!(components = change.after, "components recomputed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::complex::BuildComplex;
    use crate::geometry::Container;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[allow(clippy::cast_precision_loss)]
    fn row(n: usize) -> (CellComplex, LinkGraph) {
        let container = Container::from_aabb(p(0.0, 0.0, 0.0), p(n as f64, 1.0, 1.0)).unwrap();
        let points = (0..n).map(|i| p(i as f64 + 0.5, 0.5, 0.5)).collect();
        let complex = BuildComplex::new(points, container).execute().unwrap();
        let graph = BuildLinks::new(&complex).execute().unwrap();
        (complex, graph)
    }

    #[test]
    fn row_of_cells_is_connected() {
        let (_, graph) = row(3);
        assert_eq!(graph.len(), 2 + 3 * 4 + 2);
        assert_eq!(graph.internal().len(), 2);
        assert_eq!(graph.component_count(), 1);
        assert_eq!(graph.components(), vec![BTreeSet::from([0, 1, 2])]);
        assert_eq!(graph.links_of_cell(1).len(), 6);
        assert_eq!(graph.wall_links_of(WallId(0)).len(), 1);
        assert_eq!(graph.wall_links_of(WallId(2)).len(), 3);
    }

    #[test]
    fn internal_keys_are_ordered() {
        let (_, graph) = row(4);
        for &id in graph.internal() {
            let key = graph.link(id).unwrap().key();
            assert!(key.lo() >= 0 && key.lo() < key.hi());
        }
        for &id in graph.external() {
            let key = graph.link(id).unwrap().key();
            assert!(key.lo() < 0 && key.hi() >= 0);
        }
    }

    #[test]
    fn sanitize_middle_cell_splits() {
        let (_, mut graph) = row(3);
        let change = graph.sanitize(&BTreeSet::from([1])).unwrap();
        assert_eq!(change, ComponentChange { before: 1, after: 3 });
        assert!(graph.sanitize(&BTreeSet::from([1])).is_none());
        let change = graph.sanitize(&BTreeSet::new()).unwrap();
        assert_eq!(change.after, 1);
    }

    #[test]
    fn refresh_air_follows_cell_state() {
        let (mut complex, mut graph) = row(2);
        assert!(graph.iter().all(|(_, l)| !l.is_air()));
        complex.mark_deleted(&[0]).unwrap();
        graph.refresh_air(&complex);
        assert!(graph.link_by_key(LinkKey::new(0, 1)).unwrap().is_air());
        let far = LinkKey::new(WallId(1).key_value(), 1);
        assert!(!graph.link_by_key(far).unwrap().is_air());
    }

    #[test]
    fn snapshot_restores_link_state() {
        let (_, mut graph) = row(2);
        let before = graph.snapshot();
        let id = graph.internal()[0];
        let link = graph.link_mut(id).unwrap();
        link.life = -0.5;
        link.picks = 3;
        assert_eq!(graph.exhausted_links(), vec![id]);
        graph.restore_snapshot(&before).unwrap();
        assert_eq!(graph.snapshot(), before);
        assert!(graph.restore_snapshot(&before[1..]).is_err());
    }

    #[test]
    fn unknown_key_is_not_found() {
        let (_, graph) = row(2);
        assert!(graph.require(LinkKey::new(0, 9)).is_err());
        assert!(graph.require(LinkKey::new(0, 1)).is_ok());
    }
}
