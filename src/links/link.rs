use std::fmt;

use crate::complex::{NeighborError, NeighborRef};
use crate::geometry::WallId;
use crate::math::{Point3, Vector3};

slotmap::new_key_type! {
    /// Unique identifier for a link in a [`super::LinkGraph`].
    pub struct LinkId;
}

/// Order-independent key of a link.
///
/// Walls are encoded as negative values, so `lo` is the wall for every
/// cell-wall link and the smaller cell index for every cell-cell link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkKey {
    lo: i64,
    hi: i64,
}

impl LinkKey {
    /// Creates the key of the unordered pair `{a, b}`.
    #[must_use]
    pub fn new(a: i64, b: i64) -> Self {
        Self {
            lo: a.min(b),
            hi: a.max(b),
        }
    }

    /// Key between a cell and what lies across one of its faces.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn between(cell: usize, neighbor: NeighborRef) -> Option<Self> {
        neighbor.key_value().map(|v| Self::new(cell as i64, v))
    }

    /// Smaller key value (the wall for wall links).
    #[must_use]
    pub fn lo(&self) -> i64 {
        self.lo
    }

    /// Larger key value.
    #[must_use]
    pub fn hi(&self) -> i64 {
        self.hi
    }

    /// Returns `true` for a cell-wall key.
    #[must_use]
    pub fn is_wall(&self) -> bool {
        self.lo < 0
    }

    /// The wall of a cell-wall key.
    #[must_use]
    pub fn wall(&self) -> Option<WallId> {
        WallId::from_key_value(self.lo)
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lo, self.hi)
    }
}

/// The two things a link joins, with the face on each cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEnds {
    /// A cell face lying on a wall.
    Wall { wall: WallId, cell: usize, face: usize },
    /// A face shared by two cells; `a < b`.
    Cells {
        a: usize,
        face_a: usize,
        b: usize,
        face_b: usize,
    },
}

impl LinkEnds {
    /// Cells bounding the link (one for wall links, two otherwise).
    #[must_use]
    pub fn cells(&self) -> Vec<usize> {
        match *self {
            Self::Wall { cell, .. } => vec![cell],
            Self::Cells { a, b, .. } => vec![a, b],
        }
    }

    /// `(cell, face)` slots that carry this link.
    #[must_use]
    pub fn slots(&self) -> Vec<(usize, usize)> {
        match *self {
            Self::Wall { cell, face, .. } => vec![(cell, face)],
            Self::Cells {
                a,
                face_a,
                b,
                face_b,
            } => vec![(a, face_a), (b, face_b)],
        }
    }
}

/// Links reachable from a link by crossing to an adjacent face.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkNeighbors {
    /// Adjacent cell-cell links.
    pub cell_cell: Vec<LinkId>,
    /// Adjacent cell-wall links.
    pub cell_wall: Vec<LinkId>,
    /// Adjacent face slots that carry no link.
    pub errors: Vec<NeighborError>,
}

impl LinkNeighbors {
    /// Traversal candidates: cell-cell links first, then cell-wall links.
    pub fn candidates(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.cell_cell.iter().chain(self.cell_wall.iter()).copied()
    }

    /// Number of traversal candidates.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.cell_cell.len() + self.cell_wall.len()
    }
}

/// Per-link simulation state captured by a backup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkSnapshot {
    pub life: f64,
    pub picks: u32,
    pub picks_entry: u32,
    pub air: bool,
}

/// Adjacency between two cells, or between a cell and a wall.
#[derive(Debug, Clone)]
pub struct Link {
    pub(super) key: LinkKey,
    pub(super) ends: LinkEnds,
    pub(super) position: Point3,
    pub(super) direction: Vector3,
    pub(super) area: f64,
    pub(super) area_factor: f64,
    pub(super) resistance: f64,
    pub(super) neighbors: Option<LinkNeighbors>,
    pub(crate) life: f64,
    pub(crate) picks: u32,
    pub(crate) picks_entry: u32,
    pub(crate) air: bool,
}

impl Link {
    /// The link key.
    #[must_use]
    pub fn key(&self) -> LinkKey {
        self.key
    }

    /// What the link joins.
    #[must_use]
    pub fn ends(&self) -> &LinkEnds {
        &self.ends
    }

    /// Returns `true` for a cell-wall link.
    #[must_use]
    pub fn is_wall(&self) -> bool {
        self.key.is_wall()
    }

    /// Centre of the shared face.
    #[must_use]
    pub fn position(&self) -> &Point3 {
        &self.position
    }

    /// Unit face normal, pointing from the lower cell to the higher cell or
    /// out of the cell towards the wall.
    #[must_use]
    pub fn direction(&self) -> &Vector3 {
        &self.direction
    }

    /// Area of the shared face.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Area relative to the graph-average link area.
    #[must_use]
    pub fn area_factor(&self) -> f64 {
        self.area_factor
    }

    /// Resistance in `[0, 1]` sampled from the resistance field.
    #[must_use]
    pub fn resistance(&self) -> f64 {
        self.resistance
    }

    /// Remaining integrity; may go below zero.
    #[must_use]
    pub fn life(&self) -> f64 {
        self.life
    }

    /// Life clamped to `[0, 1]`.
    #[must_use]
    pub fn life_clamped(&self) -> f64 {
        self.life.clamp(0.0, 1.0)
    }

    /// Times traversed.
    #[must_use]
    pub fn picks(&self) -> u32 {
        self.picks
    }

    /// Times chosen as an entry.
    #[must_use]
    pub fn picks_entry(&self) -> u32 {
        self.picks_entry
    }

    /// Returns `true` if a bounding cell is air.
    #[must_use]
    pub fn is_air(&self) -> bool {
        self.air
    }

    /// Cached neighbour links; `None` until the graph resolved them.
    #[must_use]
    pub fn neighbors(&self) -> Option<&LinkNeighbors> {
        self.neighbors.as_ref()
    }

    /// Captures the simulation-mutable fields.
    #[must_use]
    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            life: self.life,
            picks: self.picks,
            picks_entry: self.picks_entry,
            air: self.air,
        }
    }

    pub(crate) fn restore(&mut self, snapshot: &LinkSnapshot) {
        self.life = snapshot.life;
        self.picks = snapshot.picks;
        self.picks_entry = snapshot.picks_entry;
        self.air = snapshot.air;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_order_independent() {
        assert_eq!(LinkKey::new(3, 1), LinkKey::new(1, 3));
        let k = LinkKey::new(5, 2);
        assert_eq!((k.lo(), k.hi()), (2, 5));
    }

    #[test]
    fn wall_sorts_first() {
        let k = LinkKey::between(4, NeighborRef::Wall(WallId(2))).unwrap();
        assert_eq!((k.lo(), k.hi()), (-3, 4));
        assert!(k.is_wall());
        assert_eq!(k.wall(), Some(WallId(2)));
        assert!(LinkKey::between(4, NeighborRef::Error(NeighborError::Missing)).is_none());
    }

    #[test]
    fn cell_zero_is_not_a_wall() {
        let k = LinkKey::between(0, NeighborRef::Cell(1)).unwrap();
        assert!(!k.is_wall());
        assert_eq!(k.wall(), None);
        assert_eq!(k.to_string(), "(0, 1)");
    }
}
