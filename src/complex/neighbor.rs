use std::fmt;

use crate::geometry::WallId;

/// Why a face slot cannot form a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NeighborError {
    /// The neighbouring cell failed to build.
    Missing,
    /// The neighbouring cell has no face pointing back.
    Asymmetry,
    /// The neighbouring cell was deleted after construction.
    Deleted,
}

impl fmt::Display for NeighborError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Missing => "missing",
            Self::Asymmetry => "asymmetry",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// What lies across one face of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeighborRef {
    /// A found cell with a reciprocal face.
    Cell(usize),
    /// A container wall.
    Wall(WallId),
    /// No usable neighbour.
    Error(NeighborError),
}

impl NeighborRef {
    /// Signed key value: cell index, negative wall value, or `None` for errors.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn key_value(self) -> Option<i64> {
        match self {
            Self::Cell(i) => Some(i as i64),
            Self::Wall(w) => Some(w.key_value()),
            Self::Error(_) => None,
        }
    }

    /// Returns the error kind, if any.
    #[must_use]
    pub fn error(self) -> Option<NeighborError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if this slot points at a wall.
    #[must_use]
    pub fn is_wall(self) -> bool {
        matches!(self, Self::Wall(_))
    }
}

impl fmt::Display for NeighborRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cell(i) => write!(f, "cell#{i}"),
            Self::Wall(w) => write!(f, "{w}"),
            Self::Error(e) => write!(f, "error({e})"),
        }
    }
}
