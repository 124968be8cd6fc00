use std::fmt;

use crate::error::{BuildError, Result};
use crate::math::{Point3, Vector3};

use super::HalfSpace;

/// Number of bounding planes every container starts with.
pub const BOUNDING_PLANES: usize = 6;

/// Identifier of a wall plane in a [`Container`].
///
/// Walls `0..6` are the bounding planes (`-x`, `+x`, `-y`, `+y`, `-z`, `+z`
/// for an axis-aligned box), further walls are user planes in the order
/// they were added. In link keys a wall is encoded as the negative value
/// `-(index + 1)`, so wall keys always sort before cell indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WallId(pub usize);

impl WallId {
    /// Signed key value used in link keys (always negative).
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn key_value(self) -> i64 {
        -(self.0 as i64) - 1
    }

    /// Recovers a wall id from a negative key value.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn from_key_value(value: i64) -> Option<Self> {
        (value < 0).then(|| Self((-(value + 1)) as usize))
    }

    /// Returns `true` for one of the six bounding planes.
    #[must_use]
    pub fn is_bounding(self) -> bool {
        self.0 < BOUNDING_PLANES
    }
}

impl fmt::Display for WallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wall#{}", self.0)
    }
}

/// The region cells are clipped to: six bounding planes plus extra walls.
#[derive(Debug, Clone)]
pub struct Container {
    walls: Vec<HalfSpace>,
}

impl Container {
    /// Creates a container from an axis-aligned box.
    ///
    /// # Errors
    ///
    /// Returns an error if the box is empty or not finite.
    pub fn from_aabb(min: Point3, max: Point3) -> Result<Self> {
        if (0..3).any(|i| !min[i].is_finite() || !max[i].is_finite() || min[i] >= max[i]) {
            return Err(BuildError::InvalidInput(format!(
                "bounding box min {min} must be strictly below max {max}"
            ))
            .into());
        }
        let walls = vec![
            HalfSpace::new(-Vector3::x(), -min.x)?,
            HalfSpace::new(Vector3::x(), max.x)?,
            HalfSpace::new(-Vector3::y(), -min.y)?,
            HalfSpace::new(Vector3::y(), max.y)?,
            HalfSpace::new(-Vector3::z(), -min.z)?,
            HalfSpace::new(Vector3::z(), max.z)?,
        ];
        Ok(Self { walls })
    }

    /// Creates a container from six arbitrary (e.g. oriented box) planes.
    #[must_use]
    pub fn from_planes(planes: [HalfSpace; BOUNDING_PLANES]) -> Self {
        Self {
            walls: planes.to_vec(),
        }
    }

    /// Appends extra wall planes after the bounding planes.
    #[must_use]
    pub fn with_walls(mut self, walls: impl IntoIterator<Item = HalfSpace>) -> Self {
        self.walls.extend(walls);
        self
    }

    /// Returns all walls, bounding planes first.
    #[must_use]
    pub fn walls(&self) -> &[HalfSpace] {
        &self.walls
    }

    /// Returns the wall with the given id.
    #[must_use]
    pub fn wall(&self, id: WallId) -> Option<&HalfSpace> {
        self.walls.get(id.0)
    }

    /// Iterates over `(WallId, &HalfSpace)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (WallId, &HalfSpace)> {
        self.walls.iter().enumerate().map(|(i, w)| (WallId(i), w))
    }

    /// Returns `true` if the point lies inside every wall (within `eps`).
    #[must_use]
    pub fn contains(&self, point: &Point3, eps: f64) -> bool {
        self.walls.iter().all(|w| w.contains(point, eps))
    }

    /// Largest absolute plane offset, a rough scale of the container.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.walls
            .iter()
            .map(|w| w.offset().abs())
            .fold(0.0, f64::max)
    }
}
