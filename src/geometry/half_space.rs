use serde::{Deserialize, Serialize};

use crate::error::{GeometryError, Result};
use crate::math::{is_finite_point, Point3, Vector3, TOLERANCE};

/// A closed half-space `normal · x <= offset` in 3D.
///
/// The normal is unit length and points out of the kept region, so the
/// bounding plane's outward direction is `normal`. Two in-plane directions
/// (`u_dir`, `v_dir`, with `u_dir × v_dir = normal`) are kept for projecting
/// points onto the plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct HalfSpace {
    normal: Vector3,
    offset: f64,
    u_dir: Vector3,
    v_dir: Vector3,
}

impl HalfSpace {
    /// Creates a half-space from an outward normal and a signed offset.
    ///
    /// The normal does not need to be unit length; the offset is rescaled
    /// with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the normal is zero-length or a value is not finite.
    pub fn new(normal: Vector3, offset: f64) -> Result<Self> {
        if !offset.is_finite() || normal.iter().any(|c| !c.is_finite()) {
            return Err(GeometryError::NonFinite("half-space").into());
        }
        let len = normal.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let normal = normal / len;

        // Choose a reference vector not parallel to the normal
        let reference = if normal.x.abs() < 0.9 {
            Vector3::new(1.0, 0.0, 0.0)
        } else {
            Vector3::new(0.0, 1.0, 0.0)
        };
        let u_dir = reference.cross(&normal).normalize();
        let v_dir = normal.cross(&u_dir);

        Ok(Self {
            normal,
            offset: offset / len,
            u_dir,
            v_dir,
        })
    }

    /// Creates a half-space whose boundary passes through `origin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the normal is zero-length or a value is not finite.
    pub fn through_point(origin: &Point3, normal: Vector3) -> Result<Self> {
        if !is_finite_point(origin) {
            return Err(GeometryError::NonFinite("half-space origin").into());
        }
        let len = normal.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Self::new(normal, origin.coords.dot(&normal))
    }

    /// The perpendicular bisector of `from → to`, keeping the side of `from`.
    ///
    /// # Errors
    ///
    /// Returns an error if the two points coincide.
    pub fn bisector(from: &Point3, to: &Point3) -> Result<Self> {
        let normal = to - from;
        if normal.norm() < TOLERANCE {
            return Err(GeometryError::Degenerate("bisector of coincident points".into()).into());
        }
        let mid = Point3::from((from.coords + to.coords) * 0.5);
        Self::through_point(&mid, normal)
    }

    /// Returns the unit outward normal.
    #[must_use]
    pub fn normal(&self) -> &Vector3 {
        &self.normal
    }

    /// Returns the signed offset of the boundary plane along the normal.
    #[must_use]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Returns the U direction in the boundary plane.
    #[must_use]
    pub fn u_dir(&self) -> &Vector3 {
        &self.u_dir
    }

    /// Returns the V direction in the boundary plane.
    #[must_use]
    pub fn v_dir(&self) -> &Vector3 {
        &self.v_dir
    }

    /// Signed distance of `point` to the boundary plane, positive outside.
    #[must_use]
    pub fn signed_distance(&self, point: &Point3) -> f64 {
        self.normal.dot(&point.coords) - self.offset
    }

    /// Returns `true` if the point lies inside or within `eps` of the boundary.
    #[must_use]
    pub fn contains(&self, point: &Point3, eps: f64) -> bool {
        self.signed_distance(point) <= eps
    }

    /// Projects a point onto the `(u, v)` frame of the boundary plane.
    #[must_use]
    pub fn project_to_uv(&self, point: &Point3) -> (f64, f64) {
        (point.coords.dot(&self.u_dir), point.coords.dot(&self.v_dir))
    }
}

impl TryFrom<[f64; 4]> for HalfSpace {
    type Error = crate::error::FissuraError;

    fn try_from(value: [f64; 4]) -> Result<Self> {
        Self::new(Vector3::new(value[0], value[1], value[2]), value[3])
    }
}

impl From<HalfSpace> for [f64; 4] {
    fn from(h: HalfSpace) -> Self {
        [h.normal.x, h.normal.y, h.normal.z, h.offset]
    }
}
