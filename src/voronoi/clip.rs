use std::cmp::Ordering;

use crate::geometry::HalfSpace;
use crate::math::polygon_3d::{polygon_area_3d, polygon_centroid};
use crate::math::{Point3, Vector3};

use super::{RawCell, RawNeighbor};

/// Origin of a polyhedron face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceTag {
    /// A face of the initial seed cube, not yet cut away.
    Seed,
    /// A face produced by clipping against a neighbour's plane.
    Neighbor(RawNeighbor),
}

/// Result of clipping a polyhedron by a half-space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOutcome {
    /// The polyhedron lies inside the half-space.
    Unchanged,
    /// Part of the polyhedron was cut away and a cap face was added.
    Clipped,
    /// Nothing of positive volume remains.
    Emptied,
}

#[derive(Debug, Clone)]
struct ClipFace {
    polygon: Vec<Point3>,
    tag: FaceTag,
}

/// A convex polyhedron stored as independent tagged face polygons.
///
/// Faces are wound counter-clockwise seen from outside. Clipping is
/// Sutherland-Hodgman per face followed by a cap polygon built from the
/// on-plane vertices.
#[derive(Debug, Clone)]
pub struct ConvexPolyhedron {
    faces: Vec<ClipFace>,
    eps: f64,
}

impl ConvexPolyhedron {
    /// Creates an axis-aligned cube with all faces tagged [`FaceTag::Seed`].
    #[must_use]
    pub fn cube(center: &Point3, half: f64, eps: f64) -> Self {
        let c = |x: f64, y: f64, z: f64| center + Vector3::new(x, y, z) * half;
        let corners = [
            c(-1.0, -1.0, -1.0),
            c(1.0, -1.0, -1.0),
            c(1.0, 1.0, -1.0),
            c(-1.0, 1.0, -1.0),
            c(-1.0, -1.0, 1.0),
            c(1.0, -1.0, 1.0),
            c(1.0, 1.0, 1.0),
            c(-1.0, 1.0, 1.0),
        ];
        let loops: [[usize; 4]; 6] = [
            [0, 4, 7, 3],
            [1, 2, 6, 5],
            [0, 1, 5, 4],
            [2, 3, 7, 6],
            [0, 3, 2, 1],
            [4, 5, 6, 7],
        ];
        let faces = loops
            .iter()
            .map(|l| ClipFace {
                polygon: l.iter().map(|&i| corners[i]).collect(),
                tag: FaceTag::Seed,
            })
            .collect();
        Self { faces, eps }
    }

    /// Returns `true` if no volume remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.len() < 4
    }

    /// Geometric tolerance used for clipping and welding.
    #[must_use]
    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Returns `true` if any face still carries the given tag.
    #[must_use]
    pub fn has_tag(&self, tag: FaceTag) -> bool {
        self.faces.iter().any(|f| f.tag == tag)
    }

    /// Largest squared distance from `center` to a vertex.
    #[must_use]
    pub fn max_radius_sq(&self, center: &Point3) -> f64 {
        self.faces
            .iter()
            .flat_map(|f| f.polygon.iter())
            .map(|v| (v - center).norm_squared())
            .fold(0.0, f64::max)
    }

    /// Clips the polyhedron to the half-space, tagging the new face.
    pub fn clip(&mut self, plane: &HalfSpace, tag: FaceTag) -> ClipOutcome {
        let eps = self.eps;
        let mut any_outside = false;
        let mut any_inside = false;
        for v in self.faces.iter().flat_map(|f| f.polygon.iter()) {
            let s = plane.signed_distance(v);
            any_outside |= s > eps;
            any_inside |= s < -eps;
        }
        if !any_outside {
            return ClipOutcome::Unchanged;
        }
        if !any_inside {
            self.faces.clear();
            return ClipOutcome::Emptied;
        }

        let mut kept = Vec::with_capacity(self.faces.len() + 1);
        let mut face_on_plane = false;
        for face in &self.faces {
            let polygon = clip_polygon(&face.polygon, plane, eps);
            if polygon.len() < 3 {
                continue;
            }
            if polygon.iter().all(|v| plane.signed_distance(v).abs() <= eps) {
                face_on_plane = true;
            }
            kept.push(ClipFace {
                polygon,
                tag: face.tag,
            });
        }

        if !face_on_plane {
            if let Some(cap) = cap_polygon(&kept, plane, eps) {
                kept.push(ClipFace { polygon: cap, tag });
            }
        }

        self.faces = kept;
        if self.is_empty() {
            self.faces.clear();
            return ClipOutcome::Emptied;
        }
        ClipOutcome::Clipped
    }

    /// Welds shared vertices and converts to an indexed raw cell.
    ///
    /// Returns `None` if a face still carries the seed tag.
    #[must_use]
    pub fn into_raw(self) -> Option<RawCell> {
        let eps_sq = self.eps * self.eps;
        let mut raw = RawCell::default();
        for face in self.faces {
            let FaceTag::Neighbor(neighbor) = face.tag else {
                return None;
            };
            let mut loop_ids: Vec<usize> = Vec::with_capacity(face.polygon.len());
            for p in &face.polygon {
                let id = match raw
                    .vertices
                    .iter()
                    .position(|v| (v - p).norm_squared() <= eps_sq)
                {
                    Some(id) => id,
                    None => {
                        raw.vertices.push(*p);
                        raw.vertices.len() - 1
                    }
                };
                if loop_ids.last() != Some(&id) {
                    loop_ids.push(id);
                }
            }
            while loop_ids.len() > 1 && loop_ids.first() == loop_ids.last() {
                loop_ids.pop();
            }
            if loop_ids.len() < 3 {
                continue;
            }
            raw.faces.push(loop_ids);
            raw.neighbors.push(neighbor);
        }
        Some(raw)
    }
}

/// Sutherland-Hodgman clip of one polygon against `signed_distance <= eps`.
fn clip_polygon(polygon: &[Point3], plane: &HalfSpace, eps: f64) -> Vec<Point3> {
    let n = polygon.len();
    let mut out: Vec<Point3> = Vec::with_capacity(n + 1);
    let push = |p: Point3, out: &mut Vec<Point3>| {
        if !out.last().is_some_and(|q| (q - p).norm() <= eps) {
            out.push(p);
        }
    };
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        let sa = plane.signed_distance(&a);
        let sb = plane.signed_distance(&b);
        if sa <= eps {
            push(a, &mut out);
        }
        if (sa < -eps && sb > eps) || (sa > eps && sb < -eps) {
            let t = sa / (sa - sb);
            push(a + (b - a) * t, &mut out);
        }
    }
    while out.len() > 1 && out.first().zip(out.last()).is_some_and(|(f, l)| (f - l).norm() <= eps) {
        out.pop();
    }
    out
}

/// Builds the cap face from the on-plane vertices of the kept faces.
fn cap_polygon(faces: &[ClipFace], plane: &HalfSpace, eps: f64) -> Option<Vec<Point3>> {
    let mut points: Vec<Point3> = Vec::new();
    for v in faces.iter().flat_map(|f| f.polygon.iter()) {
        if plane.signed_distance(v).abs() <= eps && !points.iter().any(|q| (q - v).norm() <= eps) {
            points.push(*v);
        }
    }
    if points.len() < 3 {
        return None;
    }

    let center = polygon_centroid(&points);
    let (cu, cv) = plane.project_to_uv(&center);
    let mut keyed: Vec<(f64, Point3)> = points
        .into_iter()
        .map(|p| {
            let (u, v) = plane.project_to_uv(&p);
            ((v - cv).atan2(u - cu), p)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    let polygon: Vec<Point3> = keyed.into_iter().map(|(_, p)| p).collect();

    if polygon_area_3d(&polygon, plane.normal()) <= eps * eps {
        return None;
    }
    Some(polygon)
}
