use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::error::{BuildError, Result};
use crate::geometry::{Container, HalfSpace};
use crate::math::polygon_3d::polyhedron_volume;
use crate::math::{is_finite_point, Point3};

use super::{CellDecomposer, ClipOutcome, ConvexPolyhedron, FaceTag, RawCell, RawNeighbor};

/// Builds each cell by clipping the container with neighbour bisectors.
///
/// The container polyhedron is computed once by clipping a large seed cube
/// with every wall. Each cell then clips a copy of it with the bisector of
/// every other generator, nearest first, and stops once the next bisector
/// lies beyond the cell's current radius.
///
/// Generators outside the container and generators coinciding (within the
/// precision) with an earlier one get no cell and do not cut others.
/// Generators whose cell collapses to zero volume do cut their neighbours,
/// so the neighbours keep a face pointing at a missing cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfSpaceClipper;

impl CellDecomposer for HalfSpaceClipper {
    fn decompose(
        &self,
        points: &[Point3],
        container: &Container,
        precision: f64,
    ) -> Result<Vec<Option<RawCell>>> {
        let base = container_polyhedron(points, container, precision)?;
        let active = active_generators(points, container, precision);
        let inactive = active.iter().filter(|a| !**a).count();
        if inactive > 0 {
            warn!(inactive, "generators outside the container or duplicated");
        }

        let cells = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if !active[i] {
                    return None;
                }
                let cell = clip_cell(i, p, points, &active, &base);
                if cell.is_none() {
                    debug!(cell = i, "cell collapsed during clipping");
                }
                cell
            })
            .collect();
        Ok(cells)
    }
}

/// Clips a seed cube with every container wall.
fn container_polyhedron(
    points: &[Point3],
    container: &Container,
    precision: f64,
) -> Result<ConvexPolyhedron> {
    let extent = points
        .iter()
        .flat_map(|p| p.coords.iter().copied())
        .map(f64::abs)
        .fold(container.scale(), f64::max);
    let half = 100.0 * (extent + 1.0);

    let mut poly = ConvexPolyhedron::cube(&Point3::origin(), half, precision);
    for (id, wall) in container.iter() {
        if poly.clip(wall, FaceTag::Neighbor(RawNeighbor::Wall(id))) == ClipOutcome::Emptied {
            return Err(BuildError::InvalidInput("container walls enclose no volume".into()).into());
        }
    }
    if poly.has_tag(FaceTag::Seed) {
        return Err(BuildError::InvalidInput("container walls do not bound a finite region".into()).into());
    }
    Ok(poly)
}

/// Flags generators that take part in the decomposition.
fn active_generators(points: &[Point3], container: &Container, precision: f64) -> Vec<bool> {
    let mut active = vec![false; points.len()];
    for (i, p) in points.iter().enumerate() {
        if !is_finite_point(p) || !container.contains(p, precision) {
            continue;
        }
        let duplicate = points[..i]
            .iter()
            .zip(&active)
            .any(|(q, &a)| a && (p - q).norm() <= precision);
        active[i] = !duplicate;
    }
    active
}

fn clip_cell(
    index: usize,
    center: &Point3,
    points: &[Point3],
    active: &[bool],
    base: &ConvexPolyhedron,
) -> Option<RawCell> {
    let mut others: Vec<(f64, usize)> = points
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != index && active[j])
        .map(|(j, q)| ((q - center).norm_squared(), j))
        .collect();
    others.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut poly = base.clone();
    let mut radius_sq = poly.max_radius_sq(center);
    for (dist_sq, j) in others {
        // Bisector sits at half the distance; nothing further can cut.
        if dist_sq > 4.0 * radius_sq {
            break;
        }
        let Ok(plane) = HalfSpace::bisector(center, &points[j]) else {
            continue;
        };
        match poly.clip(&plane, FaceTag::Neighbor(RawNeighbor::Cell(j))) {
            ClipOutcome::Unchanged => {}
            ClipOutcome::Clipped => radius_sq = poly.max_radius_sq(center),
            ClipOutcome::Emptied => return None,
        }
    }

    let eps = base.eps();
    let raw = poly.into_raw()?;
    let volume = polyhedron_volume(&raw.vertices, &raw.faces);
    if volume <= eps * eps * eps {
        return None;
    }
    Some(raw)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::WallId;
    use approx::assert_relative_eq;

    const PRECISION: f64 = 1e-6;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn unit_box() -> Container {
        Container::from_aabb(p(-1.0, -1.0, -1.0), p(1.0, 1.0, 1.0)).unwrap()
    }

    fn volume(cell: &RawCell) -> f64 {
        polyhedron_volume(&cell.vertices, &cell.faces)
    }

    #[test]
    fn single_point_fills_box() {
        let cells = HalfSpaceClipper
            .decompose(&[p(0.0, 0.0, 0.0)], &unit_box(), PRECISION)
            .unwrap();
        let cell = cells[0].as_ref().unwrap();
        assert_eq!(cell.faces.len(), 6);
        assert_eq!(cell.vertices.len(), 8);
        assert!(cell
            .neighbors
            .iter()
            .all(|n| matches!(n, RawNeighbor::Wall(w) if w.is_bounding())));
        assert_relative_eq!(volume(cell), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn two_points_split_box() {
        let points = [p(-0.5, 0.0, 0.0), p(0.5, 0.0, 0.0)];
        let cells = HalfSpaceClipper
            .decompose(&points, &unit_box(), PRECISION)
            .unwrap();
        let a = cells[0].as_ref().unwrap();
        let b = cells[1].as_ref().unwrap();
        assert!(a.neighbors.contains(&RawNeighbor::Cell(1)));
        assert!(b.neighbors.contains(&RawNeighbor::Cell(0)));
        assert_relative_eq!(volume(a), 4.0, epsilon = 1e-9);
        assert_relative_eq!(volume(b), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn outside_and_duplicate_points_are_missing() {
        let points = [p(0.0, 0.0, 0.0), p(5.0, 0.0, 0.0), p(0.0, 0.0, 0.0)];
        let cells = HalfSpaceClipper
            .decompose(&points, &unit_box(), PRECISION)
            .unwrap();
        assert!(cells[0].is_some());
        assert!(cells[1].is_none());
        assert!(cells[2].is_none());
        assert_relative_eq!(volume(cells[0].as_ref().unwrap()), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn extra_wall_cuts_cells() {
        let cut = HalfSpace::new(crate::math::Vector3::z(), 0.0).unwrap();
        let container = unit_box().with_walls([cut]);
        let cells = HalfSpaceClipper
            .decompose(&[p(0.0, 0.0, -0.5), p(0.0, 0.0, 0.5)], &container, PRECISION)
            .unwrap();
        let below = cells[0].as_ref().unwrap();
        assert!(below.neighbors.contains(&RawNeighbor::Wall(WallId(6))));
        assert_relative_eq!(volume(below), 4.0, epsilon = 1e-9);
        // Generator above the wall lies outside the container.
        assert!(cells[1].is_none());
    }

    #[test]
    fn unbounded_container_is_rejected() {
        let walls = [HalfSpace::new(crate::math::Vector3::z(), 1.0).unwrap(); 6];
        let container = Container::from_planes(walls);
        let result = HalfSpaceClipper.decompose(&[p(0.0, 0.0, 0.0)], &container, PRECISION);
        assert!(result.is_err());
    }
}
