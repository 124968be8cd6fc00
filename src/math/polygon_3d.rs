use super::{Point3, Vector3, TOLERANCE};

/// Compute the area of a 3D polygon (coplanar points).
///
/// Uses the cross-product summation method projected along the polygon normal.
#[must_use]
pub fn polygon_area_3d(points: &[Point3], normal: &Vector3) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    0.5 * cross_sum(points).dot(normal).abs()
}

/// Unit normal of a planar polygon using Newell's method.
///
/// The orientation follows the vertex winding (counter-clockwise seen from
/// the side the normal points to). Returns `None` for degenerate polygons.
#[must_use]
pub fn polygon_normal(points: &[Point3]) -> Option<Vector3> {
    if points.len() < 3 {
        return None;
    }
    let n = points.len();
    let mut normal = Vector3::zeros();
    for i in 0..n {
        let a = &points[i];
        let b = &points[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    let len = normal.norm();
    if len < TOLERANCE {
        return None;
    }
    Some(normal / len)
}

/// Computes the vertex-average centre of a polygon.
#[must_use]
pub fn polygon_centroid(points: &[Point3]) -> Point3 {
    let n = points.len();
    if n == 0 {
        return Point3::origin();
    }
    #[allow(clippy::cast_precision_loss)]
    let inv_n = 1.0 / n as f64;
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum * inv_n)
}

/// Signed volume of a closed polyhedron given as outward-wound faces.
///
/// Each face is fanned into triangles from its first vertex and the
/// divergence theorem is applied. Outward winding yields a positive volume.
#[must_use]
pub fn polyhedron_volume(vertices: &[Point3], faces: &[Vec<usize>]) -> f64 {
    let mut volume = 0.0;
    for face in faces {
        if face.len() < 3 {
            continue;
        }
        let a = vertices[face[0]].coords;
        for w in face[1..].windows(2) {
            let b = vertices[w[0]].coords;
            let c = vertices[w[1]].coords;
            volume += a.dot(&b.cross(&c));
        }
    }
    volume / 6.0
}

fn cross_sum(points: &[Point3]) -> Vector3 {
    let n = points.len();
    let mut sum = Vector3::zeros();
    let o = &points[0];
    for i in 1..n {
        let a = points[i] - o;
        let b = points[(i + 1) % n] - o;
        sum += a.cross(&b);
    }
    sum
}
