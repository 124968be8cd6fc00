//! Face-to-face adjacency of cell meshes.

use std::collections::{BTreeSet, HashMap};

use crate::complex::{CellComplex, CellMesh};

/// Canonical undirected edge key (smaller vertex index first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EdgeKey(usize, usize);

impl EdgeKey {
    fn new(a: usize, b: usize) -> Self {
        if a < b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// Per-face sets of faces sharing an edge with it.
///
/// Only edges with exactly two incident faces create adjacency. Boundary
/// and non-manifold edges are ignored. Sets are ordered so traversal over
/// them is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaceAdjacency {
    adjacent: Vec<BTreeSet<usize>>,
}

impl FaceAdjacency {
    /// Computes face adjacency for one mesh.
    #[must_use]
    pub fn compute(mesh: &CellMesh) -> Self {
        let mut edge_to_faces: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
        for (face_idx, face) in mesh.faces.iter().enumerate() {
            let n = face.len();
            for i in 0..n {
                let key = EdgeKey::new(face[i], face[(i + 1) % n]);
                let faces = edge_to_faces.entry(key).or_default();
                if faces.last() != Some(&face_idx) {
                    faces.push(face_idx);
                }
            }
        }

        let mut adjacent = vec![BTreeSet::new(); mesh.faces.len()];
        for faces in edge_to_faces.values() {
            if let [a, b] = faces[..] {
                if a != b {
                    adjacent[a].insert(b);
                    adjacent[b].insert(a);
                }
            }
        }
        Self { adjacent }
    }

    /// Faces sharing an edge with `face` (empty for unknown faces).
    #[must_use]
    pub fn of(&self, face: usize) -> &BTreeSet<usize> {
        static EMPTY: BTreeSet<usize> = BTreeSet::new();
        self.adjacent.get(face).unwrap_or(&EMPTY)
    }

    /// Number of faces covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adjacent.len()
    }

    /// Returns `true` if the mesh had no faces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adjacent.is_empty()
    }
}

/// Face adjacency of every found cell, computed once per complex.
#[derive(Debug, Clone, Default)]
pub struct FaceAdjacencyIndex {
    cells: Vec<Option<FaceAdjacency>>,
}

impl FaceAdjacencyIndex {
    /// Computes adjacency for all cells that have a mesh.
    #[must_use]
    pub fn build(complex: &CellComplex) -> Self {
        let cells = complex
            .cells()
            .iter()
            .map(|c| (!c.mesh().faces.is_empty()).then(|| FaceAdjacency::compute(c.mesh())))
            .collect();
        Self { cells }
    }

    /// Adjacency of one cell's mesh.
    #[must_use]
    pub fn cell(&self, index: usize) -> Option<&FaceAdjacency> {
        self.cells.get(index)?.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;

    fn cube_mesh() -> CellMesh {
        let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);
        CellMesh {
            vertices: vec![
                p(0.0, 0.0, 0.0),
                p(1.0, 0.0, 0.0),
                p(1.0, 1.0, 0.0),
                p(0.0, 1.0, 0.0),
                p(0.0, 0.0, 1.0),
                p(1.0, 0.0, 1.0),
                p(1.0, 1.0, 1.0),
                p(0.0, 1.0, 1.0),
            ],
            faces: vec![
                vec![0, 3, 2, 1],
                vec![4, 5, 6, 7],
                vec![0, 1, 5, 4],
                vec![2, 3, 7, 6],
                vec![1, 2, 6, 5],
                vec![0, 4, 7, 3],
            ],
        }
    }

    #[test]
    fn cube_faces_touch_four_others() {
        let adj = FaceAdjacency::compute(&cube_mesh());
        assert_eq!(adj.len(), 6);
        for f in 0..6 {
            assert_eq!(adj.of(f).len(), 4, "face {f}");
        }
        // Bottom and top are opposite.
        assert!(!adj.of(0).contains(&1));
        assert!(adj.of(0).contains(&2));
    }

    #[test]
    fn boundary_edges_give_no_adjacency() {
        let mut mesh = cube_mesh();
        mesh.faces.truncate(1);
        let adj = FaceAdjacency::compute(&mesh);
        assert!(adj.of(0).is_empty());
        assert!(adj.of(9).is_empty());
    }

    #[test]
    fn non_manifold_edges_are_ignored() {
        let mut mesh = cube_mesh();
        // A fin sharing the bottom-front edge (0, 1) with two faces.
        mesh.vertices.push(Point3::new(0.5, -1.0, 0.0));
        mesh.faces.push(vec![0, 8, 1]);
        let adj = FaceAdjacency::compute(&mesh);
        assert!(!adj.of(0).contains(&2));
        assert!(!adj.of(6).contains(&0));
        assert!(adj.of(0).contains(&4));
    }
}
