use std::collections::{BTreeMap, BTreeSet};

/// Disjoint-set forest with path halving and union by rank.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
    sets: usize,
}

impl UnionFind {
    /// Creates `n` singleton sets.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
            sets: n,
        }
    }

    /// Representative of the set containing `x`.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merges the sets of `a` and `b`; returns `false` if already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        self.sets -= 1;
        true
    }

    /// Number of disjoint sets.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.sets
    }
}

/// Component count before and after a recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentChange {
    pub before: usize,
    pub after: usize,
}

impl ComponentChange {
    /// Returns `true` when the component count changed (a new split or merge).
    #[must_use]
    pub fn new_split(&self) -> bool {
        self.before != self.after
    }
}

/// Graph of found cells joined by internal links, used for connectivity.
///
/// Deleted cells are detached (all incident edges dropped) but stay as
/// isolated nodes. The edges a cell had at construction are kept so a
/// restored cell can be attached again.
#[derive(Debug, Clone, Default)]
pub struct CellGraph {
    adjacency: BTreeMap<usize, BTreeSet<usize>>,
    built: BTreeMap<usize, BTreeSet<usize>>,
    detached: BTreeSet<usize>,
    component_of: BTreeMap<usize, usize>,
    component_count: usize,
}

impl CellGraph {
    /// Adds an isolated node.
    pub fn add_node(&mut self, cell: usize) {
        self.adjacency.entry(cell).or_default();
        self.built.entry(cell).or_default();
    }

    /// Adds an undirected edge, creating nodes as needed.
    pub fn add_edge(&mut self, a: usize, b: usize) {
        for (x, y) in [(a, b), (b, a)] {
            self.adjacency.entry(x).or_default().insert(y);
            self.built.entry(x).or_default().insert(y);
        }
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of edges currently present.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Returns `true` if the node exists.
    #[must_use]
    pub fn contains(&self, cell: usize) -> bool {
        self.adjacency.contains_key(&cell)
    }

    /// Current neighbours of a node.
    #[must_use]
    pub fn neighbors(&self, cell: usize) -> Option<&BTreeSet<usize>> {
        self.adjacency.get(&cell)
    }

    /// Nodes currently detached.
    #[must_use]
    pub fn detached(&self) -> &BTreeSet<usize> {
        &self.detached
    }

    /// Number of connected components from the last recomputation.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.component_count
    }

    /// Component label of a node (labels are dense, ordered by smallest member).
    #[must_use]
    pub fn component_of(&self, cell: usize) -> Option<usize> {
        self.component_of.get(&cell).copied()
    }

    /// All components as sets of cells, ordered by smallest member.
    #[must_use]
    pub fn components(&self) -> Vec<BTreeSet<usize>> {
        let mut out = vec![BTreeSet::new(); self.component_count];
        for (&cell, &label) in &self.component_of {
            out[label].insert(cell);
        }
        out
    }

    /// Drops all edges of a node; the node stays. Costs `O(degree)`.
    fn detach(&mut self, cell: usize) -> bool {
        let Some(edges) = self.adjacency.get_mut(&cell) else {
            return false;
        };
        let edges = std::mem::take(edges);
        for other in edges {
            if let Some(set) = self.adjacency.get_mut(&other) {
                set.remove(&cell);
            }
        }
        self.detached.insert(cell);
        true
    }

    /// Restores a node's construction edges to attached neighbours.
    fn attach(&mut self, cell: usize) -> bool {
        if !self.detached.remove(&cell) {
            return false;
        }
        let edges: Vec<usize> = self
            .built
            .get(&cell)
            .map(|s| s.iter().copied().filter(|o| !self.detached.contains(o)).collect())
            .unwrap_or_default();
        for other in edges {
            self.adjacency.entry(cell).or_default().insert(other);
            self.adjacency.entry(other).or_default().insert(cell);
        }
        true
    }

    /// Brings the detached set in line with `deleted` and recomputes
    /// components if anything changed.
    ///
    /// Returns `None` when `deleted` matches the current state, in which
    /// case nothing is touched.
    pub fn sanitize(&mut self, deleted: &BTreeSet<usize>) -> Option<ComponentChange> {
        let to_detach: Vec<usize> = deleted
            .iter()
            .copied()
            .filter(|c| self.contains(*c) && !self.detached.contains(c))
            .collect();
        let to_attach: Vec<usize> = self.detached.difference(deleted).copied().collect();
        if to_detach.is_empty() && to_attach.is_empty() {
            return None;
        }
        for cell in to_detach {
            self.detach(cell);
        }
        for cell in to_attach {
            self.attach(cell);
        }
        Some(self.recompute())
    }

    /// Recomputes connected components.
    pub fn recompute(&mut self) -> ComponentChange {
        let before = self.component_count;
        let nodes: Vec<usize> = self.adjacency.keys().copied().collect();
        let dense: BTreeMap<usize, usize> =
            nodes.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        let mut uf = UnionFind::new(nodes.len());
        for (&cell, edges) in &self.adjacency {
            for other in edges.range(cell + 1..) {
                uf.union(dense[&cell], dense[other]);
            }
        }

        let mut labels: BTreeMap<usize, usize> = BTreeMap::new();
        self.component_of.clear();
        for (i, &cell) in nodes.iter().enumerate() {
            let root = uf.find(i);
            let next = labels.len();
            let label = *labels.entry(root).or_insert(next);
            self.component_of.insert(cell, label);
        }
        self.component_count = uf.set_count();
        ComponentChange {
            before,
            after: self.component_count,
        }
    }
}
