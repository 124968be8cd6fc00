use std::collections::{BTreeMap, HashMap};

use slotmap::SlotMap;
use tracing::{debug, info, warn};

use crate::adjacency::FaceAdjacencyIndex;
use crate::complex::{CellComplex, CellState, NeighborRef};
use crate::error::{LinkError, Result};
use crate::math::Point3;

use super::components::CellGraph;
use super::field::{NoiseField, ResistanceField};
use super::{FaceSlot, Link, LinkEnds, LinkGraph, LinkId, LinkKey, LinkNeighbors, LinkStats};

/// Builds the [`LinkGraph`] of a cell complex.
///
/// Pass one walks every found cell's faces and creates one link per
/// unique adjacency with its geometry. Pass two resolves, for every link,
/// the links on faces adjacent to its own face(s). The graph is only
/// returned once both passes have completed.
pub struct BuildLinks<'a> {
    complex: &'a CellComplex,
    field: Box<dyn ResistanceField + 'a>,
}

impl<'a> BuildLinks<'a> {
    /// Creates a new `BuildLinks` operation with the default noise field.
    #[must_use]
    pub fn new(complex: &'a CellComplex) -> Self {
        Self {
            complex,
            field: Box::new(NoiseField::default()),
        }
    }

    /// Sets the field resistance is sampled from.
    #[must_use]
    pub fn with_field(mut self, field: impl ResistanceField + 'a) -> Self {
        self.field = Box::new(field);
        self
    }

    /// Executes the build.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NoLinks`] if no link could be formed.
    pub fn execute(&self) -> Result<LinkGraph> {
        let complex = self.complex;
        let adjacency = FaceAdjacencyIndex::build(complex);

        let mut links: SlotMap<LinkId, Link> = SlotMap::with_key();
        let mut order: Vec<LinkId> = Vec::new();
        let mut by_key: HashMap<LinkKey, LinkId> = HashMap::new();
        let mut external = Vec::new();
        let mut internal = Vec::new();
        let mut wall_links: BTreeMap<_, Vec<LinkId>> = BTreeMap::new();
        let mut slots: Vec<Vec<Option<FaceSlot>>> = complex
            .cells()
            .iter()
            .map(|c| {
                if c.is_found() {
                    vec![None; c.face_count()]
                } else {
                    Vec::new()
                }
            })
            .collect();
        let mut cells = CellGraph::default();
        let mut stats = LinkStats::default();
        let mut area_sum = 0.0;

        // Pass 1: links and their geometry.
        for cell in complex.found_cells() {
            let i = cell.index();
            cells.add_node(i);
            for (f, nb) in complex.neighbors_of(i)?.into_iter().enumerate() {
                if slots[i][f].is_some() {
                    continue;
                }
                let Some(key) = LinkKey::between(i, nb) else {
                    if let NeighborRef::Error(e) = nb {
                        slots[i][f] = Some(FaceSlot::Error(e));
                        stats.error_slots += 1;
                    }
                    continue;
                };
                if let Some(&existing) = by_key.get(&key) {
                    warn!(%key, cell = i, face = f, "duplicate adjacency on one cell");
                    slots[i][f] = Some(FaceSlot::Link(existing));
                    continue;
                }

                let face = &cell.faces()[f];
                let (ends, direction) = match nb {
                    NeighborRef::Wall(wall) => (LinkEnds::Wall { wall, cell: i, face: f }, face.normal),
                    NeighborRef::Cell(j) => {
                        let Some(back) = complex.matching_face(i, f) else {
                            continue;
                        };
                        let (a, face_a, b, face_b) = if i < j { (i, f, j, back) } else { (j, back, i, f) };
                        let direction = if i < j { face.normal } else { -face.normal };
                        (LinkEnds::Cells { a, face_a, b, face_b }, direction)
                    }
                    NeighborRef::Error(_) => continue,
                };

                let air = ends
                    .cells()
                    .iter()
                    .any(|&c| complex.cells()[c].state() == CellState::Air);
                let position = face.centroid;
                let link = Link {
                    key,
                    ends,
                    position,
                    direction,
                    area: face.area,
                    area_factor: 1.0,
                    resistance: self.field.sample(position.x, position.y).clamp(0.0, 1.0),
                    neighbors: None,
                    life: 1.0,
                    picks: 0,
                    picks_entry: 0,
                    air,
                };
                let id = links.insert(link);
                order.push(id);
                by_key.insert(key, id);
                for (c, slot_face) in ends.slots() {
                    slots[c][slot_face] = Some(FaceSlot::Link(id));
                }
                match ends {
                    LinkEnds::Wall { wall, .. } => {
                        external.push(id);
                        wall_links.entry(wall).or_default().push(id);
                    }
                    LinkEnds::Cells { a, b, .. } => {
                        internal.push(id);
                        cells.add_edge(a, b);
                    }
                }

                stats.record(order.len() == 1, &position, face.area);
                area_sum += face.area;
            }
        }

        if links.is_empty() {
            return Err(LinkError::NoLinks.into());
        }
        stats.wall_links = external.len();
        stats.internal_links = internal.len();
        #[allow(clippy::cast_precision_loss)]
        let average = area_sum / links.len() as f64;
        stats.average_area = average;
        debug!(links = links.len(), "link pass one complete");

        // Pass 2: neighbour lists.
        let mut resolved: Vec<(LinkId, LinkNeighbors)> = Vec::with_capacity(order.len());
        for &id in &order {
            let link = &links[id];
            if link.neighbors.is_some() {
                continue;
            }
            let mut neighbors = LinkNeighbors::default();
            for (c, face) in link.ends.slots() {
                let Some(adj) = adjacency.cell(c) else {
                    continue;
                };
                for &g in adj.of(face) {
                    match slots[c][g] {
                        Some(FaceSlot::Link(other)) if other != id => {
                            if links[other].is_wall() {
                                neighbors.cell_wall.push(other);
                            } else {
                                neighbors.cell_cell.push(other);
                            }
                        }
                        Some(FaceSlot::Error(e)) => neighbors.errors.push(e),
                        Some(FaceSlot::Link(_)) | None => {}
                    }
                }
            }
            resolved.push((id, neighbors));
        }
        for (id, neighbors) in resolved {
            let link = &mut links[id];
            link.area_factor = if average > 0.0 { link.area / average } else { 1.0 };
            link.neighbors = Some(neighbors);
        }

        cells.recompute();
        info!(
            wall_links = stats.wall_links,
            internal_links = stats.internal_links,
            error_slots = stats.error_slots,
            average_area = stats.average_area,
            components = cells.component_count(),
            "link graph built"
        );

        Ok(LinkGraph {
            links,
            order,
            by_key,
            external,
            internal,
            wall_links,
            slots,
            cells,
            stats,
        })
    }
}

impl LinkStats {
    fn record(&mut self, first: bool, position: &Point3, area: f64) {
        if first {
            self.min_area = area;
            self.max_area = area;
            self.bounds_min = *position;
            self.bounds_max = *position;
        } else {
            self.min_area = self.min_area.min(area);
            self.max_area = self.max_area.max(area);
            self.bounds_min = self.bounds_min.inf(position);
            self.bounds_max = self.bounds_max.sup(position);
        }
    }
}
