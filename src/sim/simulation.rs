use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::complex::CellStates;
use crate::error::{LinkError, Result, SimulationError};
use crate::fracture::Fracture;
use crate::links::{ComponentChange, Link, LinkId, LinkKey, LinkSnapshot};
use crate::math::{Vector3, TOLERANCE};

use super::config::SimConfig;
use super::state::{ExitFlag, SimulationState, StepOutcome, SubstepRecord};

/// Everything [`InfiltrationSimulation::restore_state`] puts back.
#[derive(Debug, Clone)]
pub struct SimulationBackup {
    links: Vec<LinkSnapshot>,
    cells: CellStates,
    rng: ChaCha8Rng,
    state: SimulationState,
}

/// Droplet simulation over one [`Fracture`].
///
/// The simulation owns its random generator; the fracture is passed to
/// every call, so one fracture can be driven by several simulations in
/// turn. All randomness goes through weighted picks and uniform draws on
/// that generator, so a seed fixes the whole run.
#[derive(Debug, Clone)]
pub struct InfiltrationSimulation {
    config: SimConfig,
    water_dir: Vector3,
    next_dir: Vector3,
    rng: ChaCha8Rng,
    state: SimulationState,
    backup: Option<SimulationBackup>,
}

impl InfiltrationSimulation {
    /// Creates a simulation for `fracture`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the fracture
    /// has no wall link to enter through.
    pub fn new(fracture: &Fracture, config: SimConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        if fracture.links().external().is_empty() {
            return Err(LinkError::NoExternalLinks.into());
        }
        Ok(Self {
            water_dir: config.water_dir.normalize(),
            next_dir: config.next_dir.normalize(),
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            state: SimulationState::default(),
            backup: None,
        })
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// State of the most recent step.
    #[must_use]
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Returns `true` if a backup is held.
    #[must_use]
    pub fn has_backup(&self) -> bool {
        self.backup.is_some()
    }

    /// Runs one droplet from entry to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the link graph is inconsistent with itself.
    pub fn step(&mut self, fracture: &mut Fracture) -> Result<StepOutcome> {
        let (_, links) = fracture.parts_mut();
        self.state.begin(self.config.water_initial);

        let mut entries = Vec::with_capacity(links.external().len());
        for &id in links.external() {
            let link = links.link(id)?;
            entries.push((id, link.key(), self.entry_weight(link)));
        }
        let weights: Vec<f64> = entries.iter().map(|e| e.2).collect();
        if self.config.trace_full {
            self.state.entry_candidates = entries.iter().map(|&(_, key, w)| (key, w)).collect();
        }
        let Some(pick) = pick_weighted(&mut self.rng, &weights) else {
            warn!(candidates = entries.len(), "no entry link has a positive weight");
            self.state.exit = ExitFlag::NoNextLink;
            return Ok(self.outcome(None, None));
        };

        let (mut current, entry, _) = entries[pick];
        links.link_mut(current)?.picks_entry += 1;
        self.state.steps += 1;
        self.state.visit(entry);

        let limit = self.config.depth_limit();
        let mut exhausted = false;
        while self.state.is_running() {
            let from = links.link(current)?;
            let candidates: Vec<LinkId> = from
                .neighbors()
                .map(|n| n.candidates().collect())
                .unwrap_or_default();
            if candidates.is_empty() {
                self.state.exit = if from.is_wall() {
                    ExitFlag::NoNextLinkWall
                } else {
                    ExitFlag::NoNextLink
                };
                break;
            }

            let mut weights = Vec::with_capacity(candidates.len());
            for &id in &candidates {
                weights.push(self.next_weight(from, links.link(id)?));
            }
            let Some(pick) = pick_weighted(&mut self.rng, &weights) else {
                self.state.exit = ExitFlag::NoNextLink;
                break;
            };
            let next = candidates[pick];
            if self.config.trace_full {
                let mut weighed = Vec::with_capacity(candidates.len());
                for (&id, &w) in candidates.iter().zip(&weights) {
                    weighed.push((links.link(id)?.key(), w));
                }
                self.state.substeps.push(SubstepRecord {
                    from: from.key(),
                    candidates: weighed,
                    chosen: links.link(next)?.key(),
                });
            }

            current = next;
            self.state.depth += 1;
            let link = links.link_mut(current)?;

            let mut water =
                self.state.water - self.config.water_base_cost * link.area() * link.resistance();
            if !link.is_air() {
                water -= self.config.water_link_cost * link.area() * link.life_clamped();
            }
            self.state.water = water;
            let threshold = self.config.water_min_absorb_threshold;
            let absorbed = water > 0.0
                && water < threshold
                && random(&mut self.rng)
                    < water / threshold * self.config.water_min_absorb_continue_prob;

            let was_alive = link.life > 0.0;
            link.life -= self.config.step_link_degradation * water;
            link.picks += 1;
            if was_alive && link.life <= 0.0 {
                debug!(link = %link.key(), "link life exhausted");
                exhausted = true;
            }
            let key = link.key();
            self.state.visit(key);

            if absorbed {
                self.state.exit = ExitFlag::NoWaterRandom;
            } else if water < 0.0 {
                self.state.exit = ExitFlag::NoWater;
            } else if self.state.depth >= limit {
                self.state.exit = ExitFlag::MaxDepth;
            }
        }

        let components = exhausted.then(|| links.recompute_components());
        debug!(
            exit = ?self.state.exit,
            depth = self.state.depth,
            water = self.state.water,
            "step finished"
        );
        Ok(self.outcome(Some(entry), components))
    }

    /// Resets every link and recomputes components.
    ///
    /// Without `randomize`, links get full life and no picks. With it,
    /// life and pick counts are drawn per link, scaled by how likely the
    /// link is as an entry, so likely entries start more worn.
    ///
    /// # Errors
    ///
    /// Returns an error if the link graph is inconsistent with itself.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn reset(&mut self, fracture: &mut Fracture, randomize: bool) -> Result<ComponentChange> {
        let (complex, links) = fracture.parts_mut();
        links.refresh_air(complex);

        let mut weighted = Vec::with_capacity(links.len());
        for (id, link) in links.iter() {
            weighted.push((id, self.entry_weight(link)));
        }
        let max = weighted.iter().map(|w| w.1).fold(0.0, f64::max);
        for (id, w) in weighted {
            let link = links.link_mut(id)?;
            if randomize {
                let t = if max > 0.0 { w / max } else { 0.0 };
                let (a, b, c) = (
                    random(&mut self.rng),
                    random(&mut self.rng),
                    random(&mut self.rng),
                );
                link.life = 1.0 - t * (1.0 - self.config.reset_life_min) * a;
                link.picks = (t * f64::from(self.config.reset_picks_max) * b).round() as u32;
                link.picks_entry = if link.is_wall() {
                    (t * f64::from(self.config.reset_entry_picks_max) * c).round() as u32
                } else {
                    0
                };
            } else {
                link.life = 1.0;
                link.picks = 0;
                link.picks_entry = 0;
            }
        }

        self.state = SimulationState::default();
        let change = links.recompute_components();
        info!(randomize, components = change.after, "simulation reset");
        Ok(change)
    }

    /// Captures link state, cell state, the generator and the last step.
    pub fn backup_state(&mut self, fracture: &Fracture) {
        self.backup = Some(SimulationBackup {
            links: fracture.links().snapshot(),
            cells: fracture.complex().cell_states(),
            rng: self.rng.clone(),
            state: self.state.clone(),
        });
    }

    /// Puts back what [`Self::backup_state`] captured. The backup is kept,
    /// so the same point can be restored again.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NoBackup`] without a backup and
    /// [`SimulationError::BackupMismatch`] if it was taken on another
    /// fracture shape.
    pub fn restore_state(&mut self, fracture: &mut Fracture) -> Result<()> {
        let backup = self.backup.as_ref().ok_or(SimulationError::NoBackup)?;
        let (complex, links) = fracture.parts_mut();
        if backup.links.len() != links.len() {
            return Err(SimulationError::BackupMismatch(format!(
                "backup has {} links, fracture has {}",
                backup.links.len(),
                links.len()
            ))
            .into());
        }
        complex.restore_cell_states(&backup.cells)?;
        links.restore_snapshot(&backup.links)?;
        links.sanitize(complex.deleted());
        self.rng = backup.rng.clone();
        self.state = backup.state.clone();
        Ok(())
    }

    fn entry_weight(&self, link: &Link) -> f64 {
        let align = (-self.water_dir).dot(link.direction());
        if align < self.config.entry_min_align {
            return 0.0;
        }
        let w = if self.config.entry_weight_by_area {
            align * link.area()
        } else {
            align
        };
        w.max(0.0)
    }

    fn next_weight(&self, from: &Link, to: &Link) -> f64 {
        let delta = to.position() - from.position();
        let norm = delta.norm();
        let mut align = if norm > TOLERANCE {
            delta.dot(&self.next_dir) / norm
        } else {
            0.0
        };
        if align < self.config.next_min_align {
            align = 0.0;
        }
        (align * (1.0 - to.resistance())).max(self.config.next_weight_floor)
    }

    fn outcome(&self, entry: Option<LinkKey>, components: Option<ComponentChange>) -> StepOutcome {
        StepOutcome {
            exit: self.state.exit,
            depth: self.state.depth,
            water: self.state.water,
            entry,
            components,
        }
    }
}

/// Index drawn with probability proportional to its weight; `None` if no
/// weight is positive.
fn pick_weighted(rng: &mut ChaCha8Rng, weights: &[f64]) -> Option<usize> {
    WeightedIndex::new(weights).ok().map(|dist| dist.sample(rng))
}

/// Uniform draw in `[0, 1)`.
fn random(rng: &mut ChaCha8Rng) -> f64 {
    rng.gen::<f64>()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::complex::{BuildComplex, CellComplex};
    use crate::geometry::{Container, WallId};
    use crate::voronoi::{RawCell, RawNeighbor};
    use crate::links::{ConstantField, LinkKey};
    use crate::math::Point3;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn single() -> Fracture {
        let container = Container::from_aabb(p(-1.0, -1.0, -1.0), p(1.0, 1.0, 1.0)).unwrap();
        let op = BuildComplex::new(vec![p(0.0, 0.0, 0.0)], container);
        Fracture::build(&op, ConstantField(0.0)).unwrap()
    }

    fn column() -> Fracture {
        let container = Container::from_aabb(p(0.0, 0.0, 0.0), p(1.0, 1.0, 3.0)).unwrap();
        let points = vec![p(0.5, 0.5, 0.5), p(0.5, 0.5, 1.5), p(0.5, 0.5, 2.5)];
        Fracture::build(&BuildComplex::new(points, container), ConstantField(0.2)).unwrap()
    }

    fn top_of(cell: usize) -> LinkKey {
        LinkKey::new(WallId(5).key_value(), i64::try_from(cell).unwrap())
    }

    #[test]
    fn droplet_enters_from_the_top() {
        let mut f = single();
        let config = SimConfig {
            max_depth: Some(1),
            ..SimConfig::default()
        };
        let mut sim = InfiltrationSimulation::new(&f, config, 7).unwrap();
        let out = sim.step(&mut f).unwrap();

        assert_eq!(out.entry, Some(top_of(0)));
        assert_eq!(out.exit, ExitFlag::MaxDepth);
        assert_eq!(out.depth, 1);
        // Fresh side face: area 4, life 1, no resistance.
        assert_relative_eq!(out.water, 1.0 - 0.1 * 4.0, epsilon = 1e-9);
        assert_eq!(sim.state().trace.len(), 2);
        assert_eq!(sim.state().steps, 1);

        let entry = f.links().link_by_key(top_of(0)).unwrap();
        assert_eq!(entry.picks_entry(), 1);
        let visited = f.links().link_by_key(sim.state().trace[1].link).unwrap();
        assert_eq!(visited.picks(), 1);
        assert_relative_eq!(visited.life(), 1.0 - 0.25 * 0.6, epsilon = 1e-9);
    }

    #[test]
    fn same_seed_same_run() {
        let mut a = column();
        let mut b = a.clone();
        let mut sa = InfiltrationSimulation::new(&a, SimConfig::default(), 42).unwrap();
        let mut sb = InfiltrationSimulation::new(&b, SimConfig::default(), 42).unwrap();
        for _ in 0..10 {
            assert_eq!(sa.step(&mut a).unwrap(), sb.step(&mut b).unwrap());
            assert_eq!(sa.state().trace, sb.state().trace);
        }
        assert_eq!(a.links().snapshot(), b.links().snapshot());
    }

    #[test]
    fn zero_entry_weights_end_without_a_step() {
        let mut f = single();
        let config = SimConfig {
            entry_min_align: 2.0,
            ..SimConfig::default()
        };
        let mut sim = InfiltrationSimulation::new(&f, config, 1).unwrap();
        let out = sim.step(&mut f).unwrap();
        assert_eq!(out.exit, ExitFlag::NoNextLink);
        assert_eq!(out.entry, None);
        assert_eq!(out.depth, 0);
        assert_eq!(sim.state().steps, 0);
        assert!(f.links().iter().all(|(_, l)| l.picks_entry() == 0));
    }

    #[test]
    fn weight_floor_keeps_marginal_candidates_selectable() {
        let mut f = single();
        let config = SimConfig {
            next_dir: Vector3::new(0.0, 0.0, 1.0),
            max_depth: Some(3),
            water_link_cost: 0.0,
            trace_full: true,
            ..SimConfig::default()
        };
        let mut sim = InfiltrationSimulation::new(&f, config, 3).unwrap();
        let out = sim.step(&mut f).unwrap();
        assert_eq!(out.exit, ExitFlag::MaxDepth);
        let first = &sim.state().substeps[0];
        assert_eq!(first.from, top_of(0));
        assert_eq!(first.candidates.len(), 4);
        for &(_, w) in &first.candidates {
            assert_relative_eq!(w, 1e-3);
        }
        assert_eq!(sim.state().substeps.len(), 3);
        assert_eq!(sim.state().entry_candidates.len(), 6);
    }

    #[test]
    fn low_water_is_absorbed_at_random() {
        let mut f = single();
        let config = SimConfig {
            water_initial: 0.05,
            water_base_cost: 0.0,
            water_link_cost: 0.0,
            water_min_absorb_continue_prob: 1.0,
            max_depth: Some(10_000),
            ..SimConfig::default()
        };
        let mut sim = InfiltrationSimulation::new(&f, config.clone(), 9).unwrap();
        assert_eq!(sim.step(&mut f).unwrap().exit, ExitFlag::NoWaterRandom);

        let never = SimConfig {
            water_min_absorb_continue_prob: 0.0,
            max_depth: Some(50),
            ..config
        };
        let mut sim = InfiltrationSimulation::new(&f, never, 9).unwrap();
        assert_eq!(sim.step(&mut f).unwrap().exit, ExitFlag::MaxDepth);
    }

    #[test]
    fn running_dry_ends_with_no_water() {
        let mut f = single();
        let config = SimConfig {
            water_link_cost: 1.0,
            ..SimConfig::default()
        };
        let mut sim = InfiltrationSimulation::new(&f, config, 5).unwrap();
        let out = sim.step(&mut f).unwrap();
        assert_eq!(out.exit, ExitFlag::NoWater);
        assert!(out.water < 0.0);
        assert_eq!(out.depth, 1);

        // The last link wears by the overdrawn water level as it stands.
        let last = f.links().link_by_key(sim.state().trace[1].link).unwrap();
        assert_relative_eq!(last.life(), 1.0 - 0.25 * out.water, epsilon = 1e-9);
        assert!(last.life() > 1.0);
        assert_eq!(last.picks(), 1);
    }

    #[test]
    fn dry_water_level_keeps_going() {
        let mut f = single();
        let config = SimConfig {
            water_initial: 0.0,
            water_base_cost: 0.0,
            water_link_cost: 0.0,
            water_min_absorb_continue_prob: 1.0,
            max_depth: Some(25),
            ..SimConfig::default()
        };
        let mut sim = InfiltrationSimulation::new(&f, config, 17).unwrap();
        let out = sim.step(&mut f).unwrap();
        assert_eq!(out.exit, ExitFlag::MaxDepth);
        assert_eq!(out.depth, 25);
        assert_relative_eq!(out.water, 0.0);
        for entry in &sim.state().trace {
            assert_relative_eq!(entry.water, 0.0);
        }
        for (_, link) in f.links().iter() {
            assert_relative_eq!(link.life(), 1.0);
        }
    }

    /// A wall face and a duplicate of the face towards cell 1 share an
    /// edge; every other face is isolated.
    fn dead_ends() -> Fracture {
        let container = Container::from_aabb(p(-10.0, -10.0, -10.0), p(10.0, 10.0, 10.0)).unwrap();
        let top = RawCell {
            vertices: vec![
                p(0.0, 0.0, 1.0),
                p(1.0, 0.0, 1.0),
                p(0.0, 1.0, 1.0),
                p(0.0, 0.0, 0.0),
                p(5.0, 5.0, 5.0),
                p(6.0, 5.0, 5.0),
                p(5.0, 6.0, 5.0),
            ],
            faces: vec![vec![0, 1, 2], vec![4, 5, 6], vec![1, 0, 3]],
            neighbors: vec![
                RawNeighbor::Wall(WallId(5)),
                RawNeighbor::Cell(1),
                RawNeighbor::Cell(1),
            ],
        };
        let below = RawCell {
            vertices: vec![p(5.0, 5.0, 5.0), p(5.0, 6.0, 5.0), p(6.0, 5.0, 5.0)],
            faces: vec![vec![0, 1, 2]],
            neighbors: vec![RawNeighbor::Cell(0)],
        };
        let points = [p(0.2, 0.2, 0.5), p(5.3, 5.3, 4.0)];
        let complex =
            CellComplex::from_raw_cells(&points, container, 1e-9, vec![Some(top), Some(below)])
                .unwrap();
        Fracture::from_complex(complex, ConstantField(0.0)).unwrap()
    }

    #[test]
    fn isolated_wall_face_ends_on_the_wall() {
        let container = Container::from_aabb(p(-10.0, -10.0, -10.0), p(10.0, 10.0, 10.0)).unwrap();
        let lone = RawCell {
            vertices: vec![p(0.0, 0.0, 1.0), p(1.0, 0.0, 1.0), p(0.0, 1.0, 1.0)],
            faces: vec![vec![0, 1, 2]],
            neighbors: vec![RawNeighbor::Wall(WallId(5))],
        };
        let complex =
            CellComplex::from_raw_cells(&[p(0.2, 0.2, 0.5)], container, 1e-9, vec![Some(lone)])
                .unwrap();
        let mut f = Fracture::from_complex(complex, ConstantField(0.0)).unwrap();
        let mut sim = InfiltrationSimulation::new(&f, SimConfig::default(), 4).unwrap();

        let out = sim.step(&mut f).unwrap();
        assert_eq!(out.exit, ExitFlag::NoNextLinkWall);
        assert_eq!(out.depth, 0);
        assert_eq!(out.entry, Some(top_of(0)));
        assert_relative_eq!(out.water, 1.0);
    }

    #[test]
    fn isolated_internal_face_ends_between_cells() {
        let mut f = dead_ends();
        assert_eq!(f.links().internal().len(), 1);
        let mut sim = InfiltrationSimulation::new(&f, SimConfig::default(), 4).unwrap();

        let out = sim.step(&mut f).unwrap();
        assert_eq!(out.exit, ExitFlag::NoNextLink);
        assert_eq!(out.depth, 1);
        assert_eq!(out.entry, Some(top_of(0)));
        assert_eq!(sim.state().trace[1].link, LinkKey::new(0, 1));
        assert_eq!(f.links().link_by_key(LinkKey::new(0, 1)).unwrap().picks(), 1);
    }

    #[test]
    fn reset_restores_fresh_links() {
        let mut f = column();
        let mut sim = InfiltrationSimulation::new(&f, SimConfig::default(), 11).unwrap();
        for _ in 0..5 {
            sim.step(&mut f).unwrap();
        }
        let change = sim.reset(&mut f, false).unwrap();
        assert_eq!(change.after, 1);
        assert_eq!(sim.state().steps, 0);
        for (_, link) in f.links().iter() {
            assert_relative_eq!(link.life(), 1.0);
            assert_eq!((link.picks(), link.picks_entry()), (0, 0));
        }
    }

    #[test]
    fn randomized_reset_stays_in_bounds() {
        let mut f = column();
        let config = SimConfig::default();
        let mut sim = InfiltrationSimulation::new(&f, config.clone(), 13).unwrap();
        sim.reset(&mut f, true).unwrap();
        for (_, link) in f.links().iter() {
            assert!(link.life() >= config.reset_life_min && link.life() <= 1.0);
            assert!(link.picks() <= config.reset_picks_max);
            assert!(link.picks_entry() <= config.reset_entry_picks_max);
            if link.direction().z <= 0.0 {
                // Never an entry, so never pre-worn.
                assert_relative_eq!(link.life(), 1.0);
                assert_eq!(link.picks(), 0);
            }
            if !link.is_wall() {
                assert_eq!(link.picks_entry(), 0);
            }
        }
    }

    #[test]
    fn restore_replays_the_same_step() {
        let mut f = column();
        let mut sim = InfiltrationSimulation::new(&f, SimConfig::default(), 21).unwrap();
        sim.step(&mut f).unwrap();
        let links = f.links().snapshot();
        let cells = f.complex().cell_states();

        sim.backup_state(&f);
        let first = sim.step(&mut f).unwrap();
        f.mark_deleted(&[1]).unwrap();
        sim.restore_state(&mut f).unwrap();

        assert_eq!(f.links().snapshot(), links);
        assert_eq!(f.complex().cell_states(), cells);
        assert_eq!(f.component_count(), 1);
        assert_eq!(sim.step(&mut f).unwrap(), first);
    }

    #[test]
    fn restore_without_backup_fails() {
        let mut f = single();
        let mut sim = InfiltrationSimulation::new(&f, SimConfig::default(), 0).unwrap();
        assert!(!sim.has_backup());
        assert!(matches!(
            sim.restore_state(&mut f),
            Err(crate::error::FissuraError::Simulation(SimulationError::NoBackup))
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let f = single();
        let config = SimConfig {
            max_depth: Some(0),
            ..SimConfig::default()
        };
        assert!(InfiltrationSimulation::new(&f, config, 0).is_err());
    }
}
