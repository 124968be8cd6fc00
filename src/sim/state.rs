use serde::{Deserialize, Serialize};

use crate::links::{ComponentChange, LinkKey};

/// How a step ended. Every flag except `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitFlag {
    Running,
    /// The depth limit was reached.
    MaxDepth,
    /// Water fell below zero.
    NoWater,
    /// Low water was absorbed by chance.
    NoWaterRandom,
    /// No candidate from an internal link, or no entry at all.
    NoNextLink,
    /// No candidate from a wall link.
    NoNextLinkWall,
}

/// One visited link and the water left after it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceEntry {
    pub link: LinkKey,
    pub water: f64,
}

/// Candidates weighed at one traversal, kept when full tracing is on.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstepRecord {
    pub from: LinkKey,
    pub candidates: Vec<(LinkKey, f64)>,
    pub chosen: LinkKey,
}

/// Summary of one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub exit: ExitFlag,
    /// Links traversed after the entry.
    pub depth: usize,
    pub water: f64,
    /// Entry link; `None` when no entry could be chosen.
    pub entry: Option<LinkKey>,
    /// Set when some link's life ran out during the step.
    pub components: Option<ComponentChange>,
}

/// State of the current or most recent step.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    /// Steps that found an entry since the last reset.
    pub steps: usize,
    pub exit: ExitFlag,
    pub water: f64,
    pub depth: usize,
    pub current: Option<LinkKey>,
    pub trace: Vec<TraceEntry>,
    /// Entry candidates and their weights (full tracing only).
    pub entry_candidates: Vec<(LinkKey, f64)>,
    /// Per-traversal candidate records (full tracing only).
    pub substeps: Vec<SubstepRecord>,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            steps: 0,
            exit: ExitFlag::Running,
            water: 0.0,
            depth: 0,
            current: None,
            trace: Vec::new(),
            entry_candidates: Vec::new(),
            substeps: Vec::new(),
        }
    }
}

impl SimulationState {
    /// Clears per-step data and starts a new step.
    pub(super) fn begin(&mut self, water: f64) {
        self.exit = ExitFlag::Running;
        self.water = water;
        self.depth = 0;
        self.current = None;
        self.trace.clear();
        self.entry_candidates.clear();
        self.substeps.clear();
    }

    pub(super) fn visit(&mut self, link: LinkKey) {
        self.current = Some(link);
        self.trace.push(TraceEntry {
            link,
            water: self.water,
        });
    }

    /// Returns `true` while the step has not reached an exit.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.exit == ExitFlag::Running
    }
}
