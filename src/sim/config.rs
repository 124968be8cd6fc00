use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::math::Vector3;

/// Depth limit applied when [`SimConfig::max_depth`] is `None`.
pub const UNBOUNDED_DEPTH_CAP: usize = 100_000;

/// Parameters of the infiltration simulation.
///
/// Missing fields in a serialized document take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Direction the water comes from; entry links facing against it are preferred.
    pub water_dir: Vector3,
    /// Entry alignments below this are weighted zero.
    pub entry_min_align: f64,
    /// Multiply entry weights by link area.
    pub entry_weight_by_area: bool,
    /// Reference direction for choosing the next link.
    pub next_dir: Vector3,
    /// Next-link alignments below this are weighted zero (before the floor).
    pub next_min_align: f64,
    /// Smallest weight any candidate can have.
    pub next_weight_floor: f64,
    /// Traversal depth limit; `None` caps at [`UNBOUNDED_DEPTH_CAP`].
    pub max_depth: Option<usize>,
    pub water_initial: f64,
    /// Cost per unit area and resistance, always paid.
    pub water_base_cost: f64,
    /// Cost per unit area and life, paid on links with no air side.
    pub water_link_cost: f64,
    /// Water below this may be absorbed at random.
    pub water_min_absorb_threshold: f64,
    pub water_min_absorb_continue_prob: f64,
    /// Life lost per unit of water carried across a link.
    pub step_link_degradation: f64,
    /// Keep per-substep candidate weights.
    pub trace_full: bool,
    /// Lowest life a randomized reset can assign.
    pub reset_life_min: f64,
    pub reset_picks_max: u32,
    pub reset_entry_picks_max: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            water_dir: Vector3::new(0.0, 0.0, -1.0),
            entry_min_align: 0.0,
            entry_weight_by_area: true,
            next_dir: Vector3::new(0.0, 0.0, -1.0),
            next_min_align: 0.0,
            next_weight_floor: 1e-3,
            max_depth: None,
            water_initial: 1.0,
            water_base_cost: 0.05,
            water_link_cost: 0.1,
            water_min_absorb_threshold: 0.1,
            water_min_absorb_continue_prob: 0.5,
            step_link_degradation: 0.25,
            trace_full: false,
            reset_life_min: 0.5,
            reset_picks_max: 10,
            reset_entry_picks_max: 5,
        }
    }
}

impl SimConfig {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_direction("water_dir", &self.water_dir)?;
        check_direction("next_dir", &self.next_dir)?;
        check(
            self.next_weight_floor.is_finite() && self.next_weight_floor > 0.0,
            "next_weight_floor must be positive",
        )?;
        check(self.max_depth != Some(0), "max_depth must be at least 1")?;
        for (name, value) in [
            ("entry_min_align", self.entry_min_align),
            ("next_min_align", self.next_min_align),
        ] {
            check(value.is_finite(), name)?;
        }
        for (name, value) in [
            ("water_initial", self.water_initial),
            ("water_base_cost", self.water_base_cost),
            ("water_link_cost", self.water_link_cost),
            ("water_min_absorb_threshold", self.water_min_absorb_threshold),
            ("step_link_degradation", self.step_link_degradation),
        ] {
            check(value.is_finite() && value >= 0.0, name)?;
        }
        for (name, value) in [
            ("water_min_absorb_continue_prob", self.water_min_absorb_continue_prob),
            ("reset_life_min", self.reset_life_min),
        ] {
            check((0.0..=1.0).contains(&value), name)?;
        }
        Ok(())
    }

    /// The depth limit actually applied.
    #[must_use]
    pub fn depth_limit(&self) -> usize {
        self.max_depth.unwrap_or(UNBOUNDED_DEPTH_CAP)
    }
}

fn check(ok: bool, what: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid(what.to_string()).into())
    }
}

fn check_direction(name: &str, v: &Vector3) -> Result<()> {
    check(
        v.iter().all(|c| c.is_finite()) && v.norm_squared() > 0.0,
        &format!("{name} must be a finite non-zero vector"),
    )
}
