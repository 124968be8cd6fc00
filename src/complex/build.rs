use tracing::debug;

use crate::error::{BuildError, Result};
use crate::geometry::{Container, HalfSpace};
use crate::math::{is_finite_point, Point3};
use crate::voronoi::{CellDecomposer, HalfSpaceClipper};

use super::CellComplex;

/// Default absolute tolerance for the cell decomposition.
pub const DEFAULT_PRECISION: f64 = 1e-6;

/// Builds a [`CellComplex`] from generator points and a container.
pub struct BuildComplex {
    points: Vec<Point3>,
    container: Container,
    precision: f64,
}

impl BuildComplex {
    /// Creates a new `BuildComplex` operation.
    #[must_use]
    pub fn new(points: Vec<Point3>, bounds: Container) -> Self {
        Self {
            points,
            container: bounds,
            precision: DEFAULT_PRECISION,
        }
    }

    /// Adds wall planes that cells are clipped against.
    #[must_use]
    pub fn with_walls(mut self, walls: Vec<HalfSpace>) -> Self {
        self.container = self.container.with_walls(walls);
        self
    }

    /// Sets the geometric precision forwarded to the decomposition.
    #[must_use]
    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    /// Executes the build with the built-in [`HalfSpaceClipper`].
    ///
    /// # Errors
    ///
    /// Returns an error if the input is invalid or no cell could be built.
    pub fn execute(&self) -> Result<CellComplex> {
        self.execute_with(&HalfSpaceClipper)
    }

    /// Executes the build with a custom decomposition primitive.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is invalid, the decomposition fails
    /// as a whole, or no cell could be built.
    pub fn execute_with(&self, decomposer: &impl CellDecomposer) -> Result<CellComplex> {
        if self.points.is_empty() {
            return Err(BuildError::InvalidInput("no generator points".into()).into());
        }
        if !(self.precision.is_finite() && self.precision > 0.0) {
            return Err(BuildError::InvalidInput(format!(
                "precision must be positive, got {}",
                self.precision
            ))
            .into());
        }
        if let Some(i) = self.points.iter().position(|p| !is_finite_point(p)) {
            return Err(BuildError::InvalidInput(format!("generator {i} is not finite")).into());
        }

        debug!(
            points = self.points.len(),
            walls = self.container.walls().len(),
            precision = self.precision,
            "decomposing cells"
        );
        let raw = decomposer.decompose(&self.points, &self.container, self.precision)?;
        CellComplex::from_raw_cells(&self.points, self.container.clone(), self.precision, raw)
    }
}
