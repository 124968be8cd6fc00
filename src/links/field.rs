use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

/// A deterministic scalar field over the XY plane.
pub trait ResistanceField {
    /// Samples the field; values are clamped to `[0, 1]` by the caller.
    fn sample(&self, x: f64, y: f64) -> f64;
}

/// The same resistance everywhere.
#[derive(Debug, Clone, Copy)]
pub struct ConstantField(pub f64);

impl ResistanceField for ConstantField {
    fn sample(&self, _x: f64, _y: f64) -> f64 {
        self.0
    }
}

/// Fractal Perlin noise remapped to `[low, high]`.
#[derive(Clone)]
pub struct NoiseField {
    fbm: Fbm<Perlin>,
    frequency: f64,
    low: f64,
    high: f64,
}

impl NoiseField {
    /// Default number of noise octaves.
    pub const OCTAVES: usize = 4;

    /// Creates a field from a noise seed and a spatial frequency.
    #[must_use]
    pub fn new(seed: u32, frequency: f64) -> Self {
        Self {
            fbm: Fbm::<Perlin>::new(seed).set_octaves(Self::OCTAVES),
            frequency,
            low: 0.0,
            high: 1.0,
        }
    }

    /// Remaps the output to `[low, high]`.
    #[must_use]
    pub fn with_range(mut self, low: f64, high: f64) -> Self {
        self.low = low;
        self.high = high;
        self
    }
}

impl Default for NoiseField {
    fn default() -> Self {
        Self::new(0, 1.0).with_range(0.0, 0.5)
    }
}

impl ResistanceField for NoiseField {
    fn sample(&self, x: f64, y: f64) -> f64 {
        let v = self.fbm.get([x * self.frequency, y * self.frequency]);
        let t = ((v + 1.0) * 0.5).clamp(0.0, 1.0);
        self.low + (self.high - self.low) * t
    }
}
