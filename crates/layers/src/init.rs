//! Deterministic parameter initialisation.
//!
//! Candle's CPU device cannot be seeded, so weights are sampled on the host
//! from a [`StdRng`] owned by an [`Initializer`] and then uploaded to the
//! target device. Constructors across the workspace take `&mut Initializer`,
//! which makes the order of construction part of the reproducibility
//! contract: building the same architecture from the same seed yields
//! bit-identical parameters.

use candle_core::{Device, Result, Shape, Tensor};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Seeded source of initial parameter values and dropout seeds.
#[derive(Debug, Clone)]
pub struct Initializer {
    seed: u64,
    rng: StdRng,
}

impl Initializer {
    /// Creates an initializer whose samples are fully determined by `seed`.
    pub fn new(seed: u64) -> Self {
        log::debug!("initializer seeded with {seed}");
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed this initializer was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draws a fresh seed, used to give every dropout site its own stream.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Samples `U(low, high)` into an `f32` tensor of the given shape.
    pub fn uniform<S: Into<Shape>>(
        &mut self,
        low: f32,
        high: f32,
        shape: S,
        device: &Device,
    ) -> Result<Tensor> {
        let shape = shape.into();
        let span = high - low;
        let data: Vec<f32> = (0..shape.elem_count())
            .map(|_| low + span * self.rng.gen::<f32>())
            .collect();
        Tensor::from_vec(data, shape, device)
    }

    /// Xavier/Glorot uniform sample for a `(fan_out, fan_in)` matrix.
    pub fn xavier_uniform(&mut self, shape: (usize, usize), device: &Device) -> Result<Tensor> {
        let (fan_out, fan_in) = shape;
        let bound = (6.0f64 / (fan_in + fan_out) as f64).sqrt() as f32;
        self.uniform(-bound, bound, shape, device)
    }

    /// Fan-in scaled uniform sample, the default for projection biases.
    pub fn fan_in_uniform<S: Into<Shape>>(
        &mut self,
        fan_in: usize,
        shape: S,
        device: &Device,
    ) -> Result<Tensor> {
        let bound = 1.0 / (fan_in.max(1) as f32).sqrt();
        self.uniform(-bound, bound, shape, device)
    }
}
