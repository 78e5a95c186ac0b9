//! Seeded inverted dropout with an explicit train/eval switch.
//!
//! Masks are drawn from a per-instance [`StdRng`] so a model built from a
//! fixed seed reproduces the same dropout pattern on every run. Surviving
//! activations are scaled by `1 / (1 - p)`; in evaluation mode, or when
//! `p == 0`, the input passes through untouched.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use candle_core::{Error, Module, Result, Tensor};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Element-wise dropout usable on tensors of any rank.
pub struct Dropout {
    probability: f32,
    rng: Mutex<StdRng>,
    training: AtomicBool,
}

impl fmt::Debug for Dropout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dropout")
            .field("probability", &self.probability)
            .field("training", &self.is_training())
            .finish()
    }
}

impl Dropout {
    /// Builds a dropout site; `probability` must lie in `[0, 1)`.
    pub fn new(probability: f32, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&probability) {
            return Err(Error::Msg(format!(
                "dropout probability must be in [0, 1), got {probability}"
            )));
        }
        Ok(Self {
            probability,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            training: AtomicBool::new(true),
        })
    }

    /// A dropout site that never drops anything.
    pub fn disabled() -> Self {
        Self {
            probability: 0.0,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
            training: AtomicBool::new(true),
        }
    }

    pub fn probability(&self) -> f32 {
        self.probability
    }

    /// Enables or disables dropout based on training mode.
    pub fn set_training(&self, training: bool) {
        self.training.store(training, Ordering::Relaxed);
    }

    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Relaxed)
    }

    fn sample_mask(&self, tensor: &Tensor) -> Result<Tensor> {
        let keep_prob = 1.0 - self.probability;
        let scale = 1.0 / keep_prob;
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| Error::Msg("dropout RNG mutex poisoned".into()))?;
        let data: Vec<f32> = (0..tensor.elem_count())
            .map(|_| {
                if rng.gen::<f32>() < keep_prob {
                    scale
                } else {
                    0.0
                }
            })
            .collect();
        Tensor::from_vec(data, tensor.dims(), tensor.device())?.to_dtype(tensor.dtype())
    }
}

impl Module for Dropout {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        if !self.is_training() || self.probability == 0.0 {
            return Ok(xs.clone());
        }
        let mask = self.sample_mask(xs)?;
        xs.mul(&mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn rejects_out_of_range_probability() {
        assert!(Dropout::new(1.0, 0).is_err());
        assert!(Dropout::new(-0.1, 0).is_err());
        assert!(Dropout::new(0.0, 0).is_ok());
    }

    #[test]
    fn dropout_preserves_expectation() -> Result<()> {
        let dropout = Dropout::new(0.25, 123)?;
        let input = Tensor::ones((4, 8, 16), DType::F32, &Device::Cpu)?;
        let values = dropout.forward(&input)?.flatten_all()?.to_vec1::<f32>()?;
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        assert!((mean - 1.0).abs() < 0.1);
        let kept = 1.0 / 0.75;
        assert!(values
            .iter()
            .all(|v| *v == 0.0 || (*v - kept).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn eval_mode_is_identity() -> Result<()> {
        let dropout = Dropout::new(0.5, 0)?;
        dropout.set_training(false);
        let input = Tensor::randn(0f32, 1.0, (2, 2, 4), &Device::Cpu)?;
        let out = dropout.forward(&input)?;
        let diff = input.sub(&out)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert_eq!(diff, 0.0);
        Ok(())
    }

    #[test]
    fn same_seed_same_mask() -> Result<()> {
        let input = Tensor::ones((3, 5), DType::F32, &Device::Cpu)?;
        let a = Dropout::new(0.5, 9)?.forward(&input)?;
        let b = Dropout::new(0.5, 9)?.forward(&input)?;
        assert_eq!(a.flatten_all()?.to_vec1::<f32>()?, b.flatten_all()?.to_vec1::<f32>()?);
        Ok(())
    }
}
