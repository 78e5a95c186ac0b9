//! Output head mapping decoder states to log-probabilities over the target
//! vocabulary.

use candle_core::{Device, Module, Result, Tensor, D};
use candle_nn::ops::log_softmax;
use layers::{Initializer, Linear, LinearConfig, LinearInit, NamedParameter};

#[derive(Debug)]
pub struct ProjectionLayer {
    proj: Linear,
}

impl ProjectionLayer {
    pub fn new(
        d_model: usize,
        vocab_size: usize,
        init: &mut Initializer,
        device: &Device,
    ) -> Result<Self> {
        let proj = Linear::with_init(
            LinearConfig::new(d_model, vocab_size),
            LinearInit::XavierUniform,
            init,
            device,
        )?;
        Ok(Self { proj })
    }

    pub fn vocab_size(&self) -> usize {
        self.proj.config().output_dim
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<NamedParameter> {
        self.proj.named_parameters(scope)
    }
}

impl Module for ProjectionLayer {
    /// `(batch, seq, d_model)` to `(batch, seq, vocab)` log-probabilities.
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        log_softmax(&self.proj.forward(xs)?, D::Minus1)
    }
}
