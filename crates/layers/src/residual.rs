//! Pre-norm residual wiring around an arbitrary sublayer.
//!
//! A [`Residual`] owns the normalisation and dropout of one sublayer slot and
//! computes `x + dropout(sublayer(norm(x)))`. The sublayer is any
//! [`Module`], which includes closures of type `Fn(&Tensor) -> Result<Tensor>`,
//! so attention calls that need extra arguments (keys, masks) can be wrapped
//! inline.

use candle_core::{Device, Module, Result, Tensor};

use crate::{
    checks,
    dropout::Dropout,
    init::Initializer,
    norm::{LayerNorm, NormConfig},
    scoped, NamedParameter,
};

/// Configuration describing one residual slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualConfig {
    /// Feature dimension of the residual stream.
    pub hidden_size: usize,
    /// Dropout applied to the sublayer output before the addition.
    pub dropout_p: f32,
    /// Epsilon of the pre-sublayer layer norm.
    pub norm_epsilon: f64,
}

impl ResidualConfig {
    pub fn new(hidden_size: usize, dropout_p: f32) -> Self {
        Self {
            hidden_size,
            dropout_p,
            norm_epsilon: NormConfig::new(hidden_size).epsilon,
        }
    }
}

/// Residual connection with its own pre-norm and dropout.
#[derive(Debug)]
pub struct Residual {
    config: ResidualConfig,
    norm: LayerNorm,
    dropout: Dropout,
}

impl Residual {
    pub fn new(config: ResidualConfig, init: &mut Initializer, device: &Device) -> Result<Self> {
        let mut norm_config = NormConfig::new(config.hidden_size);
        norm_config.epsilon = config.norm_epsilon;
        let norm = LayerNorm::new(norm_config, device)?;
        let dropout = Dropout::new(config.dropout_p, init.next_seed())?;
        Ok(Self {
            config,
            norm,
            dropout,
        })
    }

    pub fn config(&self) -> &ResidualConfig {
        &self.config
    }

    pub fn norm(&self) -> &LayerNorm {
        &self.norm
    }

    /// Enables or disables dropout based on training mode.
    pub fn set_training(&self, training: bool) {
        self.dropout.set_training(training);
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<NamedParameter> {
        self.norm.named_parameters(&scoped(scope, "norm"))
    }

    /// Applies `x + dropout(sublayer(norm(x)))`.
    pub fn forward<M: Module + ?Sized>(&self, xs: &Tensor, sublayer: &M) -> Result<Tensor> {
        checks::expect_batch_seq_hidden("residual.input", xs, self.config.hidden_size)?;
        let normed = self.norm.forward(xs)?;
        let branch = sublayer.forward(&normed)?;
        checks::expect_shape("residual.branch", &branch, xs.dims())?;
        checks::expect_same_dtype("residual.branch", &branch, "residual.input", xs)?;
        let dropped = self.dropout.forward(&branch)?;
        xs.add(&dropped)
    }
}
