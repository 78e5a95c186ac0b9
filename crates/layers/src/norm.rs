//! Layer normalisation over the trailing feature axis.
//!
//! Computes `alpha * (x - mean) / (std + eps) + bias` where `std` is the
//! sample standard deviation (Bessel corrected, `N - 1` denominator) of the
//! last dimension. Note that `eps` is added to the standard deviation, not to
//! the variance. `alpha` and `bias` are single learned scalars broadcast over
//! every feature, initialised to `1` and `0`.

use candle_core::{DType, Device, Error, Module, Result, Tensor, Var, D};

use crate::{checks, scoped, NamedParameter};

/// Configuration for [`LayerNorm`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormConfig {
    /// Size of the feature dimension being normalised.
    pub hidden_size: usize,
    /// Stabiliser added to the standard deviation.
    pub epsilon: f64,
    /// Use the `N - 1` sample estimator for the standard deviation.
    pub unbiased: bool,
}

impl NormConfig {
    pub fn new(hidden_size: usize) -> Self {
        Self {
            hidden_size,
            epsilon: 1e-6,
            unbiased: true,
        }
    }
}

/// Layer normalisation with a learned scalar gain and shift.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    config: NormConfig,
    alpha: Var,
    bias: Var,
}

impl LayerNorm {
    /// Constructs a norm with `alpha = 1` and `bias = 0`.
    pub fn new(config: NormConfig, device: &Device) -> Result<Self> {
        let alpha = Tensor::ones(1, DType::F32, device)?;
        let bias = Tensor::zeros(1, DType::F32, device)?;
        Self::from_parameters(config, alpha, bias)
    }

    /// Constructs a norm from explicit one-element scale and shift tensors.
    pub fn from_parameters(config: NormConfig, alpha: Tensor, bias: Tensor) -> Result<Self> {
        if config.hidden_size == 0 {
            return Err(Error::Msg("layer norm requires hidden_size > 0".into()));
        }
        if config.epsilon <= 0.0 {
            return Err(Error::Msg(format!(
                "layer norm epsilon must be positive, got {}",
                config.epsilon
            )));
        }
        checks::expect_shape("norm.alpha", &alpha, &[1])?;
        checks::expect_shape("norm.bias", &bias, &[1])?;
        Ok(Self {
            config,
            alpha: Var::from_tensor(&alpha)?,
            bias: Var::from_tensor(&bias)?,
        })
    }

    pub fn config(&self) -> &NormConfig {
        &self.config
    }

    pub fn alpha(&self) -> &Tensor {
        self.alpha.as_tensor()
    }

    pub fn bias(&self) -> &Tensor {
        self.bias.as_tensor()
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<NamedParameter> {
        vec![
            (scoped(scope, "alpha"), self.alpha.clone()),
            (scoped(scope, "bias"), self.bias.clone()),
        ]
    }
}

impl Module for LayerNorm {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        checks::expect_last_dim("norm.input", xs, self.config.hidden_size)?;

        let hidden = self.config.hidden_size as f64;
        let denom = if self.config.unbiased { hidden - 1.0 } else { hidden };

        let mean = xs.mean_keepdim(D::Minus1)?;
        let centered = xs.broadcast_sub(&mean)?;
        let variance = (centered.sqr()?.sum_keepdim(D::Minus1)? / denom)?;
        let std = (variance.sqrt()? + self.config.epsilon)?;
        let normalized = centered.broadcast_div(&std)?;

        normalized
            .broadcast_mul(self.alpha.as_tensor())?
            .broadcast_add(self.bias.as_tensor())
    }
}
