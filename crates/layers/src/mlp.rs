//! Position-wise feed-forward blocks.
//!
//! Hidden states shaped `(batch, seq, hidden)` are expanded to
//! `intermediate_size`, passed through the activation and dropout, then
//! contracted back to `hidden`. Each sequence position is transformed
//! independently.

use candle_core::{Device, Error, Module, Result, Tensor};

use crate::{
    activations::ActivationKind,
    checks,
    dropout::Dropout,
    init::Initializer,
    linear::{Linear, LinearConfig, LinearInit},
    scoped, NamedParameter,
};

/// Configuration shared by transformer feed-forward networks.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedForwardConfig {
    /// Model hidden size (`d_model`).
    pub hidden_size: usize,
    /// Width of the activation space (`d_ff`).
    pub intermediate_size: usize,
    /// Activation applied between projections.
    pub activation: ActivationKind,
    /// Dropout applied to the activated intermediate features.
    pub dropout_p: f32,
}

impl FeedForwardConfig {
    /// Standard ReLU feed-forward configuration.
    pub fn new(hidden_size: usize, intermediate_size: usize, dropout_p: f32) -> Self {
        Self {
            hidden_size,
            intermediate_size,
            activation: ActivationKind::Relu,
            dropout_p,
        }
    }
}

/// Two-layer MLP: `linear_2(dropout(activation(linear_1(x))))`.
#[derive(Debug)]
pub struct FeedForward {
    config: FeedForwardConfig,
    linear_1: Linear,
    linear_2: Linear,
    dropout: Dropout,
}

impl FeedForward {
    pub fn new(
        config: FeedForwardConfig,
        policy: LinearInit,
        init: &mut Initializer,
        device: &Device,
    ) -> Result<Self> {
        if config.hidden_size == 0 || config.intermediate_size == 0 {
            return Err(Error::Msg(format!(
                "feed-forward dimensions must be non-zero, got hidden={} intermediate={}",
                config.hidden_size, config.intermediate_size
            )));
        }
        let linear_1 = Linear::with_init(
            LinearConfig::new(config.hidden_size, config.intermediate_size),
            policy,
            init,
            device,
        )?;
        let linear_2 = Linear::with_init(
            LinearConfig::new(config.intermediate_size, config.hidden_size),
            policy,
            init,
            device,
        )?;
        let dropout = Dropout::new(config.dropout_p, init.next_seed())?;
        Ok(Self {
            config,
            linear_1,
            linear_2,
            dropout,
        })
    }

    pub fn config(&self) -> &FeedForwardConfig {
        &self.config
    }

    pub fn set_training(&self, training: bool) {
        self.dropout.set_training(training);
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<NamedParameter> {
        let mut params = self.linear_1.named_parameters(&scoped(scope, "linear_1"));
        params.extend(self.linear_2.named_parameters(&scoped(scope, "linear_2")));
        params
    }
}

impl Module for FeedForward {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        checks::expect_last_dim("feed_forward.input", xs, self.config.hidden_size)?;
        let expanded = self.linear_1.forward(xs)?;
        let activated = self.config.activation.forward(&expanded)?;
        let dropped = self.dropout.forward(&activated)?;
        self.linear_2.forward(&dropped)
    }
}
