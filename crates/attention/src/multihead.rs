//! Multi-head attention block.
//!
//! Inputs `(batch, seq, d_model)` are projected by `w_q`, `w_k` and `w_v`,
//! split into `n_heads` heads of width `d_k = d_model / n_heads`, attended
//! through an [`Attention`] kernel, merged back and projected by `w_o`.

use std::sync::Mutex;

use candle_core::{Device, Error, Module, Result, Tensor};
use layers::{checks, scoped, Initializer, Linear, LinearConfig, LinearInit, NamedParameter};

use crate::core::{Attention, Config};
use crate::reference::ExactAttention;

/// Hyper-parameters of one attention block.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiHeadConfig {
    pub d_model: usize,
    pub n_heads: usize,
    /// Probability used by the kernel's weight dropout.
    pub dropout_p: f32,
    pub attention: Config,
}

impl MultiHeadConfig {
    pub fn new(d_model: usize, n_heads: usize, dropout_p: f32) -> Self {
        Self {
            d_model,
            n_heads,
            dropout_p,
            attention: Config::default(),
        }
    }

    /// Width of one head, or `None` when `n_heads` is zero.
    pub fn head_dim(&self) -> Option<usize> {
        self.d_model.checked_div(self.n_heads)
    }
}

#[derive(Debug)]
pub struct MultiHeadAttention {
    config: MultiHeadConfig,
    w_q: Linear,
    w_k: Linear,
    w_v: Linear,
    w_o: Linear,
    kernel: ExactAttention,
    last_weights: Mutex<Option<Tensor>>,
}

impl MultiHeadAttention {
    pub fn new(config: MultiHeadConfig, init: &mut Initializer, device: &Device) -> Result<Self> {
        if config.n_heads == 0 || config.d_model % config.n_heads != 0 {
            return Err(Error::Msg(format!(
                "d_model {} is not divisible by n_heads {}",
                config.d_model, config.n_heads
            )));
        }
        let w_q = projection(config.d_model, init, device)?;
        let w_k = projection(config.d_model, init, device)?;
        let w_v = projection(config.d_model, init, device)?;
        let w_o = projection(config.d_model, init, device)?;
        let kernel = ExactAttention::new(config.dropout_p, init.next_seed())?;
        Ok(Self {
            config,
            w_q,
            w_k,
            w_v,
            w_o,
            kernel,
            last_weights: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &MultiHeadConfig {
        &self.config
    }

    pub fn set_training(&self, training: bool) {
        self.kernel.set_training(training);
    }

    /// Attention weights `(batch, n_heads, q_len, k_len)` of the most recent
    /// call, or `None` before the first call.
    pub fn last_attention_weights(&self) -> Result<Option<Tensor>> {
        let guard = self
            .last_weights
            .lock()
            .map_err(|_| Error::Msg("attention weights mutex poisoned".into()))?;
        Ok(guard.as_ref().cloned())
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<NamedParameter> {
        let mut params = self.w_q.named_parameters(&scoped(scope, "w_q"));
        params.extend(self.w_k.named_parameters(&scoped(scope, "w_k")));
        params.extend(self.w_v.named_parameters(&scoped(scope, "w_v")));
        params.extend(self.w_o.named_parameters(&scoped(scope, "w_o")));
        params
    }

    /// `query` is `(batch, q_len, d_model)`; `key` and `value` are
    /// `(batch, k_len, d_model)`. The mask must broadcast to
    /// `(batch, n_heads, q_len, k_len)`.
    pub fn forward(
        &self,
        query: &Tensor,
        key: &Tensor,
        value: &Tensor,
        mask: Option<&Tensor>,
    ) -> Result<Tensor> {
        let d_model = self.config.d_model;
        checks::expect_batch_seq_hidden("attention.query", query, d_model)?;
        checks::expect_batch_seq_hidden("attention.key", key, d_model)?;
        checks::expect_batch_seq_hidden("attention.value", value, d_model)?;

        let q = self.split_heads(&self.w_q.forward(query)?)?;
        let k = self.split_heads(&self.w_k.forward(key)?)?;
        let v = self.split_heads(&self.w_v.forward(value)?)?;

        let attended = self.kernel.attend(&q, &k, &v, mask, &self.config.attention)?;
        log::debug!("attention weights shape {:?}", attended.weights.dims());
        let mut slot = self
            .last_weights
            .lock()
            .map_err(|_| Error::Msg("attention weights mutex poisoned".into()))?;
        *slot = Some(attended.weights);
        drop(slot);

        let merged = self.merge_heads(&attended.output)?;
        self.w_o.forward(&merged)
    }

    fn split_heads(&self, xs: &Tensor) -> Result<Tensor> {
        let (batch, seq, _) = xs.dims3()?;
        let head_dim = self
            .config
            .head_dim()
            .ok_or_else(|| Error::Msg("n_heads must be non-zero".into()))?;
        xs.reshape((batch, seq, self.config.n_heads, head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    fn merge_heads(&self, xs: &Tensor) -> Result<Tensor> {
        let (batch, _, seq, _) = xs.dims4()?;
        xs.transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq, self.config.d_model))
    }
}

fn projection(d_model: usize, init: &mut Initializer, device: &Device) -> Result<Linear> {
    Linear::with_init(
        LinearConfig::new(d_model, d_model),
        LinearInit::XavierUniform,
        init,
        device,
    )
}
