//! Fixed sinusoidal positional encoding.
//!
//! The table has shape `(max_seq_len, hidden_dim)`. For position `pos` and
//! even column `2i` the angle is `pos * exp(-ln(10000) * 2i / hidden_dim)`;
//! column `2i` holds `sin(angle)` and column `2i + 1` holds `cos(angle)`.
//! The table is a plain tensor, never a [`candle_core::Var`], so no gradient
//! is accumulated for it.

use candle_core::{Device, Error, Module, Result, Tensor};
use layers::{checks, Dropout, Initializer};

const BASE: f64 = 10_000.0;

/// Configuration for [`PositionalEncoding`].
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalEncodingConfig {
    /// Feature dimension the encoding is added to.
    pub hidden_dim: usize,
    /// Longest sequence the precomputed table covers.
    pub max_seq_len: usize,
    /// Dropout applied after the addition.
    pub dropout_p: f32,
}

/// Builds the raw `(max_seq_len, hidden_dim)` sinusoid table.
///
/// An odd `hidden_dim` leaves the last sine column without a cosine partner.
pub fn sinusoidal_table(max_seq_len: usize, hidden_dim: usize, device: &Device) -> Result<Tensor> {
    let mut data = vec![0f32; max_seq_len * hidden_dim];
    let log_base = BASE.ln();
    for pos in 0..max_seq_len {
        let row = &mut data[pos * hidden_dim..(pos + 1) * hidden_dim];
        for even in (0..hidden_dim).step_by(2) {
            let frequency = (-log_base * even as f64 / hidden_dim as f64).exp();
            let angle = pos as f64 * frequency;
            row[even] = angle.sin() as f32;
            if even + 1 < hidden_dim {
                row[even + 1] = angle.cos() as f32;
            }
        }
    }
    Tensor::from_vec(data, (max_seq_len, hidden_dim), device)
}

/// Adds the sinusoid table to `(batch, seq, hidden)` inputs, then applies dropout.
#[derive(Debug)]
pub struct PositionalEncoding {
    config: PositionalEncodingConfig,
    table: Tensor,
    dropout: Dropout,
}

impl PositionalEncoding {
    pub fn new(
        config: PositionalEncodingConfig,
        init: &mut Initializer,
        device: &Device,
    ) -> Result<Self> {
        if config.hidden_dim == 0 || config.max_seq_len == 0 {
            return Err(Error::Msg(format!(
                "positional encoding requires non-zero dims, got hidden={} max_seq_len={}",
                config.hidden_dim, config.max_seq_len
            )));
        }
        let table = sinusoidal_table(config.max_seq_len, config.hidden_dim, device)?;
        log::debug!(
            "positional encoding table built: max_seq_len={} hidden={}",
            config.max_seq_len,
            config.hidden_dim
        );
        let dropout = Dropout::new(config.dropout_p, init.next_seed())?;
        Ok(Self {
            config,
            table,
            dropout,
        })
    }

    pub fn config(&self) -> &PositionalEncodingConfig {
        &self.config
    }

    /// The full precomputed table.
    pub fn table(&self) -> &Tensor {
        &self.table
    }

    pub fn set_training(&self, training: bool) {
        self.dropout.set_training(training);
    }
}

impl Module for PositionalEncoding {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        checks::expect_batch_seq_hidden("positional.input", xs, self.config.hidden_dim)?;
        let seq_len = xs.dim(1)?;
        if seq_len > self.config.max_seq_len {
            return Err(Error::Msg(format!(
                "sequence length {seq_len} exceeds positional table length {}",
                self.config.max_seq_len
            )));
        }
        let window = self
            .table
            .narrow(0, 0, seq_len)?
            .unsqueeze(0)?
            .to_dtype(xs.dtype())?;
        let encoded = xs.broadcast_add(&window)?;
        self.dropout.forward(&encoded)
    }
}
