//! Reference attention kernel.
//!
//! Computes `softmax(mask_fill(QKᵀ / sqrt(d_k))) · V` with plain tensor ops.
//! The exact path prioritises clarity and mirrors the semantics described by
//! the [`Attention`](crate::core::Attention) trait.

use std::sync::OnceLock;

use candle_core::{DType, Module, Result as CandleResult, Tensor};
use candle_nn::ops::softmax_last_dim;
use layers::Dropout;

use crate::core::{Attended, Attention, AttentionError, Config, WeightDropout};

/// Score written where the mask is zero.
pub const MASKED_SCORE: f64 = -1e9;

/// Portable attention kernel.
///
/// Owns the dropout used when [`WeightDropout::Applied`] is configured; with
/// the default [`WeightDropout::Discarded`] the dropout never touches the
/// weights.
#[derive(Debug)]
pub struct ExactAttention {
    dropout: Dropout,
    first_call: OnceLock<()>,
}

impl ExactAttention {
    /// Kernel whose weight dropout uses probability `dropout_p` and `seed`.
    pub fn new(dropout_p: f32, seed: u64) -> CandleResult<Self> {
        Ok(Self {
            dropout: Dropout::new(dropout_p, seed)?,
            first_call: OnceLock::new(),
        })
    }

    pub fn set_training(&self, training: bool) {
        self.dropout.set_training(training);
    }
}

impl Default for ExactAttention {
    fn default() -> Self {
        Self {
            dropout: Dropout::disabled(),
            first_call: OnceLock::new(),
        }
    }
}

impl Attention for ExactAttention {
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        mask: Option<&Tensor>,
        config: &Config,
    ) -> Result<Attended, AttentionError> {
        if self.first_call.set(()).is_ok() {
            log::info!(
                "attention::reference init weight_dropout={} p={} training={}",
                config.weight_dropout.name(),
                self.dropout.probability(),
                self.dropout.is_training()
            );
        }

        let device = q.device();
        if !device.same_device(k.device()) || !device.same_device(v.device()) {
            return Err(AttentionError::InvalidShape {
                context: "q, k, v must reside on the same device".to_string(),
            });
        }

        let dtype = q.dtype();
        if dtype != k.dtype() || dtype != v.dtype() {
            return Err(AttentionError::InvalidShape {
                context: "q, k, v must share the same dtype".to_string(),
            });
        }
        if !matches!(dtype, DType::F32 | DType::F64) {
            return Err(AttentionError::UnsupportedDType {
                requested: format!("{dtype:?}"),
            });
        }

        let (batch, heads, q_len, head_dim) =
            q.dims4().map_err(|_| AttentionError::InvalidShape {
                context: "q must have shape [batch, heads, seq_len, head_dim]".to_string(),
            })?;
        let (kb, kh, k_len, kd) = k.dims4().map_err(|_| AttentionError::InvalidShape {
            context: "k must have shape [batch, heads, seq_len, head_dim]".to_string(),
        })?;
        let (vb, vh, vk, vd) = v.dims4().map_err(|_| AttentionError::InvalidShape {
            context: "v must have shape [batch, heads, seq_len, head_dim]".to_string(),
        })?;

        if kb != batch || kh != heads || kd != head_dim {
            return Err(AttentionError::InvalidShape {
                context: format!(
                    "k shape mismatch: expected [{batch}, {heads}, ?, {head_dim}] got [{kb}, {kh}, {k_len}, {kd}]"
                ),
            });
        }
        if vb != batch || vh != heads || vk != k_len || vd != head_dim {
            return Err(AttentionError::InvalidShape {
                context: format!(
                    "v shape mismatch: expected [{batch}, {heads}, {k_len}, {head_dim}] got [{vb}, {vh}, {vk}, {vd}]"
                ),
            });
        }

        let k_t = k.transpose(2, 3)?.contiguous()?;
        let scores = (q.contiguous()?.matmul(&k_t)? / (head_dim as f64).sqrt())?;

        let scores = match mask {
            Some(mask) => {
                if !device.same_device(mask.device()) {
                    return Err(AttentionError::InvalidShape {
                        context: "mask must reside on the same device as q".to_string(),
                    });
                }
                let keep = mask
                    .ne(0f64)?
                    .broadcast_as((batch, heads, q_len, k_len))
                    .map_err(|_| AttentionError::InvalidShape {
                        context: format!(
                            "mask of shape {:?} does not broadcast to [{batch}, {heads}, {q_len}, {k_len}]",
                            mask.dims()
                        ),
                    })?;
                let filler = Tensor::full(MASKED_SCORE, (batch, heads, q_len, k_len), device)?
                    .to_dtype(dtype)?;
                keep.where_cond(&scores, &filler)?
            }
            None => scores,
        };

        let weights = softmax_last_dim(&scores)?;
        let weights = match config.weight_dropout {
            WeightDropout::Applied => self.dropout.forward(&weights)?,
            WeightDropout::Discarded => weights,
        };

        let output = weights.matmul(&v.contiguous()?)?;
        Ok(Attended { output, weights })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masks::{build_causal_mask, padding_mask_from_lengths};
    use candle_core::Device;

    fn build_inputs(device: &Device) -> CandleResult<(Tensor, Tensor, Tensor)> {
        let data: Vec<f32> = (0..64).map(|i| (i as f32) * 0.01).collect();
        let q = Tensor::from_vec(data.clone(), (1, 2, 4, 8), device)?;
        let k = Tensor::from_vec(data.iter().rev().copied().collect::<Vec<_>>(), (1, 2, 4, 8), device)?;
        let v = Tensor::from_vec(data, (1, 2, 4, 8), device)?;
        Ok((q, k, v))
    }

    fn naive_attention(
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        keep: Option<&[Vec<u8>]>,
    ) -> CandleResult<Tensor> {
        let (batch, heads, q_len, head_dim) = q.dims4()?;
        let (_, _, k_len, _) = k.dims4()?;
        let mut output = vec![0f32; batch * heads * q_len * head_dim];

        let q_vec = q.flatten_all()?.to_vec1::<f32>()?;
        let k_vec = k.flatten_all()?.to_vec1::<f32>()?;
        let v_vec = v.flatten_all()?.to_vec1::<f32>()?;
        let scale = 1.0 / (head_dim as f32).sqrt();

        for b in 0..batch {
            for h in 0..heads {
                for q_idx in 0..q_len {
                    let mut row = vec![0f32; k_len];
                    for (k_idx, slot) in row.iter_mut().enumerate() {
                        let mut dot = 0f32;
                        for d in 0..head_dim {
                            let qi = ((b * heads + h) * q_len + q_idx) * head_dim + d;
                            let ki = ((b * heads + h) * k_len + k_idx) * head_dim + d;
                            dot += q_vec[qi] * k_vec[ki];
                        }
                        *slot = dot * scale;
                        if let Some(keep) = keep {
                            if keep[q_idx][k_idx] == 0 {
                                *slot = -1e9;
                            }
                        }
                    }
                    let max_val = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                    let exp: Vec<f32> = row.iter().map(|s| (s - max_val).exp()).collect();
                    let denom: f32 = exp.iter().sum();
                    for d in 0..head_dim {
                        let mut acc = 0f32;
                        for (k_idx, e) in exp.iter().enumerate() {
                            let vi = ((b * heads + h) * k_len + k_idx) * head_dim + d;
                            acc += e / denom * v_vec[vi];
                        }
                        output[((b * heads + h) * q_len + q_idx) * head_dim + d] = acc;
                    }
                }
            }
        }

        Tensor::from_vec(output, (batch, heads, q_len, head_dim), q.device())
    }

    fn max_diff(a: &Tensor, b: &Tensor) -> CandleResult<f32> {
        a.sub(b)?.abs()?.max_all()?.to_vec0::<f32>()
    }

    #[test]
    fn exact_attention_matches_naive() -> CandleResult<()> {
        let device = Device::Cpu;
        let (q, k, v) = build_inputs(&device)?;
        let mask = build_causal_mask(&device, 4)?;
        let attended = ExactAttention::default().attend(&q, &k, &v, Some(&mask), &Config::default())?;
        let keep: Vec<Vec<u8>> = mask.get(0)?.to_vec2::<u8>()?;
        let expected = naive_attention(&q, &k, &v, Some(keep.as_slice()))?;
        assert!(max_diff(&attended.output, &expected)? < 1e-5);
        Ok(())
    }

    #[test]
    fn weights_are_row_stochastic_and_masked() -> CandleResult<()> {
        let device = Device::Cpu;
        let (q, k, v) = build_inputs(&device)?;
        let mask = build_causal_mask(&device, 4)?;
        let attended = ExactAttention::default().attend(&q, &k, &v, Some(&mask), &Config::default())?;
        assert_eq!(attended.weights.dims(), &[1, 2, 4, 4]);

        let sums = attended.weights.sum(3)?.flatten_all()?.to_vec1::<f32>()?;
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-5));

        let rows = attended.weights.get(0)?.get(1)?.to_vec2::<f32>()?;
        for (i, row) in rows.iter().enumerate() {
            for (j, w) in row.iter().enumerate() {
                if j > i {
                    assert!(*w < 1e-6, "weight ({i}, {j}) = {w}");
                }
            }
        }
        Ok(())
    }

    #[test]
    fn padding_mask_zeroes_padded_keys() -> CandleResult<()> {
        let device = Device::Cpu;
        let (q, k, v) = build_inputs(&device)?;
        let mask = padding_mask_from_lengths(&device, &[3], 4)?;
        let attended = ExactAttention::default().attend(&q, &k, &v, Some(&mask), &Config::default())?;
        let last_key = attended.weights.narrow(3, 3, 1)?.max_all()?.to_vec0::<f32>()?;
        assert!(last_key < 1e-6);
        Ok(())
    }

    #[test]
    fn fully_masked_rows_stay_finite() -> CandleResult<()> {
        let device = Device::Cpu;
        let (q, k, v) = build_inputs(&device)?;
        let mask = Tensor::zeros((1, 1, 1, 4), DType::U8, &device)?;
        let attended = ExactAttention::default().attend(&q, &k, &v, Some(&mask), &Config::default())?;
        let weights = attended.weights.flatten_all()?.to_vec1::<f32>()?;
        assert!(weights.iter().all(|w| (w - 0.25).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn cross_attention_lengths_may_differ() -> CandleResult<()> {
        let device = Device::Cpu;
        let q = Tensor::randn(0f32, 1.0, (2, 2, 3, 4), &device)?;
        let k = Tensor::randn(0f32, 1.0, (2, 2, 5, 4), &device)?;
        let v = Tensor::randn(0f32, 1.0, (2, 2, 5, 4), &device)?;
        let attended = ExactAttention::default().attend(&q, &k, &v, None, &Config::default())?;
        assert_eq!(attended.output.dims(), &[2, 2, 3, 4]);
        assert_eq!(attended.weights.dims(), &[2, 2, 3, 5]);
        Ok(())
    }

    #[test]
    fn mismatched_shapes_error() -> CandleResult<()> {
        let device = Device::Cpu;
        let q = Tensor::zeros((1, 2, 4, 8), DType::F32, &device)?;
        let k = Tensor::zeros((1, 2, 5, 8), DType::F32, &device)?;
        let v = Tensor::zeros((1, 2, 4, 8), DType::F32, &device)?;
        let err = ExactAttention::default()
            .attend(&q, &k, &v, None, &Config::default())
            .unwrap_err();
        assert!(matches!(err, AttentionError::InvalidShape { .. }));
        Ok(())
    }

    #[test]
    fn mask_shape_validation() -> CandleResult<()> {
        let device = Device::Cpu;
        let q = Tensor::zeros((1, 2, 4, 8), DType::F32, &device)?;
        let mask = Tensor::ones((1, 3, 4, 4), DType::U8, &device)?;
        let err = ExactAttention::default()
            .attend(&q, &q, &q, Some(&mask), &Config::default())
            .unwrap_err();
        assert!(matches!(err, AttentionError::InvalidShape { .. }));
        Ok(())
    }

    #[test]
    fn discarded_dropout_leaves_weights_untouched() -> CandleResult<()> {
        let device = Device::Cpu;
        let (q, k, v) = build_inputs(&device)?;
        let kernel = ExactAttention::new(0.5, 9)?;
        let plain = ExactAttention::default().attend(&q, &k, &v, None, &Config::default())?;
        let discarded = kernel.attend(&q, &k, &v, None, &Config::default())?;
        assert_eq!(max_diff(&plain.weights, &discarded.weights)?, 0.0);

        let applied = kernel.attend(
            &q,
            &k,
            &v,
            None,
            &Config {
                weight_dropout: WeightDropout::Applied,
            },
        )?;
        assert!(max_diff(&plain.weights, &applied.weights)? > 0.0);

        kernel.set_training(false);
        let eval = kernel.attend(
            &q,
            &k,
            &v,
            None,
            &Config {
                weight_dropout: WeightDropout::Applied,
            },
        )?;
        assert_eq!(max_diff(&plain.weights, &eval.weights)?, 0.0);
        Ok(())
    }

    #[test]
    fn rejects_integer_inputs() -> CandleResult<()> {
        let q = Tensor::zeros((1, 1, 2, 2), DType::U32, &Device::Cpu)?;
        let err = ExactAttention::default()
            .attend(&q, &q, &q, None, &Config::default())
            .unwrap_err();
        assert!(matches!(err, AttentionError::UnsupportedDType { .. }));
        Ok(())
    }
}
