//! Core traits and types shared across attention implementations.
//!
//! Implementations operate on tensors with layout
//! `[batch, n_heads, seq_len, head_dim]`. Queries and keys may have different
//! sequence lengths (cross-attention); keys and values must agree.

pub mod config;
pub mod errors;

use candle_core::Tensor;

pub use config::{Config, WeightDropout};
pub use errors::AttentionError;

/// Result of one attention call.
#[derive(Debug, Clone)]
pub struct Attended {
    /// `[batch, n_heads, q_len, head_dim]`, same dtype as `q`.
    pub output: Tensor,
    /// `[batch, n_heads, q_len, k_len]` weights that were multiplied into `v`.
    pub weights: Tensor,
}

/// Unified interface for attention kernels.
///
/// * `q` is `[batch, n_heads, q_len, head_dim]`; `k` and `v` are
///   `[batch, n_heads, k_len, head_dim]`.
/// * Masks, when present, must broadcast to `[batch, n_heads, q_len, k_len]`.
///   Non-zero entries are kept; zero entries have their score replaced by
///   `-1e9` before the softmax.
pub trait Attention {
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        mask: Option<&Tensor>,
        config: &Config,
    ) -> Result<Attended, AttentionError>;
}
