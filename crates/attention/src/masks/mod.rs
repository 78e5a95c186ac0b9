//! Mask utilities shared by attention implementations.
//!
//! All masks produced here are binary tensors with dtype `u8`: `1` keeps a
//! query/key pair and `0` discards it. Shapes are chosen to broadcast against
//! `[batch, n_heads, q_len, k_len]` attention scores.

pub mod causal;
pub mod padding;

use candle_core::{DType, Result, Tensor};

/// Dtype shared by all binary masks.
pub const MASK_DTYPE: DType = DType::U8;

pub use causal::build_causal_mask;
pub use padding::{padding_mask_from_lengths, padding_mask_from_tokens};

/// Logical AND of two masks with broadcasting. Any non-zero entry counts as
/// "keep", whatever the input dtype.
pub fn combine_masks(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    let a = binarize(a)?;
    let b = binarize(b)?;
    a.broadcast_mul(&b)
}

/// Mask for decoder self-attention: keys must be non-padding and must not
/// lie after the query. Returns `[batch, 1, len, len]`.
pub fn decoder_mask(token_ids: &Tensor, pad_id: u32) -> Result<Tensor> {
    let padding = padding_mask_from_tokens(token_ids, pad_id)?;
    let len = token_ids.dim(1)?;
    let causal = build_causal_mask(token_ids.device(), len)?;
    combine_masks(&padding, &causal)
}

fn binarize(mask: &Tensor) -> Result<Tensor> {
    if mask.dtype() == MASK_DTYPE {
        return mask.ne(0u8);
    }
    mask.ne(0f64)
}
