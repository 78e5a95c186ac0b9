//! Builders for padding masks used to drop padded keys.
//!
//! Padding masks are shaped `[batch, 1, 1, k_len]` so that they broadcast
//! over heads and query positions.

use candle_core::{bail, DType, Device, Result, Tensor};

use super::MASK_DTYPE;

/// Masks every key whose token id equals `pad_id`.
///
/// `token_ids` must be `[batch, len]` with an integer dtype.
pub fn padding_mask_from_tokens(token_ids: &Tensor, pad_id: u32) -> Result<Tensor> {
    let (batch, len) = token_ids.dims2()?;
    if !token_ids.dtype().is_int() {
        bail!(
            "padding mask expects integer token ids, got {:?}",
            token_ids.dtype()
        );
    }
    let keep = token_ids.to_dtype(DType::I64)?.ne(i64::from(pad_id))?;
    keep.reshape((batch, 1, 1, len))
}

/// Masks key positions at or beyond each batch element's valid length.
pub fn padding_mask_from_lengths(
    device: &Device,
    key_lengths: &[usize],
    k_len: usize,
) -> Result<Tensor> {
    let batch = key_lengths.len();
    let mut data = vec![0u8; batch * k_len];
    for (b, &valid) in key_lengths.iter().enumerate() {
        let valid = valid.min(k_len);
        data[b * k_len..b * k_len + valid].fill(1);
    }
    Tensor::from_vec(data, (batch, 1, 1, k_len), device)?.to_dtype(MASK_DTYPE)
}
