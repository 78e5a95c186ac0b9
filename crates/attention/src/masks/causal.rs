//! Builder for the causal (no look-ahead) mask.

use candle_core::{Device, Result, Tensor};

use super::MASK_DTYPE;

/// Lower-triangular `[1, size, size]` mask: entry `(i, j)` is `1` when
/// `j <= i` and `0` otherwise.
pub fn build_causal_mask(device: &Device, size: usize) -> Result<Tensor> {
    let data: Vec<u8> = (0..size)
        .flat_map(|i| (0..size).map(move |j| u8::from(j <= i)))
        .collect();
    Tensor::from_vec(data, (1, size, size), device)?.to_dtype(MASK_DTYPE)
}
