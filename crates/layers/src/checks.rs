//! Lightweight validation helpers shared across layer components.
//!
//! Each routine takes a `label` naming the tensor under inspection so that the
//! resulting `candle_core::Error` points at the offending call site. They
//! return `candle_core::Result<()>` so call sites can propagate errors without
//! panicking.

use candle_core::{DType, Error, Result, Tensor};

/// Ensures a tensor matches the expected dimensions exactly.
pub fn expect_shape(label: &str, tensor: &Tensor, expected: &[usize]) -> Result<()> {
    let actual = tensor.dims();
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label}: expected shape {expected:?}, got {actual:?}"
        )))
    }
}

/// Ensures a tensor has exactly `rank` dimensions.
pub fn expect_rank(label: &str, tensor: &Tensor, rank: usize) -> Result<()> {
    let actual = tensor.rank();
    if actual == rank {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label}: expected rank {rank}, got {actual} ({:?})",
            tensor.dims()
        )))
    }
}

/// Validates the `(batch, seq, hidden)` convention with a known hidden size.
pub fn expect_batch_seq_hidden(label: &str, tensor: &Tensor, hidden: usize) -> Result<()> {
    match tensor.dims() {
        [_, _, actual_hidden] if *actual_hidden == hidden => Ok(()),
        dims => Err(Error::Msg(format!(
            "{label}: expected (batch, seq, {hidden}) layout, got {dims:?}"
        ))),
    }
}

/// Validates that the trailing dimension equals `hidden`, whatever the rank.
pub fn expect_last_dim(label: &str, tensor: &Tensor, hidden: usize) -> Result<()> {
    match tensor.dims().last() {
        Some(last) if *last == hidden => Ok(()),
        _ => Err(Error::Msg(format!(
            "{label}: expected trailing dimension {hidden}, got {:?}",
            tensor.dims()
        ))),
    }
}

/// Checks the tensor dtype is one of the allowed values.
pub fn expect_dtype_in(label: &str, tensor: &Tensor, allowed: &[DType]) -> Result<()> {
    let dtype = tensor.dtype();
    if allowed.contains(&dtype) {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label}: expected dtype in {allowed:?}, got {dtype:?}"
        )))
    }
}

/// Checks two tensors share a dtype.
pub fn expect_same_dtype(
    label_a: &str,
    a: &Tensor,
    label_b: &str,
    b: &Tensor,
) -> Result<()> {
    if a.dtype() == b.dtype() {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label_a} has dtype {:?} but {label_b} has dtype {:?}",
            a.dtype(),
            b.dtype()
        )))
    }
}
