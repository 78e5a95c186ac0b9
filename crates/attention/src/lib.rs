//! Scaled dot-product and multi-head attention.
//!
//! Kernels operate on `[batch, n_heads, seq_len, head_dim]` tensors. Queries
//! and keys may come from different sequences, which is how the decoder
//! attends to the encoder output. Masks are binary (`u8`, see [`masks`]) and
//! broadcast against the score matrix; masked scores are replaced by `-1e9`
//! before the softmax so fully masked rows stay finite.
//!
//! Dropout on the attention weights is configurable through
//! [`WeightDropout`]; it defaults to leaving the weights untouched.

pub mod core;
pub mod masks;
pub mod multihead;
pub mod reference;

pub use core::{Attended, Attention, AttentionError, Config, WeightDropout};
pub use multihead::{MultiHeadAttention, MultiHeadConfig};
pub use reference::ExactAttention;
