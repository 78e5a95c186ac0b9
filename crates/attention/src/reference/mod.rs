//! Portable, exact implementation of scaled dot-product attention.

pub mod exact;

pub use exact::{ExactAttention, MASKED_SCORE};
