//! Positional encodings added to token embeddings.

pub mod sinusoidal;

pub use sinusoidal::{sinusoidal_table, PositionalEncoding, PositionalEncodingConfig};
