//! Encoder-decoder transformer for sequence-to-sequence tasks.
//!
//! [`build_transformer`] assembles source/target embeddings, sinusoidal
//! positional encodings, `N` encoder and decoder blocks and a log-softmax
//! projection from a [`TransformerConfig`]. Masks are built with the helpers
//! re-exported under [`masks`].

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod model;
pub mod projection;

pub use attention::masks;
pub use config::TransformerConfig;
pub use decoder::{Decoder, DecoderBlock};
pub use encoder::{Encoder, EncoderBlock};
pub use error::{Result, TransformerError};
pub use model::{build_transformer, Transformer};
pub use projection::ProjectionLayer;
