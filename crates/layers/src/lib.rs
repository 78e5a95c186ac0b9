//! Building blocks for encoder-decoder transformer layers.
//!
//! Every component here consumes and produces tensors following the
//! `(batch, seq, hidden)` convention and implements [`candle_core::Module`]
//! where its forward pass takes a single input. Parameters are stored as
//! [`candle_core::Var`] so an external optimiser can update them in place, and
//! all random state (weight sampling, dropout masks) flows from an explicit
//! [`init::Initializer`] rather than a global generator.

pub mod activations;
pub mod checks;
pub mod dropout;
pub mod init;
pub mod linear;
pub mod mlp;
pub mod norm;
pub mod residual;

pub use activations::ActivationKind;
pub use dropout::Dropout;
pub use init::Initializer;
pub use linear::{Linear, LinearConfig, LinearInit};
pub use mlp::{FeedForward, FeedForwardConfig};
pub use norm::{LayerNorm, NormConfig};
pub use residual::{Residual, ResidualConfig};

/// Parameter handle paired with its dotted name, e.g. `encoder.layers.0.norm.alpha`.
pub type NamedParameter = (String, candle_core::Var);

/// Joins a parent scope and a child name with a `.` separator.
pub fn scoped(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}
