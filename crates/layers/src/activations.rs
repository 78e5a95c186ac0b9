//! Activation catalogue for transformer feed-forward stacks.
//!
//! Activations are shape preserving and operate on any rank.
//!
//! # Built-in formulas
//!
//! * **ReLU** `max(0, x)`, the default for encoder-decoder feed-forward
//!   blocks.
//! * **GELU** uses the erf form `0.5 * x * (1 + erf(x / sqrt(2)))`.
//! * **Identity** passes the input through, useful when probing wiring.

use candle_core::{Module, Result, Tensor};

/// Identifies which non-linearity a feed-forward block applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationKind {
    /// Rectified linear unit.
    #[default]
    Relu,
    /// Gaussian error linear unit (erf form).
    Gelu,
    /// Identity function.
    Identity,
}

impl ActivationKind {
    /// Parses the lowercase names used in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "relu" => Some(ActivationKind::Relu),
            "gelu" => Some(ActivationKind::Gelu),
            "identity" | "none" => Some(ActivationKind::Identity),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivationKind::Relu => "relu",
            ActivationKind::Gelu => "gelu",
            ActivationKind::Identity => "identity",
        }
    }
}

impl Module for ActivationKind {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            ActivationKind::Relu => xs.relu(),
            ActivationKind::Gelu => xs.gelu_erf(),
            ActivationKind::Identity => Ok(xs.clone()),
        }
    }
}
