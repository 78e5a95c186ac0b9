//! Configuration options shared by all attention implementations.
//!
//! The [`Config`] struct captures run-time knobs that callers can tune
//! without swapping implementations.

/// What happens to the dropout computed over attention weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightDropout {
    /// Dropout is not applied to the weights; the values multiplied into `V`
    /// are the plain softmax output.
    #[default]
    Discarded,
    /// Dropout is applied to the weights during training before they are
    /// multiplied into `V`.
    Applied,
}

impl WeightDropout {
    /// Parses `"discarded"` or `"applied"`, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "discarded" => Some(Self::Discarded),
            "applied" => Some(Self::Applied),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Discarded => "discarded",
            Self::Applied => "applied",
        }
    }
}

/// Configuration driving attention behaviour.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Treatment of dropout on the attention weights.
    pub weight_dropout: WeightDropout,
}
