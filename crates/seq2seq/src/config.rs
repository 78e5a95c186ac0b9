//! Model hyper-parameters.
//!
//! [`TransformerConfig::new`] gives the base-model defaults (`d_model = 512`,
//! six layers, eight heads, `d_ff = 2048`, dropout `0.1`). Configurations can
//! also be read from TOML or JSON; omitted fields fall back to the same
//! defaults.

use std::{fs, path::Path};

use attention::{MultiHeadConfig, WeightDropout};
use layers::{norm::NormConfig, ActivationKind, FeedForwardConfig, ResidualConfig};
use serde::{de, Deserialize, Deserializer};

use crate::error::{Result, TransformerError};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransformerConfig {
    pub src_vocab_size: usize,
    pub tgt_vocab_size: usize,
    /// Longest source sequence the positional table covers.
    pub src_seq_len: usize,
    /// Longest target sequence the positional table covers.
    pub tgt_seq_len: usize,
    #[serde(default = "default_d_model")]
    pub d_model: usize,
    #[serde(default = "default_n_layers", alias = "N")]
    pub n_layers: usize,
    #[serde(default = "default_n_heads", alias = "h")]
    pub n_heads: usize,
    #[serde(default = "default_d_ff")]
    pub d_ff: usize,
    #[serde(default = "default_dropout")]
    pub dropout: f32,
    #[serde(default = "default_norm_epsilon")]
    pub norm_epsilon: f64,
    /// Seed for weight sampling and every dropout stream.
    #[serde(default)]
    pub seed: u64,
    #[serde(default, deserialize_with = "deserialize_weight_dropout")]
    pub attention_weight_dropout: WeightDropout,
    #[serde(default, deserialize_with = "deserialize_activation")]
    pub activation: ActivationKind,
}

impl TransformerConfig {
    pub fn new(
        src_vocab_size: usize,
        tgt_vocab_size: usize,
        src_seq_len: usize,
        tgt_seq_len: usize,
    ) -> Self {
        Self {
            src_vocab_size,
            tgt_vocab_size,
            src_seq_len,
            tgt_seq_len,
            d_model: default_d_model(),
            n_layers: default_n_layers(),
            n_heads: default_n_heads(),
            d_ff: default_d_ff(),
            dropout: default_dropout(),
            norm_epsilon: default_norm_epsilon(),
            seed: 0,
            attention_weight_dropout: WeightDropout::default(),
            activation: ActivationKind::default(),
        }
    }

    /// Reads a configuration from `.toml` or `.json` and validates it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: TransformerConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") | None => toml::from_str(&contents)?,
            Some(other) => {
                return Err(TransformerError::ConfigFormat(format!(
                    "unsupported configuration extension '{other}'"
                )));
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every structural constraint and reports all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.src_vocab_size == 0 {
            errors.push("src_vocab_size must be greater than 0".to_string());
        }
        if self.tgt_vocab_size == 0 {
            errors.push("tgt_vocab_size must be greater than 0".to_string());
        }
        if self.src_seq_len == 0 {
            errors.push("src_seq_len must be greater than 0".to_string());
        }
        if self.tgt_seq_len == 0 {
            errors.push("tgt_seq_len must be greater than 0".to_string());
        }
        if self.d_model == 0 {
            errors.push("d_model must be greater than 0".to_string());
        }
        if self.n_layers == 0 {
            errors.push("n_layers must be greater than 0".to_string());
        }
        if self.n_heads == 0 {
            errors.push("n_heads must be greater than 0".to_string());
        } else if self.d_model % self.n_heads != 0 {
            errors.push(format!(
                "d_model ({}) must be divisible by n_heads ({})",
                self.d_model, self.n_heads
            ));
        }
        if self.d_ff == 0 {
            errors.push("d_ff must be greater than 0".to_string());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            errors.push(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        if self.norm_epsilon <= 0.0 {
            errors.push("norm_epsilon must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TransformerError::InvalidConfig(errors))
        }
    }

    /// Width of one attention head, or `None` when `n_heads` is zero.
    pub fn head_dim(&self) -> Option<usize> {
        self.d_model.checked_div(self.n_heads)
    }

    pub(crate) fn attention_config(&self) -> MultiHeadConfig {
        let mut config = MultiHeadConfig::new(self.d_model, self.n_heads, self.dropout);
        config.attention.weight_dropout = self.attention_weight_dropout;
        config
    }

    pub(crate) fn feed_forward_config(&self) -> FeedForwardConfig {
        let mut config = FeedForwardConfig::new(self.d_model, self.d_ff, self.dropout);
        config.activation = self.activation;
        config
    }

    pub(crate) fn residual_config(&self) -> ResidualConfig {
        ResidualConfig {
            hidden_size: self.d_model,
            dropout_p: self.dropout,
            norm_epsilon: self.norm_epsilon,
        }
    }

    pub(crate) fn norm_config(&self) -> NormConfig {
        let mut config = NormConfig::new(self.d_model);
        config.epsilon = self.norm_epsilon;
        config
    }
}

fn deserialize_activation<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<ActivationKind, D::Error> {
    let name = String::deserialize(deserializer)?;
    ActivationKind::from_name(&name)
        .ok_or_else(|| de::Error::custom(format!("unknown activation '{name}'")))
}

fn deserialize_weight_dropout<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<WeightDropout, D::Error> {
    let name = String::deserialize(deserializer)?;
    WeightDropout::from_name(&name)
        .ok_or_else(|| de::Error::custom(format!("unknown attention_weight_dropout '{name}'")))
}

fn default_d_model() -> usize {
    512
}

fn default_n_layers() -> usize {
    6
}

fn default_n_heads() -> usize {
    8
}

fn default_d_ff() -> usize {
    2048
}

fn default_dropout() -> f32 {
    0.1
}

fn default_norm_epsilon() -> f64 {
    1e-6
}
