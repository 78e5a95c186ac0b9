//! Token embedding layer.

use candle_core::{bail, DType, Device, Error, Module, Result, Tensor, Var};
use layers::{scoped, Initializer, NamedParameter};

/// Configuration for building a token embedding table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEmbeddingConfig {
    /// Size of the vocabulary (number of distinct tokens).
    pub vocab_size: usize,
    /// Dimensionality of each embedding vector (`d_model`).
    pub hidden_dim: usize,
}

/// Learnable token embedding table.
///
/// Looked-up vectors are multiplied by `sqrt(hidden_dim)` so their magnitude
/// is comparable to the positional encoding added afterwards.
#[derive(Debug, Clone)]
pub struct TokenEmbedding {
    config: TokenEmbeddingConfig,
    weight: Var,
    scale: f64,
}

impl TokenEmbedding {
    /// Builds a new table with Xavier-uniform sampled rows.
    pub fn new(
        config: TokenEmbeddingConfig,
        init: &mut Initializer,
        device: &Device,
    ) -> Result<Self> {
        if config.vocab_size == 0 {
            bail!("token embedding requires vocab_size > 0");
        }
        if config.hidden_dim == 0 {
            bail!("token embedding requires hidden_dim > 0");
        }
        let initial = init.xavier_uniform((config.vocab_size, config.hidden_dim), device)?;
        Self::from_weight(config, initial)
    }

    /// Wraps an existing `(vocab_size, hidden_dim)` table.
    pub fn from_weight(config: TokenEmbeddingConfig, weight: Tensor) -> Result<Self> {
        layers::checks::expect_shape(
            "embedding.weight",
            &weight,
            &[config.vocab_size, config.hidden_dim],
        )?;
        let scale = (config.hidden_dim as f64).sqrt();
        Ok(Self {
            config,
            weight: Var::from_tensor(&weight)?,
            scale,
        })
    }

    /// Returns the embedding configuration.
    pub fn config(&self) -> &TokenEmbeddingConfig {
        &self.config
    }

    /// Returns the underlying weight tensor.
    pub fn weight(&self) -> &Tensor {
        self.weight.as_tensor()
    }

    /// Returns the trainable parameters for this embedding with an optional scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<NamedParameter> {
        let prefix = if scope.is_empty() { "embedding" } else { scope };
        vec![(scoped(prefix, "weight"), self.weight.clone())]
    }

    fn validate_token_ids(&self, token_ids: &Tensor) -> Result<()> {
        layers::checks::expect_rank("token_ids", token_ids, 2)?;
        let (batch, seq) = token_ids.dims2()?;
        if batch == 0 || seq == 0 {
            return Err(Error::Msg(
                "token_ids must have non-zero batch and seq dimensions".into(),
            ));
        }

        if token_ids.dtype().is_int() {
            Ok(())
        } else {
            Err(Error::Msg(format!(
                "token_ids expected integer dtype but received {:?}",
                token_ids.dtype()
            )))
        }
    }

    fn ensure_id_range(&self, flat_ids: &Tensor) -> Result<()> {
        let min_id = flat_ids.min_all()?.to_scalar::<i64>()?;
        if min_id < 0 {
            return Err(Error::Msg(format!(
                "encountered negative token id {min_id} (minimum)"
            )));
        }

        let max_id = flat_ids.max_all()?.to_scalar::<i64>()?;
        let vocab = self.config.vocab_size as i64;
        if max_id >= vocab {
            return Err(Error::Msg(format!(
                "token id {max_id} exceeds vocab size {vocab}"
            )));
        }
        Ok(())
    }
}

impl Module for TokenEmbedding {
    /// Looks up embeddings for `(batch, seq)` integer token ids and returns
    /// `(batch, seq, hidden)` scaled by `sqrt(hidden)`.
    fn forward(&self, token_ids: &Tensor) -> Result<Tensor> {
        self.validate_token_ids(token_ids)?;
        let (batch, seq) = token_ids.dims2()?;

        let flat = token_ids.to_dtype(DType::I64)?.flatten_all()?;
        self.ensure_id_range(&flat)?;

        let gathered = self.weight.as_tensor().index_select(&flat, 0)?;
        let scaled = gathered.affine(self.scale, 0.0)?;
        scaled.reshape((batch, seq, self.config.hidden_dim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_scaled_by_sqrt_hidden() -> Result<()> {
        let device = Device::Cpu;
        let config = TokenEmbeddingConfig {
            vocab_size: 3,
            hidden_dim: 4,
        };
        let weight = Tensor::arange(0f32, 12.0, &device)?.reshape((3, 4))?;
        let embedding = TokenEmbedding::from_weight(config, weight)?;
        let ids = Tensor::new(&[[2u32, 0]], &device)?;
        let out = embedding.forward(&ids)?;
        assert_eq!(out.dims(), &[1, 2, 4]);
        assert_eq!(
            out.flatten_all()?.to_vec1::<f32>()?,
            vec![16.0, 18.0, 20.0, 22.0, 0.0, 2.0, 4.0, 6.0]
        );
        Ok(())
    }

    #[test]
    fn rejects_float_ids_and_bad_rank() -> Result<()> {
        let device = Device::Cpu;
        let mut init = Initializer::new(0);
        let embedding = TokenEmbedding::new(
            TokenEmbeddingConfig {
                vocab_size: 4,
                hidden_dim: 2,
            },
            &mut init,
            &device,
        )?;
        let float_ids = Tensor::zeros((1, 2), DType::F32, &device)?;
        assert!(embedding.forward(&float_ids).is_err());
        let flat_ids = Tensor::new(&[0u32, 1], &device)?;
        assert!(embedding.forward(&flat_ids).is_err());
        Ok(())
    }

    #[test]
    fn rejects_negative_ids() -> Result<()> {
        let device = Device::Cpu;
        let mut init = Initializer::new(0);
        let embedding = TokenEmbedding::new(
            TokenEmbeddingConfig {
                vocab_size: 4,
                hidden_dim: 2,
            },
            &mut init,
            &device,
        )?;
        let ids = Tensor::new(&[[1i64, -1]], &device)?;
        let err = embedding.forward(&ids).unwrap_err();
        assert!(err.to_string().contains("negative token id"));
        Ok(())
    }
}
