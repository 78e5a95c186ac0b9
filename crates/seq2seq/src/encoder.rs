//! Encoder stack: `n_layers` blocks of self-attention and feed-forward,
//! each wrapped in a pre-norm residual, followed by a final layer norm.

use attention::MultiHeadAttention;
use candle_core::{Device, Module, Result, Tensor};
use layers::{scoped, FeedForward, Initializer, LayerNorm, LinearInit, NamedParameter, Residual};

use crate::config::TransformerConfig;

#[derive(Debug)]
pub struct EncoderBlock {
    self_attention: MultiHeadAttention,
    feed_forward: FeedForward,
    residuals: [Residual; 2],
}

impl EncoderBlock {
    pub fn new(config: &TransformerConfig, init: &mut Initializer, device: &Device) -> Result<Self> {
        let self_attention = MultiHeadAttention::new(config.attention_config(), init, device)?;
        let feed_forward = FeedForward::new(
            config.feed_forward_config(),
            LinearInit::XavierUniform,
            init,
            device,
        )?;
        let residuals = [
            Residual::new(config.residual_config(), init, device)?,
            Residual::new(config.residual_config(), init, device)?,
        ];
        Ok(Self {
            self_attention,
            feed_forward,
            residuals,
        })
    }

    pub fn self_attention(&self) -> &MultiHeadAttention {
        &self.self_attention
    }

    pub fn forward(&self, xs: &Tensor, src_mask: Option<&Tensor>) -> Result<Tensor> {
        let attend = |x: &Tensor| self.self_attention.forward(x, x, x, src_mask);
        let xs = self.residuals[0].forward(xs, &attend)?;
        self.residuals[1].forward(&xs, &self.feed_forward)
    }

    pub fn set_training(&self, training: bool) {
        self.self_attention.set_training(training);
        self.feed_forward.set_training(training);
        for residual in &self.residuals {
            residual.set_training(training);
        }
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<NamedParameter> {
        let mut params = self
            .self_attention
            .named_parameters(&scoped(scope, "self_attention"));
        params.extend(
            self.feed_forward
                .named_parameters(&scoped(scope, "feed_forward")),
        );
        for (idx, residual) in self.residuals.iter().enumerate() {
            params.extend(residual.named_parameters(&scoped(scope, &format!("residuals.{idx}"))));
        }
        params
    }
}

#[derive(Debug)]
pub struct Encoder {
    layers: Vec<EncoderBlock>,
    norm: LayerNorm,
}

impl Encoder {
    pub fn new(config: &TransformerConfig, init: &mut Initializer, device: &Device) -> Result<Self> {
        let layers = (0..config.n_layers)
            .map(|_| EncoderBlock::new(config, init, device))
            .collect::<Result<Vec<_>>>()?;
        let norm = LayerNorm::new(config.norm_config(), device)?;
        Ok(Self { layers, norm })
    }

    pub fn layers(&self) -> &[EncoderBlock] {
        &self.layers
    }

    /// `xs` is the embedded source `(batch, src_len, d_model)`.
    pub fn forward(&self, xs: &Tensor, src_mask: Option<&Tensor>) -> Result<Tensor> {
        let mut hidden = xs.clone();
        for layer in &self.layers {
            hidden = layer.forward(&hidden, src_mask)?;
        }
        self.norm.forward(&hidden)
    }

    pub fn set_training(&self, training: bool) {
        for layer in &self.layers {
            layer.set_training(training);
        }
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<NamedParameter> {
        let mut params = Vec::new();
        for (idx, layer) in self.layers.iter().enumerate() {
            params.extend(layer.named_parameters(&scoped(scope, &format!("layers.{idx}"))));
        }
        params.extend(self.norm.named_parameters(&scoped(scope, "norm")));
        params
    }
}
