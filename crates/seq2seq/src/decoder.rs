//! Decoder stack: masked self-attention, cross-attention over the encoder
//! output and feed-forward, each in a pre-norm residual; final layer norm.

use attention::MultiHeadAttention;
use candle_core::{Device, Module, Result, Tensor};
use layers::{scoped, FeedForward, Initializer, LayerNorm, LinearInit, NamedParameter, Residual};

use crate::config::TransformerConfig;

#[derive(Debug)]
pub struct DecoderBlock {
    self_attention: MultiHeadAttention,
    cross_attention: MultiHeadAttention,
    feed_forward: FeedForward,
    residuals: [Residual; 3],
}

impl DecoderBlock {
    pub fn new(config: &TransformerConfig, init: &mut Initializer, device: &Device) -> Result<Self> {
        let self_attention = MultiHeadAttention::new(config.attention_config(), init, device)?;
        let cross_attention = MultiHeadAttention::new(config.attention_config(), init, device)?;
        let feed_forward = FeedForward::new(
            config.feed_forward_config(),
            LinearInit::XavierUniform,
            init,
            device,
        )?;
        let residuals = [
            Residual::new(config.residual_config(), init, device)?,
            Residual::new(config.residual_config(), init, device)?,
            Residual::new(config.residual_config(), init, device)?,
        ];
        Ok(Self {
            self_attention,
            cross_attention,
            feed_forward,
            residuals,
        })
    }

    pub fn self_attention(&self) -> &MultiHeadAttention {
        &self.self_attention
    }

    pub fn cross_attention(&self) -> &MultiHeadAttention {
        &self.cross_attention
    }

    /// Queries of the cross-attention come from the decoder stream; keys and
    /// values are the (already normalised) encoder output.
    pub fn forward(
        &self,
        xs: &Tensor,
        encoder_output: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
    ) -> Result<Tensor> {
        let attend_self = |x: &Tensor| self.self_attention.forward(x, x, x, tgt_mask);
        let xs = self.residuals[0].forward(xs, &attend_self)?;
        let attend_source = |x: &Tensor| {
            self.cross_attention
                .forward(x, encoder_output, encoder_output, src_mask)
        };
        let xs = self.residuals[1].forward(&xs, &attend_source)?;
        self.residuals[2].forward(&xs, &self.feed_forward)
    }

    pub fn set_training(&self, training: bool) {
        self.self_attention.set_training(training);
        self.cross_attention.set_training(training);
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
            self.cross_attention
                .named_parameters(&scoped(scope, "cross_attention")),
        );
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
pub struct Decoder {
    layers: Vec<DecoderBlock>,
    norm: LayerNorm,
}

impl Decoder {
    pub fn new(config: &TransformerConfig, init: &mut Initializer, device: &Device) -> Result<Self> {
        let layers = (0..config.n_layers)
            .map(|_| DecoderBlock::new(config, init, device))
            .collect::<Result<Vec<_>>>()?;
        let norm = LayerNorm::new(config.norm_config(), device)?;
        Ok(Self { layers, norm })
    }

    pub fn layers(&self) -> &[DecoderBlock] {
        &self.layers
    }

    pub fn forward(
        &self,
        xs: &Tensor,
        encoder_output: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
    ) -> Result<Tensor> {
        let mut hidden = xs.clone();
        for layer in &self.layers {
            hidden = layer.forward(&hidden, encoder_output, src_mask, tgt_mask)?;
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
