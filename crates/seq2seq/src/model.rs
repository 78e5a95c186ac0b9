//! The assembled encoder-decoder transformer.

use candle_core::{Device, Module, Tensor};
use embedding::{PositionalEncoding, PositionalEncodingConfig, TokenEmbedding, TokenEmbeddingConfig};
use layers::{Initializer, NamedParameter};

use crate::{
    config::TransformerConfig,
    decoder::Decoder,
    encoder::Encoder,
    error::Result,
    projection::ProjectionLayer,
};

/// Source and target embeddings, positional encodings, encoder and decoder
/// stacks, and the output projection.
///
/// Freshly built models are in training mode; call
/// [`Transformer::set_training`] with `false` for deterministic inference.
#[derive(Debug)]
pub struct Transformer {
    config: TransformerConfig,
    src_embed: TokenEmbedding,
    tgt_embed: TokenEmbedding,
    src_pos: PositionalEncoding,
    tgt_pos: PositionalEncoding,
    encoder: Encoder,
    decoder: Decoder,
    projection: ProjectionLayer,
}

/// Validates `config` and builds a model whose weights are drawn from
/// `config.seed`.
pub fn build_transformer(config: &TransformerConfig, device: &Device) -> Result<Transformer> {
    Transformer::new(config.clone(), device)
}

impl Transformer {
    pub fn new(config: TransformerConfig, device: &Device) -> Result<Self> {
        config.validate()?;
        let mut init = Initializer::new(config.seed);

        let src_embed = TokenEmbedding::new(
            TokenEmbeddingConfig {
                vocab_size: config.src_vocab_size,
                hidden_dim: config.d_model,
            },
            &mut init,
            device,
        )?;
        let tgt_embed = TokenEmbedding::new(
            TokenEmbeddingConfig {
                vocab_size: config.tgt_vocab_size,
                hidden_dim: config.d_model,
            },
            &mut init,
            device,
        )?;
        let src_pos = PositionalEncoding::new(
            PositionalEncodingConfig {
                hidden_dim: config.d_model,
                max_seq_len: config.src_seq_len,
                dropout_p: config.dropout,
            },
            &mut init,
            device,
        )?;
        let tgt_pos = PositionalEncoding::new(
            PositionalEncodingConfig {
                hidden_dim: config.d_model,
                max_seq_len: config.tgt_seq_len,
                dropout_p: config.dropout,
            },
            &mut init,
            device,
        )?;
        let encoder = Encoder::new(&config, &mut init, device)?;
        let decoder = Decoder::new(&config, &mut init, device)?;
        let projection =
            ProjectionLayer::new(config.d_model, config.tgt_vocab_size, &mut init, device)?;

        let model = Self {
            config,
            src_embed,
            tgt_embed,
            src_pos,
            tgt_pos,
            encoder,
            decoder,
            projection,
        };
        log::info!(
            "seq2seq transformer built: d_model={} layers={} heads={} d_ff={} src_vocab={} tgt_vocab={} params={}",
            model.config.d_model,
            model.config.n_layers,
            model.config.n_heads,
            model.config.d_ff,
            model.config.src_vocab_size,
            model.config.tgt_vocab_size,
            model.parameter_count()
        );
        Ok(model)
    }

    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Embeds `(batch, src_len)` token ids and runs the encoder stack.
    /// Returns `(batch, src_len, d_model)`.
    pub fn encode(&self, src: &Tensor, src_mask: Option<&Tensor>) -> Result<Tensor> {
        let embedded = self.src_embed.forward(src)?;
        let positioned = self.src_pos.forward(&embedded)?;
        Ok(self.encoder.forward(&positioned, src_mask)?)
    }

    /// Embeds `(batch, tgt_len)` token ids and runs the decoder stack against
    /// `encoder_output`. Returns `(batch, tgt_len, d_model)`.
    pub fn decode(
        &self,
        encoder_output: &Tensor,
        src_mask: Option<&Tensor>,
        tgt: &Tensor,
        tgt_mask: Option<&Tensor>,
    ) -> Result<Tensor> {
        let embedded = self.tgt_embed.forward(tgt)?;
        let positioned = self.tgt_pos.forward(&embedded)?;
        Ok(self
            .decoder
            .forward(&positioned, encoder_output, src_mask, tgt_mask)?)
    }

    /// Log-probabilities `(batch, tgt_len, tgt_vocab_size)`.
    pub fn project(&self, decoder_output: &Tensor) -> Result<Tensor> {
        Ok(self.projection.forward(decoder_output)?)
    }

    /// `project(decode(encode(src), tgt))` in one call.
    pub fn forward(
        &self,
        src: &Tensor,
        src_mask: Option<&Tensor>,
        tgt: &Tensor,
        tgt_mask: Option<&Tensor>,
    ) -> Result<Tensor> {
        let memory = self.encode(src, src_mask)?;
        let decoded = self.decode(&memory, src_mask, tgt, tgt_mask)?;
        self.project(&decoded)
    }

    /// Switches every dropout site between training and evaluation mode.
    pub fn set_training(&self, training: bool) {
        log::debug!("seq2seq transformer training={training}");
        self.src_pos.set_training(training);
        self.tgt_pos.set_training(training);
        self.encoder.set_training(training);
        self.decoder.set_training(training);
    }

    /// Every trainable parameter with its dotted path.
    pub fn named_parameters(&self) -> Vec<NamedParameter> {
        let mut params = self.src_embed.named_parameters("src_embed");
        params.extend(self.tgt_embed.named_parameters("tgt_embed"));
        params.extend(self.encoder.named_parameters("encoder"));
        params.extend(self.decoder.named_parameters("decoder"));
        params.extend(self.projection.named_parameters("projection"));
        params
    }

    pub fn parameter_count(&self) -> usize {
        self.named_parameters()
            .iter()
            .map(|(_, var)| var.elem_count())
            .sum()
    }
}
