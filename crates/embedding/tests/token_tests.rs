use anyhow::Result;
use candle_core::{Device, Module, Tensor};
use embedding::{
    PositionalEncoding, PositionalEncodingConfig, TokenEmbedding, TokenEmbeddingConfig,
};
use layers::Initializer;

fn make_ids(data: &[i64], shape: (usize, usize)) -> Result<Tensor> {
    Ok(Tensor::from_slice(data, shape, &Device::Cpu)?)
}

fn embedding(vocab_size: usize, hidden_dim: usize, seed: u64) -> Result<TokenEmbedding> {
    let mut init = Initializer::new(seed);
    Ok(TokenEmbedding::new(
        TokenEmbeddingConfig {
            vocab_size,
            hidden_dim,
        },
        &mut init,
        &Device::Cpu,
    )?)
}

#[test]
fn forward_shape_matches_config() -> Result<()> {
    let embedding = embedding(8, 4, 0)?;
    let token_ids = make_ids(&[0, 1, 2, 3], (2, 2))?;
    let output = embedding.forward(&token_ids)?;
    assert_eq!(output.dims(), &[2, 2, 4]);
    Ok(())
}

#[test]
fn forward_rejects_out_of_range_ids() -> Result<()> {
    let embedding = embedding(4, 3, 0)?;
    let token_ids = make_ids(&[0, 4], (1, 2))?;
    let err = embedding.forward(&token_ids).unwrap_err();
    assert!(err.to_string().contains("token id 4 exceeds vocab size"));
    Ok(())
}

#[test]
fn same_seed_gives_same_table() -> Result<()> {
    let a = embedding(10, 6, 42)?;
    let b = embedding(10, 6, 42)?;
    let c = embedding(10, 6, 43)?;
    let same = a.weight().sub(b.weight())?.abs()?.max_all()?.to_vec0::<f32>()?;
    let different = a.weight().sub(c.weight())?.abs()?.max_all()?.to_vec0::<f32>()?;
    assert_eq!(same, 0.0);
    assert!(different > 0.0);
    Ok(())
}

#[test]
fn xavier_bound_holds_for_table() -> Result<()> {
    let embedding = embedding(50, 20, 3)?;
    let bound = (6.0f32 / 70.0).sqrt();
    let max = embedding.weight().abs()?.max_all()?.to_vec0::<f32>()?;
    assert!(max <= bound);
    Ok(())
}

#[test]
fn embedding_then_positions_in_eval_mode() -> Result<()> {
    let device = Device::Cpu;
    let mut init = Initializer::new(0);
    let embedding = TokenEmbedding::new(
        TokenEmbeddingConfig {
            vocab_size: 5,
            hidden_dim: 4,
        },
        &mut init,
        &device,
    )?;
    let positions = PositionalEncoding::new(
        PositionalEncodingConfig {
            hidden_dim: 4,
            max_seq_len: 8,
            dropout_p: 0.3,
        },
        &mut init,
        &device,
    )?;
    positions.set_training(false);

    let ids = make_ids(&[1, 1, 1], (1, 3))?;
    let out = positions.forward(&embedding.forward(&ids)?)?;
    assert_eq!(out.dims(), &[1, 3, 4]);

    // Identical tokens differ only by their position signal.
    let delta = out.get(0)?.get(1)?.sub(&out.get(0)?.get(0)?)?;
    let table = positions.table();
    let expected = table.get(1)?.sub(&table.get(0)?)?;
    let diff = delta.sub(&expected)?.abs()?.max_all()?.to_vec0::<f32>()?;
    assert!(diff < 1e-5);
    Ok(())
}
