//! Linear and affine projection helpers.
//!
//! Linear layers accept inputs of any rank whose trailing dimension equals
//! `input_dim` (typically `(batch, seq, in_dim)`) and return the same leading
//! layout with `output_dim` features. The weight is stored PyTorch style as
//! `(output_dim, input_dim)` and applied as `x · Wᵀ + b`.

use candle_core::{DType, Device, Error, Module, Result, Tensor, Var};

use crate::{checks, init::Initializer, scoped, NamedParameter};

/// Configuration shared by dense projection layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConfig {
    /// Incoming feature dimension.
    pub input_dim: usize,
    /// Output feature dimension.
    pub output_dim: usize,
    /// Whether a learnable bias vector should be applied.
    pub bias: bool,
}

impl LinearConfig {
    /// Creates a configuration for a projection with bias.
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            output_dim,
            bias: true,
        }
    }
}

/// Supported weight initialisation policies for transformer projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinearInit {
    /// Xavier/Glorot uniform initialisation.
    #[default]
    XavierUniform,
    /// `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`.
    FanInUniform,
}

impl LinearInit {
    fn sample(&self, shape: (usize, usize), init: &mut Initializer, device: &Device) -> Result<Tensor> {
        match self {
            LinearInit::XavierUniform => init.xavier_uniform(shape, device),
            LinearInit::FanInUniform => init.fan_in_uniform(shape.1, shape, device),
        }
    }
}

/// Dense affine projection with optional bias.
#[derive(Debug, Clone)]
pub struct Linear {
    config: LinearConfig,
    weight: Var,
    bias: Option<Var>,
}

impl Linear {
    /// Constructs a linear layer from pre-existing parameters.
    pub fn new(config: LinearConfig, weight: Tensor, bias: Option<Tensor>) -> Result<Self> {
        Self::validate_weight(&config, &weight)?;
        Self::validate_bias(&config, bias.as_ref())?;
        Ok(Self {
            config,
            weight: Var::from_tensor(&weight)?,
            bias: bias.as_ref().map(Var::from_tensor).transpose()?,
        })
    }

    /// Builds a linear layer with weights sampled according to `policy`.
    ///
    /// The bias, when enabled, is drawn from the fan-in uniform range.
    pub fn with_init(
        config: LinearConfig,
        policy: LinearInit,
        init: &mut Initializer,
        device: &Device,
    ) -> Result<Self> {
        let weight = policy.sample((config.output_dim, config.input_dim), init, device)?;
        let bias = if config.bias {
            Some(init.fan_in_uniform(config.input_dim, config.output_dim, device)?)
        } else {
            None
        };
        Self::new(config, weight, bias)
    }

    pub fn config(&self) -> &LinearConfig {
        &self.config
    }

    /// Returns the weight tensor shaped `(output_dim, input_dim)`.
    pub fn weight(&self) -> &Tensor {
        self.weight.as_tensor()
    }

    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref().map(Var::as_tensor)
    }

    /// Trainable parameters under `scope` (`{scope}.weight`, `{scope}.bias`).
    pub fn named_parameters(&self, scope: &str) -> Vec<NamedParameter> {
        let mut params = vec![(scoped(scope, "weight"), self.weight.clone())];
        if let Some(bias) = &self.bias {
            params.push((scoped(scope, "bias"), bias.clone()));
        }
        params
    }

    fn validate_weight(config: &LinearConfig, weight: &Tensor) -> Result<()> {
        checks::expect_shape(
            "linear.weight",
            weight,
            &[config.output_dim, config.input_dim],
        )?;
        checks::expect_dtype_in("linear.weight", weight, &[DType::F32, DType::F64])
    }

    fn validate_bias(config: &LinearConfig, bias: Option<&Tensor>) -> Result<()> {
        match (config.bias, bias) {
            (true, Some(tensor)) => {
                checks::expect_shape("linear.bias", tensor, &[config.output_dim])?;
                checks::expect_dtype_in("linear.bias", tensor, &[DType::F32, DType::F64])
            }
            (false, Some(_)) => Err(Error::Msg("bias provided but config disables bias".into())),
            (true, None) => Err(Error::Msg("config expects bias but none supplied".into())),
            (false, None) => Ok(()),
        }
    }
}

impl Module for Linear {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        checks::expect_last_dim("linear.input", xs, self.config.input_dim)?;
        let dims = xs.dims();
        let rows = dims[..dims.len() - 1].iter().product::<usize>();

        let flat = xs.reshape((rows, self.config.input_dim))?;
        let mut output = flat.matmul(&self.weight.as_tensor().t()?)?;
        if let Some(bias) = &self.bias {
            output = output.broadcast_add(bias.as_tensor())?;
        }

        let mut out_dims = dims.to_vec();
        if let Some(last) = out_dims.last_mut() {
            *last = self.config.output_dim;
        }
        output.reshape(out_dims)
    }
}
