use candle_core::{Module, Tensor};
use candle_nn::{conv2d, seq, Activation, Conv2d, Conv2dConfig, Sequential, VarBuilder};

pub fn same_conv_config() -> Conv2dConfig {
  Conv2dConfig {
    padding: 1,
    ..Default::default()
  }
}

/// 3x3 convolution preserving the spatial size.
pub fn conv3x3(
  in_channels: usize,
  out_channels: usize,
  vb: VarBuilder,
) -> Result<Conv2d, candle_core::Error> {
  conv2d(in_channels, out_channels, 3, same_conv_config(), vb)
}

/// Two 3x3 convolutions, each followed by a ReLU. Parameters live under
/// `{offset}` and `{offset + 2}`, matching a sequential container whose
/// activations sit at the odd indices.
pub struct ConvBlock {
  conv: Sequential,
  out_channels: usize,
}

impl ConvBlock {
  pub fn new(
    in_channels: usize,
    out_channels: usize,
    offset: usize,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    let mut conv = seq();

    conv = conv.add(conv3x3(
      in_channels,
      out_channels,
      vb.pp(offset.to_string()),
    )?);

    conv = conv.add(Activation::Relu);

    conv = conv.add(conv3x3(
      out_channels,
      out_channels,
      vb.pp((offset + 2).to_string()),
    )?);

    conv = conv.add(Activation::Relu);

    Ok(Self { conv, out_channels })
  }

  pub fn out_channels(&self) -> usize {
    self.out_channels
  }
}

impl Module for ConvBlock {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    self.conv.forward(x)
  }
}
