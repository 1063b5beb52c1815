use candle_core::{Module, Tensor};
use candle_nn::{Conv2d, VarBuilder};

use super::{
  conv_block::{conv3x3, ConvBlock},
  pyramid::FeaturePyramid,
};
use crate::error::{Error, Result};

enum EncoderStage {
  /// conv3x3 + ReLU at input resolution.
  Stem(Conv2d),
  /// maxpool 2x2 followed by a conv block.
  Down(ConvBlock),
  /// maxpool 2x2 only, produces the bottleneck.
  Pool,
}

impl Module for EncoderStage {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    match self {
      Self::Stem(conv) => conv.forward(x)?.relu(),
      Self::Down(block) => block.forward(&x.max_pool2d(2)?),
      Self::Pool => x.max_pool2d(2),
    }
  }
}

pub struct Encoder {
  in_channels: usize,
  stages: Vec<EncoderStage>,
}

impl Encoder {
  pub fn new(in_channels: usize, channels: &[usize], vb: VarBuilder) -> Result<Self> {
    let Some(&first) = channels.first() else {
      return Err(Error::Config("encoder needs at least one stage".to_owned()));
    };

    let vb = vb.pp("stages");
    let mut stages = Vec::with_capacity(channels.len() + 1);

    stages.push(EncoderStage::Stem(conv3x3(in_channels, first, vb.pp("0").pp("0"))?));

    for (i, pair) in channels.windows(2).enumerate() {
      // Index 0 of each sequential stage is the pool.
      stages.push(EncoderStage::Down(ConvBlock::new(
        pair[0],
        pair[1],
        1,
        vb.pp((i + 1).to_string()),
      )?));
    }

    stages.push(EncoderStage::Pool);

    Ok(Self {
      in_channels,
      stages,
    })
  }

  /// Number of pyramid levels produced per call.
  pub fn levels(&self) -> usize {
    self.stages.len()
  }

  pub fn forward(&self, x: &Tensor) -> Result<FeaturePyramid> {
    let (_, c, _, _) = x.dims4()?;
    if c != self.in_channels {
      return Err(Error::ChannelMismatch {
        what: "encoder input",
        expected: self.in_channels,
        actual: c,
      });
    }

    let mut levels = Vec::with_capacity(self.stages.len());
    let mut x = x.clone();

    for (i, stage) in self.stages.iter().enumerate() {
      x = stage.forward(&x)?;
      tracing::debug!(stage = i, shape = ?x.dims(), "encoder stage");
      levels.push(x.clone());
    }

    FeaturePyramid::new(levels)
  }
}

#[cfg(test)]
mod tests {
  use candle_core::{DType, Device};
  use candle_nn::VarMap;

  use super::*;

  #[test]
  fn pyramid_has_one_level_per_stage_plus_bottleneck() -> Result<()> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);

    let channels = [4, 6, 8];
    let encoder = Encoder::new(5, &channels, vb)?;
    let x = Tensor::randn(0f32, 1., (2, 5, 32, 16), &Device::Cpu)?;
    let pyramid = encoder.forward(&x)?;

    assert_eq!(pyramid.depth(), channels.len() + 1);
    assert_eq!(encoder.levels(), channels.len() + 1);

    let dims: Vec<_> = pyramid.levels().iter().map(|t| t.dims().to_vec()).collect();
    assert_eq!(
      dims,
      vec![
        vec![2, 4, 32, 16],
        vec![2, 6, 16, 8],
        vec![2, 8, 8, 4],
        vec![2, 8, 4, 2],
      ]
    );
    Ok(())
  }

  #[test]
  fn parameter_names_follow_sequential_layout() -> Result<()> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    Encoder::new(3, &[4, 4], vb.pp("encoder"))?;

    let data = varmap.data().lock().unwrap();
    for name in [
      "encoder.stages.0.0.weight",
      "encoder.stages.1.1.weight",
      "encoder.stages.1.3.bias",
    ] {
      assert!(data.contains_key(name), "missing {name}");
    }
    assert_eq!(data.len(), 6);
    Ok(())
  }

  #[test]
  fn rejects_wrong_input_channels() -> Result<()> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let encoder = Encoder::new(3, &[4, 4], vb)?;

    let x = Tensor::zeros((1, 2, 8, 8), DType::F32, &Device::Cpu)?;
    assert!(matches!(
      encoder.forward(&x),
      Err(Error::ChannelMismatch { expected: 3, actual: 2, .. })
    ));
    Ok(())
  }
}
