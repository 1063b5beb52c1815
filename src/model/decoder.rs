use candle_core::{Module, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};

use super::{
  conv_block::{conv3x3, ConvBlock},
  pyramid::FeaturePyramid,
};
use crate::{
  error::{Error, Result},
  utils::TensorExt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
  Goal,
  /// Every pyramid level carries `waypoints` extra conditioning channels.
  Trajectory { waypoints: usize },
}

impl DecoderKind {
  pub fn conditioning_channels(&self) -> usize {
    match self {
      Self::Goal => 0,
      Self::Trajectory { waypoints } => *waypoints,
    }
  }
}

struct DecoderStage {
  upsample_conv: Conv2d,
  fusion: ConvBlock,
  skip_channels: usize,
}

pub struct Decoder {
  kind: DecoderKind,
  center_channels: usize,
  center: ConvBlock,
  stages: Vec<DecoderStage>,
  predictor: Conv2d,
}

impl Decoder {
  pub fn new(
    encoder_channels: &[usize],
    decoder_channels: &[usize],
    output_len: usize,
    kind: DecoderKind,
    vb: VarBuilder,
  ) -> Result<Self> {
    if decoder_channels.len() != encoder_channels.len() || decoder_channels.is_empty() {
      return Err(Error::Config(format!(
        "decoder needs one stage per skip level: {} encoder levels, {} decoder stages",
        encoder_channels.len(),
        decoder_channels.len()
      )));
    }

    let extra = kind.conditioning_channels();
    let coarse_to_fine: Vec<usize> = encoder_channels.iter().rev().map(|c| c + extra).collect();

    // The bottleneck is a pooled copy of the coarsest stage.
    let center_channels = coarse_to_fine[0];
    let center = ConvBlock::new(center_channels, center_channels * 2, 0, vb.pp("center"))?;

    let mut stages = Vec::with_capacity(decoder_channels.len());
    let mut running = center.out_channels();

    for (i, (&skip_channels, &out_channels)) in
      coarse_to_fine.iter().zip(decoder_channels).enumerate()
    {
      let upsampled = running / 2;

      let upsample_conv = conv3x3(running, upsampled, vb.pp(format!("upsample_conv.{i}")))?;
      let fusion = ConvBlock::new(
        skip_channels + upsampled,
        out_channels,
        0,
        vb.pp(format!("decoder.{i}")),
      )?;

      stages.push(DecoderStage {
        upsample_conv,
        fusion,
        skip_channels,
      });
      running = out_channels;
    }

    let predictor = conv2d(
      running,
      output_len,
      1,
      Conv2dConfig::default(),
      vb.pp("predictor"),
    )?;

    Ok(Self {
      kind,
      center_channels,
      center,
      stages,
      predictor,
    })
  }

  pub fn stages(&self) -> usize {
    self.stages.len()
  }

  /// Heatmap logits at the resolution of the finest pyramid level.
  pub fn forward(&self, features: &FeaturePyramid) -> Result<Tensor> {
    if features.depth() != self.stages.len() + 1 {
      return Err(Error::PyramidMismatch(format!(
        "{:?} decoder expects {} levels, got {}",
        self.kind,
        self.stages.len() + 1,
        features.depth()
      )));
    }

    let (_, c, _, _) = features.bottleneck().dims4()?;
    if c != self.center_channels {
      return Err(Error::PyramidMismatch(format!(
        "{:?} decoder expects a {}-channel bottleneck, got {c}",
        self.kind, self.center_channels
      )));
    }

    let mut x = self.center.forward(features.bottleneck())?;

    for (i, (stage, skip)) in self
      .stages
      .iter()
      .zip(features.skips_coarse_to_fine())
      .enumerate()
    {
      x = x.upsample_bilinear2x()?;
      x = stage.upsample_conv.forward(&x)?;

      let expected = skip.spatial_size()?;
      let actual = x.spatial_size()?;
      if expected != actual {
        return Err(Error::SpatialMismatch {
          stage: format!("{:?} decoder stage {i}", self.kind),
          expected,
          actual,
        });
      }

      let (_, skip_channels, _, _) = skip.dims4()?;
      if skip_channels != stage.skip_channels {
        return Err(Error::ChannelMismatch {
          what: "skip level",
          expected: stage.skip_channels,
          actual: skip_channels,
        });
      }

      x = Tensor::cat(&[&x, skip], 1)?;
      x = stage.fusion.forward(&x)?;
      tracing::debug!(stage = i, shape = ?x.dims(), "decoder stage");
    }

    Ok(self.predictor.forward(&x)?)
  }
}
