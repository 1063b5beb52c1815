mod backbone;
mod conv_block;
mod decoder;
mod encoder;
mod pyramid;

use candle_core::Tensor;
use candle_nn::{ops::sigmoid, VarBuilder};

pub use backbone::*;
pub use decoder::{Decoder, DecoderKind};
pub use encoder::Encoder;
pub use pyramid::FeaturePyramid;

use crate::{
  config::YNetConfig,
  error::{Error, Result},
  softargmax::{spatial_softmax, SoftArgmax2d},
  utils::TensorExt,
};

/// What the trajectory decoder is conditioned on.
#[derive(Debug, Clone, Copy)]
pub enum Conditioning<'a> {
  /// The spatial softmax of the goal logits at the configured waypoint
  /// timesteps.
  Goal,
  /// Caller-provided waypoint maps, `(B, waypoint_count, H, W)` at input
  /// resolution.
  Maps(&'a Tensor),
}

#[derive(Debug, Clone)]
pub struct YNetOutput {
  pub goal_logits: Tensor,
  pub trajectory_logits: Tensor,
}

pub struct YNet {
  config: YNetConfig,
  segmentation: Segmentation,
  encoder: Encoder,
  goal_decoder: Decoder,
  traj_decoder: Decoder,
  softargmax: SoftArgmax2d,
}

impl YNet {
  pub fn new(config: YNetConfig, segmentation: Segmentation, vb: VarBuilder) -> Result<Self> {
    config.validate()?;

    match (segmentation.head(), config.semantic_classes, config.use_features_only) {
      (None, 0, false) => {}
      (None, classes, false) => {
        return Err(Error::Config(format!(
          "{classes} semantic classes configured without a segmentation backbone"
        )))
      }
      (None, _, true) => {
        return Err(Error::Config(
          "features-only mode requires a segmentation backbone".to_owned(),
        ))
      }
      (Some(SegmentationHead::Classifier), 0, _) => {
        return Err(Error::Config(
          "a classifier backbone needs semantic_classes > 0".to_owned(),
        ))
      }
      (Some(head), _, features_only) => {
        if features_only != (head == SegmentationHead::Features) {
          return Err(Error::Config(format!(
            "use_features_only = {features_only} conflicts with a {head:?} backbone"
          )));
        }
      }
    }

    let semantic_channels = segmentation.channels(config.semantic_classes);
    let in_channels = semantic_channels + config.observed_len;

    let encoder = Encoder::new(in_channels, &config.encoder_channels, vb.pp("encoder"))?;

    let goal_decoder = Decoder::new(
      &config.encoder_channels,
      &config.decoder_channels,
      config.predicted_len,
      DecoderKind::Goal,
      vb.pp("goal_decoder"),
    )?;

    let traj_decoder = Decoder::new(
      &config.encoder_channels,
      &config.decoder_channels,
      config.predicted_len,
      DecoderKind::Trajectory {
        waypoints: config.waypoint_count(),
      },
      vb.pp("traj_decoder"),
    )?;

    tracing::info!(
      in_channels,
      levels = encoder.levels(),
      waypoints = ?config.waypoints,
      "Y-Net constructed"
    );

    Ok(Self {
      softargmax: SoftArgmax2d::new(config.coordinates),
      config,
      segmentation,
      encoder,
      goal_decoder,
      traj_decoder,
    })
  }

  pub fn config(&self) -> &YNetConfig {
    &self.config
  }

  /// Channels the segmentation stage contributes to the encoder input.
  pub fn semantic_channels(&self) -> usize {
    self.segmentation.channels(self.config.semantic_classes)
  }

  pub fn segment(&self, image: &Tensor) -> Result<Tensor> {
    Ok(self.segmentation.forward(image)?)
  }

  /// Stacks segmentation channels (if any) in front of the observed
  /// trajectory heatmaps.
  pub fn encoder_input(&self, observed: &Tensor, image: Option<&Tensor>) -> Result<Tensor> {
    let (_, c, h, w) = observed.dims4()?;
    if c != self.config.observed_len {
      return Err(Error::ChannelMismatch {
        what: "observed heatmaps",
        expected: self.config.observed_len,
        actual: c,
      });
    }

    let semantic_channels = self.semantic_channels();
    if semantic_channels == 0 {
      if image.is_some() {
        tracing::warn!("No segmentation channels configured! Ignoring the scene image...");
      }
      return Ok(observed.clone());
    }

    let semantic = self.segment(image.ok_or(Error::MissingImage)?)?;
    let (_, k, sh, sw) = semantic.dims4()?;

    if k != semantic_channels {
      return Err(Error::ChannelMismatch {
        what: "segmentation output",
        expected: semantic_channels,
        actual: k,
      });
    }

    if (sh, sw) != (h, w) {
      return Err(Error::SpatialMismatch {
        stage: "segmentation output".to_owned(),
        expected: (h, w),
        actual: (sh, sw),
      });
    }

    Ok(Tensor::cat(&[&semantic, observed], 1)?)
  }

  pub fn predict_features(&self, x: &Tensor) -> Result<FeaturePyramid> {
    let (h, w) = x.spatial_size()?;
    let multiple = self.config.input_multiple();

    if h % multiple != 0 || w % multiple != 0 {
      return Err(Error::InputSize {
        height: h,
        width: w,
        multiple,
      });
    }

    self.encoder.forward(x)
  }

  pub fn predict_goal(&self, features: &FeaturePyramid) -> Result<Tensor> {
    self.goal_decoder.forward(features)
  }

  /// `features` must already carry the conditioning channels, see
  /// [`YNet::condition_features`].
  pub fn predict_trajectory(&self, features: &FeaturePyramid) -> Result<Tensor> {
    self.traj_decoder.forward(features)
  }

  /// Appends `maps`, resampled to every level's resolution, to each level of
  /// the pyramid.
  pub fn condition_features(
    &self,
    features: &FeaturePyramid,
    maps: &Tensor,
  ) -> Result<FeaturePyramid> {
    let (_, k, _, _) = maps.dims4()?;
    if k != self.config.waypoint_count() {
      return Err(Error::ChannelMismatch {
        what: "waypoint maps",
        expected: self.config.waypoint_count(),
        actual: k,
      });
    }

    let levels = features
      .levels()
      .iter()
      .map(|level| {
        let (h, w) = level.spatial_size()?;
        let resampled = maps.resample_to(h, w)?;
        Ok(Tensor::cat(&[level, &resampled], 1)?)
      })
      .collect::<Result<Vec<_>>>()?;

    FeaturePyramid::new(levels)
  }

  /// Spatial softmax of the goal logits at the waypoint timesteps, the
  /// maps used by [`Conditioning::Goal`].
  pub fn goal_conditioning(&self, goal_logits: &Tensor) -> Result<Tensor> {
    let indices: Vec<u32> = self.config.waypoints.iter().map(|&t| t as u32).collect();
    let indices = Tensor::new(indices.as_slice(), goal_logits.device())?;

    self.spatial_softmax(&goal_logits.index_select(&indices, 1)?)
  }

  pub fn forward(
    &self,
    observed: &Tensor,
    image: Option<&Tensor>,
    conditioning: Conditioning,
  ) -> Result<YNetOutput> {
    let x = self.encoder_input(observed, image)?;
    let features = self.predict_features(&x)?;
    let goal_logits = self.predict_goal(&features)?;

    let maps = match conditioning {
      Conditioning::Maps(maps) => maps.clone(),
      Conditioning::Goal => self.goal_conditioning(&goal_logits)?,
    };

    let conditioned = self.condition_features(&features, &maps)?;
    let trajectory_logits = self.predict_trajectory(&conditioned)?;

    Ok(YNetOutput {
      goal_logits,
      trajectory_logits,
    })
  }

  pub fn spatial_softmax(&self, x: &Tensor) -> Result<Tensor> {
    spatial_softmax(x)
  }

  pub fn sigmoid(&self, x: &Tensor) -> Result<Tensor> {
    Ok(sigmoid(x)?)
  }

  /// Expected coordinates of raw logits.
  pub fn soft_argmax(&self, x: &Tensor) -> Result<Tensor> {
    self.softargmax.forward(x)
  }

  /// Expected coordinates of a map that already sums to 1 per channel.
  pub fn soft_argmax_on_normalized_map(&self, x: &Tensor) -> Result<Tensor> {
    self.softargmax.forward_normalized(x)
  }
}
