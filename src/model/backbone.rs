use candle_core::Tensor;

use crate::config::FEATURE_CHANNELS;

/// A pretrained, frozen scene segmentation network. Outputs must share the
/// image's spatial grid.
pub trait SceneSegmenter: Send + Sync {
  /// Per-pixel class probabilities, `(B, classes, H, W)`.
  fn class_probabilities(&self, image: &Tensor) -> Result<Tensor, candle_core::Error>;

  /// Penultimate-layer features, `(B, FEATURE_CHANNELS, H, W)`.
  fn features(&self, image: &Tensor) -> Result<Tensor, candle_core::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationHead {
  Classifier,
  Features,
}

pub enum Segmentation {
  /// No backbone: images pass through untouched and contribute no encoder
  /// channels.
  Identity,
  Frozen {
    segmenter: Box<dyn SceneSegmenter>,
    head: SegmentationHead,
  },
}

impl Segmentation {
  pub fn frozen(segmenter: impl SceneSegmenter + 'static, head: SegmentationHead) -> Self {
    Self::Frozen {
      segmenter: Box::new(segmenter),
      head,
    }
  }

  pub fn head(&self) -> Option<SegmentationHead> {
    match self {
      Self::Identity => None,
      Self::Frozen { head, .. } => Some(*head),
    }
  }

  /// Encoder channels contributed by this variant given the nominal class
  /// count.
  pub fn channels(&self, semantic_classes: usize) -> usize {
    match self.head() {
      None => 0,
      Some(SegmentationHead::Classifier) => semantic_classes,
      Some(SegmentationHead::Features) => FEATURE_CHANNELS,
    }
  }

  pub fn forward(&self, image: &Tensor) -> Result<Tensor, candle_core::Error> {
    match self {
      Self::Identity => Ok(image.clone()),
      Self::Frozen { segmenter, head } => {
        let out = match head {
          SegmentationHead::Classifier => segmenter.class_probabilities(image)?,
          SegmentationHead::Features => segmenter.features(image)?,
        };
        Ok(out.detach())
      }
    }
  }
}

impl std::fmt::Debug for Segmentation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self.head() {
      None => f.write_str("Identity"),
      Some(head) => f.debug_struct("Frozen").field("head", &head).finish(),
    }
  }
}
