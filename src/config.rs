use crate::{
  error::{Error, Result},
  softargmax::CoordinateSystem,
};

/// Channel count of the segmentation backbone's penultimate layer, used in
/// place of `semantic_classes` when only features are taken from it.
pub const FEATURE_CHANNELS: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct YNetConfig {
  /// Observed timesteps, one heatmap channel each.
  pub observed_len: usize,
  /// Predicted timesteps, output channels of both decoders.
  pub predicted_len: usize,
  pub semantic_classes: usize,
  pub encoder_channels: Vec<usize>,
  pub decoder_channels: Vec<usize>,
  /// Goal timesteps that condition the trajectory decoder, strictly
  /// increasing.
  pub waypoints: Vec<usize>,
  pub use_features_only: bool,
  pub coordinates: CoordinateSystem,
}

impl Default for YNetConfig {
  fn default() -> Self {
    Self {
      observed_len: 8,
      predicted_len: 12,
      semantic_classes: 0,
      encoder_channels: vec![32, 32, 64, 64, 64],
      decoder_channels: vec![64, 64, 64, 32, 32],
      waypoints: vec![11],
      use_features_only: false,
      coordinates: CoordinateSystem::Pixel,
    }
  }
}

impl YNetConfig {
  pub fn new(observed_len: usize, predicted_len: usize) -> Self {
    Self {
      observed_len,
      predicted_len,
      waypoints: vec![predicted_len.saturating_sub(1)],
      ..Default::default()
    }
  }

  pub fn with_channels(mut self, encoder: Vec<usize>, decoder: Vec<usize>) -> Self {
    self.encoder_channels = encoder;
    self.decoder_channels = decoder;
    self
  }

  pub fn with_waypoints(mut self, waypoints: Vec<usize>) -> Self {
    self.waypoints = waypoints;
    self
  }

  /// Conditioning width of the trajectory decoder.
  pub fn waypoint_count(&self) -> usize {
    self.waypoints.len()
  }

  pub fn with_semantic_classes(mut self, semantic_classes: usize) -> Self {
    self.semantic_classes = semantic_classes;
    self
  }

  pub fn with_features_only(mut self, use_features_only: bool) -> Self {
    self.use_features_only = use_features_only;
    self
  }

  pub fn with_coordinates(mut self, coordinates: CoordinateSystem) -> Self {
    self.coordinates = coordinates;
    self
  }

  /// Number of 2x2 max-pool layers between the input and the bottleneck.
  pub fn pooling_stages(&self) -> usize {
    self.encoder_channels.len()
  }

  /// Input height and width must be multiples of this value.
  pub fn input_multiple(&self) -> usize {
    1 << self.pooling_stages()
  }

  /// Checks the structural invariants that do not depend on the backbone.
  pub fn validate(&self) -> Result<()> {
    if self.observed_len == 0 {
      return Err(Error::Config("observed_len must be at least 1".to_owned()));
    }

    if self.predicted_len == 0 {
      return Err(Error::Config("predicted_len must be at least 1".to_owned()));
    }

    if self.waypoints.is_empty() {
      return Err(Error::Config("at least one waypoint is required".to_owned()));
    }

    if let Some(&t) = self.waypoints.iter().find(|&&t| t >= self.predicted_len) {
      return Err(Error::Config(format!(
        "waypoint {t} is outside the {} predicted timesteps",
        self.predicted_len
      )));
    }

    if self.waypoints.windows(2).any(|pair| pair[0] >= pair[1]) {
      return Err(Error::Config(format!(
        "waypoints must be strictly increasing, got {:?}",
        self.waypoints
      )));
    }

    if self.encoder_channels.is_empty() {
      return Err(Error::Config("encoder_channels must not be empty".to_owned()));
    }

    if self.encoder_channels.contains(&0) || self.decoder_channels.contains(&0) {
      return Err(Error::Config("channel counts must be positive".to_owned()));
    }

    // One decoder stage per skip level of the pyramid.
    if self.decoder_channels.len() != self.encoder_channels.len() {
      return Err(Error::Config(format!(
        "decoder_channels has {} entries but the encoder emits {} skip levels",
        self.decoder_channels.len(),
        self.encoder_channels.len()
      )));
    }

    let (_, inner) = self
      .decoder_channels
      .split_last()
      .ok_or_else(|| Error::Config("decoder_channels must not be empty".to_owned()))?;

    if let Some(c) = inner.iter().find(|&&c| c < 2) {
      return Err(Error::Config(format!(
        "decoder channel {c} cannot be halved by the next upsample convolution"
      )));
    }

    Ok(())
  }
}
