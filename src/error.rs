use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid configuration: {0}")]
  Config(String),

  #[error("input size {height}x{width} is not a multiple of {multiple}")]
  InputSize {
    height: usize,
    width: usize,
    multiple: usize,
  },

  #[error("spatial size mismatch at {stage}: expected {expected:?}, got {actual:?}")]
  SpatialMismatch {
    stage: String,
    expected: (usize, usize),
    actual: (usize, usize),
  },

  #[error("feature pyramid mismatch: {0}")]
  PyramidMismatch(String),

  #[error("{what} has {actual} channels, expected {expected}")]
  ChannelMismatch {
    what: &'static str,
    expected: usize,
    actual: usize,
  },

  #[error("a scene image is required when semantic channels are configured")]
  MissingImage,

  #[error(transparent)]
  Candle(#[from] candle_core::Error),
}

impl Error {
  /// Whether the error comes from an input or intermediate tensor having the
  /// wrong shape, as opposed to a bad configuration or a backend failure.
  pub fn is_shape_error(&self) -> bool {
    matches!(
      self,
      Self::InputSize { .. }
        | Self::SpatialMismatch { .. }
        | Self::PyramidMismatch(_)
        | Self::ChannelMismatch { .. }
    )
  }
}
