//! Y-Net: goal and trajectory heatmap prediction for pedestrians.
//!
//! Observed positions are rendered as heatmap channels, optionally stacked
//! with a semantic scene map, and encoded into a feature pyramid. A goal
//! decoder regresses goal heatmaps from the pyramid; a trajectory decoder
//! regresses per-timestep heatmaps from the same pyramid with the goal
//! distribution appended at every level. Soft-argmax turns heatmaps into
//! coordinates.

pub mod config;
pub mod error;
pub mod heatmap;
pub mod model;
pub mod softargmax;
pub mod utils;

pub use config::{YNetConfig, FEATURE_CHANNELS};
pub use error::{Error, Result};
pub use model::{
  Conditioning, FeaturePyramid, SceneSegmenter, Segmentation, SegmentationHead, YNet, YNetOutput,
};
pub use softargmax::{CoordinateSystem, SoftArgmax2d};
