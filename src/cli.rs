use std::path::PathBuf;

use clap::Parser;
use ynet::YNetConfig;

fn parse_point(s: &str) -> Result<(f32, f32), String> {
  let (x, y) = s
    .split_once(',')
    .ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;

  let x = x.trim().parse().map_err(|e| format!("invalid x in `{s}`: {e}"))?;
  let y = y.trim().parse().map_err(|e| format!("invalid y in `{s}`: {e}"))?;

  Ok((x, y))
}

#[derive(Parser)]
#[command(version, author)]
#[command(about = "Goal and trajectory heatmap prediction with Y-Net", long_about = None)]
pub struct Cli {
  #[arg(
    short,
    long,
    help = "Observed position in pixels, repeat once per timestep",
    value_name = "X,Y",
    value_parser = parse_point
  )]
  pub observed: Vec<(f32, f32)>,

  #[arg(long, help = "Scene height in pixels", default_value = "64")]
  pub height: usize,

  #[arg(long, help = "Scene width in pixels", default_value = "64")]
  pub width: usize,

  #[arg(short, long, help = "Number of predicted timesteps", default_value = "12")]
  pub predicted_len: usize,

  #[arg(short, long, value_delimiter = ',', value_name = "T,...")]
  #[arg(help = "Predicted timesteps conditioning the trajectory, the last one if omitted")]
  pub waypoints: Vec<usize>,

  #[arg(long, value_delimiter = ',', default_value = "32,32,64,64,64")]
  pub encoder_channels: Vec<usize>,

  #[arg(long, value_delimiter = ',', default_value = "64,64,64,32,32")]
  pub decoder_channels: Vec<usize>,

  #[arg(short, long, help = "Std-dev of the observed heatmaps", default_value = "4.0")]
  pub sigma: f32,

  #[arg(long, help = "Report coordinates in [-1, 1] instead of pixels")]
  pub normalized: bool,

  #[arg(long, help = "Weights in safetensors format, random weights if omitted")]
  #[arg(value_name = "WEIGHTS")]
  pub weights: Option<PathBuf>,

  #[arg(long, help = "Seed for random weights")]
  pub seed: Option<u64>,

  #[arg(long, help = "Write the final-step goal distribution as a PNG")]
  #[arg(value_name = "HEATMAP")]
  pub heatmap_out: Option<PathBuf>,

  #[arg(short = 'C', long, help = "Use CPU instead of GPU for inference")]
  pub use_cpu: bool,
}

impl Cli {
  /// The given positions, or a diagonal walk as long as the default
  /// observation window.
  pub fn observed_positions(&self) -> Vec<(f32, f32)> {
    if !self.observed.is_empty() {
      return self.observed.clone();
    }

    tracing::info!("No observed positions given, using a diagonal walk");
    let (x0, y0) = (self.width as f32 * 0.25, self.height as f32 * 0.25);
    (0..YNetConfig::default().observed_len)
      .map(|t| (x0 + t as f32 * 2., y0 + t as f32 * 2.))
      .collect()
  }

  pub fn waypoint_steps(&self) -> Vec<usize> {
    if self.waypoints.is_empty() {
      vec![self.predicted_len.saturating_sub(1)]
    } else {
      self.waypoints.clone()
    }
  }
}
