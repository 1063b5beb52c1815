use candle_core::Device;
use image::ImageFormat;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::cli::Cli;

pub fn setup_tracing() {
  let subscriber = FmtSubscriber::builder()
    .with_max_level(Level::INFO)
    .with_target(false)
    .finish();

  tracing::subscriber::set_global_default(subscriber).expect("Setting default subscriber failed");
}

pub fn setup_args(args: &Cli) -> Result<(), &'static str> {
  if args.seed.is_some() && args.weights.is_some() {
    tracing::warn!("Seed only affects random weights! Ignoring `--seed`...");
  } else if args.seed.is_some() && args.use_cpu {
    tracing::warn!("Seed only affects GPU random weights! Ignoring `--seed`...");
  }

  if let Some(path) = &args.heatmap_out {
    let Ok(format) = ImageFormat::from_path(path) else {
      return Err("Failed to get image format from the heatmap path");
    };

    if format != ImageFormat::Png {
      return Err("Heatmaps can only be written as PNG");
    }
  }

  Ok(())
}

/// Seeds the device rng for random weights. The CPU rng cannot be seeded, so
/// the seed is dropped there.
pub fn seed_device(device: &Device, seed: Option<u64>) -> Result<(), candle_core::Error> {
  match seed {
    Some(seed) if device.is_cuda() => device.set_seed(seed),
    Some(_) => {
      tracing::warn!("No GPU in use, seed only affects GPU random weights! Ignoring `--seed`...");
      Ok(())
    }
    None => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use clap::Parser;

  use super::*;

  #[test]
  fn seed_is_ignored_on_cpu() {
    let args = Cli::parse_from(["ynet", "-C", "--seed", "7"]);
    assert!(setup_args(&args).is_ok());
    assert!(seed_device(&Device::Cpu, args.seed).is_ok());
    assert!(seed_device(&Device::Cpu, None).is_ok());
  }

  #[test]
  fn rejects_non_png_heatmap() {
    let args = Cli::parse_from(["ynet", "--heatmap-out", "goal.jpg"]);
    assert!(setup_args(&args).is_err());

    let args = Cli::parse_from(["ynet", "--heatmap-out", "goal.png"]);
    assert!(setup_args(&args).is_ok());
  }
}
