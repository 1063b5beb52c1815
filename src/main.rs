mod cli;
mod setup;

use std::{error::Error, path::Path};

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use clap::Parser;
use image::GrayImage;

use ynet::{
  heatmap::gaussian_heatmaps, Conditioning, CoordinateSystem, Segmentation, YNet, YNetConfig,
};

use crate::{
  cli::Cli,
  setup::{seed_device, setup_args, setup_tracing},
};

fn main() {
  setup_tracing();

  let args = Cli::parse();

  if let Err(err) = setup_args(&args) {
    tracing::error!("{err}");
    return;
  }

  if let Err(err) = run(args) {
    tracing::error!("{err}");
  }
}

fn run(args: Cli) -> Result<(), Box<dyn Error>> {
  let device = if args.use_cpu {
    Device::Cpu
  } else {
    Device::cuda_if_available(0)?
  };

  let observed = args.observed_positions();

  let config = YNetConfig::new(observed.len(), args.predicted_len)
    .with_channels(args.encoder_channels.clone(), args.decoder_channels.clone())
    .with_waypoints(args.waypoint_steps())
    .with_coordinates(if args.normalized {
      CoordinateSystem::Normalized
    } else {
      CoordinateSystem::Pixel
    });

  let varmap = VarMap::new();
  let vb = match &args.weights {
    Some(path) => {
      tracing::info!("Load weights from {}", path.display());
      unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, &device)? }
    }
    None => {
      if !args.use_cpu {
        seed_device(&device, args.seed)?;
      }
      VarBuilder::from_varmap(&varmap, DType::F32, &device)
    }
  };

  let model = YNet::new(config, Segmentation::Identity, vb)?;

  let heatmaps = gaussian_heatmaps(&observed, args.height, args.width, args.sigma, &device)?;
  let output = model.forward(&heatmaps, None, Conditioning::Goal)?;
  tracing::info!("Forward pass finished");

  let goal = model.soft_argmax(&output.goal_logits)?;
  let trajectory = model.soft_argmax(&output.trajectory_logits)?;

  // (1, T, 2) for T > 1, (1, 2) for a single step.
  let goal = goal.reshape(((), 2))?.to_vec2::<f32>()?;
  let trajectory = trajectory.reshape(((), 2))?.to_vec2::<f32>()?;

  for (t, (g, p)) in goal.iter().zip(&trajectory).enumerate() {
    tracing::info!(
      "t+{:<2} goal ({:>7.2}, {:>7.2})  trajectory ({:>7.2}, {:>7.2})",
      t + 1,
      g[0],
      g[1],
      p[0],
      p[1]
    );
  }

  if let Some(path) = &args.heatmap_out {
    let last = output.goal_logits.narrow(1, args.predicted_len - 1, 1)?;
    save_heatmap(&model.spatial_softmax(&last)?, path)?;
    tracing::info!("Heatmap written to {}", path.display());
  }

  Ok(())
}

/// Writes a `(1, 1, H, W)` distribution scaled so its peak is white.
fn save_heatmap(probs: &Tensor, path: &Path) -> Result<(), Box<dyn Error>> {
  let (_, _, h, w) = probs.dims4()?;
  let peak = probs.flatten_all()?.max(0)?.to_scalar::<f32>()?;
  let scale = if peak > 0. { 255. / peak as f64 } else { 0. };

  let pixels = probs
    .affine(scale, 0.)?
    .flatten_all()?
    .to_vec1::<f32>()?
    .into_iter()
    .map(|v| v.clamp(0., 255.) as u8)
    .collect();

  let Some(image) = GrayImage::from_raw(w as u32, h as u32, pixels) else {
    return Err("Heatmap buffer does not match its size".into());
  };

  image.save(path)?;

  Ok(())
}
