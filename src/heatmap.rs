//! Rendering of trajectory positions into heatmap channels.

use candle_core::{Device, Tensor};

use crate::error::{Error, Result};

/// One Gaussian channel per position, `(1, positions.len(), height, width)`.
/// Each channel peaks at 1 on its position, given in pixels as `(x, y)`, and
/// is zero beyond three standard deviations.
pub fn gaussian_heatmaps(
  positions: &[(f32, f32)],
  height: usize,
  width: usize,
  sigma: f32,
  device: &Device,
) -> Result<Tensor> {
  if sigma.is_nan() || sigma <= 0. {
    return Err(Error::Config(format!("sigma must be positive, got {sigma}")));
  }

  if height == 0 || width == 0 {
    return Err(Error::Config("heatmap grid must not be empty".to_owned()));
  }

  let two_sigma_sq = 2. * sigma * sigma;
  let clip_radius_sq = (3. * sigma).powi(2);

  let mut data = vec![0f32; positions.len() * height * width];

  for (map, &(cx, cy)) in data.chunks_exact_mut(height * width).zip(positions) {
    for r in 0..height {
      for c in 0..width {
        let dx = c as f32 - cx;
        let dy = r as f32 - cy;
        let dist_sq = dx * dx + dy * dy;
        if dist_sq <= clip_radius_sq {
          map[r * width + c] = (-dist_sq / two_sigma_sq).exp();
        }
      }
    }
  }

  Ok(Tensor::from_vec(data, (1, positions.len(), height, width), device)?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::softargmax::{CoordinateSystem, SoftArgmax2d};

  #[test]
  fn peaks_on_position() -> Result<()> {
    let maps = gaussian_heatmaps(&[(3., 5.), (10., 2.)], 16, 16, 1.5, &Device::Cpu)?;
    assert_eq!(maps.dims(), &[1, 2, 16, 16]);

    let first = maps.squeeze(0)?.get(0)?.to_vec2::<f32>()?;
    assert_eq!(first[5][3], 1.);
    assert!(first[5][4] < 1.);
    assert_eq!(first[15][15], 0.);
    Ok(())
  }

  #[test]
  fn centroid_matches_position() -> Result<()> {
    let maps = gaussian_heatmaps(&[(7., 9.)], 20, 20, 2., &Device::Cpu)?;
    let probs = maps.broadcast_div(&maps.sum_keepdim((2, 3))?)?;

    let coords = SoftArgmax2d::new(CoordinateSystem::Pixel)
      .forward_normalized(&probs)?
      .to_vec2::<f32>()?;
    assert!((coords[0][0] - 7.).abs() < 1e-4);
    assert!((coords[0][1] - 9.).abs() < 1e-4);
    Ok(())
  }

  #[test]
  fn rejects_non_positive_sigma() {
    assert!(gaussian_heatmaps(&[(0., 0.)], 4, 4, 0., &Device::Cpu).is_err());
  }
}
