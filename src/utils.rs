use candle_core::Tensor;

use crate::error::{Error, Result};

pub trait TensorExt {
  /// Bilinear x2 upsampling of the two trailing dimensions of an NCHW
  /// tensor, with half-pixel centers and clamped borders.
  fn upsample_bilinear2x(&self) -> Result<Self, candle_core::Error>
  where
    Self: Sized;

  /// Average-pools an NCHW tensor down to `height` x `width`. The source grid
  /// must be an exact integer multiple of the target grid.
  fn resample_to(&self, height: usize, width: usize) -> Result<Self>
  where
    Self: Sized;

  fn spatial_size(&self) -> Result<(usize, usize), candle_core::Error>;
}

impl TensorExt for Tensor {
  fn upsample_bilinear2x(&self) -> Result<Self, candle_core::Error> {
    self.upsample_bilinear2d_with_scale(2., 2., false)
  }

  fn resample_to(&self, height: usize, width: usize) -> Result<Self> {
    let (h, w) = self.spatial_size()?;

    if (h, w) == (height, width) {
      return Ok(self.clone());
    }

    if height == 0 || width == 0 || h % height != 0 || w % width != 0 || h / height != w / width {
      return Err(Error::SpatialMismatch {
        stage: "conditioning resample".to_owned(),
        expected: (height, width),
        actual: (h, w),
      });
    }

    Ok(self.avg_pool2d(h / height)?)
  }

  fn spatial_size(&self) -> Result<(usize, usize), candle_core::Error> {
    let (_, _, h, w) = self.dims4()?;
    Ok((h, w))
  }
}

#[cfg(test)]
mod tests {
  use candle_core::{Device, Tensor};

  use super::*;

  #[test]
  fn upsample_uses_half_pixel_centers() -> Result<()> {
    let x = Tensor::new(&[1f32, 2.], &Device::Cpu)?.reshape((1, 1, 1, 2))?;
    let y = x.upsample_bilinear2x()?;

    assert_eq!(y.dims(), &[1, 1, 2, 4]);
    let rows = y.squeeze(0)?.squeeze(0)?.to_vec2::<f32>()?;
    assert_eq!(rows, vec![vec![1., 1.25, 1.75, 2.]; 2]);
    Ok(())
  }

  #[test]
  fn bilinear_upsample_doubles_both_axes() -> Result<()> {
    let x = Tensor::new(&[0f32, 4., 8., 12.], &Device::Cpu)?.reshape((1, 1, 2, 2))?;
    let y = x.upsample_bilinear2x()?;

    assert_eq!(y.dims(), &[1, 1, 4, 4]);
    let rows = y.squeeze(0)?.squeeze(0)?.to_vec2::<f32>()?;
    assert_eq!(rows[0], vec![0., 1., 3., 4.]);
    assert_eq!(rows[1], vec![2., 3., 5., 6.]);
    assert_eq!(rows[3], vec![8., 9., 11., 12.]);
    Ok(())
  }

  #[test]
  fn single_cell_upsamples_to_constant() -> Result<()> {
    let x = Tensor::new(&[3f32], &Device::Cpu)?.reshape((1, 1, 1, 1))?;
    let y = x.upsample_bilinear2x()?;

    assert_eq!(y.flatten_all()?.to_vec1::<f32>()?, vec![3.; 4]);
    Ok(())
  }

  #[test]
  fn resample_averages_blocks() -> Result<()> {
    let x = Tensor::arange(0f32, 16., &Device::Cpu)?.reshape((1, 1, 4, 4))?;
    let y = x.resample_to(2, 2)?;

    assert_eq!(y.flatten_all()?.to_vec1::<f32>()?, vec![2.5, 4.5, 10.5, 12.5]);
    assert!(x.resample_to(3, 3).is_err());
    Ok(())
  }
}
