//! Reduction of spatial heatmaps to expected (x, y) coordinates.

use candle_core::{DType, Device, Tensor, D};
use candle_nn::ops::softmax_last_dim;

use crate::error::Result;

const EPS: f64 = 1e-6;

/// Units of the coordinates produced by soft-argmax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateSystem {
  /// Raw cell indices, `x` in `[0, W - 1]` and `y` in `[0, H - 1]`.
  #[default]
  Pixel,
  /// Both axes mapped linearly onto `[-1, 1]`.
  Normalized,
}

/// Flattened `(pos_x, pos_y)` grids of length `height * width`, row-major.
pub fn create_meshgrid(
  height: usize,
  width: usize,
  coordinates: CoordinateSystem,
  dtype: DType,
  device: &Device,
) -> Result<(Tensor, Tensor)> {
  let xs = axis(width, coordinates, device)?;
  let ys = axis(height, coordinates, device)?;

  let pos_x = xs
    .unsqueeze(0)?
    .broadcast_as((height, width))?
    .flatten_all()?
    .to_dtype(dtype)?;
  let pos_y = ys
    .unsqueeze(1)?
    .broadcast_as((height, width))?
    .flatten_all()?
    .to_dtype(dtype)?;

  Ok((pos_x, pos_y))
}

fn axis(len: usize, coordinates: CoordinateSystem, device: &Device) -> Result<Tensor> {
  let idx = Tensor::arange(0u32, len as u32, device)?.to_dtype(DType::F32)?;

  Ok(match coordinates {
    CoordinateSystem::Pixel => idx,
    CoordinateSystem::Normalized if len > 1 => idx.affine(2. / (len - 1) as f64, -1.)?,
    CoordinateSystem::Normalized => idx.affine(0., -1.)?,
  })
}

/// Softmax of every channel of an NCHW tensor over its `H * W` cells.
pub fn spatial_softmax(x: &Tensor) -> Result<Tensor> {
  let (b, c, h, w) = x.dims4()?;
  Ok(softmax_last_dim(&x.reshape((b, c, h * w))?)?.reshape((b, c, h, w))?)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SoftArgmax2d {
  coordinates: CoordinateSystem,
}

impl SoftArgmax2d {
  pub fn new(coordinates: CoordinateSystem) -> Self {
    Self { coordinates }
  }

  /// Soft-argmax on raw logits. Normalizes each channel with a max-shifted
  /// exponential before taking the expectation.
  pub fn forward(&self, logits: &Tensor) -> Result<Tensor> {
    let (b, c, h, w) = logits.dims4()?;
    let flat = logits.reshape((b, c, h * w))?;

    let shifted = flat.broadcast_sub(&flat.max_keepdim(D::Minus1)?)?;
    let exp = shifted.exp()?;
    let denom = (exp.sum_keepdim(D::Minus1)? + EPS)?;
    let probs = exp.broadcast_div(&denom)?;

    self.expectation(&probs, h, w)
  }

  /// Expected coordinates of an already normalized distribution. The input is
  /// not checked; an unnormalized map gives a meaningless centroid.
  pub fn forward_normalized(&self, probs: &Tensor) -> Result<Tensor> {
    let (b, c, h, w) = probs.dims4()?;
    self.expectation(&probs.reshape((b, c, h * w))?, h, w)
  }

  fn expectation(&self, probs: &Tensor, height: usize, width: usize) -> Result<Tensor> {
    let (pos_x, pos_y) = create_meshgrid(
      height,
      width,
      self.coordinates,
      probs.dtype(),
      probs.device(),
    )?;

    let expected_x = probs.broadcast_mul(&pos_x)?.sum_keepdim(D::Minus1)?;
    let expected_y = probs.broadcast_mul(&pos_y)?.sum_keepdim(D::Minus1)?;
    let coords = Tensor::cat(&[expected_x, expected_y], D::Minus1)?;

    if coords.dim(1)? == 1 {
      Ok(coords.squeeze(1)?)
    } else {
      Ok(coords)
    }
  }
}
