use candle_core::Tensor;
use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Encoder outputs ordered from the finest resolution to the coarsest. The
/// last level is the decoder bottleneck, all others are skip sources.
#[derive(Debug, Clone)]
pub struct FeaturePyramid {
  levels: SmallVec<[Tensor; 8]>,
}

impl FeaturePyramid {
  pub fn new(levels: impl IntoIterator<Item = Tensor>) -> Result<Self> {
    let levels: SmallVec<[Tensor; 8]> = levels.into_iter().collect();

    if levels.len() < 2 {
      return Err(Error::PyramidMismatch(format!(
        "a pyramid needs a bottleneck and at least one skip level, got {} levels",
        levels.len()
      )));
    }

    Ok(Self { levels })
  }

  /// Number of levels, bottleneck included.
  pub fn depth(&self) -> usize {
    self.levels.len()
  }

  /// Finest to coarsest.
  pub fn levels(&self) -> &[Tensor] {
    &self.levels
  }

  pub fn finest(&self) -> &Tensor {
    &self.levels[0]
  }

  pub fn bottleneck(&self) -> &Tensor {
    &self.levels[self.levels.len() - 1]
  }

  /// Skip levels in the order the decoder consumes them, bottleneck excluded.
  pub fn skips_coarse_to_fine(&self) -> impl ExactSizeIterator<Item = &Tensor> {
    self.levels[..self.levels.len() - 1].iter().rev()
  }
}

#[cfg(test)]
mod tests {
  use candle_core::{DType, Device};

  use super::*;

  #[test]
  fn coarse_to_fine_view() -> Result<()> {
    let levels = (0..4)
      .map(|i| Tensor::zeros((1, 1, 16 >> i, 16 >> i), DType::F32, &Device::Cpu))
      .collect::<Result<Vec<_>, _>>()?;
    let pyramid = FeaturePyramid::new(levels)?;

    assert_eq!(pyramid.depth(), 4);
    assert_eq!(pyramid.bottleneck().dims(), &[1, 1, 2, 2]);
    let sizes: Vec<_> = pyramid.skips_coarse_to_fine().map(|t| t.dims()[2]).collect();
    assert_eq!(sizes, vec![4, 8, 16]);
    assert_eq!(pyramid.finest().dims()[3], 16);
    Ok(())
  }

  #[test]
  fn rejects_single_level() -> Result<()> {
    let only = Tensor::zeros((1, 1, 2, 2), DType::F32, &Device::Cpu)?;
    assert!(FeaturePyramid::new([only]).is_err());
    Ok(())
  }
}
