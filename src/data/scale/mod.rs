/*!
Input data scaling
*/
use crate::CpuFloat;
use num::Float;

/// A min-max scaler, mapping the range of the data it was fitted on to `[0, 1]`
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MinMaxScaler<F = CpuFloat> {
    /// The smallest finite value seen while fitting
    pub min: F,
    /// The largest finite value seen while fitting
    pub max: F,
}

impl<F> MinMaxScaler<F>
where
    F: Copy + Float,
{
    /// Fit a scaler to the finite values of a series. Returns `None` if there are none.
    pub fn fit(values: &[F]) -> Option<MinMaxScaler<F>> {
        let mut finite = values.iter().copied().filter(|v| v.is_finite());
        let first = finite.next()?;
        let (min, max) = finite.fold((first, first), |(min, max), v| (min.min(v), max.max(v)));
        Some(MinMaxScaler { min, max })
    }

    /// The width of the fitted range. A constant series scales as if the range were one.
    #[inline]
    pub fn range(&self) -> F {
        let range = self.max - self.min;
        if range == F::zero() {
            F::one()
        } else {
            range
        }
    }

    /// Scale a value; values outside the fitted range land outside `[0, 1]`
    #[inline]
    pub fn scale(&self, val: F) -> F {
        (val - self.min) / self.range()
    }

    /// Undo [`MinMaxScaler::scale`]
    #[inline]
    pub fn unscale(&self, val: F) -> F {
        val * self.range() + self.min
    }

    /// Scale a whole series
    pub fn transform(&self, values: &[F]) -> Vec<F> {
        values.iter().map(|&v| self.scale(v)).collect()
    }

    /// Unscale a whole series
    pub fn inverse_transform(&self, values: &[F]) -> Vec<F> {
        values.iter().map(|&v| self.unscale(v)).collect()
    }
}
