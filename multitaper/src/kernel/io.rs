use super::ConfigError;

use ndarray::{
    Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewD, ArrayViewMut1, Axis, Ix1, Ix2,
};

/// Adapter trait for writing contiguous 1D output.
pub trait Write1D<T> {
    /// Borrow the underlying output as a mutable contiguous slice.
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError>;
}

/// Adapter trait for reading `(channels, samples)` input.
///
/// One dimensional inputs are presented as a single channel so kernels only
/// deal with the 2D case. [`Read2D::source_ndim`] reports what the caller
/// actually passed, which lets output shaping collapse the channel axis again.
pub trait Read2D<T> {
    /// Borrow the input as a `(channels, samples)` view.
    fn read_view(&self) -> Result<ArrayView2<'_, T>, ConfigError>;

    /// Dimensionality of the original input (1 or 2).
    fn source_ndim(&self) -> usize {
        2
    }
}

impl<T> Write1D<T> for [T] {
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError> {
        Ok(self)
    }
}

impl<T> Write1D<T> for Vec<T> {
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError> {
        Ok(self.as_mut_slice())
    }
}

impl<T> Write1D<T> for Array1<T> {
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError> {
        self.as_slice_mut()
            .ok_or(ConfigError::NonContiguous { arg: "array" })
    }
}

impl<'a, T> Write1D<T> for ArrayViewMut1<'a, T> {
    fn write_slice_mut(&mut self) -> Result<&mut [T], ConfigError> {
        self.as_slice_mut().ok_or(ConfigError::NonContiguous {
            arg: "array_view_mut",
        })
    }
}

impl<T> Read2D<T> for [T] {
    fn read_view(&self) -> Result<ArrayView2<'_, T>, ConfigError> {
        Ok(ArrayView1::from(self).insert_axis(Axis(0)))
    }

    fn source_ndim(&self) -> usize {
        1
    }
}

impl<T, const N: usize> Read2D<T> for [T; N] {
    fn read_view(&self) -> Result<ArrayView2<'_, T>, ConfigError> {
        Ok(ArrayView1::from(&self[..]).insert_axis(Axis(0)))
    }

    fn source_ndim(&self) -> usize {
        1
    }
}

impl<T> Read2D<T> for Vec<T> {
    fn read_view(&self) -> Result<ArrayView2<'_, T>, ConfigError> {
        Ok(ArrayView1::from(self.as_slice()).insert_axis(Axis(0)))
    }

    fn source_ndim(&self) -> usize {
        1
    }
}

impl<T> Read2D<T> for Array1<T> {
    fn read_view(&self) -> Result<ArrayView2<'_, T>, ConfigError> {
        Ok(self.view().insert_axis(Axis(0)))
    }

    fn source_ndim(&self) -> usize {
        1
    }
}

impl<'a, T> Read2D<T> for ArrayView1<'a, T> {
    fn read_view(&self) -> Result<ArrayView2<'_, T>, ConfigError> {
        Ok(self.view().insert_axis(Axis(0)))
    }

    fn source_ndim(&self) -> usize {
        1
    }
}

impl<T> Read2D<T> for Array2<T> {
    fn read_view(&self) -> Result<ArrayView2<'_, T>, ConfigError> {
        Ok(self.view())
    }
}

impl<'a, T> Read2D<T> for ArrayView2<'a, T> {
    fn read_view(&self) -> Result<ArrayView2<'_, T>, ConfigError> {
        Ok(self.view())
    }
}

fn dyn_view<'a, T>(view: ArrayViewD<'a, T>) -> Result<ArrayView2<'a, T>, ConfigError> {
    match view.ndim() {
        1 => view
            .into_dimensionality::<Ix1>()
            .map(|v| v.insert_axis(Axis(0)))
            .map_err(|_| ConfigError::InvalidArgument {
                arg: "signal",
                reason: "could not view input as one dimensional",
            }),
        2 => view
            .into_dimensionality::<Ix2>()
            .map_err(|_| ConfigError::InvalidArgument {
                arg: "signal",
                reason: "could not view input as two dimensional",
            }),
        _ => Err(ConfigError::InvalidArgument {
            arg: "signal",
            reason: "signal must be 1D (samples) or 2D (channels x samples)",
        }),
    }
}

impl<T> Read2D<T> for ArrayD<T> {
    fn read_view(&self) -> Result<ArrayView2<'_, T>, ConfigError> {
        dyn_view(self.view())
    }

    fn source_ndim(&self) -> usize {
        self.ndim()
    }
}

impl<'a, T> Read2D<T> for ArrayViewD<'a, T> {
    fn read_view(&self) -> Result<ArrayView2<'_, T>, ConfigError> {
        dyn_view(self.view())
    }

    fn source_ndim(&self) -> usize {
        self.ndim()
    }
}
