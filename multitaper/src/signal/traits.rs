//! Trait interfaces for multitaper capabilities.
//!
//! Kernels are constructed once through [`crate::kernel::KernelLifecycle`]
//! and then run any number of times through these traits.

use crate::kernel::{ExecInvariantViolation, Read2D, Write1D};
use crate::signal::multitaper::{
    AdaptiveWeights, CsdEstimate, PsdEstimate, TaperWeights, TaperedSpectra, Tapers,
};
use crate::signal::windows::TaperSet;
use ndarray::{Array1, ArrayView1, ArrayView2, ArrayViewMut2};
use rustfft::num_complex::Complex;

/// DPSS taper generation capability.
pub trait DpssGenerate {
    /// Write tapers `(K, N)` and their concentration ratios `(K,)` into
    /// caller-provided buffers.
    fn run_into<O>(
        &self,
        tapers: ArrayViewMut2<'_, f64>,
        eigenvalues: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        O: Write1D<f64> + ?Sized;

    /// Generate and allocate the taper set.
    fn run_alloc(&self) -> Result<TaperSet, ExecInvariantViolation>;
}

/// Per-taper spectra of a `(channels, samples)` signal.
pub trait TaperedSpectra2D {
    /// Taper every channel with every taper and transform.
    fn run_alloc<I>(
        &self,
        signal: &I,
        tapers: Tapers<'_>,
    ) -> Result<TaperedSpectra, ExecInvariantViolation>
    where
        I: Read2D<f64> + ?Sized;
}

/// Weighted combination of two sets of per-taper spectra.
pub trait CrossSpectrum1D {
    /// Combine into a caller-provided output buffer.
    fn run_into<O>(
        &self,
        tx: ArrayView2<'_, Complex<f64>>,
        ty: ArrayView2<'_, Complex<f64>>,
        weights: &TaperWeights,
        out: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        O: Write1D<Complex<f64>> + ?Sized;

    /// Combine and allocate output.
    fn run_alloc(
        &self,
        tx: ArrayView2<'_, Complex<f64>>,
        ty: ArrayView2<'_, Complex<f64>>,
        weights: &TaperWeights,
    ) -> Result<Array1<Complex<f64>>, ExecInvariantViolation>;
}

/// Thomson adaptive weighting of per-taper spectra.
pub trait AdaptiveWeighting {
    /// Iterate weights for the `(K, F)` spectra of one channel.
    fn run_alloc(
        &self,
        yk: ArrayView2<'_, Complex<f64>>,
        eigenvalues: ArrayView1<'_, f64>,
    ) -> Result<AdaptiveWeights, ExecInvariantViolation>;
}

/// Multitaper cross-spectral density matrix of a `(channels, samples)` signal.
pub trait MultitaperCsd2D {
    /// Estimate the `(C, C, F)` cross-spectral density matrix.
    fn run_alloc<I>(&self, signal: &I) -> Result<CsdEstimate, ExecInvariantViolation>
    where
        I: Read2D<f64> + ?Sized;
}

/// Multitaper power spectral density of every channel of a signal.
pub trait MultitaperPsd2D {
    /// Estimate the `(C, F)` power spectral densities.
    fn run_alloc<I>(&self, signal: &I) -> Result<PsdEstimate, ExecInvariantViolation>
    where
        I: Read2D<f64> + ?Sized;
}
