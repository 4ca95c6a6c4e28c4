//! Weighted combination of per-taper spectra into a cross spectrum.

use crate::error::Error;
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Write1D};
use crate::signal::traits::CrossSpectrum1D;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, CowArray, Ix2};
use rustfft::num_complex::Complex;

use super::Sides;

/// Amplitude weights applied to per-taper spectra before averaging.
///
/// A bin combines as `sum_k w_k^2 conj(X_k) Y_k / sum_k w_k^2`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TaperWeights {
    /// Equal weights; a plain average over tapers.
    #[default]
    Uniform,
    /// One weight per taper, shape `(K,)`.
    PerTaper(Array1<f64>),
    /// One weight per taper and frequency bin, shape `(K, F)`.
    PerFrequency(Array2<f64>),
}

impl TaperWeights {
    /// Weights as a `(k, f)` array.
    pub(crate) fn expand(
        &self,
        k: usize,
        f: usize,
    ) -> Result<CowArray<'_, f64, Ix2>, ExecInvariantViolation> {
        match self {
            TaperWeights::Uniform => Ok(Array2::ones((k, f)).into()),
            TaperWeights::PerTaper(w) => {
                if w.len() != k {
                    return Err(ExecInvariantViolation::ShapeMismatch {
                        arg: "weights",
                        expected: (k, 1),
                        got: (w.len(), 1),
                    });
                }
                Ok(Array2::from_shape_fn((k, f), |(i, _)| w[i]).into())
            }
            TaperWeights::PerFrequency(w) => {
                if w.dim() != (k, f) {
                    return Err(ExecInvariantViolation::ShapeMismatch {
                        arg: "weights",
                        expected: (k, f),
                        got: w.dim(),
                    });
                }
                Ok(w.view().into())
            }
        }
    }
}

/// `sum_k wx wy conj(X_k) Y_k / sqrt(sum_k wx^2 sum_k wy^2)` per bin, with no
/// one-sided scaling.
pub(crate) fn combine(
    tx: ArrayView2<'_, Complex<f64>>,
    ty: ArrayView2<'_, Complex<f64>>,
    wx: ArrayView2<'_, f64>,
    wy: ArrayView2<'_, f64>,
) -> Array1<Complex<f64>> {
    let bins = tx.ncols();
    Array1::from_iter((0..bins).map(|f| {
        let mut num = Complex::new(0.0, 0.0);
        let mut ex = 0.0;
        let mut ey = 0.0;
        for k in 0..tx.nrows() {
            let (a, b) = (wx[(k, f)], wy[(k, f)]);
            num += tx[(k, f)].conj() * ty[(k, f)] * (a * b);
            ex += a * a;
            ey += b * b;
        }
        let den = (ex * ey).sqrt();
        if den > 0.0 {
            num / den
        } else {
            Complex::new(0.0, 0.0)
        }
    }))
}

/// Last bin (exclusive) whose power is mirrored at a negative frequency.
fn mirrored_end(nfft: usize) -> usize {
    (nfft + 1) / 2
}

/// Double the mirrored bins of an unscaled half spectrum in place.
pub(crate) fn fold_onesided(s: &mut Array1<Complex<f64>>, nfft: usize) {
    s.slice_mut(s![1..mirrored_end(nfft)])
        .mapv_inplace(|v| v * 2.0);
}

fn mirror(half: ArrayView1<'_, Complex<f64>>, nfft: usize) -> Array1<Complex<f64>> {
    let mut full = Array1::<Complex<f64>>::zeros(nfft);
    full.slice_mut(s![..half.len()]).assign(&half);
    for k in 1..mirrored_end(nfft) {
        full[nfft - k] = half[k].conj();
    }
    full
}

/// Fold a two-sided spectrum of length `nfft` into `nfft / 2 + 1` bins.
pub fn twosided_to_onesided(
    spectrum: ArrayView1<'_, Complex<f64>>,
    nfft: usize,
) -> Result<Array1<Complex<f64>>, Error> {
    if spectrum.len() != nfft || nfft == 0 {
        return Err(Error::invalid(
            "spectrum",
            format!("expected {nfft} two-sided bins, got {}", spectrum.len()),
        ));
    }
    let mut half = spectrum.slice(s![..nfft / 2 + 1]).to_owned();
    fold_onesided(&mut half, nfft);
    Ok(half)
}

/// Unfold a one-sided spectrum into all `nfft` bins using conjugate symmetry.
pub fn onesided_to_twosided(
    spectrum: ArrayView1<'_, Complex<f64>>,
    nfft: usize,
) -> Result<Array1<Complex<f64>>, Error> {
    if spectrum.len() != nfft / 2 + 1 || nfft == 0 {
        return Err(Error::invalid(
            "spectrum",
            format!(
                "expected {} one-sided bins for nfft {nfft}, got {}",
                nfft / 2 + 1,
                spectrum.len()
            ),
        ));
    }
    let mut half = spectrum.to_owned();
    half.slice_mut(s![1..mirrored_end(nfft)])
        .mapv_inplace(|v| v / 2.0);
    Ok(mirror(half.view(), nfft))
}

/// Constructor config for [`MtmCrossSpectrumKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MtmCrossSpectrumConfig {
    /// Transform length the spectra were computed with.
    pub nfft: usize,
    /// Output layout.
    pub sides: Sides,
}

/// Trait-first multitaper cross-spectrum kernel.
///
/// Inputs may hold either all `nfft` bins or the `nfft / 2 + 1` non-negative
/// bins; the output layout is chosen by [`MtmCrossSpectrumConfig::sides`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MtmCrossSpectrumKernel {
    nfft: usize,
    sides: Sides,
}

impl MtmCrossSpectrumKernel {
    /// Bins produced per call.
    pub fn output_len(&self) -> usize {
        self.sides.bins(self.nfft)
    }
}

impl KernelLifecycle for MtmCrossSpectrumKernel {
    type Config = MtmCrossSpectrumConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.nfft == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "nfft",
                reason: "nfft must be > 0",
            });
        }
        Ok(Self {
            nfft: config.nfft,
            sides: config.sides,
        })
    }
}

impl CrossSpectrum1D for MtmCrossSpectrumKernel {
    fn run_into<O>(
        &self,
        tx: ArrayView2<'_, Complex<f64>>,
        ty: ArrayView2<'_, Complex<f64>>,
        weights: &TaperWeights,
        out: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        O: Write1D<Complex<f64>> + ?Sized,
    {
        let out = out.write_slice_mut().map_err(ExecInvariantViolation::from)?;
        if out.len() != self.output_len() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "out",
                expected: self.output_len(),
                got: out.len(),
            });
        }
        let combined = self.run_alloc(tx, ty, weights)?;
        for (dst, src) in out.iter_mut().zip(combined.iter()) {
            *dst = *src;
        }
        Ok(())
    }

    fn run_alloc(
        &self,
        tx: ArrayView2<'_, Complex<f64>>,
        ty: ArrayView2<'_, Complex<f64>>,
        weights: &TaperWeights,
    ) -> Result<Array1<Complex<f64>>, ExecInvariantViolation> {
        if tx.dim() != ty.dim() {
            return Err(ExecInvariantViolation::ShapeMismatch {
                arg: "ty",
                expected: tx.dim(),
                got: ty.dim(),
            });
        }
        let (k, f) = tx.dim();
        if k == 0 {
            return Err(ConfigError::EmptyInput { arg: "tx" }.into());
        }
        let full_input = if f == self.nfft {
            true
        } else if f == self.nfft / 2 + 1 {
            false
        } else {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "tx",
                expected: self.nfft,
                got: f,
            });
        };

        let w = weights.expand(k, f)?;
        let mut combined = combine(tx, ty, w.view(), w.view());
        Ok(match (full_input, self.sides) {
            (true, Sides::TwoSided) => combined,
            (true, Sides::OneSided) => {
                let mut half = combined.slice(s![..self.nfft / 2 + 1]).to_owned();
                fold_onesided(&mut half, self.nfft);
                half
            }
            (false, Sides::OneSided) => {
                fold_onesided(&mut combined, self.nfft);
                combined
            }
            (false, Sides::TwoSided) => mirror(combined.view(), self.nfft),
        })
    }
}

/// Combine one-sided per-taper spectra `tx`, `ty` of shape `(K, F)`, as
/// returned by [`super::tapered_spectra`], into one cross spectrum.
///
/// `nfft` is the transform length behind the `F` bins and defaults to
/// `2 (F - 1)`. `OneSided` output keeps the `F` bins, doubling every bin
/// with a negative-frequency twin. `TwoSided` output mirrors out to all
/// `nfft` bins (`2F - 2` for even, `2F - 1` for odd `nfft`). Unequal shapes
/// fail with [`Error::ShapeMismatch`].
pub fn mtm_cross_spectrum(
    tx: ArrayView2<'_, Complex<f64>>,
    ty: ArrayView2<'_, Complex<f64>>,
    weights: &TaperWeights,
    sides: Sides,
    nfft: Option<usize>,
) -> Result<Array1<Complex<f64>>, Error> {
    if tx.dim() != ty.dim() {
        return Err(ExecInvariantViolation::ShapeMismatch {
            arg: "ty",
            expected: tx.dim(),
            got: ty.dim(),
        }
        .into());
    }
    let bins = tx.ncols();
    let nfft = nfft.unwrap_or_else(|| (2 * bins.saturating_sub(1)).max(1));
    if nfft / 2 + 1 != bins {
        return Err(Error::invalid(
            "nfft",
            format!("{bins} one-sided bins cannot come from nfft {nfft}"),
        ));
    }
    let kernel = MtmCrossSpectrumKernel::try_new(MtmCrossSpectrumConfig { nfft, sides })?;
    Ok(kernel.run_alloc(tx, ty, weights)?)
}
