//! Per-taper spectra of single or multi-channel signals.

use crate::error::Error;
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read2D};
use crate::signal::traits::TaperedSpectra2D;
use crate::signal::windows::{cached_tapers, DpssConfig, TaperSet};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis, CowArray, Ix2};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::{Sides, SpectralWarning};

/// Concentration ratio a taper needs to survive low-bias selection.
pub(crate) const LOW_BIAS_THRESHOLD: f64 = 0.9;

/// Where the tapers for [`tapered_spectra`] come from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tapers<'a> {
    /// Caller-supplied `(K, N)` tapers without concentration ratios. Low-bias
    /// selection does not apply.
    Given(ArrayView2<'a, f64>),
    /// A previously designed taper set.
    Set(&'a TaperSet),
    /// Design DPSS tapers for the signal length.
    Design {
        /// Time-half-bandwidth product.
        nw: f64,
        /// Number of tapers to design before low-bias selection.
        kmax: usize,
    },
}

impl<'a> From<&'a TaperSet> for Tapers<'a> {
    fn from(set: &'a TaperSet) -> Self {
        Tapers::Set(set)
    }
}

/// Output of [`tapered_spectra`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaperedSpectra {
    /// Complex spectra indexed `(taper, channel, frequency)`.
    pub spectra: Array3<Complex<f64>>,
    /// Transform length actually used.
    pub nfft: usize,
    /// Layout of the frequency axis.
    pub sides: Sides,
    /// Concentration ratios of the tapers that were applied, when known.
    pub eigenvalues: Option<Array1<f64>>,
    /// Conditions raised while computing.
    pub warnings: Vec<SpectralWarning>,
}

/// Constructor config for [`TaperedSpectraKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaperedSpectraConfig {
    /// Transform length; defaults to the signal length and is never shorter.
    pub nfft: Option<usize>,
    /// Keep only tapers with concentration ratio above 0.9.
    pub low_bias: bool,
    /// Frequency layout of the output.
    pub sides: Sides,
}

impl Default for TaperedSpectraConfig {
    fn default() -> Self {
        Self {
            nfft: None,
            low_bias: true,
            sides: Sides::OneSided,
        }
    }
}

/// Trait-first tapered spectra kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaperedSpectraKernel {
    nfft: Option<usize>,
    low_bias: bool,
    sides: Sides,
}

impl KernelLifecycle for TaperedSpectraKernel {
    type Config = TaperedSpectraConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.nfft == Some(0) {
            return Err(ConfigError::InvalidArgument {
                arg: "nfft",
                reason: "nfft must be > 0",
            });
        }
        Ok(Self {
            nfft: config.nfft,
            low_bias: config.low_bias,
            sides: config.sides,
        })
    }
}

/// Indices of tapers passing low-bias selection; the most concentrated taper
/// is kept when none pass.
pub(crate) fn low_bias_selection(eigenvalues: ArrayView1<'_, f64>) -> Vec<usize> {
    let keep = eigenvalues
        .iter()
        .enumerate()
        .filter(|(_, l)| **l > LOW_BIAS_THRESHOLD)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    if !keep.is_empty() {
        return keep;
    }
    tracing::debug!("no taper passes low-bias selection, keeping the first");
    vec![0]
}

fn demeaned(signal: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut out = signal.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let mean = row.mean().unwrap_or(0.0);
        row.mapv_inplace(|v| v - mean);
    }
    out
}

impl TaperedSpectra2D for TaperedSpectraKernel {
    fn run_alloc<I>(
        &self,
        signal: &I,
        tapers: Tapers<'_>,
    ) -> Result<TaperedSpectra, ExecInvariantViolation>
    where
        I: Read2D<f64> + ?Sized,
    {
        let signal = signal.read_view().map_err(ExecInvariantViolation::from)?;
        let (channels, n) = signal.dim();
        if channels == 0 || n == 0 {
            return Err(ConfigError::EmptyInput { arg: "signal" }.into());
        }

        let designed = match tapers {
            Tapers::Design { nw, kmax } => Some(cached_tapers(DpssConfig::new(n, nw, kmax))?),
            _ => None,
        };
        let (taper_view, eigen): (ArrayView2<'_, f64>, Option<ArrayView1<'_, f64>>) =
            match tapers {
                Tapers::Given(view) => (view.reborrow(), None),
                Tapers::Set(set) => (set.tapers(), Some(set.eigenvalues())),
                Tapers::Design { .. } => match designed.as_deref() {
                    Some(set) => (set.tapers(), Some(set.eigenvalues())),
                    None => {
                        return Err(ExecInvariantViolation::InvalidState {
                            reason: "taper design produced no tapers",
                        })
                    }
                },
            };
        if taper_view.nrows() == 0 {
            return Err(ConfigError::EmptyInput { arg: "tapers" }.into());
        }
        if taper_view.ncols() != n {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "tapers",
                expected: n,
                got: taper_view.ncols(),
            });
        }

        let (applied, eigenvalues): (CowArray<'_, f64, Ix2>, Option<Array1<f64>>) =
            match (self.low_bias, eigen) {
                (true, Some(eig)) => {
                    let keep = low_bias_selection(eig);
                    (
                        taper_view.select(Axis(0), &keep).into(),
                        Some(eig.select(Axis(0), &keep)),
                    )
                }
                (_, eig) => (taper_view.into(), eig.map(|e| e.to_owned())),
            };

        let requested = self.nfft.unwrap_or(n);
        let mut warnings = Vec::new();
        if !self.low_bias && requested < 2 * n {
            tracing::warn!(
                nfft = requested,
                window_len = n,
                "transform length is below twice the taper length; the estimate may be biased"
            );
            warnings.push(SpectralWarning::InsufficientPadding {
                nfft: requested,
                window_len: n,
            });
        }
        let nfft = requested.max(n);
        let bins = self.sides.bins(nfft);

        let centred = demeaned(signal);
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(nfft);
        let mut buf = vec![Complex::new(0.0, 0.0); nfft];
        let mut spectra = Array3::<Complex<f64>>::zeros((applied.nrows(), channels, bins));
        for (taper, mut per_taper) in applied
            .axis_iter(Axis(0))
            .zip(spectra.axis_iter_mut(Axis(0)))
        {
            for (channel, mut out) in centred
                .axis_iter(Axis(0))
                .zip(per_taper.axis_iter_mut(Axis(0)))
            {
                buf.iter_mut().for_each(|b| *b = Complex::new(0.0, 0.0));
                for ((dst, x), h) in buf.iter_mut().zip(channel.iter()).zip(taper.iter()) {
                    *dst = Complex::new(x * h, 0.0);
                }
                fft.process(&mut buf);
                out.assign(&ArrayView1::from(&buf[..bins]));
            }
        }

        Ok(TaperedSpectra {
            spectra,
            nfft,
            sides: self.sides,
            eigenvalues,
            warnings,
        })
    }
}

/// Taper every channel of `signal` and return one-sided spectra
/// `(K, C, nfft / 2 + 1)`.
///
/// `signal` is `(samples,)` or `(channels, samples)`; each channel is
/// de-meaned first. `nfft` defaults to the signal length and shorter requests
/// are raised to it. With `low_bias` set, designed tapers whose concentration
/// ratio is not above 0.9 are dropped; without it, a transform shorter than
/// twice the signal length records [`SpectralWarning::InsufficientPadding`].
pub fn tapered_spectra<I>(
    signal: &I,
    tapers: Tapers<'_>,
    nfft: Option<usize>,
    low_bias: bool,
) -> Result<TaperedSpectra, Error>
where
    I: Read2D<f64> + ?Sized,
{
    let kernel = TaperedSpectraKernel::try_new(TaperedSpectraConfig {
        nfft,
        low_bias,
        sides: Sides::OneSided,
    })?;
    Ok(kernel.run_alloc(signal, tapers)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::signal::windows::dpss_windows;
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    #[test]
    fn short_transform_without_low_bias_warns_once() {
        let s = Array2::<f64>::ones((2, 4));
        let out = tapered_spectra(&s, Tapers::Design { nw: 1.0, kmax: 2 }, Some(3), false)
            .expect("tapered spectra");
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(
            out.warnings[0],
            SpectralWarning::InsufficientPadding {
                nfft: 3,
                window_len: 4
            }
        );
        // nfft is raised to the signal length.
        assert_eq!(out.nfft, 4);
        assert_eq!(out.spectra.dim(), (2, 2, 3));
    }

    #[test]
    fn padded_or_low_bias_calls_do_not_warn() {
        let s = Array2::<f64>::ones((2, 16));
        let padded = tapered_spectra(&s, Tapers::Design { nw: 2.0, kmax: 3 }, Some(32), false)
            .expect("tapered spectra");
        assert!(padded.warnings.is_empty());
        let low_bias = tapered_spectra(&s, Tapers::Design { nw: 2.0, kmax: 3 }, Some(16), true)
            .expect("tapered spectra");
        assert!(low_bias.warnings.is_empty());
    }

    #[test]
    fn one_dimensional_signal_gets_a_channel_axis() {
        let x = Array1::from_iter((0..64).map(|i| (i as f64 * 0.3).sin()));
        let out = tapered_spectra(&x, Tapers::Design { nw: 2.0, kmax: 3 }, None, true)
            .expect("tapered spectra");
        let k = out.eigenvalues.as_ref().map(|e| e.len()).expect("designed tapers");
        assert_eq!(out.spectra.dim(), (k, 1, 33));
        assert!(out
            .eigenvalues
            .as_ref()
            .map(|e| e.iter().all(|l| *l > LOW_BIAS_THRESHOLD))
            .unwrap_or(false));
    }

    #[test]
    fn low_bias_keeps_concentrated_tapers() {
        let eig = Array1::from(vec![0.999, 0.95, 0.9, 0.4]);
        assert_eq!(low_bias_selection(eig.view()), vec![0, 1]);
        let poor = Array1::from(vec![0.6, 0.2]);
        assert_eq!(low_bias_selection(poor.view()), vec![0]);
    }

    #[test]
    fn channels_are_demeaned() {
        let s = Array2::<f64>::from_elem((3, 32), 5.0);
        let out = tapered_spectra(&s, Tapers::Design { nw: 2.0, kmax: 3 }, None, true)
            .expect("tapered spectra");
        out.spectra
            .iter()
            .for_each(|v| assert_abs_diff_eq!(v.norm(), 0.0, epsilon = 1e-10));
    }

    #[test]
    fn boxcar_taper_recovers_a_sinusoid() {
        let n = 32;
        let boxcar = Array2::<f64>::from_elem((1, n), 1.0 / (n as f64).sqrt());
        let x = Array1::from_iter(
            (0..n).map(|i| (2.0 * core::f64::consts::PI * 4.0 * i as f64 / n as f64).cos()),
        );
        let out = tapered_spectra(&x, Tapers::Given(boxcar.view()), None, true)
            .expect("tapered spectra");
        assert!(out.eigenvalues.is_none());
        let spectrum = out.spectra.index_axis(Axis(0), 0).index_axis(Axis(0), 0).to_owned();
        assert_abs_diff_eq!(spectrum[4].norm(), 16.0 / (n as f64).sqrt(), epsilon = 1e-10);
        assert_abs_diff_eq!(spectrum[3].norm(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn two_sided_output_is_conjugate_symmetric() {
        let kernel = TaperedSpectraKernel::try_new(TaperedSpectraConfig {
            nfft: Some(50),
            low_bias: true,
            sides: Sides::TwoSided,
        })
        .expect("kernel should initialize");
        let x = Array1::from_iter((0..40).map(|i| ((i * i) % 7) as f64));
        let set = dpss_windows(40, 2.0, 3, None).expect("valid design");
        let out = kernel.run_alloc(&x, Tapers::from(&set)).expect("tapered spectra");
        assert_eq!(out.nfft, 50);
        assert_eq!(out.spectra.dim().2, 50);
        for k in 1..25 {
            let a = out.spectra[(0, 0, k)];
            let b = out.spectra[(0, 0, 50 - k)].conj();
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-10);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-10);
        }
    }

    #[test]
    fn taper_length_must_match_signal() {
        let x = Array1::<f64>::zeros(100);
        let set = dpss_windows(99, 2.0, 2, None).expect("valid design");
        let err = tapered_spectra(&x, Tapers::Set(&set), None, false)
            .expect_err("mismatched taper length");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn rejects_zero_nfft_and_empty_signal() {
        assert!(TaperedSpectraKernel::try_new(TaperedSpectraConfig {
            nfft: Some(0),
            ..TaperedSpectraConfig::default()
        })
        .is_err());
        let empty = Array2::<f64>::zeros((2, 0));
        assert!(tapered_spectra(&empty, Tapers::Design { nw: 1.0, kmax: 1 }, None, true).is_err());
    }
}
