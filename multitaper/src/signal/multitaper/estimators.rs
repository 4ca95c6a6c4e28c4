//! Multitaper cross-spectral and power spectral density estimators.

use crate::error::Error;
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read2D};
use crate::signal::traits::{AdaptiveWeighting, MultitaperCsd2D, MultitaperPsd2D, TaperedSpectra2D};
use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};
use rustfft::num_complex::Complex;

use super::adaptive::{AdaptiveConfig, AdaptiveKernel};
use super::cross::{combine, fold_onesided};
use super::tapered::{TaperedSpectraConfig, TaperedSpectraKernel, Tapers};
use super::{frequencies, Sides, SpectralWarning, TaperedSpectra};

/// Time-half-bandwidth product used when neither `nw` nor `bandwidth` is set.
pub const DEFAULT_NW: f64 = 4.0;

/// Constructor config for [`MultitaperKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultitaperConfig {
    /// Time-half-bandwidth product.
    pub nw: Option<f64>,
    /// Full bandwidth in units of `fs`; takes precedence over `nw`.
    pub bandwidth: Option<f64>,
    /// Sampling rate.
    pub fs: f64,
    /// Keep only tapers with concentration ratio above 0.9.
    pub low_bias: bool,
    /// Use Thomson adaptive weights instead of `sqrt(eigenvalue)` weights.
    pub adaptive: bool,
    /// Frequency layout of the output.
    pub sides: Sides,
    /// Transform length; defaults to the signal length.
    pub nfft: Option<usize>,
}

impl Default for MultitaperConfig {
    fn default() -> Self {
        Self {
            nw: None,
            bandwidth: None,
            fs: 2.0 * core::f64::consts::PI,
            low_bias: true,
            adaptive: false,
            sides: Sides::OneSided,
            nfft: None,
        }
    }
}

/// Cross-spectral density matrix estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct CsdEstimate {
    /// Frequencies of the bins.
    pub frequencies: Array1<f64>,
    /// Hermitian matrix per bin, indexed `(channel, channel, frequency)`.
    pub csd: Array3<Complex<f64>>,
    /// Transform length used.
    pub nfft: usize,
    /// Conditions raised while estimating.
    pub warnings: Vec<SpectralWarning>,
}

/// Power spectral density estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct PsdEstimate {
    /// Frequencies of the bins.
    pub frequencies: Array1<f64>,
    /// Densities indexed `(channel, frequency)`.
    pub psd: Array2<f64>,
    /// Degrees of freedom indexed `(channel, frequency)`.
    pub dof: Array2<f64>,
    /// Transform length used.
    pub nfft: usize,
    /// Conditions raised while estimating.
    pub warnings: Vec<SpectralWarning>,
}

/// Trait-first multitaper estimator kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultitaperKernel {
    nw: Option<f64>,
    bandwidth: Option<f64>,
    fs: f64,
    low_bias: bool,
    adaptive: bool,
    sides: Sides,
    nfft: Option<usize>,
}

impl KernelLifecycle for MultitaperKernel {
    type Config = MultitaperConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if !config.fs.is_finite() || config.fs <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "fs",
                reason: "fs must be finite and > 0",
            });
        }
        if matches!(config.nw, Some(nw) if !nw.is_finite() || nw <= 0.0) {
            return Err(ConfigError::InvalidArgument {
                arg: "nw",
                reason: "nw must be finite and > 0",
            });
        }
        if matches!(config.bandwidth, Some(bw) if !bw.is_finite() || bw <= 0.0) {
            return Err(ConfigError::InvalidArgument {
                arg: "bandwidth",
                reason: "bandwidth must be finite and > 0",
            });
        }
        if config.nfft == Some(0) {
            return Err(ConfigError::InvalidArgument {
                arg: "nfft",
                reason: "nfft must be > 0",
            });
        }
        Ok(Self {
            nw: config.nw,
            bandwidth: config.bandwidth,
            fs: config.fs,
            low_bias: config.low_bias,
            adaptive: config.adaptive,
            sides: config.sides,
            nfft: config.nfft,
        })
    }
}

/// Per-channel weights `(K, F)` and the warnings raised computing them.
struct ChannelWeights {
    weights: Vec<Array2<f64>>,
    dof: Vec<Array1<f64>>,
    warnings: Vec<SpectralWarning>,
}

impl MultitaperKernel {
    /// Time-half-bandwidth product for a window of `n` samples.
    pub fn nw_for(&self, n: usize) -> f64 {
        match self.bandwidth {
            Some(bw) => (bw * n as f64 / self.fs).round() / 2.0,
            None => self.nw.unwrap_or(DEFAULT_NW),
        }
    }

    fn spectra(&self, signal: ArrayView2<'_, f64>) -> Result<TaperedSpectra, ExecInvariantViolation> {
        let nw = self.nw_for(signal.ncols());
        let kmax = ((2.0 * nw).floor() as usize).max(1);
        tracing::debug!(nw, kmax, adaptive = self.adaptive, "multitaper estimate");
        let kernel = TaperedSpectraKernel::try_new(TaperedSpectraConfig {
            nfft: self.nfft,
            low_bias: self.low_bias,
            sides: self.sides,
        })?;
        kernel.run_alloc(&signal, Tapers::Design { nw, kmax })
    }

    fn channel_weights(
        &self,
        tapered: &TaperedSpectra,
    ) -> Result<ChannelWeights, ExecInvariantViolation> {
        let (k, channels, bins) = tapered.spectra.dim();
        let eigenvalues = tapered
            .eigenvalues
            .as_ref()
            .ok_or(ExecInvariantViolation::InvalidState {
                reason: "designed tapers are missing concentration ratios",
            })?;

        if !self.adaptive {
            let fixed = Array2::from_shape_fn((k, bins), |(i, _)| eigenvalues[i].sqrt());
            return Ok(ChannelWeights {
                weights: vec![fixed; channels],
                dof: vec![Array1::from_elem(bins, 2.0 * k as f64); channels],
                warnings: Vec::new(),
            });
        }

        let kernel = AdaptiveKernel::try_new(AdaptiveConfig::new(tapered.nfft))?;
        let mut out = ChannelWeights {
            weights: Vec::with_capacity(channels),
            dof: Vec::with_capacity(channels),
            warnings: Vec::new(),
        };
        for yk in tapered.spectra.axis_iter(Axis(1)) {
            let adaptive = kernel.run_alloc(yk, eigenvalues.view())?;
            out.weights.push(adaptive.weights);
            out.dof.push(adaptive.dof);
            out.warnings.extend(adaptive.warnings);
        }
        Ok(out)
    }

    fn pair(
        &self,
        tapered: &TaperedSpectra,
        weights: &ChannelWeights,
        i: usize,
        j: usize,
    ) -> Array1<Complex<f64>> {
        let mut s = combine(
            tapered.spectra.index_axis(Axis(1), i),
            tapered.spectra.index_axis(Axis(1), j),
            weights.weights[i].view(),
            weights.weights[j].view(),
        );
        if self.sides == Sides::OneSided {
            fold_onesided(&mut s, tapered.nfft);
        }
        s.mapv_inplace(|v| v / self.fs);
        s
    }
}

impl MultitaperCsd2D for MultitaperKernel {
    fn run_alloc<I>(&self, signal: &I) -> Result<CsdEstimate, ExecInvariantViolation>
    where
        I: Read2D<f64> + ?Sized,
    {
        let signal = signal.read_view().map_err(ExecInvariantViolation::from)?;
        let tapered = self.spectra(signal)?;
        let weights = self.channel_weights(&tapered)?;
        let (_, channels, bins) = tapered.spectra.dim();

        let mut csd = Array3::<Complex<f64>>::zeros((channels, channels, bins));
        for i in 0..channels {
            for j in 0..=i {
                let s = self.pair(&tapered, &weights, i, j);
                csd.slice_mut(s![j, i, ..]).assign(&s.mapv(|v| v.conj()));
                csd.slice_mut(s![i, j, ..]).assign(&s);
            }
        }

        let mut warnings = tapered.warnings.clone();
        warnings.extend(weights.warnings);
        Ok(CsdEstimate {
            frequencies: frequencies(tapered.nfft, self.fs, self.sides),
            csd,
            nfft: tapered.nfft,
            warnings,
        })
    }
}

impl MultitaperPsd2D for MultitaperKernel {
    fn run_alloc<I>(&self, signal: &I) -> Result<PsdEstimate, ExecInvariantViolation>
    where
        I: Read2D<f64> + ?Sized,
    {
        let signal = signal.read_view().map_err(ExecInvariantViolation::from)?;
        let tapered = self.spectra(signal)?;
        let weights = self.channel_weights(&tapered)?;
        let (_, channels, bins) = tapered.spectra.dim();

        let mut psd = Array2::<f64>::zeros((channels, bins));
        let mut dof = Array2::<f64>::zeros((channels, bins));
        for c in 0..channels {
            psd.row_mut(c)
                .assign(&self.pair(&tapered, &weights, c, c).mapv(|v| v.re));
            dof.row_mut(c).assign(&weights.dof[c]);
        }

        let mut warnings = tapered.warnings.clone();
        warnings.extend(weights.warnings);
        Ok(PsdEstimate {
            frequencies: frequencies(tapered.nfft, self.fs, self.sides),
            psd,
            dof,
            nfft: tapered.nfft,
            warnings,
        })
    }
}

/// Multitaper cross-spectral density matrix of every channel pair.
///
/// `NW` comes from `config.bandwidth` when set (`round(bandwidth * N / fs) / 2`),
/// otherwise from `config.nw`, defaulting to 4; `floor(2 NW)` tapers are
/// designed. The result is scaled by `1 / fs`.
pub fn multi_taper_csd<I>(signal: &I, config: &MultitaperConfig) -> Result<CsdEstimate, Error>
where
    I: Read2D<f64> + ?Sized,
{
    let kernel = MultitaperKernel::try_new(*config)?;
    Ok(MultitaperCsd2D::run_alloc(&kernel, signal)?)
}

/// Multitaper power spectral density of every channel, with degrees of
/// freedom per bin.
pub fn multi_taper_psd<I>(signal: &I, config: &MultitaperConfig) -> Result<PsdEstimate, Error>
where
    I: Read2D<f64> + ?Sized,
{
    let kernel = MultitaperKernel::try_new(*config)?;
    Ok(MultitaperPsd2D::run_alloc(&kernel, signal)?)
}
