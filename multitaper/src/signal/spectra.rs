//! Estimator dispatch by name.
//!
//! [`get_spectra`] takes a 1-D or `(channels, samples)` signal and a
//! [`MethodConfig`] naming one of the estimators in an
//! [`EstimatorRegistry`]. Estimators declare up front which options they
//! honour, so an unsupported option is rejected before any work is done.

use std::collections::HashMap;
use std::sync::OnceLock;

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::kernel::Read2D;
use crate::signal::multitaper::{
    multi_taper_csd, multi_taper_psd, MultitaperConfig, Sides, SpectralWarning,
};

/// Registry key of the multitaper cross-spectral density estimator.
pub const MULTITAPER_CSD: &str = "multitaper_cross_spectral_density";
/// Registry key of the multitaper power spectral density estimator.
pub const MULTITAPER_PSD: &str = "multitaper_psd";

/// How to estimate a spectrum.
///
/// Deserializes from JSON with every field optional:
///
/// ```
/// use multitaper::signal::spectra::MethodConfig;
///
/// let method: MethodConfig =
///     serde_json::from_str(r#"{"estimator": "multitaper_psd", "fs": 1000.0}"#).unwrap();
/// assert_eq!(method.estimator, "multitaper_psd");
/// assert!(method.low_bias);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodConfig {
    /// Registry key of the estimator.
    #[serde(alias = "this_method")]
    pub estimator: String,
    /// Time-half-bandwidth product.
    pub nw: Option<f64>,
    /// Full bandwidth in units of `fs`; takes precedence over `nw`.
    pub bandwidth: Option<f64>,
    /// Sampling rate.
    pub fs: f64,
    /// Keep only tapers with concentration ratio above 0.9.
    pub low_bias: bool,
    /// Use adaptive taper weights.
    pub adaptive: bool,
    /// Frequency layout of the output.
    pub sides: Sides,
    /// Transform length; defaults to the signal length.
    pub nfft: Option<usize>,
}

impl Default for MethodConfig {
    fn default() -> Self {
        Self {
            estimator: MULTITAPER_CSD.to_owned(),
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

impl MethodConfig {
    /// Method using the estimator registered as `estimator`, with defaults
    /// for everything else.
    pub fn new(estimator: impl Into<String>) -> Self {
        Self {
            estimator: estimator.into(),
            ..Self::default()
        }
    }

    /// Multitaper options of this method.
    pub fn multitaper(&self) -> MultitaperConfig {
        MultitaperConfig {
            nw: self.nw,
            bandwidth: self.bandwidth,
            fs: self.fs,
            low_bias: self.low_bias,
            adaptive: self.adaptive,
            sides: self.sides,
            nfft: self.nfft,
        }
    }
}

/// Spectral values returned by an estimator.
#[derive(Debug, Clone, PartialEq)]
pub enum SpectrumOutput {
    /// Cross-spectral density matrix, `(channel, channel, frequency)`.
    Csd(Array3<Complex<f64>>),
    /// Power spectral density, `(channel, frequency)`.
    Psd(Array2<f64>),
}

impl SpectrumOutput {
    /// Number of channels.
    pub fn channels(&self) -> usize {
        match self {
            SpectrumOutput::Csd(csd) => csd.dim().0,
            SpectrumOutput::Psd(psd) => psd.nrows(),
        }
    }

    /// Number of frequency bins.
    pub fn bins(&self) -> usize {
        match self {
            SpectrumOutput::Csd(csd) => csd.dim().2,
            SpectrumOutput::Psd(psd) => psd.ncols(),
        }
    }
}

/// Result of [`get_spectra`].
#[derive(Debug, Clone, PartialEq)]
pub struct Spectra {
    /// Frequencies of the bins.
    pub frequencies: Array1<f64>,
    /// Spectral values.
    pub spectrum: SpectrumOutput,
    /// Dimensionality of the input signal (1 or 2).
    pub source_ndim: usize,
    /// Conditions raised while estimating.
    pub warnings: Vec<SpectralWarning>,
}

impl Spectra {
    /// Auto-spectrum of channel `index`, or `None` when out of range.
    pub fn channel(&self, index: usize) -> Option<Array1<f64>> {
        if index >= self.spectrum.channels() {
            return None;
        }
        Some(match &self.spectrum {
            SpectrumOutput::Csd(csd) => csd
                .index_axis(Axis(0), index)
                .index_axis(Axis(0), index)
                .mapv(|v| v.re),
            SpectrumOutput::Psd(psd) => psd.row(index).to_owned(),
        })
    }
}

/// Estimator entry point: `(channels, samples)` signal and method in, spectra
/// out.
pub type Estimator = fn(ArrayView2<'_, f64>, &MethodConfig) -> Result<Spectra, Error>;

/// Options an estimator honours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EstimatorCapabilities {
    /// Adaptive taper weighting.
    pub accepts_adaptive: bool,
    /// An explicit transform length.
    pub accepts_nfft: bool,
    /// A bandwidth instead of `nw`.
    pub accepts_bandwidth: bool,
}

impl EstimatorCapabilities {
    /// Every option is honoured.
    pub const ALL: Self = Self {
        accepts_adaptive: true,
        accepts_nfft: true,
        accepts_bandwidth: true,
    };

    fn check(&self, name: &str, method: &MethodConfig) -> Result<(), Error> {
        let unsupported = if method.adaptive && !self.accepts_adaptive {
            Some("adaptive")
        } else if method.nfft.is_some() && !self.accepts_nfft {
            Some("nfft")
        } else if method.bandwidth.is_some() && !self.accepts_bandwidth {
            Some("bandwidth")
        } else {
            None
        };
        match unsupported {
            Some(arg) => Err(Error::invalid(
                arg,
                format!("estimator `{name}` does not support this option"),
            )),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    estimator: Estimator,
    capabilities: EstimatorCapabilities,
}

/// Named estimators and their capabilities.
#[derive(Debug, Clone, Default)]
pub struct EstimatorRegistry {
    entries: HashMap<String, Entry>,
}

impl EstimatorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the multitaper CSD and PSD estimators.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(MULTITAPER_CSD, csd_estimator, EstimatorCapabilities::ALL)
            .register(MULTITAPER_PSD, psd_estimator, EstimatorCapabilities::ALL)
            .register("multi_taper_csd", csd_estimator, EstimatorCapabilities::ALL)
            .register("multi_taper_psd", psd_estimator, EstimatorCapabilities::ALL);
        registry
    }

    /// Add or replace the estimator registered under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        estimator: Estimator,
        capabilities: EstimatorCapabilities,
    ) -> &mut Self {
        self.entries.insert(
            name.into(),
            Entry {
                estimator,
                capabilities,
            },
        );
        self
    }

    /// Capabilities of the estimator registered under `name`.
    pub fn capabilities(&self, name: &str) -> Option<EstimatorCapabilities> {
        self.entries.get(name).map(|e| e.capabilities)
    }

    /// Registered names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Estimate spectra of `x` with the estimator `method` names.
    pub fn get_spectra<I>(&self, x: &I, method: &MethodConfig) -> Result<Spectra, Error>
    where
        I: Read2D<f64> + ?Sized,
    {
        let entry = self.entries.get(&method.estimator).ok_or_else(|| {
            Error::invalid(
                "estimator",
                format!("unknown estimator `{}`", method.estimator),
            )
        })?;
        entry.capabilities.check(&method.estimator, method)?;

        let view = x.read_view()?;
        tracing::debug!(
            estimator = %method.estimator,
            channels = view.nrows(),
            samples = view.ncols(),
            "estimating spectra"
        );
        let mut spectra = (entry.estimator)(view, method)?;
        spectra.source_ndim = x.source_ndim();
        Ok(spectra)
    }
}

fn csd_estimator(x: ArrayView2<'_, f64>, method: &MethodConfig) -> Result<Spectra, Error> {
    let estimate = multi_taper_csd(&x, &method.multitaper())?;
    Ok(Spectra {
        frequencies: estimate.frequencies,
        spectrum: SpectrumOutput::Csd(estimate.csd),
        source_ndim: 2,
        warnings: estimate.warnings,
    })
}

fn psd_estimator(x: ArrayView2<'_, f64>, method: &MethodConfig) -> Result<Spectra, Error> {
    let estimate = multi_taper_psd(&x, &method.multitaper())?;
    Ok(Spectra {
        frequencies: estimate.frequencies,
        spectrum: SpectrumOutput::Psd(estimate.psd),
        source_ndim: 2,
        warnings: estimate.warnings,
    })
}

fn default_registry() -> &'static EstimatorRegistry {
    static REGISTRY: OnceLock<EstimatorRegistry> = OnceLock::new();
    REGISTRY.get_or_init(EstimatorRegistry::with_defaults)
}

/// Estimate spectra of a 1-D or `(channels, samples)` signal with one of the
/// default estimators.
///
/// For `N` samples per channel and the default one-sided layout the result
/// has `N / 2 + 1` frequency bins.
pub fn get_spectra<I>(x: &I, method: &MethodConfig) -> Result<Spectra, Error>
where
    I: Read2D<f64> + ?Sized,
{
    default_registry().get_spectra(x, method)
}
