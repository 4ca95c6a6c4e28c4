//! Multitaper spectral estimation.
//!
//! The pipeline is taper design ([`crate::signal::windows`]), per-taper
//! spectra ([`tapered_spectra`]), weighted combination
//! ([`mtm_cross_spectrum`], optionally with [`adaptive_weights`]) and the
//! full estimators [`multi_taper_csd`] and [`multi_taper_psd`].

mod adaptive;
mod cross;
mod estimators;
mod tapered;

use core::fmt;

use serde::{Deserialize, Serialize};

pub use adaptive::{adaptive_weights, AdaptiveConfig, AdaptiveKernel, AdaptiveWeights};
pub use cross::{
    mtm_cross_spectrum, onesided_to_twosided, twosided_to_onesided, MtmCrossSpectrumConfig,
    MtmCrossSpectrumKernel, TaperWeights,
};
pub use estimators::{
    multi_taper_csd, multi_taper_psd, CsdEstimate, MultitaperConfig, MultitaperKernel,
    PsdEstimate,
};
pub use tapered::{
    tapered_spectra, TaperedSpectra, TaperedSpectraConfig, TaperedSpectraKernel, Tapers,
};

/// Frequency layout of a spectrum of a real signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sides {
    /// Bins `0..=nfft / 2`, with the power of mirrored bins folded in.
    #[default]
    OneSided,
    /// All `nfft` bins.
    TwoSided,
}

impl Sides {
    /// Number of bins stored for a transform of length `nfft`.
    pub fn bins(self, nfft: usize) -> usize {
        match self {
            Sides::OneSided => nfft / 2 + 1,
            Sides::TwoSided => nfft,
        }
    }
}

/// Non-fatal numerical conditions detected while estimating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralWarning {
    /// The transform is shorter than twice the taper length, so the estimate
    /// carries spectral leakage bias.
    InsufficientPadding {
        /// Transform length that was requested.
        nfft: usize,
        /// Taper length.
        window_len: usize,
    },
    /// Fewer than three tapers; adaptive weighting was replaced by fixed
    /// `sqrt(eigenvalue)` weights.
    TooFewTapersForAdaptive {
        /// Number of tapers available.
        tapers: usize,
    },
    /// Adaptive weighting stopped at its iteration cap.
    AdaptiveNotConverged {
        /// Iterations performed.
        iterations: usize,
    },
}

impl fmt::Display for SpectralWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpectralWarning::InsufficientPadding { nfft, window_len } => write!(
                f,
                "transform length {nfft} is below twice the taper length {window_len}; \
                 the estimate may be biased"
            ),
            SpectralWarning::TooFewTapersForAdaptive { tapers } => write!(
                f,
                "not adaptively combining, only {tapers} tapers"
            ),
            SpectralWarning::AdaptiveNotConverged { iterations } => write!(
                f,
                "adaptive weights did not converge after {iterations} iterations"
            ),
        }
    }
}

/// Frequencies of the stored bins for a transform of length `nfft`.
pub fn frequencies(nfft: usize, fs: f64, sides: Sides) -> ndarray::Array1<f64> {
    match sides {
        Sides::OneSided => ndarray::Array1::linspace(0.0, fs / 2.0, nfft / 2 + 1),
        Sides::TwoSided => (0..nfft).map(|k| k as f64 * fs / nfft as f64).collect(),
    }
}
