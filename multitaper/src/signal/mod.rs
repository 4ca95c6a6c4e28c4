//! Multitaper signal processing: taper design, tapered spectra, spectral
//! combination and estimator dispatch.

pub mod multitaper;
pub mod spectra;
pub mod traits;
pub mod windows;
