//! Multitaper spectral estimation.
//!
//! Power and cross-power spectra of single or multi-channel series are
//! estimated by applying a handful of orthogonal, optimally concentrated
//! tapers (discrete prolate spheroidal sequences), transforming each tapered
//! copy and combining the per-taper estimates.
//!
//! ```
//! use multitaper::signal::spectra::{get_spectra, MethodConfig};
//! use ndarray::Array1;
//!
//! let x = Array1::from_iter((0..1024).map(|i| (i as f64 * 0.2).sin()));
//! let spectra = get_spectra(&x, &MethodConfig::default()).unwrap();
//! assert_eq!(spectra.frequencies.len(), 513);
//! ```
//!
//! Every stage is also available as a kernel: a `*Config` validated once by
//! [`kernel::KernelLifecycle::try_new`] and run through the traits in
//! [`signal::traits`].

#![warn(missing_docs)]

pub mod error;
pub mod interpolate;
pub mod kernel;
pub mod linalg;
pub mod signal;

pub use error::{Error, ErrorKind};
