//! Shared trait-first kernel substrate.
//!
//! This module defines the constructor validation lifecycle and the 1D/2D
//! buffer adapters used by the taper, tapered-spectra and cross-spectrum
//! kernels.

mod errors;
mod io;
mod lifecycle;

pub use errors::*;
pub use io::*;
pub use lifecycle::*;
