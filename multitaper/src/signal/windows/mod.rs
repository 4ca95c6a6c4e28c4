//! Discrete prolate spheroidal (Slepian) taper generation.
//!
//! Tapers are designed either exactly, from the tridiagonal
//! time-and-band-limiting operator, or approximately by designing at a
//! shorter reference length and interpolating. Designs are memoized
//! process-wide by [`dpss_windows_cached`].

mod cache;
mod dpss;
mod kernels;

use std::sync::Arc;

use crate::error::Error;
use crate::kernel::{ExecInvariantViolation, KernelLifecycle};
use crate::signal::traits::DpssGenerate;

pub use dpss::TaperSet;
pub use kernels::{DpssConfig, DpssKernel};

/// Compute `kmax` DPSS tapers of length `n` and their concentration ratios.
///
/// With `interp_from = Some(m)` the tapers are designed at length `m` and
/// linearly interpolated up to `n`, which is much cheaper for very long
/// windows. Use [`DpssKernel`] to choose cubic interpolation instead.
///
/// ```
/// use multitaper::signal::windows::dpss_windows;
///
/// let set = dpss_windows(31, 6.0, 4, None).unwrap();
/// assert!(set.eigenvalues().iter().all(|l| (l - 1.0).abs() < 1e-7));
/// ```
pub fn dpss_windows(
    n: usize,
    nw: f64,
    kmax: usize,
    interp_from: Option<usize>,
) -> Result<TaperSet, Error> {
    let mut config = DpssConfig::new(n, nw, kmax);
    config.interp_from = interp_from;
    let kernel = DpssKernel::try_new(config)?;
    Ok(kernel.run_alloc()?)
}

/// Like [`dpss_windows`], but shares one design per parameter set across
/// the whole process.
pub fn dpss_windows_cached(
    n: usize,
    nw: f64,
    kmax: usize,
    interp_from: Option<usize>,
) -> Result<Arc<TaperSet>, Error> {
    let mut config = DpssConfig::new(n, nw, kmax);
    config.interp_from = interp_from;
    Ok(cached_tapers(config)?)
}

/// Forget every taper set memoized by [`dpss_windows_cached`].
pub fn clear_taper_cache() {
    cache::clear();
}

pub(crate) fn cached_tapers(config: DpssConfig) -> Result<Arc<TaperSet>, ExecInvariantViolation> {
    let kernel = DpssKernel::try_new(config)?;
    cache::cached(&kernel)
}
