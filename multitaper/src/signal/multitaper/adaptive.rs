//! Thomson adaptive weighting of per-taper spectra.
//!
//! Higher-order tapers leak more broadband power. Adaptive weights
//! down-weight them wherever the spectrum is small compared with that
//! leakage, iterating between
//!
//! ```text
//! S(f)   = sum_k d_k(f)^2 |Y_k(f)|^2 / sum_k d_k(f)^2
//! d_k(f) = sqrt(lambda_k) S(f) / (lambda_k S(f) + (1 - lambda_k) sigma^2)
//! ```
//!
//! where `sigma^2` is the signal variance estimated from the spectrum itself.

use crate::error::Error;
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle};
use crate::signal::traits::AdaptiveWeighting;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rustfft::num_complex::Complex;

use super::cross::combine;
use super::SpectralWarning;

/// Iteration cap used by [`adaptive_weights`] callers that have no preference.
pub const DEFAULT_MAX_ITER: usize = 150;

const CONVERGENCE_TOL: f64 = 1e-10;

/// Constructor config for [`AdaptiveKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveConfig {
    /// Transform length the spectra were computed with.
    pub nfft: usize,
    /// Maximum number of weight updates.
    pub max_iter: usize,
}

impl AdaptiveConfig {
    /// Config for spectra of transform length `nfft` with the default cap.
    pub fn new(nfft: usize) -> Self {
        Self {
            nfft,
            max_iter: DEFAULT_MAX_ITER,
        }
    }
}

/// Output of [`adaptive_weights`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveWeights {
    /// Weights `d_k(f)`, shape `(K, F)`, aligned with the input bins.
    pub weights: Array2<f64>,
    /// Degrees of freedom per bin, `2 sum_k d_k(f)^2`.
    pub dof: Array1<f64>,
    /// Whether the weights settled before the iteration cap.
    pub converged: bool,
    /// Weight updates performed.
    pub iterations: usize,
    /// Conditions raised while weighting.
    pub warnings: Vec<SpectralWarning>,
}

/// Trait-first adaptive weighting kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveKernel {
    nfft: usize,
    max_iter: usize,
}

impl KernelLifecycle for AdaptiveKernel {
    type Config = AdaptiveConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.nfft == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "nfft",
                reason: "nfft must be > 0",
            });
        }
        if config.max_iter == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "max_iter",
                reason: "at least one iteration is required",
            });
        }
        Ok(Self {
            nfft: config.nfft,
            max_iter: config.max_iter,
        })
    }
}

impl AdaptiveKernel {
    /// Total power of a real spectrum over all `nfft` bins divided by `nfft`.
    fn variance(&self, sdf: ArrayView1<'_, f64>) -> f64 {
        let total = if sdf.len() == self.nfft {
            sdf.sum()
        } else {
            let mirrored = (self.nfft + 1) / 2;
            sdf.sum() + sdf.slice(s![1..mirrored]).sum()
        };
        total / self.nfft as f64
    }
}

fn auto_spectrum(yk: ArrayView2<'_, Complex<f64>>, weights: ArrayView2<'_, f64>) -> Array1<f64> {
    combine(yk, yk, weights, weights).mapv(|v| v.re)
}

impl AdaptiveWeighting for AdaptiveKernel {
    fn run_alloc(
        &self,
        yk: ArrayView2<'_, Complex<f64>>,
        eigenvalues: ArrayView1<'_, f64>,
    ) -> Result<AdaptiveWeights, ExecInvariantViolation> {
        let (k, f) = yk.dim();
        if k == 0 {
            return Err(ConfigError::EmptyInput { arg: "yk" }.into());
        }
        if eigenvalues.len() != k {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "eigenvalues",
                expected: k,
                got: eigenvalues.len(),
            });
        }
        if f != self.nfft && f != self.nfft / 2 + 1 {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "yk",
                expected: self.nfft,
                got: f,
            });
        }

        let rt_eig = eigenvalues.mapv(f64::sqrt);
        if k < 3 {
            tracing::warn!(tapers = k, "not adaptively combining, number of tapers < 3");
            let weights = Array2::from_shape_fn((k, f), |(i, _)| rt_eig[i]);
            return Ok(AdaptiveWeights {
                weights,
                dof: Array1::from_elem(f, 2.0 * k as f64),
                converged: true,
                iterations: 0,
                warnings: vec![SpectralWarning::TooFewTapersForAdaptive { tapers: k }],
            });
        }

        let eig_weights = Array2::from_shape_fn((k, f), |(i, _)| eigenvalues[i]);
        let variance = self.variance(auto_spectrum(yk, eig_weights.view()).view());
        let broadband = eigenvalues.mapv(|l| (1.0 - l) * variance);

        // Seed from the two best concentrated tapers.
        let mut sdf = auto_spectrum(
            yk.slice(s![..2, ..]),
            eig_weights.slice(s![..2, ..]),
        );
        let mut previous = Array2::<f64>::zeros((k, f));
        let mut weights = Array2::<f64>::zeros((k, f));
        let mut converged = false;
        let mut iterations = 0;
        while iterations < self.max_iter {
            iterations += 1;
            for ((i, bin), d) in weights.indexed_iter_mut() {
                let den = eigenvalues[i] * sdf[bin] + broadband[i];
                *d = if den > 0.0 {
                    rt_eig[i] * sdf[bin] / den
                } else {
                    rt_eig[i]
                };
            }

            let change = (&previous - &weights)
                .mapv(|e| e * e)
                .mean_axis(Axis(0))
                .map(|m| m.fold(0.0_f64, |acc, v| acc.max(*v)))
                .unwrap_or(0.0);
            if change < CONVERGENCE_TOL {
                converged = true;
                break;
            }
            sdf = auto_spectrum(yk, weights.view());
            previous.assign(&weights);
        }

        let mut warnings = Vec::new();
        if !converged {
            tracing::warn!(iterations, "adaptive weights hit the iteration cap");
            warnings.push(SpectralWarning::AdaptiveNotConverged { iterations });
        }
        let dof = weights.mapv(|d| d * d).sum_axis(Axis(0)) * 2.0;
        Ok(AdaptiveWeights {
            weights,
            dof,
            converged,
            iterations,
            warnings,
        })
    }
}

/// Adaptive weights for the `(K, F)` per-taper spectra `yk` of one channel.
///
/// `yk` holds either all `nfft` bins or the `nfft / 2 + 1` non-negative ones.
/// With fewer than three tapers the weights fall back to `sqrt(eigenvalue)`
/// and a [`SpectralWarning::TooFewTapersForAdaptive`] is recorded.
pub fn adaptive_weights(
    yk: ArrayView2<'_, Complex<f64>>,
    eigenvalues: ArrayView1<'_, f64>,
    nfft: usize,
    max_iter: usize,
) -> Result<AdaptiveWeights, Error> {
    let kernel = AdaptiveKernel::try_new(AdaptiveConfig { nfft, max_iter })?;
    Ok(kernel.run_alloc(yk, eigenvalues)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::multitaper::{tapered_spectra, Tapers};
    use approx::assert_abs_diff_eq;
    use ndarray::Array;
    use rand::Rng;

    fn white_noise_spectra(n: usize, nw: f64, kmax: usize) -> (Array2<Complex<f64>>, Array1<f64>) {
        let mut rng = rand::rng();
        let x = Array::from_iter((0..n).map(|_| rng.random_range(-1.0..1.0)));
        let out = tapered_spectra(&x, Tapers::Design { nw, kmax }, None, true)
            .expect("tapered spectra");
        let eig = out.eigenvalues.clone().expect("designed tapers");
        (out.spectra.index_axis(Axis(1), 0).to_owned(), eig)
    }

    #[test]
    fn converges_on_white_noise() {
        let (yk, eig) = white_noise_spectra(512, 4.0, 7);
        assert!(eig.len() >= 3);
        let out = adaptive_weights(yk.view(), eig.view(), 512, DEFAULT_MAX_ITER)
            .expect("adaptive weights");
        assert!(out.converged);
        assert!(out.warnings.is_empty());
        assert_eq!(out.weights.dim(), (eig.len(), 257));
        // The leading taper leaks almost nothing, so it keeps full weight.
        out.weights
            .row(0)
            .iter()
            .for_each(|d| assert_abs_diff_eq!(*d, 1.0, epsilon = 1e-3));
        assert!(out.dof.iter().all(|v| v.is_finite() && *v > 0.0));
    }

    #[test]
    fn too_few_tapers_fall_back_to_fixed_weights() {
        let (yk, eig) = white_noise_spectra(64, 1.0, 2);
        let k = eig.len();
        assert!(k < 3);
        let out = adaptive_weights(yk.view(), eig.view(), 64, DEFAULT_MAX_ITER)
            .expect("fallback weights");
        assert_eq!(
            out.warnings,
            vec![SpectralWarning::TooFewTapersForAdaptive { tapers: k }]
        );
        for (i, row) in out.weights.axis_iter(Axis(0)).enumerate() {
            row.iter()
                .for_each(|d| assert_abs_diff_eq!(*d, eig[i].sqrt(), epsilon = 1e-12));
        }
        out.dof
            .iter()
            .for_each(|v| assert_abs_diff_eq!(*v, 2.0 * k as f64, epsilon = 1e-12));
    }

    #[test]
    fn iteration_cap_is_reported() {
        let (yk, eig) = white_noise_spectra(256, 4.0, 7);
        let out = adaptive_weights(yk.view(), eig.view(), 256, 1).expect("adaptive weights");
        assert!(!out.converged);
        assert_eq!(out.iterations, 1);
        assert_eq!(
            out.warnings,
            vec![SpectralWarning::AdaptiveNotConverged { iterations: 1 }]
        );
    }

    #[test]
    fn rejects_inconsistent_inputs() {
        let yk = Array2::<Complex<f64>>::zeros((4, 33));
        let err = adaptive_weights(yk.view(), Array1::ones(3).view(), 64, 10)
            .expect_err("eigenvalue count mismatch");
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert!(adaptive_weights(yk.view(), Array1::ones(4).view(), 100, 10).is_err());
        assert!(adaptive_weights(yk.view(), Array1::ones(4).view(), 64, 0).is_err());
    }
}
