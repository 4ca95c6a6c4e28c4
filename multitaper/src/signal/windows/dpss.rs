//! Discrete prolate spheroidal sequences.

use crate::interpolate::{resample_uniform, InterpKind};
use crate::kernel::{ConfigError, ExecInvariantViolation};
use crate::linalg::SymTridiagonal;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use num_traits::Zero;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Relative tolerance on the change of `|x|` between inverse-iteration steps.
const INVERSE_ITERATION_RTOL: f64 = 1e-8;
/// Upper bound on inverse-iteration solves per taper.
const INVERSE_ITERATION_MAX: usize = 64;

/// A set of `K` orthonormal tapers of length `N` and their concentration
/// ratios.
///
/// Row `k` of [`TaperSet::tapers`] is the `k`-th taper. Even rows are
/// symmetric with a positive sum, odd rows are antisymmetric and start out
/// positive.
#[derive(Debug, Clone, PartialEq)]
pub struct TaperSet {
    tapers: Array2<f64>,
    eigenvalues: Array1<f64>,
}

impl TaperSet {
    /// Wrap externally computed tapers.
    pub fn new(tapers: Array2<f64>, eigenvalues: Array1<f64>) -> Result<Self, ConfigError> {
        if tapers.nrows() == 0 || tapers.ncols() == 0 {
            return Err(ConfigError::EmptyInput { arg: "tapers" });
        }
        if eigenvalues.len() != tapers.nrows() {
            return Err(ConfigError::InvalidArgument {
                arg: "eigenvalues",
                reason: "need exactly one concentration ratio per taper",
            });
        }
        Ok(Self {
            tapers,
            eigenvalues,
        })
    }

    /// Tapers as a `(K, N)` view.
    pub fn tapers(&self) -> ArrayView2<'_, f64> {
        self.tapers.view()
    }

    /// Concentration ratios, one per taper, in descending order.
    pub fn eigenvalues(&self) -> ArrayView1<'_, f64> {
        self.eigenvalues.view()
    }

    /// Number of tapers `K`.
    pub fn len(&self) -> usize {
        self.tapers.nrows()
    }

    /// Always false for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.tapers.nrows() == 0
    }

    /// Taper length `N`.
    pub fn window_len(&self) -> usize {
        self.tapers.ncols()
    }

    /// Keep only tapers whose concentration ratio exceeds `threshold`.
    ///
    /// Returns `None` when no taper qualifies.
    pub fn select_concentrated(&self, threshold: f64) -> Option<TaperSet> {
        let keep = self
            .eigenvalues
            .iter()
            .enumerate()
            .filter(|(_, l)| **l > threshold)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        if keep.is_empty() {
            return None;
        }
        Some(Self {
            tapers: self.tapers.select(Axis(0), &keep),
            eigenvalues: self.eigenvalues.select(Axis(0), &keep),
        })
    }

    /// Consume into `(tapers, eigenvalues)`.
    pub fn into_parts(self) -> (Array2<f64>, Array1<f64>) {
        (self.tapers, self.eigenvalues)
    }
}

/// Check a `(n, nw, kmax)` triple, returning the first violated constraint.
pub(crate) fn validate_design(n: usize, nw: f64, kmax: usize) -> Result<(), ConfigError> {
    if n == 0 {
        return Err(ConfigError::InvalidArgument {
            arg: "n",
            reason: "sequence length must be >= 1",
        });
    }
    if !nw.is_finite() || nw <= 0.0 {
        return Err(ConfigError::InvalidArgument {
            arg: "nw",
            reason: "nw must be finite and > 0",
        });
    }
    if nw >= n as f64 / 2.0 {
        return Err(ConfigError::InvalidArgument {
            arg: "nw",
            reason: "nw must be < n / 2",
        });
    }
    if kmax == 0 {
        return Err(ConfigError::InvalidArgument {
            arg: "kmax",
            reason: "at least one taper must be requested",
        });
    }
    if kmax > n {
        return Err(ConfigError::InvalidArgument {
            arg: "kmax",
            reason: "cannot request more tapers than samples",
        });
    }
    Ok(())
}

/// Time-and-band-limiting operator for length `n` and half bandwidth
/// `w = nw / n`.
pub(crate) fn prolate_operator(n: usize, w: f64) -> Result<SymTridiagonal, ConfigError> {
    let c = (2.0 * core::f64::consts::PI * w).cos();
    let nf = n as f64;
    let diagonal = (0..n)
        .map(|i| {
            let h = (nf - 1.0 - 2.0 * i as f64) / 2.0;
            h * h * c
        })
        .collect();
    let off_diagonal = (1..n)
        .map(|i| i as f64 * (nf - i as f64) / 2.0)
        .collect();
    SymTridiagonal::new(diagonal, off_diagonal)
}

fn inverse_iteration_seed(k: usize, n: usize) -> Vec<f64> {
    let step = if n > 1 {
        core::f64::consts::PI / (n - 1) as f64
    } else {
        0.0
    };
    let seed = (0..n)
        .map(|i| ((k + 1) as f64 * i as f64 * step).sin())
        .collect::<Vec<_>>();
    if seed.iter().map(|v| v * v).sum::<f64>() > 1e-16 {
        seed
    } else {
        (0..n).map(|i| 1.0 + i as f64).collect()
    }
}

/// Flip tapers into the canonical sign convention.
fn fix_signs(tapers: &mut Array2<f64>) {
    let n = tapers.ncols();
    for (k, mut row) in tapers.axis_iter_mut(Axis(0)).enumerate() {
        let flip = if k % 2 == 0 {
            row.sum() < 0.0
        } else {
            // Sign of the ramp up to the largest excursion in the first half.
            let half = row.slice(s![..n / 2]);
            match half
                .iter()
                .enumerate()
                .max_by(|a, b| {
                    a.1.abs()
                        .partial_cmp(&b.1.abs())
                        .unwrap_or(core::cmp::Ordering::Equal)
                })
                .map(|(p, _)| p)
            {
                Some(p) => half.slice(s![..=p]).sum() < 0.0,
                None => false,
            }
        };
        if flip {
            row.mapv_inplace(|v| -v);
        }
    }
}

/// Fraction of each taper's energy inside `[-w, w]`.
///
/// Uses `lambda = sum_l r_xx[l] r[l]` with the raw taper autocorrelation
/// `r_xx` and the band-limiting kernel `r[0] = 2w`, `r[l] = 2 sin(2 pi w l) / (pi l)`.
pub(crate) fn concentration_ratios(tapers: ArrayView2<'_, f64>, w: f64) -> Array1<f64> {
    let n = tapers.ncols();
    let nfft = (2 * n).saturating_sub(1).max(1).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nfft);
    let ifft = planner.plan_fft_inverse(nfft);

    let kernel = (0..n)
        .map(|l| {
            if l == 0 {
                2.0 * w
            } else {
                let x = core::f64::consts::PI * l as f64;
                2.0 * (2.0 * w * x).sin() / x
            }
        })
        .collect::<Vec<_>>();

    let mut buf = vec![Complex::<f64>::zero(); nfft];
    tapers
        .axis_iter(Axis(0))
        .map(|row| {
            buf.iter_mut().for_each(|b| *b = Complex::zero());
            for (dst, src) in buf.iter_mut().zip(row.iter()) {
                *dst = Complex::new(*src, 0.0);
            }
            fft.process(&mut buf);
            buf.iter_mut()
                .for_each(|b| *b = Complex::new(b.norm_sqr(), 0.0));
            ifft.process(&mut buf);
            let scale = 1.0 / nfft as f64;
            let ratio = buf
                .iter()
                .take(n)
                .zip(kernel.iter())
                .map(|(rxx, r)| rxx.re * scale * r)
                .sum::<f64>();
            ratio.min(1.0)
        })
        .collect()
}

/// Exact DPSS tapers by bisection and inverse iteration on the tridiagonal
/// operator.
pub(crate) fn dpss_exact(
    n: usize,
    nw: f64,
    kmax: usize,
) -> Result<TaperSet, ExecInvariantViolation> {
    validate_design(n, nw, kmax)?;
    let w = nw / n as f64;
    let operator = prolate_operator(n, w)?;
    let shifts = operator.largest_eigenvalues(kmax);
    if shifts.len() != kmax {
        return Err(ExecInvariantViolation::InvalidState {
            reason: "could not bracket the requested eigenvalues",
        });
    }

    let mut tapers = Array2::<f64>::zeros((kmax, n));
    for (k, (shift, mut row)) in shifts
        .iter()
        .zip(tapers.axis_iter_mut(Axis(0)))
        .enumerate()
    {
        let solved = operator.inverse_iteration(
            *shift,
            inverse_iteration_seed(k, n),
            INVERSE_ITERATION_RTOL,
            INVERSE_ITERATION_MAX,
        );
        if !solved.converged {
            tracing::warn!(
                taper = k,
                iterations = solved.iterations,
                "dpss inverse iteration hit its iteration cap"
            );
        } else {
            tracing::trace!(taper = k, iterations = solved.iterations, "dpss taper converged");
        }
        if solved.vector.iter().any(|v| !v.is_finite()) {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "dpss inverse iteration diverged",
            });
        }
        row.assign(&ArrayView1::from(solved.vector.as_slice()));
    }
    fix_signs(&mut tapers);

    let eigenvalues = concentration_ratios(tapers.view(), w);
    Ok(TaperSet {
        tapers,
        eigenvalues,
    })
}

/// DPSS tapers designed at length `reference_len` and interpolated up to `n`.
pub(crate) fn dpss_interpolated(
    n: usize,
    nw: f64,
    kmax: usize,
    reference_len: usize,
    kind: InterpKind,
) -> Result<TaperSet, ExecInvariantViolation> {
    validate_design(n, nw, kmax)?;
    if reference_len > n {
        return Err(ConfigError::InvalidArgument {
            arg: "interp_from",
            reason: "interpolation reference length must be <= n",
        }
        .into());
    }
    let reference = dpss_exact(reference_len, nw, kmax)?;

    let mut tapers = Array2::<f64>::zeros((kmax, n));
    for (src, mut dst) in reference
        .tapers
        .axis_iter(Axis(0))
        .zip(tapers.axis_iter_mut(Axis(0)))
    {
        let src = src.to_vec();
        let mut stretched = resample_uniform(&src, n, kind)?;
        let energy = stretched.iter().map(|v| v * v).sum::<f64>().sqrt();
        if energy > 0.0 {
            stretched.iter_mut().for_each(|v| *v /= energy);
        }
        dst.assign(&ArrayView1::from(stretched.as_slice()));
    }

    let eigenvalues = concentration_ratios(tapers.view(), nw / n as f64);
    Ok(TaperSet {
        tapers,
        eigenvalues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::SymmetricEigen;

    #[test]
    fn short_windows_are_fully_concentrated() {
        // Percival & Walden (1993) tables: the leading ratios are unity.
        for nw in [6.0, 7.0, 8.0, 8.2] {
            let set = dpss_exact(31, nw, 4).expect("valid design");
            assert_eq!(set.eigenvalues().len(), 4);
            for l in set.eigenvalues() {
                assert_abs_diff_eq!(*l, 1.0, epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn tapers_are_orthonormal() {
        let set = dpss_exact(100, 2.0, 4).expect("valid design");
        let t = set.tapers();
        let gram = t.dot(&t.t());
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(gram[(i, j)], expected, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn parity_and_sign_convention() {
        let n = 64;
        let set = dpss_exact(n, 3.0, 5).expect("valid design");
        for (k, row) in set.tapers().axis_iter(Axis(0)).enumerate() {
            for i in 0..n / 2 {
                let mirrored = if k % 2 == 0 { row[n - 1 - i] } else { -row[n - 1 - i] };
                assert_abs_diff_eq!(row[i], mirrored, epsilon = 1e-9);
            }
            if k % 2 == 0 {
                assert!(row.sum() > 0.0);
            }
        }
        let first_odd = set.tapers().row(1).to_owned();
        assert!(first_odd.slice(s![..n / 4]).sum() > 0.0);
    }

    #[test]
    fn eigenvalues_descend_and_are_bounded() {
        let set = dpss_exact(128, 4.0, 8).expect("valid design");
        let l = set.eigenvalues();
        for pair in l.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        assert!(l.iter().all(|v| *v > 0.0 && *v <= 1.0));
    }

    #[test]
    fn matches_dense_eigendecomposition() {
        let n = 48;
        let nw = 2.5;
        let operator = prolate_operator(n, nw / n as f64).expect("operator");
        let dense = SymmetricEigen::new(operator.to_dense());
        let mut order = (0..n).collect::<Vec<_>>();
        order.sort_by(|a, b| {
            dense.eigenvalues[*b]
                .partial_cmp(&dense.eigenvalues[*a])
                .unwrap_or(core::cmp::Ordering::Equal)
        });

        let set = dpss_exact(n, nw, 4).expect("valid design");
        let tapers = set.tapers();
        for (k, idx) in order.iter().take(4).enumerate() {
            let reference = dense.eigenvectors.column(*idx);
            let row = tapers.row(k);
            let dot = row
                .iter()
                .zip(reference.iter())
                .map(|(a, b)| a * b)
                .sum::<f64>();
            // Eigenvectors are unique up to sign.
            let sign = dot.signum();
            for (a, b) in row.iter().zip(reference.iter()) {
                assert_abs_diff_eq!(*a, sign * *b, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn single_sample_window() {
        let set = dpss_exact(1, 0.25, 1).expect("valid design");
        assert_abs_diff_eq!(set.tapers()[(0, 0)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(set.eigenvalues()[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn invalid_designs_are_rejected() {
        assert!(validate_design(0, 1.0, 1).is_err());
        assert!(validate_design(16, 8.0, 2).is_err());
        assert!(validate_design(16, 0.0, 2).is_err());
        assert!(validate_design(16, 2.0, 17).is_err());
        assert!(validate_design(16, 2.0, 0).is_err());
        assert!(validate_design(16, f64::NAN, 2).is_err());
        assert!(validate_design(16, 2.0, 4).is_ok());
    }

    #[test]
    fn interpolated_tapers_track_exact_ones() {
        let n = 20_000;
        let exact = dpss_exact(n, 4.0, 4).expect("exact design");
        for kind in [InterpKind::Linear, InterpKind::Cubic] {
            let approx = dpss_interpolated(n, 4.0, 4, 4096, kind).expect("interpolated design");
            for (a, b) in approx.tapers().iter().zip(exact.tapers().iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
            }
            for (a, b) in approx.eigenvalues().iter().zip(exact.eigenvalues().iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn interpolation_reference_must_not_exceed_target() {
        let err = dpss_interpolated(256, 2.0, 2, 512, InterpKind::Linear)
            .expect_err("reference longer than target");
        assert!(matches!(err, ExecInvariantViolation::Config(_)));
    }

    #[test]
    fn select_concentrated_drops_leaky_tapers() {
        let set = dpss_exact(64, 2.0, 6).expect("valid design");
        let kept = set.select_concentrated(0.9).expect("some tapers survive");
        assert!(kept.len() < set.len());
        assert!(kept.eigenvalues().iter().all(|l| *l > 0.9));
        assert_eq!(kept.window_len(), 64);
    }
}
