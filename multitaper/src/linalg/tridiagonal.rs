use crate::kernel::ConfigError;
use nalgebra::DMatrix;

/// Outcome of [`SymTridiagonal::inverse_iteration`].
#[derive(Debug, Clone, PartialEq)]
pub struct InverseIteration {
    /// Unit-norm eigenvector estimate.
    pub vector: Vec<f64>,
    /// Number of shifted solves performed.
    pub iterations: usize,
    /// Whether the tolerance was reached before the iteration cap.
    pub converged: bool,
}

/// Real symmetric tridiagonal matrix stored as its diagonal and first
/// off-diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct SymTridiagonal {
    diagonal: Vec<f64>,
    off_diagonal: Vec<f64>,
}

impl SymTridiagonal {
    /// Build from a diagonal of length `n` and off-diagonal of length `n - 1`.
    pub fn new(diagonal: Vec<f64>, off_diagonal: Vec<f64>) -> Result<Self, ConfigError> {
        if diagonal.is_empty() {
            return Err(ConfigError::EmptyInput { arg: "diagonal" });
        }
        if off_diagonal.len() + 1 != diagonal.len() {
            return Err(ConfigError::InvalidArgument {
                arg: "off_diagonal",
                reason: "off-diagonal must be one shorter than the diagonal",
            });
        }
        if diagonal
            .iter()
            .chain(off_diagonal.iter())
            .any(|v| !v.is_finite())
        {
            return Err(ConfigError::InvalidArgument {
                arg: "diagonal",
                reason: "matrix entries must be finite",
            });
        }
        Ok(Self {
            diagonal,
            off_diagonal,
        })
    }

    /// Matrix order.
    pub fn len(&self) -> usize {
        self.diagonal.len()
    }

    /// Always false; construction rejects empty matrices.
    pub fn is_empty(&self) -> bool {
        self.diagonal.is_empty()
    }

    /// Main diagonal.
    pub fn diagonal(&self) -> &[f64] {
        &self.diagonal
    }

    /// First super/sub diagonal.
    pub fn off_diagonal(&self) -> &[f64] {
        &self.off_diagonal
    }

    /// Gershgorin interval containing every eigenvalue.
    pub fn gershgorin_bounds(&self) -> (f64, f64) {
        let n = self.len();
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for i in 0..n {
            let left = if i > 0 { self.off_diagonal[i - 1].abs() } else { 0.0 };
            let right = if i + 1 < n { self.off_diagonal[i].abs() } else { 0.0 };
            let radius = left + right;
            lo = lo.min(self.diagonal[i] - radius);
            hi = hi.max(self.diagonal[i] + radius);
        }
        (lo, hi)
    }

    fn pivot_floor(&self) -> f64 {
        let (lo, hi) = self.gershgorin_bounds();
        let scale = lo.abs().max(hi.abs()).max(1.0);
        f64::EPSILON * scale
    }

    /// Number of eigenvalues strictly less than `x` (Sturm sequence count).
    pub fn sturm_count(&self, x: f64) -> usize {
        let floor = self.pivot_floor();
        let mut count = 0;
        let mut q = self.diagonal[0] - x;
        if q.abs() < floor {
            q = -floor;
        }
        if q < 0.0 {
            count += 1;
        }
        for i in 1..self.len() {
            let e = self.off_diagonal[i - 1];
            q = (self.diagonal[i] - x) - e * e / q;
            if q.abs() < floor {
                q = -floor;
            }
            if q < 0.0 {
                count += 1;
            }
        }
        count
    }

    /// Eigenvalue with ascending index `index` (0 is the smallest), located
    /// by bisection.
    pub fn eigenvalue(&self, index: usize) -> Option<f64> {
        if index >= self.len() {
            return None;
        }
        let (mut lo, mut hi) = self.gershgorin_bounds();
        // Widen slightly so the bracket is strict at both ends.
        let pad = f64::EPSILON * lo.abs().max(hi.abs()).max(1.0);
        lo -= pad;
        hi += pad;
        for _ in 0..256 {
            let mid = 0.5 * (lo + hi);
            if mid <= lo || mid >= hi {
                break;
            }
            let tol = 2.0 * f64::EPSILON * lo.abs().max(hi.abs());
            if hi - lo <= tol {
                break;
            }
            if self.sturm_count(mid) > index {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        Some(0.5 * (lo + hi))
    }

    /// The `k` largest eigenvalues in descending order.
    pub fn largest_eigenvalues(&self, k: usize) -> Vec<f64> {
        let n = self.len();
        (0..k.min(n))
            .filter_map(|j| self.eigenvalue(n - 1 - j))
            .collect()
    }

    /// Solve `(T - shift I) x = rhs` in place with the Thomas algorithm.
    ///
    /// Pivots that vanish are replaced by a tiny value of the same sign, so
    /// shifts equal to an eigenvalue still produce a (huge) finite solution,
    /// which is what inverse iteration relies on.
    pub fn solve_shifted(&self, shift: f64, rhs: &mut [f64]) {
        let n = self.len();
        debug_assert_eq!(rhs.len(), n);
        let floor = self.pivot_floor();
        let guard = |m: f64| {
            if m.abs() < floor {
                if m.is_sign_negative() {
                    -floor
                } else {
                    floor
                }
            } else {
                m
            }
        };

        let mut upper = vec![0.0; n];
        let mut pivot = guard(self.diagonal[0] - shift);
        if n > 1 {
            upper[0] = self.off_diagonal[0] / pivot;
        }
        rhs[0] /= pivot;
        for i in 1..n {
            let sub = self.off_diagonal[i - 1];
            pivot = guard((self.diagonal[i] - shift) - sub * upper[i - 1]);
            if i + 1 < n {
                upper[i] = self.off_diagonal[i] / pivot;
            }
            rhs[i] = (rhs[i] - sub * rhs[i - 1]) / pivot;
        }
        for i in (0..n.saturating_sub(1)).rev() {
            rhs[i] -= upper[i] * rhs[i + 1];
        }
    }

    /// Eigenvector for `shift` by inverse iteration, starting from `x0`.
    ///
    /// Iterates until the change in `|x|` drops below `rtol` (in the 2-norm) or
    /// `max_iter` solves have been performed.
    pub fn inverse_iteration(
        &self,
        shift: f64,
        x0: Vec<f64>,
        rtol: f64,
        max_iter: usize,
    ) -> InverseIteration {
        let mut x = x0;
        normalize(&mut x);
        let mut prev = vec![0.0_f64; x.len()];
        let mut iterations = 0;
        let mut converged = false;
        while iterations < max_iter {
            let change = x
                .iter()
                .zip(prev.iter())
                .map(|(a, b)| {
                    let d = a.abs() - b.abs();
                    d * d
                })
                .sum::<f64>()
                .sqrt();
            if change <= rtol {
                converged = true;
                break;
            }
            prev.copy_from_slice(&x);
            self.solve_shifted(shift, &mut x);
            normalize(&mut x);
            iterations += 1;
        }
        InverseIteration {
            vector: x,
            iterations,
            converged,
        }
    }

    /// Dense copy of the matrix.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let n = self.len();
        let mut m = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = self.diagonal[i];
        }
        for (i, e) in self.off_diagonal.iter().enumerate() {
            m[(i, i + 1)] = *e;
            m[(i + 1, i)] = *e;
        }
        m
    }
}

fn normalize(x: &mut [f64]) {
    let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        x.iter_mut().for_each(|v| *v /= norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{DVector, SymmetricEigen};

    fn laplacian(n: usize) -> SymTridiagonal {
        SymTridiagonal::new(vec![2.0; n], vec![-1.0; n - 1]).expect("valid tridiagonal")
    }

    #[test]
    fn rejects_inconsistent_lengths() {
        let err = SymTridiagonal::new(vec![1.0, 2.0], vec![]).expect_err("bad lengths");
        assert!(matches!(err, ConfigError::InvalidArgument { .. }));
        assert!(SymTridiagonal::new(vec![], vec![]).is_err());
    }

    #[test]
    fn bisection_matches_closed_form_laplacian_spectrum() {
        let n = 12;
        let t = laplacian(n);
        for j in 0..n {
            let expected = 2.0
                - 2.0 * (core::f64::consts::PI * (j + 1) as f64 / (n + 1) as f64).cos();
            assert_abs_diff_eq!(t.eigenvalue(j).expect("in range"), expected, epsilon = 1e-12);
        }
        assert!(t.eigenvalue(n).is_none());
    }

    #[test]
    fn bisection_matches_dense_symmetric_eigen() {
        let diag = vec![4.0, -1.0, 3.5, 0.25, 7.0, 2.0];
        let off = vec![1.5, -0.5, 2.0, 0.75, -1.25];
        let t = SymTridiagonal::new(diag, off).expect("valid tridiagonal");
        let mut dense = SymmetricEigen::new(t.to_dense()).eigenvalues.as_slice().to_vec();
        dense.sort_by(|a, b| b.partial_cmp(a).unwrap_or(core::cmp::Ordering::Equal));

        let top = t.largest_eigenvalues(3);
        assert_eq!(top.len(), 3);
        for (a, b) in top.iter().zip(dense.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn shifted_solve_inverts_the_matrix() {
        let t = laplacian(9);
        let x_true = DVector::from_iterator(9, (0..9).map(|i| (i as f64).sin() + 0.5));
        let mut rhs = (t.to_dense() * &x_true).as_slice().to_vec();
        t.solve_shifted(0.0, &mut rhs);
        for (a, b) in rhs.iter().zip(x_true.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn inverse_iteration_recovers_eigenvector() {
        let n = 16;
        let t = laplacian(n);
        let lambda = t.eigenvalue(n - 1).expect("largest");
        let seed = (0..n).map(|i| 1.0 + i as f64 * 0.1).collect();
        let result = t.inverse_iteration(lambda, seed, 1e-10, 50);
        assert!(result.converged);

        let residual = t.to_dense() * DVector::from_vec(result.vector.clone())
            - DVector::from_vec(result.vector.clone()) * lambda;
        assert!(residual.norm() < 1e-8);
        assert_abs_diff_eq!(
            result.vector.iter().map(|v| v * v).sum::<f64>(),
            1.0,
            epsilon = 1e-12
        );
    }
}
