//! Resampling of short sequences onto denser uniform grids.
//!
//! Used to stretch tapers designed at a manageable length onto very long
//! analysis windows.

use crate::kernel::ConfigError;
use crate::linalg::SymTridiagonal;
use itertools::Itertools;

/// Interpolation method for [`resample_uniform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpKind {
    /// Piecewise linear between neighbouring samples.
    #[default]
    Linear,
    /// Natural cubic spline (zero curvature at both ends).
    Cubic,
}

/// Resample `y` (length `m`) onto `n` samples covering the same support.
///
/// Both sequences are treated as cell-centred samples of one function on a
/// unit interval: output sample `i` sits at `(i + 0.5) * m / n - 0.5` in the
/// index space of `y`. The grid is symmetric about the midpoint, so even and
/// odd sequences keep their parity. The outermost output samples fall up to
/// half an input sample outside `[0, m - 1]` and are extrapolated from the
/// edge segment.
pub fn resample_uniform(y: &[f64], n: usize, kind: InterpKind) -> Result<Vec<f64>, ConfigError> {
    if y.is_empty() {
        return Err(ConfigError::EmptyInput { arg: "y" });
    }
    if n == 0 {
        return Err(ConfigError::InvalidArgument {
            arg: "n",
            reason: "output length must be > 0",
        });
    }
    let m = y.len();
    if m == 1 {
        return Ok(vec![y[0]; n]);
    }

    let step = m as f64 / n as f64;
    let curvature = match kind {
        InterpKind::Cubic if m >= 3 => Some(natural_second_derivatives(y)?),
        _ => None,
    };

    let out = (0..n)
        .map(|i| {
            let x = (i as f64 + 0.5) * step - 0.5;
            let j = (x.max(0.0).floor() as usize).min(m - 2);
            let t = x - j as f64;
            match &curvature {
                None => y[j] * (1.0 - t) + y[j + 1] * t,
                Some(c) => {
                    let s = 1.0 - t;
                    c[j] * s * s * s / 6.0
                        + c[j + 1] * t * t * t / 6.0
                        + (y[j] - c[j] / 6.0) * s
                        + (y[j + 1] - c[j + 1] / 6.0) * t
                }
            }
        })
        .collect();
    Ok(out)
}

/// Second derivatives of the natural cubic spline through `y` at unit spacing.
fn natural_second_derivatives(y: &[f64]) -> Result<Vec<f64>, ConfigError> {
    let m = y.len();
    let mut rhs = y
        .iter()
        .tuple_windows()
        .map(|(a, b, c)| 6.0 * (a - 2.0 * b + c))
        .collect::<Vec<_>>();
    let system = SymTridiagonal::new(vec![4.0; m - 2], vec![1.0; m - 3])?;
    system.solve_shifted(0.0, &mut rhs);

    let mut c = Vec::with_capacity(m);
    c.push(0.0);
    c.extend(rhs);
    c.push(0.0);
    Ok(c)
}
