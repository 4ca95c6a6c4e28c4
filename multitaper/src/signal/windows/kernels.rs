//! Trait-first DPSS generation kernel.

use crate::interpolate::InterpKind;
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Write1D};
use crate::signal::traits::DpssGenerate;
use ndarray::ArrayViewMut2;

use super::dpss::{dpss_exact, dpss_interpolated, validate_design, TaperSet};

/// Constructor config for [`DpssKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpssConfig {
    /// Sequence length `N`.
    pub n: usize,
    /// Time-half-bandwidth product `NW`.
    pub nw: f64,
    /// Number of tapers `K`.
    pub kmax: usize,
    /// Design exactly at this length and interpolate up to `n`.
    pub interp_from: Option<usize>,
    /// Interpolation method used with `interp_from`.
    pub interp_kind: InterpKind,
}

impl DpssConfig {
    /// Exact design of `kmax` tapers of length `n`.
    pub fn new(n: usize, nw: f64, kmax: usize) -> Self {
        Self {
            n,
            nw,
            kmax,
            interp_from: None,
            interp_kind: InterpKind::default(),
        }
    }

    /// Design at `reference_len` and interpolate up to `n`.
    pub fn interpolated_from(mut self, reference_len: usize) -> Self {
        self.interp_from = Some(reference_len);
        self
    }

    /// Select the interpolation method.
    pub fn with_interp_kind(mut self, kind: InterpKind) -> Self {
        self.interp_kind = kind;
        self
    }
}

/// Trait-first DPSS taper kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpssKernel {
    n: usize,
    nw: f64,
    kmax: usize,
    interp_from: Option<usize>,
    interp_kind: InterpKind,
}

impl DpssKernel {
    /// Sequence length `N`.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Time-half-bandwidth product.
    pub fn nw(&self) -> f64 {
        self.nw
    }

    /// Number of tapers produced.
    pub fn kmax(&self) -> usize {
        self.kmax
    }

    /// Reference length when tapers are interpolated.
    pub fn interp_from(&self) -> Option<usize> {
        self.interp_from
    }

    /// Interpolation method.
    pub fn interp_kind(&self) -> InterpKind {
        self.interp_kind
    }
}

impl KernelLifecycle for DpssKernel {
    type Config = DpssConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        validate_design(config.n, config.nw, config.kmax)?;
        if let Some(m) = config.interp_from {
            if m > config.n {
                return Err(ConfigError::InvalidArgument {
                    arg: "interp_from",
                    reason: "interpolation reference length must be <= n",
                });
            }
            if m < config.kmax {
                return Err(ConfigError::InvalidArgument {
                    arg: "interp_from",
                    reason: "interpolation reference length must be >= kmax",
                });
            }
            if config.nw >= m as f64 / 2.0 {
                return Err(ConfigError::InvalidArgument {
                    arg: "interp_from",
                    reason: "nw must be < interp_from / 2",
                });
            }
        }

        Ok(Self {
            n: config.n,
            nw: config.nw,
            kmax: config.kmax,
            interp_from: config.interp_from,
            interp_kind: config.interp_kind,
        })
    }
}

impl DpssGenerate for DpssKernel {
    fn run_into<O>(
        &self,
        mut tapers: ArrayViewMut2<'_, f64>,
        eigenvalues: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        O: Write1D<f64> + ?Sized,
    {
        if tapers.dim() != (self.kmax, self.n) {
            return Err(ExecInvariantViolation::ShapeMismatch {
                arg: "tapers",
                expected: (self.kmax, self.n),
                got: tapers.dim(),
            });
        }
        let eig_out = eigenvalues
            .write_slice_mut()
            .map_err(ExecInvariantViolation::from)?;
        if eig_out.len() != self.kmax {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "eigenvalues",
                expected: self.kmax,
                got: eig_out.len(),
            });
        }

        let generated = self.run_alloc()?;
        tapers.assign(&generated.tapers());
        for (dst, src) in eig_out.iter_mut().zip(generated.eigenvalues().iter()) {
            *dst = *src;
        }
        Ok(())
    }

    fn run_alloc(&self) -> Result<TaperSet, ExecInvariantViolation> {
        tracing::debug!(
            n = self.n,
            nw = self.nw,
            kmax = self.kmax,
            interp_from = ?self.interp_from,
            "designing dpss tapers"
        );
        match self.interp_from {
            Some(m) if m < self.n => {
                dpss_interpolated(self.n, self.nw, self.kmax, m, self.interp_kind)
            }
            _ => dpss_exact(self.n, self.nw, self.kmax),
        }
    }
}
