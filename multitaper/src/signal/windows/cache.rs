//! Process-wide memo of designed taper sets.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::interpolate::InterpKind;
use crate::kernel::ExecInvariantViolation;
use crate::signal::traits::DpssGenerate;

use super::dpss::TaperSet;
use super::kernels::DpssKernel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TaperKey {
    n: usize,
    nw_bits: u64,
    kmax: usize,
    interp_from: Option<usize>,
    interp_kind: InterpKind,
}

impl From<&DpssKernel> for TaperKey {
    fn from(kernel: &DpssKernel) -> Self {
        Self {
            n: kernel.n(),
            nw_bits: kernel.nw().to_bits(),
            kmax: kernel.kmax(),
            interp_from: kernel.interp_from(),
            interp_kind: kernel.interp_kind(),
        }
    }
}

type TaperMap = HashMap<TaperKey, Arc<TaperSet>>;

fn cache() -> &'static RwLock<TaperMap> {
    static CACHE: OnceLock<RwLock<TaperMap>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Design through `kernel`, reusing an earlier result for the same parameters.
pub(crate) fn cached(kernel: &DpssKernel) -> Result<Arc<TaperSet>, ExecInvariantViolation> {
    let key = TaperKey::from(kernel);
    let hit = cache()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
        .cloned();
    if let Some(set) = hit {
        tracing::debug!(n = key.n, kmax = key.kmax, "dpss taper cache hit");
        return Ok(set);
    }

    // Design outside the lock; concurrent misses race and the first insert wins.
    let designed = Arc::new(kernel.run_alloc()?);
    let mut map = cache().write().unwrap_or_else(PoisonError::into_inner);
    Ok(map.entry(key).or_insert(designed).clone())
}

/// Drop every cached taper set.
pub(crate) fn clear() {
    cache()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}
