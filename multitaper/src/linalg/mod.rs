//! Linear algebra used by the taper generator.

mod tridiagonal;

pub use tridiagonal::*;
