//! Public facade crate for `seolab`.
//!
//! Re-exports the data model and traits from `seolab-core` at the root, and the
//! reqwest/filesystem implementations from `seolab-local` under [`local`].

pub use seolab_core::*;
pub use seolab_local as local;
