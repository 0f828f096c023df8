//! Public facade crate for `astrosniff`.
//!
//! This crate intentionally contains no IO or transport-specific logic.
//! It re-exports the backend-agnostic types, the pattern library, and the
//! streaming scanner from `astrosniff-core`.

pub use astrosniff_core::*;
