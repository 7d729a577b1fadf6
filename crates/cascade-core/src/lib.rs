//! # cascade-core
//!
//! Core library for the cascade merge bot: the version-ordered branch
//! list and the engine that forwards a merge through it.

mod cascade;
mod engine;

pub use cascade::{Cascade, CascadeOptions, extract_version};
pub use engine::{CascadeMergeState, cascade_merge};
