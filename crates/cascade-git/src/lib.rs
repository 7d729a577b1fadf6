//! # cascade-git
//!
//! Git working-copy driver for the cascade merge bot, built on git2-rs.
//! Provides open-or-clone, fetch/push with credentials, branch checkout
//! and reset discipline, and conflict-detecting three-way merges.

mod credentials;
mod error;
mod traits;
mod working_copy;

pub use credentials::Credentials;
pub use error::{Error, Result};
pub use git2::Oid;
pub use traits::CopyOps;
pub use working_copy::{DEFAULT_BRANCH, DEFAULT_REMOTE, WorkingCopy};
