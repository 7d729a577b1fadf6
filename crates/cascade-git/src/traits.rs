//! Trait abstraction over the working-copy driver.
//!
//! This module defines the `CopyOps` trait which abstracts the git
//! operations a cascade walk performs, enabling dependency injection
//! and testability.

use crate::Result;

/// Trait for the git operations a cascade needs.
///
/// This trait abstracts the working-copy driver, allowing for:
/// - Mock implementations for testing the walk's failure semantics
/// - Alternative implementations (e.g., dry-run mode)
///
/// Note: git2 is a synchronous library, so all operations are
/// synchronous; callers bridge to async with `spawn_blocking`.
#[allow(clippy::missing_errors_doc)]
pub trait CopyOps {
    /// Fetch all refs from origin, pruning deleted remote-tracking refs.
    fn fetch(&self) -> Result<()>;

    /// Delete every local branch except the default one.
    fn remove_local_branches(&self) -> Result<()>;

    /// List remote-tracking branch names, stripped of `origin/`.
    fn remote_branches(&self) -> Result<Vec<String>>;

    /// Ensure a local branch exists and is checked out.
    fn checkout(&self, branch: &str) -> Result<()>;

    /// Hard-reset the working copy to `origin/<branch>`'s tip.
    fn reset(&self, branch: &str) -> Result<()>;

    /// Merge local `source` into the checked-out `target`.
    fn merge_branches(&self, source: &str, target: &str) -> Result<()>;

    /// Push `refs/heads/<branch>` to origin.
    fn push(&self, branch: &str) -> Result<()>;
}

impl CopyOps for crate::WorkingCopy {
    fn fetch(&self) -> Result<()> {
        self.fetch()
    }

    fn remove_local_branches(&self) -> Result<()> {
        self.remove_local_branches()
    }

    fn remote_branches(&self) -> Result<Vec<String>> {
        self.remote_branches()
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.checkout(branch)
    }

    fn reset(&self, branch: &str) -> Result<()> {
        self.reset(branch)
    }

    fn merge_branches(&self, source: &str, target: &str) -> Result<()> {
        self.merge_branches(source, target)
    }

    fn push(&self, branch: &str) -> Result<()> {
        self.push(branch)
    }
}
