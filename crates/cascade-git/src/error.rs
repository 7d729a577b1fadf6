//! Error types for cascade-git.

use std::path::PathBuf;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a working copy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither opening nor cloning the repository worked.
    #[error("failed to open or clone repository at {path}: {source}")]
    RepoInit {
        /// Local path of the working copy.
        path: PathBuf,
        /// Underlying git2 error from the clone attempt.
        source: git2::Error,
    },

    /// Fetching from origin failed.
    #[error("fetch from origin failed: {0}")]
    Fetch(#[source] git2::Error),

    /// Creating a local branch failed.
    #[error("failed to create local branch '{branch}': {source}")]
    BranchCreate {
        /// Branch that could not be created.
        branch: String,
        source: git2::Error,
    },

    /// Checking out a branch failed.
    #[error("failed to checkout '{branch}': {source}")]
    Checkout {
        /// Branch that could not be checked out.
        branch: String,
        source: git2::Error,
    },

    /// Hard reset to the remote tip failed.
    #[error("failed to reset '{branch}' to its remote tip: {source}")]
    Reset {
        /// Branch that could not be reset.
        branch: String,
        source: git2::Error,
    },

    /// Pushing a branch to origin failed.
    #[error("failed to push '{branch}' to origin: {source}")]
    Push {
        /// Branch that could not be pushed.
        branch: String,
        source: git2::Error,
    },

    /// The three-way merge produced conflicts that need a human.
    #[error("merging {source_branch} into {target_branch} resulted in conflicts")]
    MergeConflict {
        /// Branch being merged.
        source_branch: String,
        /// Branch merged into.
        target_branch: String,
    },

    /// Merge analysis did not report a normal merge (fast-forward or unborn).
    #[error("merge analysis returned as not normal merge")]
    NonNormalMerge,

    /// Underlying git2 error.
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}
