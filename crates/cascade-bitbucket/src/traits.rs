//! Trait abstraction for Bitbucket API operations.
//!
//! This module defines the `BitbucketApi` trait which abstracts the
//! REST calls the worker makes, enabling dependency injection and
//! testability.

use cascade_core::CascadeOptions;

use crate::Result;
use crate::types::CreatePullRequest;

/// Trait for the Bitbucket API operations the bot needs.
///
/// All methods take `owner` and `repo` as parameters so one client can
/// serve events from any repository the credentials can reach.
pub trait BitbucketApi: Send + Sync {
    /// Resolve the clone URL, preferring the listed protocols in order.
    fn get_clone_url(
        &self,
        owner: &str,
        repo: &str,
        protocols: &[&str],
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Read the branching model and derive cascade options from it.
    fn get_cascade_options(
        &self,
        owner: &str,
        repo: &str,
    ) -> impl std::future::Future<Output = Result<CascadeOptions>> + Send;

    /// File a pull request, returning its id.
    fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pull_request: CreatePullRequest,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;
}
