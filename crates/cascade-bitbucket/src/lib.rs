//! # cascade-bitbucket
//!
//! Bitbucket Cloud integration for the cascade merge bot: webhook
//! payload models, clone-link and branching-model discovery, and
//! fallback pull-request creation.

mod client;
mod error;
mod traits;
mod types;

pub use client::BitbucketClient;
pub use error::{Error, Result};
pub use traits::BitbucketApi;
pub use types::{
    Branch, Commit, CreatePullRequest, Owner, PullRequest, PullRequestEvent, PullRequestRef,
    PullRequestState, Repository, User,
};
