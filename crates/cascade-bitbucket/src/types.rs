//! Bitbucket webhook payload types.
//!
//! These model the pull-request event the webhook endpoint receives.
//! Only repository identity, destination branch, and state drive the
//! bot; the remaining fields are carried for logging.

use serde::Deserialize;

/// A `pullrequest:*` webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    /// Repository the pull request belongs to.
    pub repository: Repository,

    /// User that triggered the event.
    pub actor: Option<User>,

    /// The pull request itself. Absent when the payload is not a
    /// pull-request event at all.
    #[serde(rename = "pullrequest")]
    pub pull_request: Option<PullRequest>,
}

/// Repository identity as carried in webhook payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// Repository UUID, braces included (e.g. `{752f7b37-...}`).
    pub uuid: String,

    /// Repository slug.
    pub name: String,

    /// `workspace/slug` form.
    pub full_name: Option<String>,

    /// Owning workspace or user.
    pub owner: Owner,
}

/// Repository owner.
///
/// Bitbucket has sent two shapes over time: team payloads carry a
/// `username`, newer workspace payloads a `uuid`. Both are kept and
/// [`Owner::id`] picks whichever is present.
#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    /// Owner UUID, braces included.
    pub uuid: Option<String>,

    /// Legacy owner username.
    pub username: Option<String>,

    /// Human-readable name.
    pub display_name: Option<String>,
}

impl Owner {
    /// The identifier to address the owner with in API paths, preferring
    /// the UUID over the legacy username.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.uuid.as_deref().or(self.username.as_deref())
    }
}

/// The pull request carried by the event.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    /// Pull request id.
    pub id: u64,

    /// Title.
    pub title: Option<String>,

    /// Description.
    pub description: Option<String>,

    /// Lifecycle state.
    pub state: PullRequestState,

    /// Author of the pull request.
    pub author: Option<User>,

    /// Source ref.
    pub source: PullRequestRef,

    /// Destination ref. Its branch name seeds the cascade.
    pub destination: PullRequestRef,
}

/// State of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestState {
    /// Open and under review.
    Open,
    /// Merged into its destination.
    Merged,
    /// Declined without merging.
    Declined,
    /// Superseded by another pull request.
    Superseded,
}

/// One end of a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestRef {
    /// Branch of this end.
    pub branch: Branch,

    /// Tip commit of this end.
    pub commit: Option<Commit>,
}

/// A branch reference.
#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    /// Branch name.
    pub name: String,
}

/// A commit reference.
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    /// Abbreviated or full hash.
    pub hash: String,
}

/// A Bitbucket user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// User UUID.
    pub uuid: Option<String>,

    /// Display name.
    pub display_name: Option<String>,
}

/// Request to create a pull request.
#[derive(Debug, Clone)]
pub struct CreatePullRequest {
    /// PR title.
    pub title: String,

    /// PR description.
    pub description: String,

    /// Source branch name.
    pub source: String,

    /// Destination branch name.
    pub destination: String,
}
