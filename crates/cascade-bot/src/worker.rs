//! Serial worker draining the event queue.
//!
//! Exactly one worker task consumes events, so all git operations on
//! the per-repository working copies are naturally serialized.

use anyhow::Context;
use secrecy::ExposeSecret;
use tokio::sync::mpsc;

use cascade_bitbucket::{BitbucketApi, CreatePullRequest, PullRequestEvent};
use cascade_core::{CascadeMergeState, cascade_merge};
use cascade_git::{Credentials, WorkingCopy};

use crate::settings::Settings;

/// Title and description of the pull request opened when a cascade
/// step needs a human.
const FALLBACK_TITLE: &str = "Automatic merge failure";
const FALLBACK_DESCRIPTION: &str =
    "There was a merge conflict automatically merging this branch";

/// Consume events until the queue closes. Failures are logged and the
/// worker moves on; no event is retried.
pub async fn run(
    mut events: mpsc::Receiver<PullRequestEvent>,
    api: impl BitbucketApi,
    settings: Settings,
) {
    while let Some(event) = events.recv().await {
        let repository = event.repository.name.clone();
        if let Err(error) = process(&event, &api, &settings).await {
            tracing::warn!(repository, error = ?error, "event dropped");
        }
    }
    tracing::info!("event queue closed, worker stopping");
}

/// Handle one merged-pull-request event end to end.
pub async fn process(
    event: &PullRequestEvent,
    api: &impl BitbucketApi,
    settings: &Settings,
) -> anyhow::Result<()> {
    let pull_request = event
        .pull_request
        .as_ref()
        .context("event carries no pull request")?;
    let repository = &event.repository;
    let owner = repository
        .owner
        .id()
        .context("webhook owner has neither uuid nor username")?;

    let options = api
        .get_cascade_options(owner, &repository.name)
        .await
        .context("cannot detect cascade options, check the branching model")?;

    // filter before any git work so unrelated merges cost nothing
    let destination = &pull_request.destination.branch.name;
    if *destination != options.development_name
        && !destination.starts_with(&options.release_prefix)
    {
        tracing::debug!(
            branch = %destination,
            "destination is not part of the cascade, ignoring"
        );
        return Ok(());
    }

    // the webhook does not carry the clone url
    let url = api
        .get_clone_url(owner, &repository.name, &["https"])
        .await
        .context("cannot read clone url")?;

    let path = settings.scratch_dir().join(&repository.uuid);
    let credentials = Credentials::new(&settings.username, settings.password.expose_secret());
    let seed = destination.clone();

    tracing::info!(repository = %repository.name, %seed, "starting cascade");

    let outcome: Result<(), CascadeMergeState> = tokio::task::spawn_blocking(move || {
        let copy = WorkingCopy::open_or_clone(&path, &url, credentials)
            .map_err(|error| CascadeMergeState {
                source: None,
                target: None,
                error,
            })?;
        cascade_merge(&copy, &seed, &options)
    })
    .await
    .context("cascade task panicked")?;

    if let Err(state) = outcome {
        if let (Some(source), Some(target)) = (state.source.clone(), state.target.clone()) {
            tracing::warn!(source, target, error = %state.error, "cascade halted");
            let id = api
                .create_pull_request(
                    owner,
                    &repository.name,
                    CreatePullRequest {
                        title: FALLBACK_TITLE.into(),
                        description: FALLBACK_DESCRIPTION.into(),
                        source: source.clone(),
                        destination: target.clone(),
                    },
                )
                .await
                .with_context(|| {
                    format!("could not create a pull request {source} to {target}")
                })?;
            tracing::info!(id, "fallback pull request created");
        } else {
            return Err(anyhow::Error::new(state).context("cascade never started"));
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;
    use std::sync::Mutex;

    use cascade_bitbucket::{Error as ApiError, Result as ApiResult};
    use cascade_core::CascadeOptions;
    use git2::Signature;
    use secrecy::SecretString;
    use tempfile::TempDir;

    use super::*;

    /// Mock API recording calls; the clone url points at a local bare
    /// repository when one is configured.
    struct MockBitbucket {
        options: Option<CascadeOptions>,
        clone_url: String,
        calls: Mutex<Vec<String>>,
    }

    impl MockBitbucket {
        fn new(options: Option<CascadeOptions>, clone_url: &str) -> Self {
            Self {
                options,
                clone_url: clone_url.to_string(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    impl BitbucketApi for MockBitbucket {
        async fn get_clone_url(
            &self,
            _owner: &str,
            _repo: &str,
            _protocols: &[&str],
        ) -> ApiResult<String> {
            self.record("get_clone_url");
            Ok(self.clone_url.clone())
        }

        async fn get_cascade_options(
            &self,
            _owner: &str,
            repo: &str,
        ) -> ApiResult<CascadeOptions> {
            self.record("get_cascade_options");
            self.options
                .clone()
                .ok_or_else(|| ApiError::ConfigurationMissing(repo.to_string()))
        }

        async fn create_pull_request(
            &self,
            _owner: &str,
            _repo: &str,
            pull_request: CreatePullRequest,
        ) -> ApiResult<u64> {
            self.record(format!(
                "create_pull_request {} -> {}",
                pull_request.source, pull_request.destination
            ));
            Ok(1)
        }
    }

    fn settings(scratch: &TempDir) -> Settings {
        Settings {
            port: 5000,
            token: None,
            username: "bot".into(),
            password: SecretString::from("secret"),
            scratch_dir: Some(scratch.path().to_path_buf()),
            queue_capacity: 100,
        }
    }

    fn event(destination: &str) -> PullRequestEvent {
        serde_json::from_value(serde_json::json!({
            "repository": {
                "uuid": "{752f7b37-d0d5-4dc2-a3ff-667d6e0f390e}",
                "name": "infra",
                "full_name": "acme/infra",
                "owner": { "uuid": "{1d53e3c7-8e03-4a2a-a3f5-4a0b4bdfa41c}" }
            },
            "pullrequest": {
                "id": 42,
                "title": "Fix",
                "state": "MERGED",
                "source": { "branch": { "name": "bugfix/x" } },
                "destination": { "branch": { "name": destination } }
            }
        }))
        .unwrap()
    }

    /// Bare repository with `master`, `release/48`, `release/49` and
    /// `develop`, each adding one file on top of the previous.
    fn seeded_remote() -> (TempDir, String) {
        let temp = TempDir::new().unwrap();
        let bare = temp.path().join("repo.git");
        git2::Repository::init_bare(&bare).unwrap();

        let copy = WorkingCopy::open_or_clone(
            &temp.path().join("setup"),
            bare.to_str().unwrap(),
            Credentials::new("bot", "secret"),
        )
        .unwrap();

        let signature = Signature::now("Jon Snow", "jon.snow@winterfell.net").unwrap();
        let workdir = copy.workdir().unwrap().to_path_buf();

        fs::write(workdir.join("README.md"), "# infra\n").unwrap();
        copy.commit("initial commit", &signature, &["README.md"])
            .unwrap();
        copy.push("master").unwrap();

        for (branch, filename) in [
            ("release/48", "foo"),
            ("release/49", "bar"),
            ("develop", "baz"),
        ] {
            copy.checkout(branch).unwrap();
            fs::write(workdir.join(filename), format!("{filename}\n")).unwrap();
            copy.commit(&format!("add {filename}"), &signature, &[filename])
                .unwrap();
            copy.push(branch).unwrap();
        }

        let url = bare.to_str().unwrap().to_string();
        (temp, url)
    }

    #[tokio::test]
    async fn destination_outside_the_cascade_is_ignored() {
        let scratch = TempDir::new().unwrap();
        let api = MockBitbucket::new(Some(CascadeOptions::default()), "unused");

        process(&event("feature/oops"), &api, &settings(&scratch)).await.unwrap();

        // the branching model was consulted, but no git work happened
        assert_eq!(api.calls(), ["get_cascade_options"]);
        assert!(
            fs::read_dir(scratch.path()).unwrap().next().is_none(),
            "no working copy should have been created"
        );
    }

    #[tokio::test]
    async fn missing_branching_model_drops_the_event() {
        let scratch = TempDir::new().unwrap();
        let api = MockBitbucket::new(None, "unused");

        let result = process(&event("release/48"), &api, &settings(&scratch)).await;

        assert!(result.is_err());
        assert_eq!(api.calls(), ["get_cascade_options"]);
    }

    #[tokio::test]
    async fn owner_without_identity_drops_the_event() {
        let scratch = TempDir::new().unwrap();
        let api = MockBitbucket::new(Some(CascadeOptions::default()), "unused");

        let mut event = event("release/48");
        event.repository.owner.uuid = None;
        event.repository.owner.username = None;

        let result = process(&event, &api, &settings(&scratch)).await;
        assert!(result.is_err());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn clean_cascade_files_no_pull_request() {
        let (_remote, url) = seeded_remote();
        let scratch = TempDir::new().unwrap();
        let api = MockBitbucket::new(Some(CascadeOptions::default()), &url);

        process(&event("release/48"), &api, &settings(&scratch)).await.unwrap();

        assert_eq!(api.calls(), ["get_cascade_options", "get_clone_url"]);

        // the working copy lives under the repository uuid
        assert!(
            scratch
                .path()
                .join("{752f7b37-d0d5-4dc2-a3ff-667d6e0f390e}")
                .join(".git")
                .exists()
        );
    }

    #[tokio::test]
    async fn conflicting_cascade_files_a_fallback_pull_request() {
        let (remote, url) = seeded_remote();
        let scratch = TempDir::new().unwrap();
        let api = MockBitbucket::new(Some(CascadeOptions::default()), &url);

        // diverge develop and release/48 on the same file
        let editor = WorkingCopy::open_or_clone(
            &remote.path().join("editor"),
            &url,
            Credentials::new("bot", "secret"),
        )
        .unwrap();
        let signature = Signature::now("Jon Snow", "jon.snow@winterfell.net").unwrap();
        let workdir = editor.workdir().unwrap().to_path_buf();
        for (branch, content) in [("release/48", "edit-48"), ("develop", "edit-develop")] {
            editor.checkout(branch).unwrap();
            editor.reset(branch).unwrap();
            fs::write(workdir.join("foo"), content).unwrap();
            editor.commit("edit foo", &signature, &["foo"]).unwrap();
            editor.push(branch).unwrap();
        }

        process(&event("release/48"), &api, &settings(&scratch)).await.unwrap();

        assert_eq!(
            api.calls(),
            [
                "get_cascade_options",
                "get_clone_url",
                "create_pull_request release/49 -> develop"
            ]
        );
    }
}
