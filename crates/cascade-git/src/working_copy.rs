//! Working-copy driver providing the git operations a cascade needs.

use std::path::Path;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, ErrorCode, FetchOptions, FetchPrune, FileFavor, MergeOptions, ObjectType, Oid,
    PushOptions, ResetType, Signature,
};

use crate::credentials::Credentials;
use crate::error::{Error, Result};

/// Remote every working copy synchronizes with.
pub const DEFAULT_REMOTE: &str = "origin";

/// Local branch that is never cleaned up; deleting it would leave the
/// repository headless.
pub const DEFAULT_BRANCH: &str = "master";

/// A local clone of one remote repository, reused across cascades.
///
/// All operations run against this single working directory; callers are
/// expected to serialize access. Transient libgit2 handles (branches,
/// commits, trees, remotes, the index) are scoped to each method and
/// released on every exit path by `Drop`.
pub struct WorkingCopy {
    inner: git2::Repository,
    credentials: Credentials,
}

impl WorkingCopy {
    /// Open the repository at `path`, or clone `url` into it when no
    /// repository exists there yet.
    ///
    /// # Errors
    /// Returns [`Error::RepoInit`] if neither opening nor cloning works.
    pub fn open_or_clone(path: &Path, url: &str, credentials: Credentials) -> Result<Self> {
        let inner = match git2::Repository::open(path) {
            Ok(repository) => repository,
            Err(_) => {
                tracing::debug!(url, path = %path.display(), "no repository on disk, cloning");
                let mut fetch_options = FetchOptions::new();
                fetch_options.remote_callbacks(credentials.callbacks());

                RepoBuilder::new()
                    .fetch_options(fetch_options)
                    .clone(url, path)
                    .map_err(|source| Error::RepoInit {
                        path: path.to_path_buf(),
                        source,
                    })?
            }
        };

        Ok(Self { inner, credentials })
    }

    /// Get the path to the working directory, if the repository has one.
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.inner.workdir()
    }

    /// Get the name of the currently checked out branch.
    ///
    /// # Errors
    /// Returns error if HEAD cannot be read or is not on a branch.
    pub fn current_branch(&self) -> Result<String> {
        let head = self.inner.head()?;
        head.shorthand()
            .map(String::from)
            .ok_or_else(|| Error::Git(git2::Error::from_str("HEAD is not on a branch")))
    }

    // === Remote synchronization ===

    /// Fetch all refs from origin, pruning remote-tracking refs whose
    /// counterpart was deleted on the server.
    ///
    /// # Errors
    /// Returns [`Error::Fetch`] if the remote cannot be contacted.
    pub fn fetch(&self) -> Result<()> {
        let mut origin = self
            .inner
            .find_remote(DEFAULT_REMOTE)
            .map_err(Error::Fetch)?;

        let mut options = FetchOptions::new();
        options
            .prune(FetchPrune::On)
            .remote_callbacks(self.credentials.callbacks());

        origin
            .fetch(&[] as &[&str], Some(&mut options), None)
            .map_err(Error::Fetch)?;
        Ok(())
    }

    /// Push `refs/heads/<branch>` to origin.
    ///
    /// # Errors
    /// Returns [`Error::Push`] if the push is rejected or the remote is
    /// unreachable.
    pub fn push(&self, branch: &str) -> Result<()> {
        let push_failed = |source| Error::Push {
            branch: branch.to_string(),
            source,
        };

        let mut origin = self.inner.find_remote(DEFAULT_REMOTE).map_err(push_failed)?;

        let mut options = PushOptions::new();
        options.remote_callbacks(self.credentials.callbacks());

        origin
            .push(&[format!("refs/heads/{branch}")], Some(&mut options))
            .map_err(push_failed)?;
        Ok(())
    }

    // === Local branch management ===

    /// List the shorthands of all remote-tracking branches, stripped of
    /// the `origin/` prefix. `origin/HEAD` is skipped.
    ///
    /// # Errors
    /// Returns error if branch enumeration fails.
    pub fn remote_branches(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in self.inner.branches(Some(BranchType::Remote))? {
            let (branch, _) = entry?;
            if let Some(name) = branch
                .name()?
                .and_then(|shorthand| shorthand.strip_prefix("origin/"))
            {
                if name != "HEAD" {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Delete every local branch except `master`, so a cascade always
    /// starts from a known-clean local state.
    ///
    /// # Errors
    /// Returns error if a branch cannot be deleted.
    pub fn remove_local_branches(&self) -> Result<()> {
        // libgit2 refuses to delete the checked-out branch, and the
        // previous cascade leaves HEAD on the integration branch.
        self.inner.set_head(&format!("refs/heads/{DEFAULT_BRANCH}"))?;

        for entry in self.inner.branches(Some(BranchType::Local))? {
            let (mut branch, _) = entry?;
            if matches!(branch.name()?, Some(DEFAULT_BRANCH) | None) {
                continue;
            }
            branch.delete()?;
        }
        Ok(())
    }

    /// Ensure a local branch `branch` exists and is checked out.
    ///
    /// The branch is created at `origin/<branch>`'s tip when a
    /// remote-tracking counterpart exists (and set to track it), at the
    /// current HEAD commit otherwise.
    ///
    /// # Errors
    /// Returns [`Error::BranchCreate`] or [`Error::Checkout`].
    pub fn checkout(&self, branch: &str) -> Result<()> {
        let create_failed = |source| Error::BranchCreate {
            branch: branch.to_string(),
            source,
        };
        let checkout_failed = |source| Error::Checkout {
            branch: branch.to_string(),
            source,
        };

        let remote_name = format!("{DEFAULT_REMOTE}/{branch}");
        let remote_branch = self.inner.find_branch(&remote_name, BranchType::Remote).ok();

        if self.inner.find_branch(branch, BranchType::Local).is_err() {
            let target = match &remote_branch {
                Some(remote) => remote.get().peel_to_commit().map_err(create_failed)?,
                None => self
                    .inner
                    .head()
                    .and_then(|head| head.peel_to_commit())
                    .map_err(create_failed)?,
            };

            let mut local = self
                .inner
                .branch(branch, &target, false)
                .map_err(create_failed)?;

            if remote_branch.is_some() {
                local.set_upstream(Some(&remote_name)).map_err(create_failed)?;
            }
        }

        let local = self
            .inner
            .find_branch(branch, BranchType::Local)
            .map_err(checkout_failed)?;
        let tree = local
            .get()
            .peel(ObjectType::Tree)
            .map_err(checkout_failed)?;

        let mut options = CheckoutBuilder::new();
        options
            .safe()
            .recreate_missing(true)
            .allow_conflicts(true)
            .use_theirs(true);

        self.inner
            .checkout_tree(&tree, Some(&mut options))
            .map_err(checkout_failed)?;
        self.inner
            .set_head(&format!("refs/heads/{branch}"))
            .map_err(checkout_failed)?;
        Ok(())
    }

    /// Hard-reset the working copy to `origin/<branch>`'s tip, so the
    /// local branch reflects the remote exactly before a merge.
    ///
    /// # Errors
    /// Returns [`Error::Reset`] if the remote-tracking branch is missing
    /// or the reset fails.
    pub fn reset(&self, branch: &str) -> Result<()> {
        let reset_failed = |source| Error::Reset {
            branch: branch.to_string(),
            source,
        };

        let remote = self
            .inner
            .find_branch(&format!("{DEFAULT_REMOTE}/{branch}"), BranchType::Remote)
            .map_err(reset_failed)?;
        let commit = remote.get().peel_to_commit().map_err(reset_failed)?;

        self.inner
            .reset(commit.as_object(), ResetType::Hard, None)
            .map_err(reset_failed)?;
        Ok(())
    }

    // === Merging ===

    /// Merge local branch `source` into `target`, which must already be
    /// checked out.
    ///
    /// Up-to-date branches are a no-op. A normal merge writes a merge
    /// commit `Automatic merge <source> into <target>` authored with the
    /// source tip's author, preserving attribution of the original
    /// change.
    ///
    /// # Errors
    /// Returns [`Error::MergeConflict`] when the index ends up
    /// conflicted (merge state is cleaned up first), and
    /// [`Error::NonNormalMerge`] when analysis reports anything other
    /// than a normal merge.
    pub fn merge_branches(&self, source: &str, target: &str) -> Result<()> {
        let source_branch = self.inner.find_branch(source, BranchType::Local)?;
        let annotated = self
            .inner
            .reference_to_annotated_commit(source_branch.get())?;

        let (analysis, _) = self.inner.merge_analysis(&[&annotated])?;
        if analysis.is_none() || analysis.is_up_to_date() {
            return Ok(());
        }
        if !analysis.is_normal() {
            return Err(Error::NonNormalMerge);
        }

        let mut merge_options = MergeOptions::new();
        merge_options
            .file_favor(FileFavor::Normal)
            .fail_on_conflict(true);

        let mut checkout_options = CheckoutBuilder::new();
        checkout_options
            .safe()
            .recreate_missing(true)
            .use_theirs(true);

        if let Err(source_error) = self.inner.merge(
            &[&annotated],
            Some(&mut merge_options),
            Some(&mut checkout_options),
        ) {
            self.inner.cleanup_state()?;
            if matches!(
                source_error.code(),
                ErrorCode::Conflict | ErrorCode::MergeConflict
            ) {
                return Err(Error::MergeConflict {
                    source_branch: source.to_string(),
                    target_branch: target.to_string(),
                });
            }
            return Err(Error::Git(source_error));
        }

        let mut index = self.inner.index()?;
        if index.has_conflicts() {
            self.inner.cleanup_state()?;
            return Err(Error::MergeConflict {
                source_branch: source.to_string(),
                target_branch: target.to_string(),
            });
        }

        let source_commit = source_branch.get().peel_to_commit()?;
        let author = source_commit.author();

        let tree_id = index.write_tree()?;
        let tree = self.inner.find_tree(tree_id)?;
        let head_commit = self.inner.head()?.peel_to_commit()?;

        self.inner.commit(
            Some("HEAD"),
            &author,
            &author,
            &format!("Automatic merge {source} into {target}"),
            &tree,
            &[&head_commit, &source_commit],
        )?;

        self.inner.cleanup_state()?;
        Ok(())
    }

    // === Commits ===

    /// Stage the given workdir-relative paths and commit them on HEAD.
    ///
    /// Handles the initial-commit case (unborn HEAD) without a parent.
    ///
    /// # Errors
    /// Returns error if staging or commit creation fails.
    pub fn commit(
        &self,
        message: &str,
        signature: &Signature<'_>,
        paths: &[&str],
    ) -> Result<Oid> {
        let mut index = self.inner.index()?;
        for path in paths {
            index.add_path(Path::new(path))?;
        }
        let tree_id = index.write_tree()?;
        index.write()?;
        let tree = self.inner.find_tree(tree_id)?;

        let oid = match self.inner.head().and_then(|head| head.peel_to_commit()) {
            Ok(parent) => self.inner.commit(
                Some("HEAD"),
                signature,
                signature,
                message,
                &tree,
                &[&parent],
            )?,
            Err(_) => self
                .inner
                .commit(Some("HEAD"), signature, signature, message, &tree, &[])?,
        };

        Ok(oid)
    }
}

impl std::fmt::Debug for WorkingCopy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingCopy")
            .field("path", &self.inner.path())
            .finish_non_exhaustive()
    }
}
