//! The cascade engine: walks the ordered branch list and forwards a
//! merge through every step with fetch/reset/merge/push discipline.

use cascade_git::CopyOps;

use crate::cascade::{Cascade, CascadeOptions};

/// Where and why a cascade halted.
///
/// Carries both endpoints of the failing hop so a fallback pull request
/// can be opened from `source` to `target`. Both are `None` when the
/// walk never began (local cleanup or fetch failed); `target` alone is
/// `None` when the seed branch itself could not be prepared.
#[derive(Debug, thiserror::Error)]
#[error("{}", describe(.source, .target))]
pub struct CascadeMergeState {
    /// Branch being merged when the cascade halted.
    pub source: Option<String>,
    /// Branch being merged into when the cascade halted.
    pub target: Option<String>,
    /// The failure that stopped the walk.
    #[source]
    pub error: cascade_git::Error,
}

impl CascadeMergeState {
    fn before_walk(error: cascade_git::Error) -> Self {
        Self {
            source: None,
            target: None,
            error,
        }
    }

    fn at_seed(seed: &str) -> impl Fn(cascade_git::Error) -> Self {
        let seed = seed.to_string();
        move |error| Self {
            source: Some(seed.clone()),
            target: None,
            error,
        }
    }

    fn at_step(source: &str, target: &str) -> impl Fn(cascade_git::Error) -> Self + use<> {
        let source = source.to_string();
        let target = target.to_string();
        move |error| Self {
            source: Some(source.clone()),
            target: Some(target.clone()),
            error,
        }
    }
}

fn describe(source: &Option<String>, target: &Option<String>) -> String {
    match (source, target) {
        (Some(source), Some(target)) => {
            format!("cascade halted merging {source} into {target}")
        }
        (Some(source), None) => format!("cascade halted preparing {source}"),
        _ => "cascade halted before any merge step".to_string(),
    }
}

/// Forward-merge `seed` through every newer release branch and finally
/// the integration branch.
///
/// The walk is strictly ordered: each step merges the already-forwarded
/// state of the previous target, so a fix landed on an old release is
/// guaranteed present in every newer one. A seed outside the cascade is
/// a no-op.
///
/// # Errors
/// Returns a [`CascadeMergeState`] identifying the first failing hop;
/// the walk never continues past a failure.
pub fn cascade_merge(
    copy: &impl CopyOps,
    seed: &str,
    options: &CascadeOptions,
) -> Result<(), CascadeMergeState> {
    copy.remove_local_branches()
        .map_err(CascadeMergeState::before_walk)?;
    copy.fetch().map_err(CascadeMergeState::before_walk)?;

    let mut cascade = Cascade::new(options);
    for branch in copy
        .remote_branches()
        .map_err(CascadeMergeState::before_walk)?
    {
        if branch == options.development_name || branch.starts_with(&options.release_prefix) {
            cascade.append(&branch);
        }
    }
    cascade.slice(seed);
    if cascade.is_empty() {
        tracing::debug!(seed, "seed is not part of the cascade, nothing to do");
        return Ok(());
    }

    let mut source = seed.to_string();
    copy.checkout(&source)
        .map_err(CascadeMergeState::at_seed(&source))?;
    copy.reset(&source)
        .map_err(CascadeMergeState::at_seed(&source))?;

    while let Some(target) = cascade.advance() {
        let halted = CascadeMergeState::at_step(&source, &target);

        copy.checkout(&target).map_err(&halted)?;
        copy.reset(&target).map_err(&halted)?;
        copy.merge_branches(&source, &target).map_err(&halted)?;
        copy.push(&target).map_err(&halted)?;

        tracing::info!(source, target, "forwarded merge");
        source = target;
    }

    Ok(())
}
