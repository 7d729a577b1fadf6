//! Version-ordered branch list a merge is forwarded through.

/// Names of the two branch families taking part in a cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOptions {
    /// Long-lived integration branch that receives every change last.
    pub development_name: String,
    /// Prefix shared by all release branches, e.g. `release/`.
    pub release_prefix: String,
}

impl Default for CascadeOptions {
    fn default() -> Self {
        Self {
            development_name: "develop".into(),
            release_prefix: "release/".into(),
        }
    }
}

/// Extract the version ordinal from a branch name.
///
/// Branch names are expected to look like `<kind>/<version>` with an
/// integer version after the final slash. Anything else (no slash, a
/// non-numeric suffix, a float-like suffix) sorts last.
#[must_use]
pub fn extract_version(branch: &str) -> u64 {
    branch
        .rsplit('/')
        .next()
        .and_then(|suffix| suffix.parse().ok())
        .unwrap_or(u64::MAX)
}

/// Deduplicated sequence of branch names, sorted ascending by version
/// ordinal with the integration branch last, plus a cursor marking the
/// current source position.
///
/// Created empty, populated with [`append`](Self::append), optionally
/// truncated with [`slice`](Self::slice), then consumed once through
/// [`advance`](Self::advance).
#[derive(Debug, Clone)]
pub struct Cascade {
    branches: Vec<String>,
    current: usize,
    development_name: String,
}

impl Cascade {
    /// Create an empty cascade for the given branching model.
    #[must_use]
    pub fn new(options: &CascadeOptions) -> Self {
        Self {
            branches: Vec::new(),
            current: 0,
            development_name: options.development_name.clone(),
        }
    }

    /// Add a branch and re-sort. Appending a name already present
    /// leaves the cascade unmodified.
    pub fn append(&mut self, branch: &str) {
        if self.branches.iter().any(|existing| existing == branch) {
            return;
        }
        self.branches.push(branch.to_string());

        // Stable sort; the integration branch outranks release branches
        // that share its (maximal) ordinal.
        let development_name = self.development_name.clone();
        self.branches
            .sort_by_key(|branch| (extract_version(branch), *branch == development_name));
    }

    /// Advance the cursor and return the branch it now points at, or
    /// `None` once the end is reached. An empty cascade yields `None`.
    pub fn advance(&mut self) -> Option<String> {
        if self.current + 1 < self.branches.len() {
            self.current += 1;
            Some(self.branches[self.current].clone())
        } else {
            None
        }
    }

    /// Drop leading branches until the head equals `seed` and rewind
    /// the cursor. When `seed` is absent the cascade becomes empty;
    /// slicing twice with the same seed is a no-op the second time.
    pub fn slice(&mut self, seed: &str) {
        match self.branches.iter().position(|branch| branch == seed) {
            Some(position) => self.branches = self.branches.split_off(position),
            None => self.branches.clear(),
        }
        self.current = 0;
    }

    /// Branches remaining in walk order.
    #[must_use]
    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    /// Check whether any branch is left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}
