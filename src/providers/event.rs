use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// File list entry standing for "every file of the repository".
pub const RESYNC_MARKER: &str = ".";

/// A repository update, normalized across Git hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushEvent {
    /// May contain `/` for nested namespaces.
    pub owner: String,
    pub repo: String,
    #[serde(rename = "ref")]
    pub reference: String,
    /// Commit-ish the files are read at.
    pub after: String,
    /// Added and modified files. Removed files never appear here.
    pub modified_files: BTreeSet<String>,
}

impl PushEvent {
    /// Build an event asking for every manifest of the repository.
    pub fn resync<T: Into<String>>(owner: T, repo: T, reference: T, after: T) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            reference: reference.into(),
            after: after.into(),
            modified_files: BTreeSet::from([RESYNC_MARKER.to_string()]),
        }
    }

    pub fn requests_resync(&self) -> bool {
        self.modified_files.contains(RESYNC_MARKER)
    }
}

/// File changes carried by one commit of a push payload.
///
/// GitHub, GitLab and Gitea share this shape.
#[derive(Debug, Default, Deserialize)]
pub struct CommitChanges {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
}

/// Union of added and modified files across `commits`.
pub fn collect_modified_files<'a, I>(commits: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a CommitChanges>,
{
    commits
        .into_iter()
        .flat_map(|c| c.added.iter().chain(c.modified.iter()))
        .cloned()
        .collect()
}
