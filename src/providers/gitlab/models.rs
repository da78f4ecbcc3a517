use serde::{Deserialize, Serialize};

use crate::providers::CommitChanges;

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    pub object_kind: Option<String>,
    #[serde(rename = "ref")]
    pub reference: String,
    pub after: String,
    #[serde(default)]
    pub commits: Vec<CommitChanges>,
    pub project: Project,
}

#[derive(Debug, Deserialize)]
pub struct Project {
    pub path_with_namespace: String,
}

#[derive(Debug, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectHook {
    pub id: u64,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct NewProjectHook<'a> {
    pub url: &'a str,
    pub push_events: bool,
    pub tag_push_events: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<&'a str>,
}
