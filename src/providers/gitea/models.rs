use serde::{Deserialize, Serialize};

use crate::providers::CommitChanges;

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub reference: String,
    pub after: String,
    #[serde(default)]
    pub commits: Vec<CommitChanges>,
    pub repository: Repository,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub full_name: Option<String>,
    pub name: String,
    pub owner: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub username: Option<String>,
    pub login: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Tree {
    #[serde(default)]
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

#[derive(Debug, Deserialize)]
pub struct HookConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Hook {
    pub id: u64,
    pub config: HookConfig,
}

#[derive(Debug, Serialize)]
pub struct NewHookConfig<'a> {
    pub url: &'a str,
    pub content_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct NewHook<'a> {
    #[serde(rename = "type")]
    pub hook_type: &'static str,
    pub config: NewHookConfig<'a>,
    pub events: &'static [&'static str],
    pub active: bool,
}
