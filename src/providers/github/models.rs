use serde::{Deserialize, Serialize};

use crate::providers::CommitChanges;

#[derive(Debug, Deserialize)]
pub struct PingEvent {
    pub zen: String,
    pub hook_id: Option<u64>,
    pub repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub reference: String,
    pub after: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub commits: Vec<CommitChanges>,
    pub repository: Repository,
}

#[derive(Debug, Deserialize)]
pub struct Tree {
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
pub struct WebhookConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Webhook {
    pub id: u64,
    pub config: WebhookConfig,
}

#[derive(Debug, Serialize)]
pub struct NewWebhookConfig<'a> {
    pub url: &'a str,
    pub content_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct NewWebhook<'a> {
    pub name: &'static str,
    pub active: bool,
    pub config: NewWebhookConfig<'a>,
    pub events: &'static [&'static str],
}
