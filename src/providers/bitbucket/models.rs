use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    pub push: Push,
    pub repository: Repository,
}

#[derive(Debug, Deserialize)]
pub struct Push {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    pub new: Option<ChangeState>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeState {
    /// `branch`, `tag`, `named_branch` or `bookmark`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub name: String,
    pub target: Target,
}

impl ChangeState {
    pub fn reference(&self) -> String {
        match self.kind.as_deref() {
            Some("tag") => format!("refs/tags/{}", self.name),
            _ => format!("refs/heads/{}", self.name),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Target {
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SourcePage {
    #[serde(default)]
    pub values: Vec<SourceEntry>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SourceEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}
