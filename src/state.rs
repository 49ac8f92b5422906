use crate::error::{Result, RippleError};
use crate::utils::template;
use jiff::Zoned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Lifecycle of one work item. Only advances; the store rejects
/// regression out of `Completed`. Failed items re-enter from Pending on
/// resume.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Applying,
    Completed,
    Failed,
    Skipped,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Applying => "applying",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
            ItemStatus::Skipped => "skipped",
        }
    }

}

impl FromStr for ItemStatus {
    type Err = RippleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ItemStatus::Pending),
            "applying" => Ok(ItemStatus::Applying),
            "completed" => Ok(ItemStatus::Completed),
            "failed" => Ok(ItemStatus::Failed),
            "skipped" => Ok(ItemStatus::Skipped),
            _ => Err(RippleError::State(format!("invalid item status: {s}"))),
        }
    }
}

/// Overall status of one rollout run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    CompletedWithFailures,
    Interrupted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::InProgress => "in progress",
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithFailures => "completed with failures",
            RunStatus::Interrupted => "interrupted",
        }
    }
}

/// Persisted record of one work item's last known progress, keyed by
/// (module, version, repo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemState {
    pub repo: String,
    pub status: ItemStatus,
    pub reason: Option<String>,
    pub pr_url: Option<String>,
    pub updated_at: Zoned,
}

impl ItemState {
    pub fn new(repo: &str) -> Self {
        Self {
            repo: repo.to_string(),
            status: ItemStatus::Pending,
            reason: None,
            pr_url: None,
            updated_at: Zoned::now(),
        }
    }

    pub fn advance(mut self, status: ItemStatus, reason: Option<String>) -> Self {
        self.status = status;
        self.reason = reason;
        self.updated_at = Zoned::now();
        self
    }

    pub fn with_pr_url(mut self, pr_url: &str) -> Self {
        self.pr_url = Some(pr_url.to_string());
        self.updated_at = Zoned::now();
        self
    }
}

/// Persisted run-level record: which items belong to the rollout of one
/// module+version and how far it got.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub module: String,
    pub version: String,
    /// Ordered item references (repo ids). Never shrinks across resumes.
    pub repos: Vec<String>,
    pub status: RunStatus,
    pub created_at: Zoned,
    pub updated_at: Zoned,
}

impl Summary {
    pub fn new(module: &str, version: &str) -> Self {
        let now = Zoned::now();
        Self {
            module: module.to_string(),
            version: version.to_string(),
            repos: Vec::new(),
            status: RunStatus::InProgress,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Fold the planned repos into the item list: existing entries keep
    /// their position, new ones are appended. The list never shrinks.
    pub fn merge_repos(&mut self, planned: &[String]) {
        for repo in planned {
            if !self.repos.contains(repo) {
                self.repos.push(repo.clone());
            }
        }
        self.updated_at = Zoned::now();
    }

    pub fn set_status(&mut self, status: RunStatus) {
        self.status = status;
        self.updated_at = Zoned::now();
    }
}

/// File-based store for summaries and per-item state. Every write lands
/// via write-temp-then-rename with an fsync, so a record is durable
/// before control returns to the pipeline.
pub struct StateManager {
    root: PathBuf,
}

impl StateManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn load_summary(&self, module: &str, version: &str) -> Result<Summary> {
        let path = self.summary_path(module, version);
        if !path.exists() {
            return Err(RippleError::StateNotFound {
                module: module.to_string(),
                version: version.to_string(),
            });
        }
        Self::read_json(&path)
    }

    pub fn save_summary(&self, summary: &Summary) -> Result<()> {
        let path = self.summary_path(&summary.module, &summary.version);
        Self::write_json(&path, summary)
    }

    pub fn load_item(&self, module: &str, version: &str, repo: &str) -> Result<Option<ItemState>> {
        let path = self.item_path(module, version, repo);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_json(&path).map(Some)
    }

    /// Save an item record, refusing to regress a Completed item. Resume
    /// re-entry (Failed/Pending/Skipped back through Applying) is allowed.
    pub fn save_item(&self, module: &str, version: &str, item: &ItemState) -> Result<()> {
        if let Some(existing) = self.load_item(module, version, &item.repo)? {
            if existing.status == ItemStatus::Completed && item.status != ItemStatus::Completed {
                return Err(RippleError::State(format!(
                    "refusing to regress completed item '{}' to {}",
                    item.repo,
                    item.status.as_str()
                )));
            }
        }

        let path = self.item_path(module, version, &item.repo);
        Self::write_json(&path, item)
    }

    /// All item records referenced by the summary, in summary order.
    pub fn load_items(&self, summary: &Summary) -> Result<Vec<ItemState>> {
        let mut items = Vec::with_capacity(summary.repos.len());
        for repo in &summary.repos {
            match self.load_item(&summary.module, &summary.version, repo)? {
                Some(item) => items.push(item),
                None => items.push(ItemState::new(repo)),
            }
        }
        Ok(items)
    }

    fn run_dir(&self, module: &str, version: &str) -> PathBuf {
        self.root.join(format!(
            "{}@{}",
            template::ref_safe(module),
            template::ref_safe(version)
        ))
    }

    fn summary_path(&self, module: &str, version: &str) -> PathBuf {
        self.run_dir(module, version).join("summary.json")
    }

    fn item_path(&self, module: &str, version: &str, repo: &str) -> PathBuf {
        self.run_dir(module, version)
            .join("items")
            .join(format!("{}.json", template::ref_safe(repo)))
    }

    fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)
            .map_err(|e| RippleError::State(format!("cannot read '{}': {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| RippleError::State(format!("corrupted record '{}': {e}", path.display())))
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            RippleError::State(format!("no parent directory for '{}'", path.display()))
        })?;
        fs::create_dir_all(parent)
            .map_err(|e| RippleError::State(format!("cannot create state dir: {e}")))?;

        let data = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        let mut file = File::create(&tmp)
            .map_err(|e| RippleError::State(format!("cannot write '{}': {e}", tmp.display())))?;
        file.write_all(&data)
            .map_err(|e| RippleError::State(format!("cannot write '{}': {e}", tmp.display())))?;
        file.sync_all()
            .map_err(|e| RippleError::State(format!("cannot sync '{}': {e}", tmp.display())))?;
        fs::rename(&tmp, path)
            .map_err(|e| RippleError::State(format!("cannot finalize '{}': {e}", path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_summary_is_not_found() {
        let dir = tempdir().unwrap();
        let state = StateManager::new(dir.path());
        let err = state.load_summary("corelib", "1.4.2").unwrap_err();
        assert!(matches!(err, RippleError::StateNotFound { .. }));
    }

    #[test]
    fn summary_round_trips() {
        let dir = tempdir().unwrap();
        let state = StateManager::new(dir.path());

        let mut summary = Summary::new("github.com/acme/corelib", "1.4.2");
        summary.merge_repos(&["acme/billing".to_string(), "acme/search".to_string()]);
        state.save_summary(&summary).unwrap();

        let loaded = state.load_summary("github.com/acme/corelib", "1.4.2").unwrap();
        assert_eq!(loaded.repos, vec!["acme/billing", "acme/search"]);
        assert_eq!(loaded.status, RunStatus::InProgress);
    }

    #[test]
    fn corrupted_summary_is_a_state_error() {
        let dir = tempdir().unwrap();
        let state = StateManager::new(dir.path());

        let summary = Summary::new("corelib", "1.4.2");
        state.save_summary(&summary).unwrap();

        let path = state.summary_path("corelib", "1.4.2");
        fs::write(&path, "{not json").unwrap();

        let err = state.load_summary("corelib", "1.4.2").unwrap_err();
        assert!(matches!(err, RippleError::State(_)));
    }

    #[test]
    fn item_round_trips_with_pr_reference() {
        let dir = tempdir().unwrap();
        let state = StateManager::new(dir.path());

        let item = ItemState::new("acme/billing")
            .advance(ItemStatus::Completed, Some("applied".into()))
            .with_pr_url("https://git.example.com/acme/billing/pull/7");
        state.save_item("corelib", "1.4.2", &item).unwrap();

        let loaded = state
            .load_item("corelib", "1.4.2", "acme/billing")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, ItemStatus::Completed);
        assert_eq!(
            loaded.pr_url.as_deref(),
            Some("https://git.example.com/acme/billing/pull/7")
        );
    }

    #[test]
    fn completed_items_never_regress() {
        let dir = tempdir().unwrap();
        let state = StateManager::new(dir.path());

        let completed = ItemState::new("acme/billing").advance(ItemStatus::Completed, None);
        state.save_item("corelib", "1.4.2", &completed).unwrap();

        let regressed = ItemState::new("acme/billing").advance(ItemStatus::Applying, None);
        let err = state.save_item("corelib", "1.4.2", &regressed).unwrap_err();
        assert!(matches!(err, RippleError::State(_)));
    }

    #[test]
    fn failed_items_may_reenter() {
        let dir = tempdir().unwrap();
        let state = StateManager::new(dir.path());

        let failed =
            ItemState::new("acme/billing").advance(ItemStatus::Failed, Some("tests failed".into()));
        state.save_item("corelib", "1.4.2", &failed).unwrap();

        let retried = ItemState::new("acme/billing").advance(ItemStatus::Applying, None);
        state.save_item("corelib", "1.4.2", &retried).unwrap();
    }

    #[test]
    fn summary_merge_never_shrinks() {
        let mut summary = Summary::new("corelib", "1.4.2");
        summary.merge_repos(&["a".to_string(), "b".to_string()]);
        // A resumed plan that covers fewer repos must not drop the rest.
        summary.merge_repos(&["b".to_string()]);
        assert_eq!(summary.repos, vec!["a", "b"]);

        summary.merge_repos(&["c".to_string()]);
        assert_eq!(summary.repos, vec!["a", "b", "c"]);
    }
}
