// src/persistence/session.rs
// JSON file storage for the agent's running session state (§4.6, §9).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_SESSION_AGE_HOURS: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemDisposition {
    Reviewed,
    Deferred,
    ActedOn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedItem {
    pub channel_id: String,
    pub message_ts: String,
    pub thread_ts: Option<String>,
    pub disposition: ItemDisposition,
    pub processed_at: String,
    pub notes: Option<String>,
}

impl ProcessedItem {
    pub fn key(&self) -> String {
        format!("{}:{}", self.channel_id, self.message_ts)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedItem {
    pub channel_id: String,
    pub message_ts: String,
    pub thread_ts: Option<String>,
    pub priority: String,
    pub summary: String,
    pub action_needed: Option<String>,
    pub context_notes: Option<String>,
    pub analyzed_at: String,
}

impl AnalyzedItem {
    pub fn key(&self) -> String {
        format!("{}:{}", self.channel_id, self.message_ts)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub summary_text: String,
    #[serde(default)]
    pub key_topics: Vec<String>,
    #[serde(default)]
    pub pending_follow_ups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_items: Vec<ProcessedItem>,
    #[serde(default)]
    pub analyzed_items: Vec<AnalyzedItem>,
    pub conversation_summary: Option<ConversationSummary>,
    pub current_focus: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            started_at: now,
            last_activity_at: now,
            processed_items: Vec::new(),
            analyzed_items: Vec::new(),
            conversation_summary: None,
            current_focus: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    pub fn add_processed_item(
        &mut self,
        channel_id: String,
        message_ts: String,
        disposition: ItemDisposition,
        thread_ts: Option<String>,
        notes: Option<String>,
    ) -> &ProcessedItem {
        self.processed_items.push(ProcessedItem {
            channel_id,
            message_ts,
            thread_ts,
            disposition,
            processed_at: Utc::now().to_rfc3339(),
            notes,
        });
        self.touch();
        self.processed_items.last().expect("just pushed")
    }

    pub fn processed_keys(&self) -> HashSet<String> {
        self.processed_items.iter().map(|i| i.key()).collect()
    }

    pub fn is_item_processed(&self, channel_id: &str, message_ts: &str) -> bool {
        self.processed_items
            .iter()
            .any(|i| i.channel_id == channel_id && i.message_ts == message_ts)
    }

    pub fn analyzed_keys(&self) -> HashSet<String> {
        self.analyzed_items.iter().map(|i| i.key()).collect()
    }

    /// Upsert by key: replaces any existing analysis for the same message.
    #[allow(clippy::too_many_arguments)]
    pub fn add_analyzed_item(
        &mut self,
        channel_id: String,
        message_ts: String,
        priority: String,
        summary: String,
        thread_ts: Option<String>,
        action_needed: Option<String>,
        context_notes: Option<String>,
    ) -> &AnalyzedItem {
        let key = format!("{channel_id}:{message_ts}");
        self.analyzed_items.retain(|i| i.key() != key);
        self.analyzed_items.push(AnalyzedItem {
            channel_id,
            message_ts,
            thread_ts,
            priority,
            summary,
            action_needed,
            context_notes,
            analyzed_at: Utc::now().to_rfc3339(),
        });
        self.touch();
        self.analyzed_items.last().expect("just pushed")
    }

    pub fn get_analyzed_item(&self, channel_id: &str, message_ts: &str) -> Option<&AnalyzedItem> {
        self.analyzed_items
            .iter()
            .find(|i| i.channel_id == channel_id && i.message_ts == message_ts)
    }

    pub fn age_hours(&self) -> f64 {
        (Utc::now() - self.started_at).num_seconds() as f64 / 3600.0
    }

    pub fn summary_text(&self) -> String {
        let mut lines = vec![
            format!("Session ID: {}", self.session_id),
            format!("Started: {}", self.started_at.to_rfc3339()),
            format!("Items processed: {}", self.processed_items.len()),
            format!("Items analyzed: {}", self.analyzed_items.len()),
        ];

        if let Some(focus) = &self.current_focus {
            lines.push(format!("Current focus: {focus}"));
        }

        if let Some(summary) = &self.conversation_summary {
            lines.push(String::new());
            lines.push("Last summary:".to_string());
            lines.push(summary.summary_text.clone());

            if !summary.pending_follow_ups.is_empty() {
                lines.push(String::new());
                lines.push("Pending follow-ups:".to_string());
                lines.extend(summary.pending_follow_ups.iter().map(|f| format!("  - {f}")));
            }
        }

        lines.join("\n")
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SessionStorage {
    session_file: PathBuf,
    history_dir: PathBuf,
}

impl SessionStorage {
    pub fn new(storage_dir: &Path) -> Self {
        Self {
            session_file: storage_dir.join("session.json"),
            history_dir: storage_dir.join("session_history"),
        }
    }

    pub fn load(&self) -> Option<SessionState> {
        let contents = std::fs::read_to_string(&self.session_file).ok()?;
        match serde_json::from_str(&contents) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(error = %e, "failed to parse session, discarding");
                None
            }
        }
    }

    pub fn save(&self, session: &mut SessionState) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.history_dir)?;
        session.touch();
        let body = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.session_file, body)?;
        debug!(session_id = %session.session_id, "saved session");
        Ok(())
    }

    /// Archives `session` (or the on-disk current session if none is
    /// given) under `session_history/session_<id>_<date>.json` and
    /// removes the current-session file.
    pub fn archive(&self, session: Option<SessionState>) -> std::io::Result<Option<PathBuf>> {
        let Some(session) = session.or_else(|| self.load()) else {
            return Ok(None);
        };

        std::fs::create_dir_all(&self.history_dir)?;
        let date = Utc::now().format("%Y-%m-%d");
        let archive_path = self.history_dir.join(format!("session_{}_{date}.json", session.session_id));
        std::fs::write(&archive_path, serde_json::to_string_pretty(&session)?)?;
        info!(session_id = %session.session_id, path = %archive_path.display(), "archived session");

        if self.session_file.exists() {
            std::fs::remove_file(&self.session_file)?;
        }

        Ok(Some(archive_path))
    }

    pub fn clear(&self) -> std::io::Result<()> {
        if self.session_file.exists() {
            std::fs::remove_file(&self.session_file)?;
            debug!("cleared current session");
        }
        Ok(())
    }

    pub fn is_stale(&self, session: &SessionState) -> bool {
        session.age_hours() > MAX_SESSION_AGE_HOURS
    }

    /// Resumes the current session if fresh, archives it and starts a new
    /// one if stale, or starts a new one if none exists. Returns
    /// `(session, resumed)`.
    pub fn get_or_create(&self) -> std::io::Result<(SessionState, bool)> {
        match self.load() {
            Some(existing) if !self.is_stale(&existing) => Ok((existing, true)),
            Some(stale) => {
                self.archive(Some(stale))?;
                let mut fresh = SessionState::new();
                self.save(&mut fresh)?;
                Ok((fresh, false))
            }
            None => {
                let mut fresh = SessionState::new();
                self.save(&mut fresh)?;
                Ok((fresh, false))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn mark_item_processed_is_idempotent_by_channel_and_ts() {
        let mut session = SessionState::new();
        assert!(!session.is_item_processed("C1", "1.1"));

        session.add_processed_item("C1".to_string(), "1.1".to_string(), ItemDisposition::Reviewed, None, None);
        assert!(session.is_item_processed("C1", "1.1"));
        assert_eq!(session.processed_keys(), HashSet::from(["C1:1.1".to_string()]));
    }

    #[test]
    fn add_analyzed_item_replaces_prior_analysis_for_same_key() {
        let mut session = SessionState::new();
        session.add_analyzed_item(
            "C1".to_string(),
            "1.1".to_string(),
            "high".to_string(),
            "first pass".to_string(),
            None,
            None,
            None,
        );
        session.add_analyzed_item(
            "C1".to_string(),
            "1.1".to_string(),
            "medium".to_string(),
            "second pass".to_string(),
            None,
            None,
            None,
        );

        assert_eq!(session.analyzed_items.len(), 1);
        assert_eq!(session.analyzed_keys(), HashSet::from(["C1:1.1".to_string()]));
        assert_eq!(session.get_analyzed_item("C1", "1.1").unwrap().summary, "second pass");
    }

    #[test]
    fn storage_resumes_a_fresh_session_without_archiving() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(dir.path());

        let (first, resumed) = storage.get_or_create().unwrap();
        assert!(!resumed);

        let (second, resumed) = storage.get_or_create().unwrap();
        assert!(resumed);
        assert_eq!(first.session_id, second.session_id);
    }

    #[test]
    fn storage_archives_a_stale_session_and_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(dir.path());

        let mut stale = SessionState::new();
        stale.started_at = Utc::now() - Duration::hours(5);
        storage.save(&mut stale).unwrap();

        let (fresh, resumed) = storage.get_or_create().unwrap();
        assert!(!resumed);
        assert_ne!(fresh.session_id, stale.session_id);
        assert!(dir.path().join("session_history").read_dir().unwrap().next().is_some());
    }
}
