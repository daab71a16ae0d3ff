// src/persistence/preferences.rs
// JSON file storage for user preferences (§4.6, §9).

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRule {
    pub id: String,
    pub description: String,
    pub created_at: String,
}

impl UserRule {
    pub fn new(description: String) -> Self {
        Self {
            id: short_id(),
            description,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFact {
    pub id: String,
    pub content: String,
    pub created_at: String,
}

impl UserFact {
    pub fn new(content: String) -> Self {
        Self {
            id: short_id(),
            content,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// An emoji reaction the user treats as acknowledgment of an item, with an
/// optional priority demotion. Not present in the upstream's preference
/// model; added because `get_status` needs a concrete source for the
/// acknowledgment emoji allowlist it consults (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmojiPattern {
    pub emoji: String,
    pub meaning: String,
    pub marks_as_handled: bool,
    #[serde(default)]
    pub priority_delta: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceSet {
    #[serde(default)]
    pub rules: Vec<UserRule>,
    #[serde(default)]
    pub facts: Vec<UserFact>,
    #[serde(default)]
    pub emoji_patterns: Vec<EmojiPattern>,
}

impl PreferenceSet {
    pub fn rules_text(&self) -> String {
        if self.rules.is_empty() {
            return "No custom prioritization rules defined.".to_string();
        }
        let mut lines = vec!["Custom prioritization rules:".to_string()];
        lines.extend(self.rules.iter().map(|r| format!("- {}", r.description)));
        lines.join("\n")
    }

    pub fn facts_text(&self) -> String {
        if self.facts.is_empty() {
            return "No remembered facts.".to_string();
        }
        let mut lines = vec!["Remembered facts:".to_string()];
        lines.extend(self.facts.iter().map(|f| format!("- {}", f.content)));
        lines.join("\n")
    }

    /// Emoji names that mean "this item is handled", for `get_status`'s
    /// acknowledgment overlay.
    pub fn acknowledgment_emojis(&self) -> Vec<String> {
        self.emoji_patterns
            .iter()
            .filter(|p| p.marks_as_handled)
            .map(|p| p.emoji.clone())
            .collect()
    }

    /// Adds an emoji pattern, or updates the existing one if its normalized
    /// name already has an entry (§4.5).
    pub fn upsert_emoji_pattern(&mut self, emoji: &str, meaning: String, marks_as_handled: bool, priority_delta: i32) {
        let normalized = normalize_emoji_name(emoji);
        let priority_delta = priority_delta.clamp(-2, 2);

        if let Some(existing) = self.emoji_patterns.iter_mut().find(|p| p.emoji == normalized) {
            existing.meaning = meaning;
            existing.marks_as_handled = marks_as_handled;
            existing.priority_delta = priority_delta;
            return;
        }

        self.emoji_patterns.push(EmojiPattern {
            emoji: normalized,
            meaning,
            marks_as_handled,
            priority_delta,
        });
    }

    pub fn remove_emoji_pattern(&mut self, emoji: &str) -> bool {
        let normalized = normalize_emoji_name(emoji);
        let original_count = self.emoji_patterns.len();
        self.emoji_patterns.retain(|p| p.emoji != normalized);
        self.emoji_patterns.len() < original_count
    }
}

/// Strips surrounding colons and lowercases, so `:eyes:`, `EYES`, and `eyes`
/// all address the same pattern.
pub fn normalize_emoji_name(emoji: &str) -> String {
    emoji.trim().trim_matches(':').to_lowercase()
}

pub struct PreferenceStorage {
    file: PathBuf,
}

impl PreferenceStorage {
    pub fn new(storage_dir: &Path) -> Self {
        Self {
            file: storage_dir.join("preferences.json"),
        }
    }

    pub fn load(&self) -> PreferenceSet {
        let Ok(contents) = std::fs::read_to_string(&self.file) else {
            return PreferenceSet::default();
        };
        match serde_json::from_str(&contents) {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(error = %e, path = %self.file.display(), "failed to parse preferences, using defaults");
                PreferenceSet::default()
            }
        }
    }

    pub fn save(&self, prefs: &PreferenceSet) -> std::io::Result<()> {
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.file, body)?;
        debug!(path = %self.file.display(), "saved preferences");
        Ok(())
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_emoji_names_consistently() {
        assert_eq!(normalize_emoji_name(":Eyes:"), "eyes");
        assert_eq!(normalize_emoji_name("EYES"), "eyes");
        assert_eq!(normalize_emoji_name(" eyes "), "eyes");
    }

    #[test]
    fn upsert_emoji_pattern_adds_new_entry() {
        let mut prefs = PreferenceSet::default();
        prefs.upsert_emoji_pattern(":white_check_mark:", "done".to_string(), true, 5);

        assert_eq!(prefs.emoji_patterns.len(), 1);
        let pattern = &prefs.emoji_patterns[0];
        assert_eq!(pattern.emoji, "white_check_mark");
        assert_eq!(pattern.meaning, "done");
        assert!(pattern.marks_as_handled);
        assert_eq!(pattern.priority_delta, 2, "priority_delta must clamp to [-2, 2]");
    }

    #[test]
    fn upsert_emoji_pattern_updates_existing_by_normalized_name() {
        let mut prefs = PreferenceSet::default();
        prefs.upsert_emoji_pattern("eyes", "looking".to_string(), false, 0);
        prefs.upsert_emoji_pattern(":EYES:", "seen".to_string(), true, -5);

        assert_eq!(prefs.emoji_patterns.len(), 1);
        let pattern = &prefs.emoji_patterns[0];
        assert_eq!(pattern.meaning, "seen");
        assert!(pattern.marks_as_handled);
        assert_eq!(pattern.priority_delta, -2);
    }

    #[test]
    fn remove_emoji_pattern_reports_whether_it_existed() {
        let mut prefs = PreferenceSet::default();
        prefs.upsert_emoji_pattern("eyes", "looking".to_string(), false, 0);

        assert!(prefs.remove_emoji_pattern(":eyes:"));
        assert!(prefs.emoji_patterns.is_empty());
        assert!(!prefs.remove_emoji_pattern("eyes"));
    }

    #[test]
    fn acknowledgment_emojis_only_includes_handled_patterns() {
        let mut prefs = PreferenceSet::default();
        prefs.upsert_emoji_pattern("white_check_mark", "done".to_string(), true, 1);
        prefs.upsert_emoji_pattern("eyes", "looking".to_string(), false, 0);

        assert_eq!(prefs.acknowledgment_emojis(), vec!["white_check_mark".to_string()]);
    }

    #[test]
    fn rules_and_facts_text_fall_back_when_empty() {
        let prefs = PreferenceSet::default();
        assert_eq!(prefs.rules_text(), "No custom prioritization rules defined.");
        assert_eq!(prefs.facts_text(), "No remembered facts.");
    }

    #[test]
    fn preference_storage_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = PreferenceStorage::new(dir.path());

        let mut prefs = PreferenceSet::default();
        prefs.rules.push(UserRule::new("always summarize threads".to_string()));
        prefs.facts.push(UserFact::new("works on the infra team".to_string()));
        storage.save(&prefs).unwrap();

        let loaded = storage.load();
        assert_eq!(loaded.rules.len(), 1);
        assert_eq!(loaded.facts.len(), 1);
        assert_eq!(loaded.rules[0].description, "always summarize threads");
    }

    #[test]
    fn preference_storage_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = PreferenceStorage::new(dir.path());
        let loaded = storage.load();
        assert!(loaded.rules.is_empty());
        assert!(loaded.facts.is_empty());
    }
}
