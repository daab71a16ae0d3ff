// src/agent/priority.rs
// Composes unread mentions, DMs, and thread replies into one priority-sorted
// status view (§4.5). Two-phase flow (collect raw items + entity ids, then
// batch-resolve and format) follows the upstream's `StatusService.get_status`
// and `FormattedStatusItem`.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::error::StoreError;
use crate::formatting::{CollectedEntities, EntityResolver, ResolvedContext, collect_entities, format_text};
use crate::persistence::preferences::PreferenceSet;
use crate::persistence::session::SessionState;
use crate::store::Store;
use crate::store::models::Reminder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical = 1,
    High = 2,
    Medium = 3,
    Low = 4,
}

impl Priority {
    fn label(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

/// One unresolved status item, before entity resolution and formatting.
struct RawItem {
    priority: Priority,
    channel_id: String,
    message_ts: String,
    thread_ts: Option<String>,
    user_id: Option<String>,
    text: Option<String>,
    timestamp: f64,
    reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormattedStatusItem {
    pub priority: String,
    pub channel_id: String,
    pub message_ts: String,
    pub thread_ts: Option<String>,
    pub formatted_user: String,
    pub formatted_channel: String,
    pub text_preview: String,
    pub reason: String,
    pub already_processed: bool,
}

impl FormattedStatusItem {
    fn from_raw(raw: RawItem, context: &ResolvedContext, processed: &HashSet<String>) -> Self {
        let formatted_user = raw
            .user_id
            .as_deref()
            .map(|id| context.get_user_name(id))
            .unwrap_or_else(|| "unknown".to_string());
        let formatted_channel = format!("#{}", context.get_channel_name(&raw.channel_id));
        let text_preview = preview(&format_text(raw.text.as_deref(), context));
        let key = format!("{}:{}", raw.channel_id, raw.message_ts);

        Self {
            priority: raw.priority.label().to_string(),
            channel_id: raw.channel_id,
            message_ts: raw.message_ts,
            thread_ts: raw.thread_ts,
            formatted_user,
            formatted_channel,
            text_preview,
            reason: raw.reason,
            already_processed: processed.contains(&key),
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= 100 {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(100).collect();
        format!("{truncated}...")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReminderSummary {
    pub id: String,
    pub text: Option<String>,
    pub time: Option<String>,
    pub recurring: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub items: Vec<FormattedStatusItem>,
    pub pending_reminders: Vec<ReminderSummary>,
}

fn ts_to_epoch(ts: &str) -> f64 {
    ts.parse::<f64>().unwrap_or(0.0)
}

/// Composes the full prioritized status view for `user_id`.
///
/// `since` bounds how far back mentions/DMs/thread-replies are pulled.
/// `include_processed` keeps items the session has already marked reviewed
/// instead of filtering them out.
pub async fn get_status(
    store: &Store,
    resolver: &EntityResolver,
    user_id: &str,
    since: Option<chrono::DateTime<chrono::Utc>>,
    prefs: &PreferenceSet,
    session: &SessionState,
    include_processed: bool,
) -> Result<Status, StoreError> {
    let mut raw_items = Vec::new();
    let mut entities = CollectedEntities::default();

    // Phase 1a: mentions. Already replied in-thread demotes to LOW.
    let mentions = store.get_unread_mentions(user_id, since).await?;
    let mention_contexts: Vec<(String, Option<String>, String)> = mentions
        .iter()
        .map(|m| (m.channel_id.clone(), m.thread_ts.clone(), m.ts.clone()))
        .collect();
    let reply_status = store.get_user_reply_status_batch(user_id, &mention_contexts).await?;

    for m in &mentions {
        entities.merge(collect_entities(m.text.as_deref()));
        if let Some(uid) = &m.user_id {
            entities.user_ids.insert(uid.clone());
        }
        entities.channel_ids.insert(m.channel_id.clone());

        let effective_thread_ts = m.thread_ts.clone().unwrap_or_else(|| m.ts.clone());
        let context_key = format!("{}:{}", m.channel_id, effective_thread_ts);
        let already_replied = reply_status.get(&context_key).copied().unwrap_or(false);

        raw_items.push(RawItem {
            priority: if already_replied { Priority::Low } else { Priority::Critical },
            channel_id: m.channel_id.clone(),
            message_ts: m.ts.clone(),
            thread_ts: m.thread_ts.clone(),
            user_id: m.user_id.clone(),
            text: m.text.clone(),
            timestamp: ts_to_epoch(&m.ts),
            reason: if already_replied {
                "mention, already replied in thread".to_string()
            } else {
                "mentions you".to_string()
            },
        });
    }

    // Phase 1b: DMs. Self-DM channels are retained even when self-authored,
    // since that's where the user leaves notes for themself.
    let self_dm_ids: HashSet<String> = store.channels.self_dm_channel_ids().await?.into_iter().collect();
    let dms = store.get_dms(since).await?;
    for m in &dms {
        let is_self_authored = m.user_id.as_deref() == Some(user_id);
        if is_self_authored && !self_dm_ids.contains(&m.channel_id) {
            continue;
        }

        entities.merge(collect_entities(m.text.as_deref()));
        if let Some(uid) = &m.user_id {
            entities.user_ids.insert(uid.clone());
        }
        entities.channel_ids.insert(m.channel_id.clone());

        raw_items.push(RawItem {
            priority: Priority::High,
            channel_id: m.channel_id.clone(),
            message_ts: m.ts.clone(),
            thread_ts: m.thread_ts.clone(),
            user_id: m.user_id.clone(),
            text: m.text.clone(),
            timestamp: ts_to_epoch(&m.ts),
            reason: if is_self_authored {
                "note to self".to_string()
            } else {
                "direct message".to_string()
            },
        });
    }

    // Phase 1c: thread replies from others, deduplicated by
    // (channel, effective_parent_ts).
    let thread_replies = store.get_threads_with_replies(user_id, since).await?;
    let mut seen_threads: HashSet<(String, String)> = HashSet::new();
    for reply in thread_replies {
        let m = &reply.message;
        let effective_parent_ts = m.thread_ts.clone().unwrap_or_else(|| m.ts.clone());
        let dedup_key = (m.channel_id.clone(), effective_parent_ts);
        if !seen_threads.insert(dedup_key) {
            continue;
        }

        entities.merge(collect_entities(m.text.as_deref()));
        if let Some(uid) = &m.user_id {
            entities.user_ids.insert(uid.clone());
        }
        entities.channel_ids.insert(m.channel_id.clone());

        raw_items.push(RawItem {
            priority: Priority::Medium,
            channel_id: m.channel_id.clone(),
            message_ts: m.ts.clone(),
            thread_ts: m.thread_ts.clone(),
            user_id: m.user_id.clone(),
            text: m.text.clone(),
            timestamp: ts_to_epoch(&m.ts),
            reason: "new reply in a thread you started".to_string(),
        });
    }

    // Phase 2: batch-resolve every entity id collected above.
    let context = resolver.resolve(&entities).await?;

    // Phase 2.5: acknowledgment-emoji overlay. Demotes to LOW and appends
    // the reaction names to the reason.
    let ack_emojis = prefs.acknowledgment_emojis();
    if !ack_emojis.is_empty() {
        let item_keys: Vec<(String, String)> = raw_items
            .iter()
            .map(|i| (i.channel_id.clone(), i.message_ts.clone()))
            .collect();
        let acks = store
            .reactions
            .get_user_reactions_on_items(user_id, &item_keys, &ack_emojis)
            .await?;

        for item in &mut raw_items {
            let key = format!("{}:{}", item.channel_id, item.message_ts);
            if let Some(emojis) = acks.get(&key) {
                item.priority = Priority::Low;
                let emoji_str = emojis.iter().map(|e| format!(":{e}:")).collect::<Vec<_>>().join(", ");
                item.reason = format!("{} (acknowledged with {})", item.reason, emoji_str);
            }
        }
    }

    // Session filter: drop already-processed items unless explicitly asked
    // to keep them.
    let processed = session.processed_keys();
    if !include_processed {
        raw_items.retain(|i| !processed.contains(&format!("{}:{}", i.channel_id, i.message_ts)));
    }

    raw_items.sort_by(|a, b| a.priority.cmp(&b.priority).then(b.timestamp.partial_cmp(&a.timestamp).unwrap()));

    let critical_count = raw_items.iter().filter(|i| i.priority == Priority::Critical).count();
    let high_count = raw_items.iter().filter(|i| i.priority == Priority::High).count();
    let medium_count = raw_items.iter().filter(|i| i.priority == Priority::Medium).count();

    let items = raw_items
        .into_iter()
        .map(|raw| FormattedStatusItem::from_raw(raw, &context, &processed))
        .collect();

    let pending_reminders = store
        .reminders
        .get_pending(user_id)
        .await?
        .into_iter()
        .map(reminder_summary)
        .collect();

    Ok(Status {
        critical_count,
        high_count,
        medium_count,
        items,
        pending_reminders,
    })
}

fn reminder_summary(r: Reminder) -> ReminderSummary {
    ReminderSummary {
        id: r.id,
        text: r.text,
        time: r.time.map(|t| t.to_rfc3339()),
        recurring: r.recurring,
    }
}

/// Convenience wrapper bundling the store + resolver together, mirroring
/// the upstream's `StatusService` as a small stateful facade over the
/// module-level [`get_status`] function.
pub struct StatusService {
    store: Arc<Store>,
    resolver: Arc<EntityResolver>,
}

impl StatusService {
    pub fn new(store: Arc<Store>, resolver: Arc<EntityResolver>) -> Self {
        Self { store, resolver }
    }

    pub async fn get_status(
        &self,
        user_id: &str,
        since: Option<chrono::DateTime<chrono::Utc>>,
        prefs: &PreferenceSet,
        session: &SessionState,
        include_processed: bool,
    ) -> Result<Status, StoreError> {
        get_status(&self.store, &self.resolver, user_id, since, prefs, session, include_processed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn priority_orders_critical_before_low() {
        let mut priorities = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
        priorities.sort();
        assert_eq!(priorities, vec![Priority::Critical, Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn ts_to_epoch_parses_slack_style_timestamps() {
        assert_eq!(ts_to_epoch("1700000000.5"), 1700000000.5);
        assert_eq!(ts_to_epoch("not-a-timestamp"), 0.0);
    }

    #[test]
    fn preview_passes_short_text_through_unchanged() {
        assert_eq!(preview("short message"), "short message");
    }

    #[test]
    fn preview_truncates_long_text_by_char_count() {
        let text: String = std::iter::repeat('x').take(150).collect();
        let result = preview(&text);
        assert_eq!(result.chars().count(), 103);
        assert!(result.ends_with("..."));
    }

    fn resolved_context() -> ResolvedContext {
        ResolvedContext {
            users: HashMap::from([("U1".to_string(), "alice".to_string())]),
            channels: HashMap::from([("C1".to_string(), "general".to_string())]),
        }
    }

    #[test]
    fn formatted_status_item_marks_already_processed_items() {
        let raw = RawItem {
            priority: Priority::Critical,
            channel_id: "C1".to_string(),
            message_ts: "1700000000.000001".to_string(),
            thread_ts: None,
            user_id: Some("U1".to_string()),
            text: Some("<@U1> hello".to_string()),
            timestamp: 1700000000.0,
            reason: "mentions you".to_string(),
        };
        let processed = HashSet::from(["C1:1700000000.000001".to_string()]);

        let item = FormattedStatusItem::from_raw(raw, &resolved_context(), &processed);

        assert_eq!(item.priority, "critical");
        assert_eq!(item.formatted_user, "alice");
        assert_eq!(item.formatted_channel, "#general");
        assert_eq!(item.text_preview, "@alice hello");
        assert!(item.already_processed);
    }

    #[test]
    fn formatted_status_item_falls_back_to_unknown_user() {
        let raw = RawItem {
            priority: Priority::Medium,
            channel_id: "C1".to_string(),
            message_ts: "1700000000.000002".to_string(),
            thread_ts: None,
            user_id: None,
            text: Some("a bot message".to_string()),
            timestamp: 1700000000.0,
            reason: "new reply in a thread you started".to_string(),
        };

        let item = FormattedStatusItem::from_raw(raw, &resolved_context(), &HashSet::new());
        assert_eq!(item.formatted_user, "unknown");
        assert!(!item.already_processed);
    }
}
