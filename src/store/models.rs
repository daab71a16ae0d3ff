// src/store/models.rs
// Entity shapes persisted by the Store (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    PublicChannel,
    PrivateChannel,
    Mpim,
    Im,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::PublicChannel => "public_channel",
            ChannelKind::PrivateChannel => "private_channel",
            ChannelKind::Mpim => "mpim",
            ChannelKind::Im => "im",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "private_channel" => ChannelKind::PrivateChannel,
            "mpim" => ChannelKind::Mpim,
            "im" => ChannelKind::Im,
            _ => ChannelKind::PublicChannel,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: Option<String>,
    pub kind: ChannelKind,
    pub is_archived: bool,
    pub is_self_dm: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

impl Channel {
    /// Human-readable name per the upstream's own rendering rule:
    /// IM → `DM: @user`, MPIM → `Group DM: name`, else `#name`.
    pub fn display_name(&self, resolved_user: Option<&str>) -> String {
        match self.kind {
            ChannelKind::Im => {
                let peer = self.name.as_deref().unwrap_or(&self.id);
                match resolved_user {
                    Some(name) => format!("DM: @{name}"),
                    None => format!("DM: {peer}"),
                }
            }
            ChannelKind::Mpim => format!("Group DM: {}", self.name.as_deref().unwrap_or(&self.id)),
            _ => format!("#{}", self.name.as_deref().unwrap_or(&self.id)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub real_name: Option<String>,
    pub display_name: Option<String>,
    pub is_bot: bool,
    pub metadata: serde_json::Value,
}

impl User {
    /// resolve-name := display ?? real ?? login ?? ID
    pub fn resolve_name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.real_name.as_deref())
            .or(self.name.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub key: i64,
    pub channel_id: String,
    pub ts: String,
    pub user_id: Option<String>,
    pub text: Option<String>,
    pub thread_ts: Option<String>,
    pub reply_count: i64,
    pub is_edited: bool,
    pub message_type: String,
    pub created_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

impl Message {
    pub fn is_thread_reply(&self) -> bool {
        self.thread_ts.as_deref().is_some_and(|t| t != self.ts)
    }

    pub fn is_thread_parent(&self) -> bool {
        self.reply_count > 0
    }
}

/// A message not yet persisted (no surrogate key).
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub channel_id: String,
    pub ts: String,
    pub user_id: Option<String>,
    pub text: Option<String>,
    pub thread_ts: Option<String>,
    pub reply_count: i64,
    pub is_edited: bool,
    pub message_type: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCursor {
    pub channel_id: String,
    pub last_ts: Option<String>,
    pub last_sync_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub user_id: String,
    pub text: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub complete_ts: Option<DateTime<Utc>>,
    pub recurring: bool,
}

/// Derived, suggestion-only priority hint attached by
/// `get_recent_messages_for_analysis` (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataPriority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedMessage {
    #[serde(flatten)]
    pub message: Message,
    pub is_mention: bool,
    pub is_dm: bool,
    pub is_self_dm: bool,
    pub metadata_priority: MetadataPriority,
}

/// Compares Slack-style `seconds.microseconds` timestamps as numeric
/// tuples, never as naive strings (§3). The fractional half is zero-padded
/// to a fixed 6-digit (microsecond) width before parsing, since it's a
/// fixed-width field, not an arbitrary-precision decimal: `.9` and `.10`
/// mean 900000us and 100000us, not 9 and 10.
pub fn ts_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    fn parts(ts: &str) -> (i64, i64) {
        let mut split = ts.splitn(2, '.');
        let secs = split.next().unwrap_or("0").parse().unwrap_or(0);
        let frac = split.next().unwrap_or("0");
        let micros = format!("{frac:0<6}").chars().take(6).collect::<String>().parse().unwrap_or(0);
        (secs, micros)
    }
    parts(a).cmp(&parts(b))
}

pub fn ts_gt(a: &str, b: &str) -> bool {
    ts_cmp(a, b) == std::cmp::Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ts_cmp_compares_seconds_numerically_not_lexically() {
        // Lexical comparison would get this backwards: "9" > "10" as strings.
        assert_eq!(ts_cmp("9.0", "10.0"), std::cmp::Ordering::Less);
    }

    #[test]
    fn ts_cmp_zero_pads_the_fractional_half() {
        // The fraction is a fixed-width microsecond field, not a decimal:
        // ".9" is 900000us, bigger than ".10"'s 100000us. A naive unpadded
        // integer parse of "9" vs "10" would get this backwards.
        assert_eq!(ts_cmp("1700000000.9", "1700000000.10"), std::cmp::Ordering::Greater);
    }

    #[test]
    fn ts_gt_is_false_when_equal() {
        // A cursor at the upstream's own latest hint means nothing new arrived.
        assert!(!ts_gt("1500.0", "1500.0"));
    }

    #[test]
    fn ts_gt_is_true_for_a_later_timestamp() {
        assert!(ts_gt("1500.1", "1500.0"));
        assert!(!ts_gt("1500.0", "1500.1"));
    }

    #[test]
    fn ts_cmp_treats_missing_fraction_as_zero() {
        assert_eq!(ts_cmp("1500", "1500.0"), std::cmp::Ordering::Equal);
    }
}
