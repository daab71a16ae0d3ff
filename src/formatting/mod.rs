// src/formatting/mod.rs
// Sigil parsing/rendering and message-link parse/format (§4.6).

pub mod resolver;

use std::collections::HashSet;

use regex::Regex;
use std::sync::LazyLock;

pub use resolver::{EntityResolver, ResolvedContext};

static USER_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@([UW][A-Z0-9]+)(?:\|[^>]*)?>").unwrap());
static CHANNEL_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<#([C][A-Z0-9]+)(?:\|([^>]*))?>").unwrap());
static URL_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(https?://[^|>]+)(?:\|([^>]+))?>").unwrap());
static SPECIAL_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!(here|channel|everyone)(?:\|[^>]*)?>").unwrap());
static TEAM_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!subteam\^([A-Z0-9]+)(?:\|([^>]+))?>").unwrap());
static HTML_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&(amp|lt|gt|nbsp|quot);").unwrap());

fn decode_entity(name: &str) -> &'static str {
    match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "nbsp" => " ",
        "quot" => "\"",
        _ => unreachable!("HTML_ENTITY only matches the five names above"),
    }
}

/// Entity IDs referenced by a message's sigils that need resolving to
/// human-readable names before rendering.
#[derive(Debug, Default, Clone)]
pub struct CollectedEntities {
    pub user_ids: HashSet<String>,
    pub channel_ids: HashSet<String>,
}

impl CollectedEntities {
    pub fn merge(&mut self, other: CollectedEntities) {
        self.user_ids.extend(other.user_ids);
        self.channel_ids.extend(other.channel_ids);
    }

    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty() && self.channel_ids.is_empty()
    }
}

/// Scans `text` for sigils and collects the IDs that need resolution.
/// Channel links carrying an explicit name (`<#C123|general>`) don't need
/// a lookup, so only bare ones contribute to `channel_ids`.
pub fn collect_entities(text: Option<&str>) -> CollectedEntities {
    let mut entities = CollectedEntities::default();
    let Some(text) = text else {
        return entities;
    };

    for cap in USER_MENTION.captures_iter(text) {
        entities.user_ids.insert(cap[1].to_string());
    }
    for cap in CHANNEL_LINK.captures_iter(text) {
        if cap.get(2).is_none() {
            entities.channel_ids.insert(cap[1].to_string());
        }
    }

    entities
}

/// Renders Slack-style markup to human-readable text, in the exact
/// substitution order the upstream uses: user mention, channel link, URL,
/// special mention, team mention, then HTML entity decode last.
pub fn format_text(text: Option<&str>, context: &ResolvedContext) -> String {
    let Some(text) = text else {
        return String::new();
    };

    let result = USER_MENTION.replace_all(text, |caps: &regex::Captures| {
        format!("@{}", context.get_user_name(&caps[1]))
    });

    let result = CHANNEL_LINK.replace_all(&result, |caps: &regex::Captures| match caps.get(2) {
        Some(explicit) => format!("#{}", explicit.as_str()),
        None => format!("#{}", context.get_channel_name(&caps[1])),
    });

    let result = URL_LINK.replace_all(&result, |caps: &regex::Captures| {
        caps.get(2).map(|l| l.as_str().to_string()).unwrap_or_else(|| caps[1].to_string())
    });

    let result = SPECIAL_MENTION.replace_all(&result, "@$1");

    let result = TEAM_MENTION.replace_all(&result, |caps: &regex::Captures| {
        caps.get(2).map(|l| l.as_str().to_string()).unwrap_or_else(|| "@team".to_string())
    });

    HTML_ENTITY
        .replace_all(&result, |caps: &regex::Captures| decode_entity(&caps[1]))
        .into_owned()
}

/// Builds a permalink for a message, scoping it to a thread when the
/// message isn't itself the thread root.
pub fn format_message_link(link_host: &str, channel_id: &str, message_ts: &str, thread_ts: Option<&str>) -> String {
    let ts_formatted = message_ts.replace('.', "");
    let mut link = format!("https://{link_host}/archives/{channel_id}/p{ts_formatted}");
    if let Some(thread_ts) = thread_ts {
        if thread_ts != message_ts {
            link.push_str(&format!("?thread_ts={}", thread_ts.replace('.', "")));
        }
    }
    link
}

/// Splits a URL-ish string into `(scheme, netloc, path, query)`, enough to
/// mirror what `urlparse` gives the original parser without pulling in a
/// full URL crate for two link shapes.
fn split_url(link: &str) -> (String, String, String, String) {
    let (scheme, rest) = match link.split_once(':') {
        Some((s, r)) => (s.to_string(), r.to_string()),
        None => (String::new(), link.to_string()),
    };

    let (authority_and_path, query) = match rest.split_once('?') {
        Some((a, q)) => (a.to_string(), q.to_string()),
        None => (rest, String::new()),
    };

    if let Some(stripped) = authority_and_path.strip_prefix("//") {
        let (netloc, path) = match stripped.split_once('/') {
            Some((n, p)) => (n.to_string(), format!("/{p}")),
            None => (stripped.to_string(), String::new()),
        };
        (scheme, netloc, path, query)
    } else {
        (scheme, String::new(), authority_and_path, query)
    }
}

/// Parses either a `.../archives/<channel>/p<digits>` permalink or a
/// `<scheme>:?id=<channel>&message=<ts>` deep link back into
/// `(channel_id, message_ts)`.
pub fn parse_message_link(link: &str) -> Option<(String, String)> {
    let (scheme, netloc, path, query) = split_url(link);

    if netloc.contains("slack.com") || path.starts_with("/archives/") {
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        if parts.len() >= 3 && parts[0] == "archives" {
            let channel_id = parts[1].to_string();
            let ts_part = parts[2];
            if let Some(ts_digits) = ts_part.strip_prefix('p') {
                if ts_digits.len() > 6 {
                    let split_at = ts_digits.len() - 6;
                    let message_ts = format!("{}.{}", &ts_digits[..split_at], &ts_digits[split_at..]);
                    return Some((channel_id, message_ts));
                }
            }
        }
        return None;
    }

    if scheme == "slack" && !query.is_empty() {
        let mut channel_id = None;
        let mut message_ts = None;
        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                match key {
                    "id" => channel_id = Some(value.to_string()),
                    "message" => message_ts = Some(value.to_string()),
                    _ => {}
                }
            }
        }
        if let (Some(channel_id), Some(message_ts)) = (channel_id, message_ts) {
            return Some((channel_id, message_ts));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn context() -> ResolvedContext {
        ResolvedContext {
            users: HashMap::from([("U123".to_string(), "alice".to_string())]),
            channels: HashMap::from([("C456".to_string(), "general".to_string())]),
        }
    }

    #[test]
    fn collects_bare_user_and_channel_mentions() {
        let entities = collect_entities(Some("hey <@U123> check <#C456>"));
        assert!(entities.user_ids.contains("U123"));
        assert!(entities.channel_ids.contains("C456"));
    }

    #[test]
    fn channel_link_with_explicit_name_is_not_collected() {
        let entities = collect_entities(Some("see <#C456|general>"));
        assert!(entities.channel_ids.is_empty());
    }

    #[test]
    fn format_text_resolves_mentions_and_decodes_entities() {
        let rendered = format_text(Some("<@U123> said hi &amp; bye in <#C456>"), &context());
        assert_eq!(rendered, "@alice said hi & bye in #general");
    }

    #[test]
    fn format_text_prefers_explicit_channel_name() {
        let rendered = format_text(Some("see <#C456|random>"), &context());
        assert_eq!(rendered, "#random");
    }

    #[test]
    fn format_text_renders_special_and_team_mentions() {
        let rendered = format_text(Some("<!channel> and <!subteam^S1|eng-team>"), &context());
        assert_eq!(rendered, "@channel and @eng-team");
    }

    #[test]
    fn format_message_link_omits_thread_ts_for_root_message() {
        let link = format_message_link("slack.com", "C456", "1700000000.000100", Some("1700000000.000100"));
        assert_eq!(link, "https://slack.com/archives/C456/p1700000000000100");
    }

    #[test]
    fn format_message_link_includes_thread_ts_for_reply() {
        let link = format_message_link("slack.com", "C456", "1700000001.000200", Some("1700000000.000100"));
        assert_eq!(link, "https://slack.com/archives/C456/p1700000001000200?thread_ts=1700000000000100");
    }

    #[test]
    fn parse_message_link_roundtrips_archive_permalink() {
        let link = format_message_link("slack.com", "C456", "1700000000.000100", None);
        let parsed = parse_message_link(&link).unwrap();
        assert_eq!(parsed, ("C456".to_string(), "1700000000.000100".to_string()));
    }

    #[test]
    fn parse_message_link_handles_deep_link() {
        let parsed = parse_message_link("slack://channel?id=C456&message=1700000000.000100").unwrap();
        assert_eq!(parsed, ("C456".to_string(), "1700000000.000100".to_string()));
    }

    #[test]
    fn parse_message_link_rejects_unrelated_url() {
        assert_eq!(parse_message_link("https://example.com/not-a-slack-link"), None);
    }
}
