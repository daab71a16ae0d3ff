// src/agent/prompt.rs
// System prompt assembly (§4.5). The template is fixed; callers fill in the
// variable sections (session continuity, emoji conventions, user context,
// custom rules, remembered facts).

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a personal workspace assistant. You help your user stay on top of \
their messages by watching a synced copy of their workspace and answering \
questions about what needs attention.

You have seven tools:
- analyze_messages: your PRIMARY tool. Pulls recent messages (mentions, DMs, \
  thread replies) with full context so you can judge what actually matters. \
  Prefer this over get_status for anything but a quick numeric check.
- get_status: a legacy summary of unread mentions, DMs, and thread replies \
  bucketed by priority. Still useful for a fast "how many things are \
  waiting" answer, but analyze_messages gives you more to reason with.
- search: hybrid search (semantic + text) over the synced message history.
- get_thread: fetch a full thread by channel/ts or by a message link.
- find_context: find messages related to a given one by semantic similarity.
- manage_preferences: read or edit the user's custom rules, remembered \
  facts, and emoji acknowledgment patterns.
- manage_session: track what you've already reviewed, deferred, or acted on \
  this session, and save a running summary of what's happened.

Priority guidance: direct mentions and DMs are usually CRITICAL or HIGH, but \
content can override that. A self-DM note that says "remind me, this is \
urgent" should be treated as CRITICAL even though it's self-authored — trust \
the words over the channel. Something already replied to in-thread drops to \
LOW regardless of who it's from.

{session_context}

{emoji_patterns}

{user_context}

{custom_rules}

{remembered_facts}

Use manage_session to mark items you've reviewed, deferred, or acted on so \
you don't re-surface them next time, and to record a summary before the \
conversation ends. Be concise. Don't pad answers with filler — tell the \
user what matters and why."#;

const NO_USER_CONTEXT: &str = "No specific user context.";
const NO_CUSTOM_RULES: &str = "No custom prioritization rules defined.";
const NO_REMEMBERED_FACTS: &str = "No remembered facts.";
const NO_SESSION_CONTEXT: &str = "This is a fresh session with no prior history.";
const NO_EMOJI_PATTERNS: &str = "No custom emoji acknowledgment patterns defined.";

pub const INITIAL_STATUS_PROMPT: &str =
    "Give me a quick rundown of what needs my attention right now, using analyze_messages.";

pub const RESUME_STATUS_PROMPT: &str =
    "I'm resuming this session. Based on what we covered before, is there anything new or still pending?";

/// Fills in the system prompt template. Any empty section falls back to a
/// fixed placeholder sentence so the model never sees a blank heading.
#[allow(clippy::too_many_arguments)]
pub fn build_system_prompt(
    session_context: &str,
    emoji_patterns: &str,
    user_context: &str,
    custom_rules: &str,
    remembered_facts: &str,
) -> String {
    let session_context = non_empty_or(session_context, NO_SESSION_CONTEXT);
    let emoji_patterns = non_empty_or(emoji_patterns, NO_EMOJI_PATTERNS);
    let user_context = non_empty_or(user_context, NO_USER_CONTEXT);
    let custom_rules = non_empty_or(custom_rules, NO_CUSTOM_RULES);
    let remembered_facts = non_empty_or(remembered_facts, NO_REMEMBERED_FACTS);

    SYSTEM_PROMPT_TEMPLATE
        .replace("{session_context}", session_context)
        .replace("{emoji_patterns}", emoji_patterns)
        .replace("{user_context}", user_context)
        .replace("{custom_rules}", custom_rules)
        .replace("{remembered_facts}", remembered_facts)
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

/// Renders the session-continuity section fed into [`build_system_prompt`].
pub fn format_session_context(focus: Option<&str>, summary: Option<&str>, age_hours: f64) -> String {
    if summary.is_none() && focus.is_none() {
        return String::new();
    }
    let mut lines = vec![format!(
        "Session context (started {:.1}h ago):",
        age_hours
    )];
    if let Some(summary) = summary {
        lines.push(format!("- Summary so far: {}", summary));
    }
    if let Some(focus) = focus {
        lines.push(format!("- Current focus: {}", focus));
    }
    lines.join("\n")
}

/// Renders the emoji-pattern section fed into [`build_system_prompt`].
pub fn format_emoji_patterns(patterns: &[crate::persistence::preferences::EmojiPattern]) -> String {
    if patterns.is_empty() {
        return String::new();
    }
    let mut lines = vec!["Emoji communication patterns:".to_string()];
    for p in patterns {
        let handled = if p.marks_as_handled { ", marks as handled" } else { "" };
        lines.push(format!(
            "- :{}: means \"{}\"{} (priority adjustment: {:+})",
            p.emoji, p.meaning, handled, p.priority_delta
        ));
    }
    lines.join("\n")
}
