// Exercises the cross-cutting queries (mentions, DMs, thread replies,
// analysis feed) against a real in-memory SQLite database running the
// actual schema, the same way the store's own unit tests set up fixtures.

use attendant::store::channels::ChannelOps;
use attendant::store::messages::MessageOps;
use attendant::store::models::{Channel, ChannelKind, NewMessage};
use attendant::store::queries;
use attendant::store::schema::SCHEMA;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

async fn setup() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query(SCHEMA).execute(&pool).await.unwrap();
    pool
}

fn channel(id: &str, kind: ChannelKind, is_self_dm: bool) -> Channel {
    Channel {
        id: id.to_string(),
        name: Some(id.to_string()),
        kind,
        is_archived: false,
        is_self_dm,
        created_at: None,
        metadata: json!({}),
    }
}

fn new_message(channel_id: &str, ts: &str, user_id: &str, text: &str, thread_ts: Option<&str>) -> NewMessage {
    NewMessage {
        channel_id: channel_id.to_string(),
        ts: ts.to_string(),
        user_id: Some(user_id.to_string()),
        text: Some(text.to_string()),
        thread_ts: thread_ts.map(str::to_string),
        reply_count: 0,
        is_edited: false,
        message_type: "message".to_string(),
        metadata: json!({}),
    }
}

#[tokio::test]
async fn unread_mentions_matches_literal_user_sigil() {
    let pool = setup().await;
    let channels = ChannelOps::new(pool.clone());
    let messages = MessageOps::new(pool.clone());

    channels.upsert(&channel("C1", ChannelKind::PublicChannel, false)).await.unwrap();
    messages.upsert(&new_message("C1", "1700000000.000001", "U2", "hey <@U1> look at this", None)).await.unwrap();
    messages.upsert(&new_message("C1", "1700000001.000001", "U2", "unrelated message", None)).await.unwrap();

    let mentions = queries::get_unread_mentions(&pool, "U1", None).await.unwrap();
    assert_eq!(mentions.len(), 1);
    assert!(mentions[0].text.as_deref().unwrap().contains("<@U1>"));
}

#[tokio::test]
async fn unread_mentions_respects_since_cutoff() {
    let pool = setup().await;
    let channels = ChannelOps::new(pool.clone());
    let messages = MessageOps::new(pool.clone());

    channels.upsert(&channel("C1", ChannelKind::PublicChannel, false)).await.unwrap();
    messages.upsert(&new_message("C1", "1700000000.000001", "U2", "<@U1> old mention", None)).await.unwrap();
    messages.upsert(&new_message("C1", "1800000000.000001", "U2", "<@U1> new mention", None)).await.unwrap();

    let since: DateTime<Utc> = DateTime::from_timestamp(1750000000, 0).unwrap();
    let mentions = queries::get_unread_mentions(&pool, "U1", Some(since)).await.unwrap();
    assert_eq!(mentions.len(), 1);
    assert!(mentions[0].text.as_deref().unwrap().contains("new mention"));
}

#[tokio::test]
async fn dms_are_scoped_to_im_channels() {
    let pool = setup().await;
    let channels = ChannelOps::new(pool.clone());
    let messages = MessageOps::new(pool.clone());

    channels.upsert(&channel("C1", ChannelKind::PublicChannel, false)).await.unwrap();
    channels.upsert(&channel("D1", ChannelKind::Im, false)).await.unwrap();
    messages.upsert(&new_message("C1", "1700000000.000001", "U2", "in a channel", None)).await.unwrap();
    messages.upsert(&new_message("D1", "1700000001.000001", "U2", "in a dm", None)).await.unwrap();

    let dms = queries::get_dms(&pool, None).await.unwrap();
    assert_eq!(dms.len(), 1);
    assert_eq!(dms[0].channel_id, "D1");
}

#[tokio::test]
async fn threads_with_replies_excludes_the_users_own_messages() {
    let pool = setup().await;
    let channels = ChannelOps::new(pool.clone());
    let messages = MessageOps::new(pool.clone());

    channels.upsert(&channel("C1", ChannelKind::PublicChannel, false)).await.unwrap();
    messages.upsert(&new_message("C1", "1700000000.000001", "U1", "my thread root", None)).await.unwrap();
    messages
        .upsert(&new_message("C1", "1700000001.000001", "U2", "a reply", Some("1700000000.000001")))
        .await
        .unwrap();
    messages
        .upsert(&new_message("C1", "1700000002.000001", "U1", "my own reply", Some("1700000000.000001")))
        .await
        .unwrap();

    let replies = queries::get_threads_with_replies(&pool, "U1", None).await.unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].message.user_id.as_deref(), Some("U2"));
}

#[tokio::test]
async fn recent_messages_for_analysis_tags_mentions_and_dms() {
    let pool = setup().await;
    let channels = ChannelOps::new(pool.clone());
    let messages = MessageOps::new(pool.clone());

    channels.upsert(&channel("C1", ChannelKind::PublicChannel, false)).await.unwrap();
    channels.upsert(&channel("D1", ChannelKind::Im, false)).await.unwrap();
    messages.upsert(&new_message("C1", "1700000000.000001", "U2", "<@U1> ping", None)).await.unwrap();
    messages.upsert(&new_message("D1", "1700000001.000001", "U2", "a dm", None)).await.unwrap();
    messages.upsert(&new_message("C1", "1700000002.000001", "U1", "my own message", None)).await.unwrap();

    let since: DateTime<Utc> = DateTime::from_timestamp(0, 0).unwrap();
    let annotated = queries::get_recent_messages_for_analysis(&pool, "U1", since, 50, false).await.unwrap();

    assert_eq!(annotated.len(), 2, "own message excluded when include_own_messages is false");
    let mention = annotated.iter().find(|m| m.message.channel_id == "C1").unwrap();
    assert!(mention.is_mention);
    assert!(!mention.is_dm);

    let dm = annotated.iter().find(|m| m.message.channel_id == "D1").unwrap();
    assert!(dm.is_dm);
    assert!(!dm.is_mention);
}

#[tokio::test]
async fn self_dm_is_flagged_as_self_dm_not_an_ordinary_dm() {
    let pool = setup().await;
    let channels = ChannelOps::new(pool.clone());
    let messages = MessageOps::new(pool.clone());

    channels.upsert(&channel("SELF1", ChannelKind::Im, true)).await.unwrap();
    messages.upsert(&new_message("SELF1", "1700000000.000001", "U1", "note to self", None)).await.unwrap();

    let since: DateTime<Utc> = DateTime::from_timestamp(0, 0).unwrap();
    let annotated = queries::get_recent_messages_for_analysis(&pool, "U1", since, 50, true).await.unwrap();

    assert_eq!(annotated.len(), 1);
    let note = &annotated[0];
    assert!(note.is_self_dm);
    assert!(!note.is_dm, "a self-dm must not be reported as an ordinary dm");
}

#[tokio::test]
async fn recent_messages_for_analysis_includes_own_messages_when_requested() {
    let pool = setup().await;
    let channels = ChannelOps::new(pool.clone());
    let messages = MessageOps::new(pool.clone());

    channels.upsert(&channel("C1", ChannelKind::PublicChannel, false)).await.unwrap();
    messages.upsert(&new_message("C1", "1700000000.000001", "U1", "my own message", None)).await.unwrap();

    let since: DateTime<Utc> = DateTime::from_timestamp(0, 0).unwrap();
    let annotated = queries::get_recent_messages_for_analysis(&pool, "U1", since, 50, true).await.unwrap();
    assert_eq!(annotated.len(), 1);
}

#[tokio::test]
async fn message_search_text_is_case_insensitive_substring_match() {
    let pool = setup().await;
    let channels = ChannelOps::new(pool.clone());
    let messages = MessageOps::new(pool.clone());

    channels.upsert(&channel("C1", ChannelKind::PublicChannel, false)).await.unwrap();
    messages.upsert(&new_message("C1", "1700000000.000001", "U2", "Deploy the new service", None)).await.unwrap();
    messages.upsert(&new_message("C1", "1700000001.000001", "U2", "unrelated", None)).await.unwrap();

    let hits = messages.search_text("deploy", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].text.as_deref().unwrap().contains("Deploy"));
}

#[tokio::test]
async fn upserting_the_same_message_twice_keeps_a_single_row() {
    let pool = setup().await;
    let channels = ChannelOps::new(pool.clone());
    let messages = MessageOps::new(pool.clone());

    channels.upsert(&channel("C1", ChannelKind::PublicChannel, false)).await.unwrap();
    messages.upsert(&new_message("C1", "1700000000.000001", "U2", "original text", None)).await.unwrap();
    messages.upsert(&new_message("C1", "1700000000.000001", "U2", "edited text", None)).await.unwrap();

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE channel_id = 'C1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let hits = messages.search_text("edited", 10).await.unwrap();
    assert_eq!(hits.len(), 1, "the second upsert should have replaced the row's text");
}

#[test]
fn cursor_boundary_is_strictly_greater_than() {
    assert!(queries::is_newer_than_cursor("1700000001.000000", Some("1700000000.000000")));
    assert!(!queries::is_newer_than_cursor("1700000000.000000", Some("1700000000.000000")));
    assert!(queries::is_newer_than_cursor("1700000000.000000", None));
}
