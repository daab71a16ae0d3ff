// src/store/schema.rs
// Schema bootstrap. Migrations proper are out of scope (§1); this only
// ensures a fresh database is usable standalone.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS channels (
    id          TEXT PRIMARY KEY,
    name        TEXT,
    kind        TEXT NOT NULL,
    is_archived INTEGER NOT NULL DEFAULT 0,
    is_self_dm  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT,
    updated_at  TEXT NOT NULL,
    metadata    TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY,
    name         TEXT,
    real_name    TEXT,
    display_name TEXT,
    is_bot       INTEGER NOT NULL DEFAULT 0,
    updated_at   TEXT NOT NULL,
    metadata     TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS messages (
    key          INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id   TEXT NOT NULL REFERENCES channels(id),
    ts           TEXT NOT NULL,
    user_id      TEXT,
    text         TEXT,
    thread_ts    TEXT,
    reply_count  INTEGER NOT NULL DEFAULT 0,
    is_edited    INTEGER NOT NULL DEFAULT 0,
    message_type TEXT NOT NULL DEFAULT 'message',
    created_at   TEXT,
    updated_at   TEXT NOT NULL,
    metadata     TEXT NOT NULL DEFAULT '{}',
    UNIQUE(channel_id, ts)
);

CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(channel_id, thread_ts);
CREATE INDEX IF NOT EXISTS idx_messages_user ON messages(user_id);
CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at);

CREATE TABLE IF NOT EXISTS reactions (
    message_key INTEGER NOT NULL REFERENCES messages(key) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    PRIMARY KEY (message_key, name, user_id)
);

CREATE TABLE IF NOT EXISTS sync_cursors (
    channel_id    TEXT PRIMARY KEY REFERENCES channels(id),
    last_ts       TEXT,
    last_sync_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS message_embeddings (
    message_key INTEGER PRIMARY KEY REFERENCES messages(key) ON DELETE CASCADE,
    model       TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reminders (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    text        TEXT,
    time        TEXT,
    complete_ts TEXT,
    recurring   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
"#;
