// src/sync_worker/mod.rs
// Per-channel incremental sync: paginate oldest-first, upsert, re-emit
// thread parents for fresh reactions, advance the cursor (§4.4).

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::rate_gate::RateGate;
use crate::store::Store;
use crate::store::models::{Channel, NewMessage, Reaction, ts_gt};
use crate::upstream::{RawMessage, UpstreamApi};

pub struct SyncWorker<A: UpstreamApi> {
    upstream: Arc<A>,
    store: Arc<Store>,
    rate_gate: Arc<RateGate>,
}

impl<A: UpstreamApi> SyncWorker<A> {
    pub fn new(upstream: Arc<A>, store: Arc<Store>, rate_gate: Arc<RateGate>) -> Self {
        Self {
            upstream,
            store,
            rate_gate,
        }
    }

    /// Syncs one channel's new messages since its cursor, draining every
    /// page the upstream returns before advancing the cursor.
    pub async fn sync_channel(&self, channel: &Channel) -> anyhow::Result<()> {
        let cursor = self.store.cursors.get(&channel.id).await?;
        let oldest = cursor.as_ref().and_then(|c| c.last_ts.clone());

        let display_name = self.display_name(channel).await;
        debug!(channel = %display_name, oldest = ?oldest, "syncing channel");

        let mut newest_ts: Option<String> = None;
        let mut cursor_param: Option<String> = None;
        let mut new_count = 0u32;

        loop {
            let oldest_ref = oldest.as_deref();
            let cursor_ref = cursor_param.as_deref();
            let channel_id = channel.id.clone();

            let page = self
                .rate_gate
                .execute("conversations.history", || {
                    let upstream = self.upstream.clone();
                    let channel_id = channel_id.clone();
                    let oldest_ref = oldest_ref.map(|s| s.to_string());
                    let cursor_ref = cursor_ref.map(|s| s.to_string());
                    async move {
                        upstream
                            .channel_history(&channel_id, oldest_ref.as_deref(), cursor_ref.as_deref())
                            .await
                    }
                })
                .await?;

            if page.messages.is_empty() {
                break;
            }

            if newest_ts.is_none() {
                newest_ts = page.messages.first().map(|m| m.ts.clone());
            }

            // The upstream returns pages newest-first; process each page
            // oldest-first so user-cache and thread drills see causally
            // ordered data.
            for msg in page.messages.iter().rev() {
                if let Some(ref oldest) = oldest {
                    if !ts_gt(&msg.ts, oldest) {
                        continue;
                    }
                }

                self.persist_message(&channel.id, msg).await?;

                if msg.reply_count > 0 {
                    self.sync_thread_replies(&channel.id, &msg.ts).await?;
                }

                if let Some(ref user_id) = msg.user {
                    self.ensure_user_cached(user_id).await?;
                }

                new_count += 1;
            }

            if !page.has_more {
                break;
            }
            cursor_param = page.next_cursor;
            if cursor_param.is_none() {
                break;
            }
        }

        if new_count > 0 {
            info!(channel = %display_name, new_count, "synced new messages");
        } else {
            debug!(channel = %display_name, "no new messages");
        }

        // A page never came back with any messages: either this channel has
        // no history yet (no prior cursor either, so the sentinel applies)
        // or there was simply nothing new since the existing cursor, which
        // must not be regressed.
        let newest_ts = newest_ts.or_else(|| Some(oldest.clone().unwrap_or_else(|| "0".to_string())));

        if let Some(ts) = newest_ts {
            self.store.cursors.set(&channel.id, &ts).await?;
        }

        Ok(())
    }

    /// Re-fetches a thread (parent included) so reactions added to the
    /// parent after the fact are captured; this is the only path that can
    /// observe a parent's reactions changing post-insert.
    async fn sync_thread_replies(&self, channel_id: &str, thread_ts: &str) -> anyhow::Result<()> {
        let channel_id_owned = channel_id.to_string();
        let thread_ts_owned = thread_ts.to_string();

        let replies = self
            .rate_gate
            .execute("conversations.replies", || {
                let upstream = self.upstream.clone();
                let channel_id = channel_id_owned.clone();
                let thread_ts = thread_ts_owned.clone();
                async move { upstream.thread_replies(&channel_id, &thread_ts).await }
            })
            .await?;

        for msg in &replies {
            self.persist_message(channel_id, msg).await?;
            if let Some(ref user_id) = msg.user {
                self.ensure_user_cached(user_id).await?;
            }
        }

        Ok(())
    }

    async fn persist_message(&self, channel_id: &str, msg: &RawMessage) -> anyhow::Result<()> {
        let new_msg = NewMessage {
            channel_id: channel_id.to_string(),
            ts: msg.ts.clone(),
            user_id: msg.user.clone(),
            text: msg.text.clone(),
            thread_ts: msg.thread_ts.clone(),
            reply_count: msg.reply_count,
            is_edited: msg.is_edited,
            message_type: msg.message_type.clone(),
            metadata: serde_json::json!({}),
        };
        let key = self.store.messages.upsert(&new_msg).await?;

        if !msg.reactions.is_empty() {
            let reactions: Vec<Reaction> = msg
                .reactions
                .iter()
                .flat_map(|r| r.users.iter().map(move |u| Reaction {
                    name: r.name.clone(),
                    user_id: u.clone(),
                }))
                .collect();
            self.store.reactions.replace(key, &reactions).await?;
        }

        Ok(())
    }

    async fn ensure_user_cached(&self, user_id: &str) -> anyhow::Result<()> {
        if self.store.users.get(user_id).await?.is_some() {
            return Ok(());
        }

        let user_id_owned = user_id.to_string();
        let raw = self
            .rate_gate
            .execute("users.info", || {
                let upstream = self.upstream.clone();
                let user_id = user_id_owned.clone();
                async move { upstream.user_info(&user_id).await }
            })
            .await;

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                warn!(user_id, error = %e, "failed to fetch user info");
                return Ok(());
            }
        };

        self.store
            .users
            .upsert(&crate::store::models::User {
                id: raw.id,
                name: raw.name,
                real_name: raw.real_name,
                display_name: raw.display_name,
                is_bot: raw.is_bot,
                metadata: serde_json::json!({}),
            })
            .await?;

        Ok(())
    }

    async fn display_name(&self, channel: &Channel) -> String {
        let resolved = match channel.kind {
            crate::store::models::ChannelKind::Im => match &channel.name {
                Some(peer_id) => self
                    .store
                    .users
                    .get(peer_id)
                    .await
                    .ok()
                    .flatten()
                    .map(|u| u.resolve_name().to_string()),
                None => None,
            },
            _ => None,
        };
        channel.display_name(resolved.as_deref())
    }
}
