// src/scheduler/mod.rs
// Adaptive polling loop: refresh channel metadata, decide who needs a sync,
// fan out bounded by a semaphore (§4.3).

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::store::Store;
use crate::store::models::{Channel, ChannelKind, ts_gt};
use crate::sync_worker::SyncWorker;
use crate::upstream::{ConversationInfo, UpstreamApi};

pub struct Scheduler<A: UpstreamApi> {
    upstream: Arc<A>,
    store: Arc<Store>,
    sync_worker: Arc<SyncWorker<A>>,
    config: SchedulerConfig,
    /// Cached conversation metadata, refreshed every tick; the "latest hint"
    /// a needs-sync decision is made against.
    channels_cache: HashMap<String, ConversationInfo>,
    self_user_id: String,
}

struct ChannelSyncInfo {
    channel: Channel,
    priority: i32,
}

impl<A: UpstreamApi + Send + Sync + 'static> Scheduler<A> {
    pub fn new(upstream: Arc<A>, store: Arc<Store>, sync_worker: Arc<SyncWorker<A>>, config: SchedulerConfig, self_user_id: String) -> Self {
        Self {
            upstream,
            store,
            sync_worker,
            config,
            channels_cache: HashMap::new(),
            self_user_id,
        }
    }

    /// Runs forever. Initial metadata refresh + full sync happen before the
    /// first tick so a cold start doesn't wait a whole interval.
    pub async fn run(&mut self) {
        info!(interval_s = self.config.poll_interval_seconds, "starting scheduler");

        self.refresh_channel_metadata().await;
        self.sync_channels_to_db().await;
        self.sync_all_channels().await;

        let mut ticker = time::interval(std::time::Duration::from_secs(self.config.poll_interval_seconds));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        let mut tick_count: u64 = 0;
        loop {
            ticker.tick().await;
            tick_count += 1;
            debug!(tick_count, "poll tick");

            self.refresh_channel_metadata().await;

            if tick_count % self.config.metadata_persist_every_n_ticks == 0 {
                self.sync_channels_to_db().await;
            }

            self.sync_all_channels().await;
        }
    }

    /// Lightweight: just refills the in-memory cache with fresh `latest`
    /// hints, does not touch the database.
    async fn refresh_channel_metadata(&mut self) {
        match self.upstream.list_conversations().await {
            Ok(conversations) => {
                let count = conversations.len();
                for conv in conversations {
                    self.channels_cache.insert(conv.id.clone(), conv);
                }
                debug!(count, "refreshed channel metadata");
            }
            Err(e) => warn!(error = %e, "failed to refresh channel metadata"),
        }
    }

    /// Full persist of channel rows, run less often since names/archival
    /// status change rarely.
    async fn sync_channels_to_db(&self) {
        let mut synced = 0;
        for conv in self.channels_cache.values() {
            let kind = if conv.is_im {
                ChannelKind::Im
            } else if conv.is_mpim {
                ChannelKind::Mpim
            } else if conv.is_private {
                ChannelKind::PrivateChannel
            } else {
                ChannelKind::PublicChannel
            };
            let is_self_dm = kind == ChannelKind::Im && conv.user.as_deref() == Some(self.self_user_id.as_str());

            let channel = Channel {
                id: conv.id.clone(),
                name: conv.name.clone().or_else(|| conv.user.clone()),
                kind,
                is_archived: conv.is_archived,
                is_self_dm,
                created_at: conv
                    .created
                    .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0)),
                metadata: serde_json::json!({
                    "unread_count": conv.unread_count,
                    "latest_ts": conv.latest_ts,
                }),
            };

            if let Err(e) = self.store.channels.upsert(&channel).await {
                error!(channel_id = %channel.id, error = %e, "failed to persist channel");
                continue;
            }
            if is_self_dm {
                debug!(channel_id = %channel.id, "detected self-dm channel");
            }
            synced += 1;
        }
        info!(synced, "synced channels to database");
    }

    async fn sync_all_channels(&self) {
        let to_sync = match self.channels_needing_sync().await {
            Ok(list) => list,
            Err(e) => {
                error!(error = %e, "failed to determine channels needing sync");
                return;
            }
        };

        if to_sync.is_empty() {
            debug!("no channels need syncing");
            return;
        }

        info!(count = to_sync.len(), "syncing channels with new activity");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_syncs));
        let futures = to_sync.into_iter().map(|info| {
            let semaphore = semaphore.clone();
            let worker = self.sync_worker.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                if let Err(e) = worker.sync_channel(&info.channel).await {
                    error!(channel_id = %info.channel.id, error = %e, "channel sync failed");
                }
            }
        });

        join_all(futures).await;
    }

    /// Compares each channel's cached `latest` hint against its persisted
    /// cursor; channels with no cursor or a fresher hint need a sync.
    /// Returned list is sorted by priority ascending (lower syncs first).
    async fn channels_needing_sync(&self) -> Result<Vec<ChannelSyncInfo>, crate::error::StoreError> {
        let channels = self.store.channels.get_all().await?;
        if channels.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = channels.iter().map(|c| c.id.clone()).collect();
        let cursors = self.store.cursors.get_batch(&ids).await?;

        let mut out = Vec::new();
        for channel in channels {
            let conv = self.channels_cache.get(&channel.id);
            let cursor = cursors.get(&channel.id);

            let needs_sync = match cursor.and_then(|c| c.last_ts.as_deref()) {
                None => true,
                Some("0") if conv.and_then(|c| c.latest_ts.as_deref()).is_none() => false,
                Some(last_ts) => match conv.and_then(|c| c.latest_ts.as_deref()) {
                    None => true,
                    Some(latest_ts) => ts_gt(latest_ts, last_ts),
                },
            };

            if !needs_sync {
                debug!(channel_id = %channel.id, "skipping, no new messages");
                continue;
            }

            let priority = channel_priority(&channel, conv);
            out.push(ChannelSyncInfo { channel, priority });
        }

        out.sort_by_key(|info| info.priority);
        Ok(out)
    }
}

/// Lower is higher priority: self-DM=0, DM=1, group-DM=2, unread>0=3, else 10.
fn channel_priority(channel: &Channel, conv: Option<&ConversationInfo>) -> i32 {
    if channel.is_self_dm {
        return 0;
    }
    match channel.kind {
        ChannelKind::Im => 1,
        ChannelKind::Mpim => 2,
        _ => {
            let unread = conv.map(|c| c.unread_count).unwrap_or(0);
            if unread > 0 { 3 } else { 10 }
        }
    }
}
