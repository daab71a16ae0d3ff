// src/formatting/resolver.rs
// Batch entity resolution with a TTL cache, so rendering a page of
// messages doesn't re-query the store per sigil.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::CollectedEntities;
use crate::error::StoreError;
use crate::store::Store;

/// Resolved `id -> display name` mappings, ready to hand to
/// [`super::format_text`].
#[derive(Debug, Default, Clone)]
pub struct ResolvedContext {
    pub users: HashMap<String, String>,
    pub channels: HashMap<String, String>,
}

impl ResolvedContext {
    pub fn get_user_name(&self, user_id: &str) -> String {
        self.users.get(user_id).cloned().unwrap_or_else(|| user_id.to_string())
    }

    pub fn get_channel_name(&self, channel_id: &str) -> String {
        self.channels
            .get(channel_id)
            .cloned()
            .unwrap_or_else(|| channel_id.to_string())
    }
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Resolves user/channel IDs to display names via batched store lookups,
/// caching hits for `cache_ttl` so repeated renders of the same entities
/// don't re-hit the database.
pub struct EntityResolver {
    store: std::sync::Arc<Store>,
    cache_ttl: Duration,
    user_cache: Mutex<HashMap<String, CacheEntry>>,
    channel_cache: Mutex<HashMap<String, CacheEntry>>,
}

impl EntityResolver {
    pub fn new(store: std::sync::Arc<Store>, cache_ttl_seconds: u64) -> Self {
        Self {
            store,
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
            user_cache: Mutex::new(HashMap::new()),
            channel_cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, entities: &CollectedEntities) -> Result<ResolvedContext, StoreError> {
        let now = Instant::now();

        let users = self
            .resolve_kind(&entities.user_ids, &self.user_cache, now, |ids| {
                let store = self.store.clone();
                let ids = ids.to_vec();
                async move {
                    let users = store.users.get_batch(&ids).await?;
                    Ok(users
                        .into_iter()
                        .map(|u| (u.id.clone(), u.resolve_name().to_string()))
                        .collect())
                }
            })
            .await?;

        let channels = self
            .resolve_kind(&entities.channel_ids, &self.channel_cache, now, |ids| {
                let store = self.store.clone();
                let ids = ids.to_vec();
                async move {
                    let channels = store.channels.get_batch(&ids).await?;
                    Ok(channels
                        .into_iter()
                        .map(|c| {
                            let name = c.name.clone().unwrap_or_else(|| c.id.clone());
                            (c.id.clone(), name)
                        })
                        .collect())
                }
            })
            .await?;

        Ok(ResolvedContext { users, channels })
    }

    /// Splits `ids` into cache hits and misses, fetches misses via
    /// `fetch`, backfills the cache, and falls back to the bare ID for
    /// anything the store doesn't know about.
    async fn resolve_kind<F, Fut>(
        &self,
        ids: &std::collections::HashSet<String>,
        cache: &Mutex<HashMap<String, CacheEntry>>,
        now: Instant,
        fetch: F,
    ) -> Result<HashMap<String, String>, StoreError>
    where
        F: FnOnce(&[String]) -> Fut,
        Fut: std::future::Future<Output = Result<HashMap<String, String>, StoreError>>,
    {
        let mut resolved = HashMap::new();
        let mut uncached = Vec::new();

        {
            let guard = cache.lock().await;
            for id in ids {
                match guard.get(id) {
                    Some(entry) if entry.expires_at > now => {
                        resolved.insert(id.clone(), entry.value.clone());
                    }
                    _ => uncached.push(id.clone()),
                }
            }
        }

        if !uncached.is_empty() {
            let fetched = fetch(&uncached).await?;
            let mut guard = cache.lock().await;
            for (id, name) in &fetched {
                guard.insert(
                    id.clone(),
                    CacheEntry {
                        value: name.clone(),
                        expires_at: now + self.cache_ttl,
                    },
                );
            }
            resolved.extend(fetched);
        }

        for id in ids {
            resolved.entry(id.clone()).or_insert_with(|| id.clone());
        }

        Ok(resolved)
    }
}
