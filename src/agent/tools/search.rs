// src/agent/tools/search.rs
// `search` — hybrid search over the synced message history: vector k-NN
// over the query's embedding, unioned with a plain substring match, and
// optionally the upstream's own search endpoint, merged by score and
// deduplicated by message (§4.5, §4.2). No upstream Python source file
// exists for this tool's service (`services/search.py` isn't present in
// the retrieved original source — only `embeddings.py` and `status.py`
// are), so this is grounded directly in the spec's algorithm description
// plus the concrete primitives already built: `VectorStore::knn`,
// `MessageOps::search_text`, and `UpstreamApi::search_messages`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use super::Tool;
use crate::agent::state::AgentState;
use crate::formatting::format_text;
use crate::store::models::Message;

const DEFAULT_LIMIT: i64 = 20;
const VECTOR_K: usize = 40;
const TEXT_SCORE: f32 = 0.5;
const UPSTREAM_SCORE: f32 = 0.4;

#[derive(Debug, Serialize)]
struct SearchHit {
    channel_id: String,
    channel: String,
    message_ts: String,
    user: String,
    text: String,
    score: f32,
    source: &'static str,
}

pub struct SearchTool {
    state: Arc<AgentState>,
}

impl SearchTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &'static str {
        "search"
    }

    fn description(&self) -> &'static str {
        "Hybrid search over synced message history: semantic similarity plus plain text \
         matching, merged by relevance."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "limit": {"type": "integer", "description": "Maximum results. Defaults to 20."},
                "use_upstream_search": {"type": "boolean", "description": "Also query the upstream API's own search, for messages not yet synced. Defaults to false."}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value) -> anyhow::Result<Value> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("query is required"))?;
        let limit = input.get("limit").and_then(Value::as_i64).unwrap_or(DEFAULT_LIMIT);
        let use_upstream_search = input.get("use_upstream_search").and_then(Value::as_bool).unwrap_or(false);

        // Ranked by key so a vector hit and a text hit for the same
        // message merge into the higher of the two scores.
        let mut ranked: HashMap<i64, (Message, f32, &'static str)> = HashMap::new();

        if let Ok(query_vec) = self.state.embeddings.embed(query).await {
            if let Ok(hits) = self.state.store.vectors.knn(&query_vec, VECTOR_K).await {
                for (key, score) in hits {
                    if let Some(message) = self.state.store.messages.get_by_key(key).await? {
                        ranked
                            .entry(key)
                            .and_modify(|(_, s, _)| *s = s.max(score))
                            .or_insert((message, score, "semantic"));
                    }
                }
            }
        }

        for message in self.state.store.messages.search_text(query, limit * 2).await? {
            ranked
                .entry(message.key)
                .and_modify(|(_, s, _)| *s = s.max(TEXT_SCORE))
                .or_insert((message, TEXT_SCORE, "text"));
        }

        let mut upstream_hits: Vec<SearchHit> = Vec::new();
        if use_upstream_search {
            if let Ok(raw_hits) = self.state.upstream.search_messages(query, limit as usize).await {
                // The upstream search surface carries no channel id, so
                // these can't be merged into the store-backed, channel-aware
                // set above; surfaced as a separate, unresolved bucket.
                upstream_hits = raw_hits
                    .into_iter()
                    .map(|raw| SearchHit {
                        channel_id: String::new(),
                        channel: "unknown".to_string(),
                        message_ts: raw.ts,
                        user: raw.user.unwrap_or_else(|| "unknown".to_string()),
                        text: raw.text.unwrap_or_default(),
                        score: UPSTREAM_SCORE,
                        source: "upstream",
                    })
                    .collect();
            }
        }

        let mut entities = crate::formatting::CollectedEntities::default();
        for (message, _, _) in ranked.values() {
            entities.merge(crate::formatting::collect_entities(message.text.as_deref()));
            if let Some(uid) = &message.user_id {
                entities.user_ids.insert(uid.clone());
            }
            entities.channel_ids.insert(message.channel_id.clone());
        }
        let context = self.state.resolver.resolve(&entities).await?;

        let mut hits: Vec<SearchHit> = ranked
            .into_values()
            .map(|(message, score, source)| SearchHit {
                channel_id: message.channel_id.clone(),
                channel: context.get_channel_name(&message.channel_id),
                message_ts: message.ts.clone(),
                user: message
                    .user_id
                    .as_deref()
                    .map(|id| context.get_user_name(id))
                    .unwrap_or_else(|| "unknown".to_string()),
                text: format_text(message.text.as_deref(), &context),
                score,
                source,
            })
            .collect();

        hits.extend(upstream_hits);
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        hits.truncate(limit as usize);

        Ok(json!({ "count": hits.len(), "results": hits }))
    }
}
