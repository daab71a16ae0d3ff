// src/embeddings/mod.rs
// The embedding-model host is an external pure function `text -> vector[d]`
// (§6); this module is the thin client that calls it and the backfill pass
// that keeps the vector store caught up with new messages.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::EmbeddingConfig;

const MAX_TEXT_CHARS: usize = 8000;
const MAX_BATCH_SIZE: usize = 100;
const TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dim(&self) -> usize;
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    dim: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.host.clone(),
            dim: config.dim,
        }
    }

    fn truncate(text: &str) -> &str {
        if text.len() > MAX_TEXT_CHARS {
            debug!(from = text.len(), to = MAX_TEXT_CHARS, "truncating text for embedding");
            &text[..MAX_TEXT_CHARS]
        } else {
            text
        }
    }

    async fn embed_batch_inner(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let inputs: Vec<&str> = texts.iter().map(|t| Self::truncate(t)).collect();

        let body = serde_json::json!({"model": self.model, "input": inputs});

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        let data = response["data"]
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("embedding response had no data array"))?;

        let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
        for item in data {
            let index = item["index"].as_u64().unwrap_or(0) as usize;
            let vector: Vec<f32> = item["embedding"]
                .as_array()
                .map(|values| values.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
                .unwrap_or_default();
            indexed.push((index, vector));
        }
        indexed.sort_by_key(|(i, _)| *i);

        Ok(indexed.into_iter().map(|(_, v)| v).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn dim(&self) -> usize {
        self.dim
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let text = Self::truncate(text);
        let vectors = self.embed_batch_inner(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedding response had no vector for single input"))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if texts.len() <= MAX_BATCH_SIZE {
            return self.embed_batch_inner(texts).await;
        }

        let chunks: Vec<Vec<String>> = texts.chunks(MAX_BATCH_SIZE).map(|c| c.to_vec()).collect();
        debug!(total = texts.len(), batches = chunks.len(), "embedding in parallel batches");

        let futures: Vec<_> = chunks.iter().map(|chunk| self.embed_batch_inner(chunk)).collect();
        let results = futures::future::join_all(futures).await;

        let mut all = Vec::with_capacity(texts.len());
        for result in results {
            all.extend(result?);
        }
        Ok(all)
    }
}
