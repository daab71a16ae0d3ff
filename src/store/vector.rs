// src/store/vector.rs
// Vector search over message embeddings, backed by Qdrant.

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use tracing::{debug, info};

use crate::error::StoreError;

pub struct VectorStore {
    client: Qdrant,
    collection: String,
}

impl VectorStore {
    pub async fn new(url: &str, collection: &str, dim: u64) -> anyhow::Result<Self> {
        let client = Qdrant::from_url(url).skip_compatibility_check().build()?;
        let store = Self {
            client,
            collection: collection.to_string(),
        };
        store.ensure_collection(dim).await?;
        Ok(store)
    }

    async fn ensure_collection(&self, dim: u64) -> anyhow::Result<()> {
        let exists = self.client.collection_exists(&self.collection).await?;
        if !exists {
            info!(collection = %self.collection, "creating qdrant collection");
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(VectorParamsBuilder::new(dim, Distance::Cosine)),
                )
                .await?;
        }
        Ok(())
    }

    /// Replaced on model change: the point id is the message surrogate key,
    /// so re-embedding under a new model just overwrites the point.
    pub async fn upsert(&self, message_key: i64, vector: Vec<f32>, model: &str) -> Result<(), StoreError> {
        let point = PointStruct::new(
            message_key as u64,
            vector,
            [("model", model.into())].into_iter().collect::<std::collections::HashMap<_, _>>(),
        );
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]))
            .await
            .map_err(|e| StoreError::Vector(e.to_string()))?;
        Ok(())
    }

    /// `knn(queryVec, k)` using cosine similarity.
    pub async fn knn(&self, query: &[f32], k: usize) -> Result<Vec<(i64, f32)>, StoreError> {
        let results = self
            .client
            .search_points(SearchPointsBuilder::new(&self.collection, query.to_vec(), k as u64))
            .await
            .map_err(|e| StoreError::Vector(e.to_string()))?;

        let hits = results
            .result
            .into_iter()
            .filter_map(|point| {
                let id = match point.id?.point_id_options? {
                    qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => n as i64,
                    qdrant_client::qdrant::point_id::PointIdOptions::Uuid(_) => return None,
                };
                Some((id, point.score))
            })
            .collect();

        debug!(collection = %self.collection, k, "ran knn search");
        Ok(hits)
    }
}
