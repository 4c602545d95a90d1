//! Postgres-backed document store. Each document is one JSONB row; merge-writes use
//! `body || patch`, which replaces only the top-level keys present in the patch.

use crate::storage::documents::DocumentStore;
use anyhow::Context;
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: sqlx::PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DocumentStore for PgDocumentStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn read(&self, collection: &str, doc_id: &str) -> anyhow::Result<Option<Value>> {
        sqlx::query_scalar::<_, Value>(
            "SELECT body FROM documents WHERE collection = $1 AND doc_id = $2",
        )
        .persistent(false)
        .bind(collection)
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("read {collection}/{doc_id} failed"))
    }

    async fn merge(
        &self,
        collection: &str,
        doc_id: &str,
        patch: Map<String, Value>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO documents (collection, doc_id, body, updated_at) \
             VALUES ($1, $2, $3, now()) \
             ON CONFLICT (collection, doc_id) DO UPDATE \
               SET body = documents.body || EXCLUDED.body, updated_at = now()",
        )
        .persistent(false)
        .bind(collection)
        .bind(doc_id)
        .bind(Value::Object(patch))
        .execute(&self.pool)
        .await
        .with_context(|| format!("merge {collection}/{doc_id} failed"))?;
        Ok(())
    }

    async fn latest_id(&self, collection: &str) -> anyhow::Result<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT doc_id FROM documents WHERE collection = $1 ORDER BY doc_id DESC LIMIT 1",
        )
        .persistent(false)
        .bind(collection)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("latest id in {collection} failed"))
    }
}
