//! In-process document store for tests and dry runs.

use crate::storage::documents::DocumentStore;
use anyhow::anyhow;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<BTreeMap<(String, String), Map<String, Value>>>,
    merges: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful merge-writes so far.
    pub fn merge_count(&self) -> usize {
        self.merges.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, collection: &str, doc_id: &str) -> anyhow::Result<Option<Value>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("memory store: reads disabled"));
        }
        let docs = self.docs.lock().map_err(|_| anyhow!("memory store poisoned"))?;
        Ok(docs
            .get(&(collection.to_string(), doc_id.to_string()))
            .cloned()
            .map(Value::Object))
    }

    async fn merge(
        &self,
        collection: &str,
        doc_id: &str,
        patch: Map<String, Value>,
    ) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("memory store: writes disabled"));
        }
        let mut docs = self.docs.lock().map_err(|_| anyhow!("memory store poisoned"))?;
        let doc = docs
            .entry((collection.to_string(), doc_id.to_string()))
            .or_default();
        doc.extend(patch);
        self.merges.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn latest_id(&self, collection: &str) -> anyhow::Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("memory store: reads disabled"));
        }
        let docs = self.docs.lock().map_err(|_| anyhow!("memory store poisoned"))?;
        Ok(docs
            .keys()
            .filter(|(c, _)| c == collection)
            .map(|(_, id)| id.clone())
            .max())
    }
}
