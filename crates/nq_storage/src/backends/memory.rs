use async_trait::async_trait;
use nq_core::query::{Filter, FindQuery, Stage};
use nq_core::types::normalize_timestamps;
use nq_core::{Article, ArticleStore, Result, Row};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::eval;

/// Documents held in insertion order, which stands in for natural database order.
#[derive(Debug, Default)]
pub struct MemoryCollection {
    docs: Vec<Row>,
}

impl MemoryCollection {
    pub fn insert_many(&mut self, docs: Vec<Row>) -> usize {
        let inserted = docs.len();
        for mut doc in docs {
            normalize_timestamps(&mut doc);
            self.docs.push(doc);
        }
        inserted
    }

    pub fn find(&self, query: &FindQuery) -> Result<Vec<Article>> {
        let mut rows = eval::filter_rows(&self.docs, &query.filter)?;
        if let Some(key) = &query.sort {
            eval::sort(&mut rows, std::slice::from_ref(key));
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit.max(0) as usize);
        }
        rows.into_iter()
            .map(|row| Article::from_value(Value::Object(row)))
            .collect()
    }

    pub fn aggregate(&self, pipeline: &[Stage]) -> Result<Vec<Row>> {
        eval::run_pipeline(self.docs.clone(), pipeline)
    }

    pub fn count(&self, filter: &Filter) -> Result<u64> {
        let mut count = 0;
        for doc in &self.docs {
            if eval::matches(doc, filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Process-local store evaluating queries itself. Timestamps are kept as
/// canonical RFC 3339 strings so they compare and sort chronologically.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    collection: Arc<RwLock<MemoryCollection>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.collection.read().await.len()
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn find(&self, query: &FindQuery) -> Result<Vec<Article>> {
        self.collection.read().await.find(query)
    }

    async fn aggregate(&self, pipeline: &[Stage]) -> Result<Vec<Row>> {
        self.collection.read().await.aggregate(pipeline)
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        self.collection.read().await.count(filter)
    }

    async fn insert_many(&self, docs: Vec<Row>) -> Result<usize> {
        Ok(self.collection.write().await.insert_many(docs))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
