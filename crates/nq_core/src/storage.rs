use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::query::{Filter, FindQuery, Stage};
use crate::types::Article;
use crate::Result;

/// A row produced by an aggregation pipeline.
pub type Row = Map<String, Value>;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Short backend name, used in logs
    fn name(&self) -> &'static str;

    /// Fetch matching articles, honouring the query's sort and limit
    async fn find(&self, query: &FindQuery) -> Result<Vec<Article>>;

    /// Run a pipeline over the whole collection
    async fn aggregate(&self, pipeline: &[Stage]) -> Result<Vec<Row>>;

    /// Count matching articles
    async fn count(&self, filter: &Filter) -> Result<u64>;

    /// Insert raw documents as they are, returning how many were written
    async fn insert_many(&self, docs: Vec<Map<String, Value>>) -> Result<usize>;

    /// Round-trip to the store to prove it is reachable
    async fn ping(&self) -> Result<()>;
}
