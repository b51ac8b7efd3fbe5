use nq_core::{ArticleStore, Clock, QueryDef, Result};
use serde_json::Value;
use std::sync::Arc;

pub struct AppState {
    pub store: Arc<dyn ArticleStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Arc<dyn ArticleStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn run(&self, def: QueryDef) -> Result<Value> {
        def.run(self.store.as_ref(), self.clock.now()).await
    }
}
