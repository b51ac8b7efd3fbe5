use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Collection};
use nq_core::query::{Accumulator, Filter, FindQuery, GroupKey, Order, RangeEnd, Scalar, SortKey, Stage};
use nq_core::types::{parse_timestamp, TIMESTAMP_FIELDS};
use nq_core::{Article, ArticleStore, Error, Result, Row};
use serde_json::{Number, Value};
use tracing::{debug, info};

use super::literal_pattern;
use crate::StoreConfig;

const APP_NAME: &str = "nq";

pub struct MongoStorage {
    client: Client,
    collection: Collection<Document>,
}

impl MongoStorage {
    /// Builds a pooled client. Connections are opened lazily by the driver.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.url).await.map_err(store_error)?;
        options.app_name = Some(APP_NAME.to_string());
        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.connect_timeout);

        let client = Client::with_options(options).map_err(store_error)?;
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);

        info!(database = %config.database, collection = %config.collection, "mongodb client ready");
        Ok(Self { client, collection })
    }
}

fn store_error(e: mongodb::error::Error) -> Error {
    match e.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::DnsResolve { .. } => Error::StoreUnavailable(e.to_string()),
        _ => Error::StoreQuery(e.to_string()),
    }
}

fn path(field: &str) -> String {
    format!("${}", field)
}

fn scalar(value: &Scalar) -> Bson {
    match value {
        Scalar::Int(i) => Bson::Int64(*i),
        Scalar::Str(s) => Bson::String(s.clone()),
        Scalar::Date(d) => Bson::DateTime(bson::DateTime::from_millis(d.timestamp_millis())),
    }
}

fn on_field(field: &str, condition: impl Into<Bson>) -> Document {
    let mut d = Document::new();
    d.insert(field, condition.into());
    d
}

fn case_insensitive(text: &str, whole: bool) -> Document {
    doc! { "$regex": literal_pattern(text, whole), "$options": "i" }
}

pub fn filter_doc(filter: &Filter) -> Document {
    match filter {
        Filter::All => Document::new(),
        Filter::And(filters) if filters.is_empty() => Document::new(),
        Filter::And(filters) => {
            let parts: Vec<Bson> = filters.iter().map(|f| Bson::Document(filter_doc(f))).collect();
            doc! { "$and": parts }
        }
        Filter::Eq { field, value } => on_field(field, scalar(value)),
        Filter::EqIgnoreCase { field, value } => on_field(field, case_insensitive(value, true)),
        Filter::Contains { field, text } => on_field(field, case_insensitive(text, false)),
        Filter::In { field, values } => {
            let values: Vec<Bson> = values.iter().map(scalar).collect();
            on_field(field, doc! { "$in": values })
        }
        Filter::Range { field, start, end } => {
            let mut bounds = doc! { "$gte": scalar(start) };
            match end {
                RangeEnd::Exclusive(s) => bounds.insert("$lt", scalar(s)),
                RangeEnd::Inclusive(s) => bounds.insert("$lte", scalar(s)),
            };
            on_field(field, bounds)
        }
        Filter::Present(field) => on_field(field, doc! { "$exists": true, "$ne": Bson::Null }),
        Filter::ArrayLen { field, len } => on_field(field, doc! { "$size": i64::from(*len) }),
        Filter::FieldGt { left, right } => doc! { "$expr": { "$gt": [path(left), path(right)] } },
    }
}

fn sort_doc(keys: &[SortKey]) -> Document {
    let mut d = Document::new();
    for key in keys {
        let direction = match key.order {
            Order::Asc => 1,
            Order::Desc => -1,
        };
        d.insert(key.field, direction);
    }
    d
}

fn group_key(key: &GroupKey) -> Bson {
    match key {
        GroupKey::Field(field) => Bson::String(path(field)),
        GroupKey::Day(field) => Bson::Document(doc! {
            "$dateToString": { "format": "%Y-%m-%d", "date": path(field) }
        }),
        GroupKey::ArrayLen(field) => Bson::Document(doc! {
            "$size": { "$ifNull": [path(field), []] }
        }),
    }
}

pub fn stage_doc(stage: &Stage) -> Document {
    match stage {
        Stage::Match(filter) => doc! { "$match": filter_doc(filter) },
        Stage::Unwind(field) => doc! { "$unwind": path(field) },
        Stage::Group { key, fields } => {
            let mut group = doc! { "_id": group_key(key) };
            for (name, acc) in fields {
                let expr = match acc {
                    Accumulator::Count => doc! { "$sum": 1 },
                    Accumulator::First(field) => doc! { "$first": path(field) },
                };
                group.insert(*name, expr);
            }
            doc! { "$group": group }
        }
        Stage::Sort(keys) => doc! { "$sort": sort_doc(keys) },
        Stage::Limit(n) => doc! { "$limit": *n },
    }
}

pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::Double(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(d) => Value::Object(document_to_row(d)),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or(Value::Null),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        other => other.into_relaxed_extjson(),
    }
}

pub fn document_to_row(d: Document) -> Row {
    d.into_iter().map(|(k, v)| (k, bson_to_json(v))).collect()
}

pub fn json_to_bson(value: Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Bson::Int64(i),
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Bson::String(s),
        Value::Array(items) => Bson::Array(items.into_iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(
            map.into_iter().map(|(k, v)| (k, json_to_bson(v))).collect(),
        ),
    }
}

/// Converts a raw article to BSON, storing parseable timestamps as native dates.
pub fn row_to_document(row: Row) -> Document {
    let mut d: Document = row.into_iter().map(|(k, v)| (k, json_to_bson(v))).collect();
    for field in TIMESTAMP_FIELDS {
        let parsed = d.get_str(field).ok().and_then(parse_timestamp);
        if let Some(ts) = parsed {
            d.insert(*field, Bson::DateTime(bson::DateTime::from_millis(ts.timestamp_millis())));
        }
    }
    d
}

#[async_trait]
impl ArticleStore for MongoStorage {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn find(&self, query: &FindQuery) -> Result<Vec<Article>> {
        let filter = filter_doc(&query.filter);
        let mut options = FindOptions::default();
        options.sort = query.sort.as_ref().map(|k| sort_doc(std::slice::from_ref(k)));
        options.limit = query.limit;
        debug!(%filter, "find");

        let docs: Vec<Document> = self
            .collection
            .find(filter, options)
            .await
            .map_err(store_error)?
            .try_collect()
            .await
            .map_err(store_error)?;

        docs.into_iter()
            .map(|d| Article::from_value(Value::Object(document_to_row(d))))
            .collect()
    }

    async fn aggregate(&self, pipeline: &[Stage]) -> Result<Vec<Row>> {
        let stages: Vec<Document> = pipeline.iter().map(stage_doc).collect();
        debug!(pipeline = ?stages, "aggregate");

        let docs: Vec<Document> = self
            .collection
            .aggregate(stages, None)
            .await
            .map_err(store_error)?
            .try_collect()
            .await
            .map_err(store_error)?;

        Ok(docs.into_iter().map(document_to_row).collect())
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let filter = filter_doc(filter);
        debug!(%filter, "count_documents");
        self.collection
            .count_documents(filter, None)
            .await
            .map_err(store_error)
    }

    async fn insert_many(&self, docs: Vec<Row>) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let docs: Vec<Document> = docs.into_iter().map(row_to_document).collect();
        let result = self
            .collection
            .insert_many(docs, None)
            .await
            .map_err(store_error)?;
        Ok(result.inserted_ids.len())
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
