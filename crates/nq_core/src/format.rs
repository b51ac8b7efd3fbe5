//! Reshapes raw store output into the JSON each endpoint promises.
//!
//! Some endpoints report counts as bare integers and others as
//! `"(N articles)"` strings. Existing clients depend on both, so each shape
//! keeps its own convention.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::dates::label_relative;
use crate::query::{Field, COUNT, ID};
use crate::storage::Row;
use crate::types::{Article, NO_TITLE};

#[derive(Debug, Clone, PartialEq)]
pub enum FindShape {
    /// `["title", ...]`
    Titles,
    /// `{"title": "Published today", ...}`
    RecentLabels,
    /// `{"URL": .., "Title": .., "Keywords": [..]}` for the first match, `null` if none.
    Details,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowShape {
    /// Rows passed through as `[{"_id": key, "count": n}, ...]`.
    CountList,
    /// `{"<key><suffix>": n, ...}`
    CountMap { suffix: &'static str },
    /// `{"<key>": "(n articles)", ...}`
    TaggedCountMap,
    /// `[{"keyword_count": k, "article_count": n}, ...]`
    KeywordCounts,
    /// `[{"<key>": n}, ...]`
    KeyCountPairs,
    /// `[{"title": .., "word_count": ..}, ...]` reading the title from `title_field`.
    TitleWordCounts { title_field: Field },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CountShape {
    /// `{"year": y, "count": n}`
    Year { year: i32 },
    /// `{"<label>": "(n articles)"}`
    Labeled { label: String },
}

pub fn articles_label(count: u64) -> String {
    format!("({} articles)", count)
}

/// Group keys become JSON object keys: strings as they are, anything else as compact JSON.
pub fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn row_int(row: &Row, field: &str) -> i64 {
    row.get(field)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

fn row_key(row: &Row) -> &Value {
    row.get(ID).unwrap_or(&Value::Null)
}

pub fn format_articles(shape: &FindShape, articles: Vec<Article>, now: DateTime<Utc>) -> Value {
    match shape {
        FindShape::Titles => Value::Array(
            articles
                .iter()
                .map(|a| Value::String(a.title_or_default().to_string()))
                .collect(),
        ),
        FindShape::RecentLabels => {
            let mut map = Map::new();
            for article in &articles {
                let published = article.published_time.unwrap_or(now);
                map.insert(
                    article.title_or_default().to_string(),
                    Value::String(label_relative(published, now)),
                );
            }
            Value::Object(map)
        }
        FindShape::Details => match articles.first() {
            Some(article) => json!({
                "URL": article.url_or_default(),
                "Title": article.title_or_default(),
                "Keywords": article.keywords_or_default(),
            }),
            None => Value::Null,
        },
    }
}

pub fn format_rows(shape: &RowShape, rows: Vec<Row>) -> Value {
    match shape {
        RowShape::CountList => Value::Array(
            rows.iter()
                .map(|row| json!({ ID: row_key(row), COUNT: row_int(row, COUNT) }))
                .collect(),
        ),
        RowShape::CountMap { suffix } => Value::Object(
            rows.iter()
                .map(|row| {
                    let key = format!("{}{}", key_string(row_key(row)), suffix);
                    (key, json!(row_int(row, COUNT)))
                })
                .collect(),
        ),
        RowShape::TaggedCountMap => Value::Object(
            rows.iter()
                .map(|row| {
                    let count = row_int(row, COUNT).max(0) as u64;
                    (key_string(row_key(row)), Value::String(articles_label(count)))
                })
                .collect(),
        ),
        RowShape::KeywordCounts => Value::Array(
            rows.iter()
                .map(|row| {
                    json!({
                        "keyword_count": row_int(row, ID),
                        "article_count": row_int(row, COUNT),
                    })
                })
                .collect(),
        ),
        RowShape::KeyCountPairs => Value::Array(
            rows.iter()
                .map(|row| {
                    let mut pair = Map::new();
                    pair.insert(key_string(row_key(row)), json!(row_int(row, COUNT)));
                    Value::Object(pair)
                })
                .collect(),
        ),
        RowShape::TitleWordCounts { title_field } => Value::Array(
            rows.iter()
                .map(|row| {
                    let title = row.get(*title_field).and_then(Value::as_str).unwrap_or(NO_TITLE);
                    json!({ "title": title, "word_count": row_int(row, "word_count") })
                })
                .collect(),
        ),
    }
}

pub fn format_count(shape: &CountShape, count: u64) -> Value {
    match shape {
        CountShape::Year { year } => json!({ "year": year, "count": count }),
        CountShape::Labeled { label } => {
            let mut map = Map::new();
            map.insert(label.clone(), Value::String(articles_label(count)));
            Value::Object(map)
        }
    }
}

/// True for `null`, `[]` and `{}`.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_count_map_with_suffix() {
        let rows = vec![
            row(json!({"_id": 120, "count": 3})),
            row(json!({"_id": 450, "count": 1})),
        ];
        let value = format_rows(&RowShape::CountMap { suffix: " words" }, rows);
        assert_eq!(value, json!({"120 words": 3, "450 words": 1}));
    }

    #[test]
    fn test_count_map_preserves_row_order() {
        let rows = vec![
            row(json!({"_id": "2024-03-01", "count": 2})),
            row(json!({"_id": "2024-03-02", "count": 5})),
            row(json!({"_id": null, "count": 1})),
        ];
        let value = format_rows(&RowShape::CountMap { suffix: "" }, rows);
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["2024-03-01", "2024-03-02", "null"]);
    }

    #[test]
    fn test_tagged_counts_are_strings() {
        let rows = vec![row(json!({"_id": "Politics", "count": 7}))];
        let value = format_rows(&RowShape::TaggedCountMap, rows);
        assert_eq!(value, json!({"Politics": "(7 articles)"}));
    }

    #[test]
    fn test_non_string_keys_are_stringified() {
        let rows = vec![row(json!({"_id": {"key": "category", "value": "news"}, "count": 2.0}))];
        let value = format_rows(&RowShape::KeyCountPairs, rows);
        assert_eq!(value, json!([{"{\"key\":\"category\",\"value\":\"news\"}": 2}]));
    }

    #[test]
    fn test_keyword_counts() {
        let rows = vec![row(json!({"_id": 0, "count": 4})), row(json!({"_id": 3, "count": 1}))];
        let value = format_rows(&RowShape::KeywordCounts, rows);
        assert_eq!(
            value,
            json!([
                {"keyword_count": 0, "article_count": 4},
                {"keyword_count": 3, "article_count": 1}
            ])
        );
    }

    #[test]
    fn test_title_word_counts_default_missing_fields() {
        let rows = vec![row(json!({"_id": "Long read", "word_count": 900})), row(json!({"_id": null}))];
        let value = format_rows(&RowShape::TitleWordCounts { title_field: ID }, rows);
        assert_eq!(
            value,
            json!([
                {"title": "Long read", "word_count": 900},
                {"title": "No Title", "word_count": 0}
            ])
        );
    }

    #[test]
    fn test_details_defaults() {
        let article = Article {
            postid: Some("42".to_string()),
            ..Default::default()
        };
        let value = format_articles(&FindShape::Details, vec![article], now());
        assert_eq!(value, json!({"URL": "No URL", "Title": "No Title", "Keywords": []}));

        let none = format_articles(&FindShape::Details, vec![], now());
        assert!(is_empty(&none));
    }

    #[test]
    fn test_recent_labels() {
        let articles = vec![
            Article {
                title: Some("Morning brief".to_string()),
                published_time: Some(Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap()),
                ..Default::default()
            },
            Article {
                title: Some("Archive".to_string()),
                published_time: Some(Utc.with_ymd_and_hms(2024, 2, 1, 6, 0, 0).unwrap()),
                ..Default::default()
            },
            Article::default(),
        ];
        let value = format_articles(&FindShape::RecentLabels, articles, now());
        assert_eq!(
            value,
            json!({
                "Morning brief": "Published today",
                "Archive": "Published on 2024-02-01",
                "No Title": "Published today",
            })
        );
    }

    #[test]
    fn test_count_shapes() {
        assert_eq!(format_count(&CountShape::Year { year: 2024 }, 12), json!({"year": 2024, "count": 12}));
        let labeled = CountShape::Labeled { label: "August 2024".to_string() };
        assert_eq!(format_count(&labeled, 0), json!({"August 2024": "(0 articles)"}));
    }
}
