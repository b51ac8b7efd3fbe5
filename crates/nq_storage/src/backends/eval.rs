//! Evaluates the query IR over JSON documents, following the document
//! database's semantics closely enough for the catalog's queries: array fields
//! match element-wise, missing values order before everything else, unwinding
//! drops rows without elements.

use std::cmp::Ordering;
use std::collections::HashMap;

use nq_core::query::{Accumulator, Filter, GroupKey, Order, RangeEnd, Scalar, SortKey, Stage, ID};
use nq_core::types::parse_timestamp;
use nq_core::{Error, Result, Row};
use regex::{Regex, RegexBuilder};
use serde_json::Value;

use super::literal_pattern;

fn case_insensitive(text: &str, whole: bool) -> Result<Regex> {
    RegexBuilder::new(&literal_pattern(text, whole))
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::StoreQuery(format!("Invalid pattern: {}", e)))
}

/// The value itself, or its elements when it is an array.
fn elements(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn compare_scalar(value: &Value, scalar: &Scalar) -> Option<Ordering> {
    match (value, scalar) {
        (Value::Number(n), Scalar::Int(i)) => match n.as_i64() {
            Some(v) => Some(v.cmp(i)),
            None => n.as_f64()?.partial_cmp(&(*i as f64)),
        },
        (Value::String(s), Scalar::Str(t)) => Some(s.as_str().cmp(t.as_str())),
        (Value::String(s), Scalar::Date(d)) => parse_timestamp(s).map(|ts| ts.cmp(d)),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order over optional JSON values: by type first, then by value.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let by_type = type_rank(a).cmp(&type_rank(b));
    if by_type != Ordering::Equal {
        return by_type;
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or(0.0)
                .partial_cmp(&y.as_f64().unwrap_or(0.0))
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        _ => Ordering::Equal,
    }
}

pub fn matches(doc: &Row, filter: &Filter) -> Result<bool> {
    let matched = match filter {
        Filter::All => true,
        Filter::And(filters) => {
            for f in filters {
                if !matches(doc, f)? {
                    return Ok(false);
                }
            }
            true
        }
        Filter::Eq { field, value } => doc.get(*field).map_or(false, |v| {
            elements(v)
                .into_iter()
                .any(|e| compare_scalar(e, value) == Some(Ordering::Equal))
        }),
        Filter::In { field, values } => doc.get(*field).map_or(false, |v| {
            elements(v).into_iter().any(|e| {
                values
                    .iter()
                    .any(|s| compare_scalar(e, s) == Some(Ordering::Equal))
            })
        }),
        Filter::EqIgnoreCase { field, value } => {
            let re = case_insensitive(value, true)?;
            string_match(doc.get(*field), &re)
        }
        Filter::Contains { field, text } => {
            let re = case_insensitive(text, false)?;
            string_match(doc.get(*field), &re)
        }
        Filter::Range { field, start, end } => doc.get(*field).map_or(false, |v| {
            let lower = matches!(
                compare_scalar(v, start),
                Some(Ordering::Greater | Ordering::Equal)
            );
            let upper = match end {
                RangeEnd::Exclusive(s) => compare_scalar(v, s) == Some(Ordering::Less),
                RangeEnd::Inclusive(s) => {
                    matches!(compare_scalar(v, s), Some(Ordering::Less | Ordering::Equal))
                }
            };
            lower && upper
        }),
        Filter::Present(field) => !matches!(doc.get(*field), None | Some(Value::Null)),
        Filter::ArrayLen { field, len } => {
            matches!(doc.get(*field), Some(Value::Array(items)) if items.len() == *len as usize)
        }
        Filter::FieldGt { left, right } => {
            compare_values(doc.get(*left), doc.get(*right)) == Ordering::Greater
        }
    };
    Ok(matched)
}

fn string_match(value: Option<&Value>, re: &Regex) -> bool {
    value.map_or(false, |v| {
        elements(v)
            .into_iter()
            .any(|e| e.as_str().map_or(false, |s| re.is_match(s)))
    })
}

fn group_key(row: &Row, key: &GroupKey) -> Result<Value> {
    match key {
        GroupKey::Field(field) => Ok(row.get(*field).cloned().unwrap_or(Value::Null)),
        GroupKey::Day(field) => Ok(row
            .get(*field)
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .map(|ts| Value::String(ts.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null)),
        GroupKey::ArrayLen(field) => match row.get(*field) {
            None | Some(Value::Null) => Ok(Value::from(0)),
            Some(Value::Array(items)) => Ok(Value::from(items.len())),
            Some(other) => Err(Error::StoreQuery(format!(
                "The argument to $size must be an array, found {} in '{}'",
                other, field
            ))),
        },
    }
}

fn group(rows: Vec<Row>, key: &GroupKey, fields: &[(&'static str, Accumulator)]) -> Result<Vec<Row>> {
    let mut groups: Vec<Row> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let id = group_key(&row, key)?;
        let slot = *index.entry(id.to_string()).or_insert_with(|| {
            let mut out = Row::new();
            out.insert(ID.to_string(), id.clone());
            for (name, acc) in fields {
                let initial = match acc {
                    Accumulator::Count => Value::from(0),
                    Accumulator::First(field) => row.get(*field).cloned().unwrap_or(Value::Null),
                };
                out.insert(name.to_string(), initial);
            }
            groups.push(out);
            groups.len() - 1
        });

        for (name, acc) in fields {
            if let Accumulator::Count = acc {
                let count = groups[slot].get(*name).and_then(Value::as_u64).unwrap_or(0);
                groups[slot].insert(name.to_string(), Value::from(count + 1));
            }
        }
    }
    Ok(groups)
}

fn unwind(rows: Vec<Row>, field: &str) -> Vec<Row> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match row.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for item in items {
                    let mut copy = row.clone();
                    copy.insert(field.to_string(), item.clone());
                    out.push(copy);
                }
            }
            Some(_) => out.push(row),
        }
    }
    out
}

pub fn sort(rows: &mut [Row], keys: &[SortKey]) {
    rows.sort_by(|a, b| {
        keys.iter()
            .map(|k| {
                let ord = compare_values(a.get(k.field), b.get(k.field));
                match k.order {
                    Order::Asc => ord,
                    Order::Desc => ord.reverse(),
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

pub fn filter_rows<'a>(rows: impl IntoIterator<Item = &'a Row>, filter: &Filter) -> Result<Vec<Row>> {
    let mut out = Vec::new();
    for row in rows {
        if matches(row, filter)? {
            out.push(row.clone());
        }
    }
    Ok(out)
}

pub fn run_pipeline(mut rows: Vec<Row>, pipeline: &[Stage]) -> Result<Vec<Row>> {
    for stage in pipeline {
        rows = match stage {
            Stage::Match(filter) => filter_rows(rows.iter(), filter)?,
            Stage::Unwind(field) => unwind(rows, field),
            Stage::Group { key, fields } => group(rows, key, fields)?,
            Stage::Sort(keys) => {
                sort(&mut rows, keys);
                rows
            }
            Stage::Limit(n) => {
                rows.truncate((*n).max(0) as usize);
                rows
            }
        };
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use nq_core::query::{count_by, COUNT};
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_contains_is_literal_and_case_insensitive() {
        let doc = row(json!({"title": "Why A+B matters"}));
        let hit = Filter::Contains { field: "title", text: "a+b".to_string() };
        assert!(matches(&doc, &hit).unwrap());

        let doc = row(json!({"title": "aab"}));
        assert!(!matches(&doc, &hit).unwrap());

        let dot = Filter::Contains { field: "title", text: ".".to_string() };
        assert!(!matches(&row(json!({"title": "no punctuation"})), &dot).unwrap());
    }

    #[test]
    fn test_eq_ignore_case_is_whole_value() {
        let f = Filter::EqIgnoreCase { field: "author", value: "jane doe".to_string() };
        assert!(matches(&row(json!({"author": "Jane Doe"})), &f).unwrap());
        assert!(!matches(&row(json!({"author": "Jane Doe Jr"})), &f).unwrap());
        assert!(!matches(&row(json!({})), &f).unwrap());
    }

    #[test]
    fn test_in_matches_array_elements() {
        let f = Filter::In { field: "classes", values: vec![Scalar::from("Lebanon")] };
        assert!(matches(&row(json!({"classes": ["Politics", "Lebanon"]})), &f).unwrap());
        assert!(matches(&row(json!({"classes": "Lebanon"})), &f).unwrap());
        assert!(!matches(&row(json!({"classes": ["Politics"]})), &f).unwrap());
    }

    #[test]
    fn test_half_open_date_range() {
        let start = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 8, 2, 0, 0, 0).unwrap();
        let f = Filter::half_open("published_time", start, end);

        assert!(matches(&row(json!({"published_time": "2024-08-01T00:00:00.000Z"})), &f).unwrap());
        assert!(matches(&row(json!({"published_time": "2024-08-01T23:59:59.999Z"})), &f).unwrap());
        assert!(!matches(&row(json!({"published_time": "2024-08-02T00:00:00.000Z"})), &f).unwrap());
        assert!(!matches(&row(json!({"published_time": null})), &f).unwrap());
    }

    #[test]
    fn test_present_and_array_len() {
        assert!(matches(&row(json!({"thumbnail": "x.jpg"})), &Filter::Present("thumbnail")).unwrap());
        assert!(!matches(&row(json!({"thumbnail": null})), &Filter::Present("thumbnail")).unwrap());

        let two = Filter::ArrayLen { field: "keywords", len: 2 };
        assert!(matches(&row(json!({"keywords": ["a", "b"]})), &two).unwrap());
        assert!(!matches(&row(json!({"keywords": ["a"]})), &two).unwrap());
        assert!(!matches(&row(json!({})), &two).unwrap());
    }

    #[test]
    fn test_field_gt() {
        let f = Filter::FieldGt { left: "last_updated", right: "published_time" };
        let later = row(json!({
            "published_time": "2024-08-01T10:00:00.000Z",
            "last_updated": "2024-08-01T12:00:00.000Z",
        }));
        let same = row(json!({
            "published_time": "2024-08-01T10:00:00.000Z",
            "last_updated": "2024-08-01T10:00:00.000Z",
        }));
        assert!(matches(&later, &f).unwrap());
        assert!(!matches(&same, &f).unwrap());
    }

    #[test]
    fn test_unwind_group_sort() {
        let rows = vec![
            row(json!({"keywords": ["gaza", "lebanon"]})),
            row(json!({"keywords": ["gaza"]})),
            row(json!({"keywords": []})),
            row(json!({"title": "no keywords"})),
        ];
        let pipeline = vec![
            Stage::Unwind("keywords"),
            count_by(GroupKey::Field("keywords")),
            Stage::Sort(vec![SortKey::desc(COUNT)]),
        ];
        let out = run_pipeline(rows, &pipeline).unwrap();
        assert_eq!(
            out,
            vec![
                row(json!({"_id": "gaza", "count": 2})),
                row(json!({"_id": "lebanon", "count": 1})),
            ]
        );
    }

    #[test]
    fn test_group_by_day_and_array_len() {
        let rows = vec![
            row(json!({"published_time": "2024-08-01T23:00:00.000Z", "keywords": ["a"]})),
            row(json!({"published_time": "2024-08-01T01:00:00.000Z"})),
            row(json!({"published_time": "2024-08-02T01:00:00.000Z", "keywords": ["a", "b"]})),
        ];
        let by_day = run_pipeline(rows.clone(), &[count_by(GroupKey::Day("published_time"))]).unwrap();
        assert_eq!(by_day[0], row(json!({"_id": "2024-08-01", "count": 2})));
        assert_eq!(by_day[1], row(json!({"_id": "2024-08-02", "count": 1})));

        let by_len = run_pipeline(
            rows,
            &[count_by(GroupKey::ArrayLen("keywords")), Stage::Sort(vec![SortKey::asc(ID)])],
        )
        .unwrap();
        let keys: Vec<_> = by_len.iter().map(|r| r[ID].clone()).collect();
        assert_eq!(keys, vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn test_size_of_non_array_fails() {
        let rows = vec![row(json!({"keywords": "gaza"}))];
        let result = run_pipeline(rows, &[count_by(GroupKey::ArrayLen("keywords"))]);
        assert!(matches!(result, Err(Error::StoreQuery(_))));
    }

    #[test]
    fn test_first_accumulator_keeps_first_row() {
        let rows = vec![
            row(json!({"title": "A", "word_count": 900})),
            row(json!({"title": "A", "word_count": 300})),
        ];
        let pipeline = vec![Stage::Group {
            key: GroupKey::Field("title"),
            fields: vec![("word_count", Accumulator::First("word_count"))],
        }];
        let out = run_pipeline(rows, &pipeline).unwrap();
        assert_eq!(out, vec![row(json!({"_id": "A", "word_count": 900}))]);
    }

    #[test]
    fn test_missing_values_sort_first() {
        let mut rows = vec![
            row(json!({"word_count": 10})),
            row(json!({})),
            row(json!({"word_count": 2})),
        ];
        sort(&mut rows, &[SortKey::asc("word_count")]);
        assert_eq!(rows[0].get("word_count"), None);
        assert_eq!(rows[1]["word_count"], 2);
    }
}
