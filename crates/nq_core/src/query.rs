//! Declarative queries over the article collection.
//!
//! Backends translate these into their own query language (or evaluate them
//! directly), so the catalog never deals with store syntax.

use chrono::{DateTime, Utc};

pub type Field = &'static str;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Str(String),
    Date(DateTime<Utc>),
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(v: DateTime<Utc>) -> Self {
        Scalar::Date(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RangeEnd {
    Exclusive(Scalar),
    Inclusive(Scalar),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    And(Vec<Filter>),
    Eq { field: Field, value: Scalar },
    /// Whole-value match ignoring case.
    EqIgnoreCase { field: Field, value: String },
    /// Case-insensitive substring match. `text` is literal, never a pattern.
    Contains { field: Field, text: String },
    /// Matches when the field (or any element of an array field) is one of `values`.
    In { field: Field, values: Vec<Scalar> },
    Range { field: Field, start: Scalar, end: RangeEnd },
    /// Field exists and is not null.
    Present(Field),
    ArrayLen { field: Field, len: u32 },
    /// `left > right`, both read from the same document.
    FieldGt { left: Field, right: Field },
}

impl Filter {
    pub fn eq(field: Field, value: impl Into<Scalar>) -> Self {
        Filter::Eq { field, value: value.into() }
    }

    /// `[start, end)`
    pub fn half_open(field: Field, start: impl Into<Scalar>, end: impl Into<Scalar>) -> Self {
        Filter::Range {
            field,
            start: start.into(),
            end: RangeEnd::Exclusive(end.into()),
        }
    }

    /// `[start, end]`
    pub fn between(field: Field, start: impl Into<Scalar>, end: impl Into<Scalar>) -> Self {
        Filter::Range {
            field,
            start: start.into(),
            end: RangeEnd::Inclusive(end.into()),
        }
    }

    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut fs), f) => {
                fs.push(f);
                Filter::And(fs)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: Field,
    pub order: Order,
}

impl SortKey {
    pub fn asc(field: Field) -> Self {
        Self { field, order: Order::Asc }
    }

    pub fn desc(field: Field) -> Self {
        Self { field, order: Order::Desc }
    }
}

/// How a group stage derives the key stored in `_id`.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    Field(Field),
    /// UTC calendar day of a timestamp field, as `YYYY-MM-DD`.
    Day(Field),
    /// Length of an array field; a missing field counts as empty.
    ArrayLen(Field),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Number of rows in the group.
    Count,
    /// Value of the field on the first row reaching the group.
    First(Field),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    /// One row per element of an array field. Rows where the field is missing,
    /// null or an empty array are dropped.
    Unwind(Field),
    Group {
        key: GroupKey,
        fields: Vec<(Field, Accumulator)>,
    },
    Sort(Vec<SortKey>),
    Limit(i64),
}

pub type Pipeline = Vec<Stage>;

/// Output field written by `Accumulator::Count` in the catalog's group stages.
pub const COUNT: Field = "count";
/// Key field of grouped rows.
pub const ID: Field = "_id";

#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Option<SortKey>,
    pub limit: Option<i64>,
}

impl FindQuery {
    pub fn new(filter: Filter) -> Self {
        Self { filter, sort: None, limit: None }
    }

    pub fn sort(mut self, key: SortKey) -> Self {
        self.sort = Some(key);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Pipeline builder for the group-and-count shape shared by most breakdowns.
pub fn count_by(key: GroupKey) -> Stage {
    Stage::Group {
        key,
        fields: vec![(COUNT, Accumulator::Count)],
    }
}
