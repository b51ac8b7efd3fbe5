//! The fixed set of queries the service answers.
//!
//! Every endpoint is a [`QueryDef`]: one store read, a result shape and a
//! policy for what an empty result means. Constructors validate their inputs
//! and fail with [`Error::Validation`] before anything reaches the store.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use tracing::{debug, error};

use crate::format::{self, CountShape, FindShape, RowShape};
use crate::query::{
    count_by, Accumulator, Filter, FindQuery, GroupKey, Pipeline, Scalar, SortKey, Stage, COUNT, ID,
};
use crate::storage::ArticleStore;
use crate::{Error, Result};

/// Length of every "top" and "recent" list.
pub const TOP_N: i64 = 10;
pub const MIN_YEAR: i32 = 1900;
/// Last year a month lookup accepts; labels and windows stay four-digit.
pub const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Find(FindQuery, FindShape),
    Aggregate(Pipeline, RowShape),
    Count(Filter, CountShape),
}

/// What an empty result means for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    /// Return the empty list or mapping as a success.
    Empty,
    /// The caller asked for something that must exist.
    NotFound(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryDef {
    pub name: &'static str,
    /// Completes "An error occurred while fetching ..." in failure messages.
    pub context: &'static str,
    pub plan: Plan,
    pub absence: Absence,
}

impl QueryDef {
    fn new(name: &'static str, context: &'static str, plan: Plan) -> Self {
        Self {
            name,
            context,
            plan,
            absence: Absence::Empty,
        }
    }

    fn or_not_found(mut self, message: &'static str) -> Self {
        self.absence = Absence::NotFound(message);
        self
    }

    pub async fn run(&self, store: &dyn ArticleStore, now: DateTime<Utc>) -> Result<Value> {
        debug!(query = self.name, backend = store.name(), plan = ?self.plan, "running query");

        let value = self.execute(store, now).await.map_err(|e| {
            error!(query = self.name, error = %e, "query failed");
            e.while_fetching(self.context)
        })?;

        if format::is_empty(&value) {
            if let Absence::NotFound(message) = self.absence {
                debug!(query = self.name, "no match");
                return Err(Error::NotFound(message.to_string()));
            }
        }
        Ok(value)
    }

    async fn execute(&self, store: &dyn ArticleStore, now: DateTime<Utc>) -> Result<Value> {
        match &self.plan {
            Plan::Find(query, shape) => {
                let articles = store.find(query).await?;
                debug!(query = self.name, rows = articles.len(), "find finished");
                Ok(format::format_articles(shape, articles, now))
            }
            Plan::Aggregate(pipeline, shape) => {
                let rows = store.aggregate(pipeline).await?;
                debug!(query = self.name, rows = rows.len(), "aggregate finished");
                Ok(format::format_rows(shape, rows))
            }
            Plan::Count(filter, shape) => {
                let count = store.count(filter).await?;
                debug!(query = self.name, count, "count finished");
                Ok(format::format_count(shape, count))
            }
        }
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn top(field: &'static str) -> Pipeline {
    vec![
        count_by(GroupKey::Field(field)),
        Stage::Sort(vec![SortKey::desc(COUNT)]),
        Stage::Limit(TOP_N),
    ]
}

fn unwound_top(field: &'static str) -> Pipeline {
    let mut pipeline = vec![Stage::Unwind(field)];
    pipeline.extend(top(field));
    pipeline
}

fn breakdown(key: GroupKey) -> Pipeline {
    vec![count_by(key), Stage::Sort(vec![SortKey::asc(ID)])]
}

fn titles(name: &'static str, context: &'static str, filter: Filter) -> QueryDef {
    QueryDef::new(name, context, Plan::Find(FindQuery::new(filter), FindShape::Titles))
}

fn labeled_count(name: &'static str, context: &'static str, filter: Filter, label: String) -> QueryDef {
    QueryDef::new(name, context, Plan::Count(filter, CountShape::Labeled { label }))
}

// --- Grouping ---

pub fn top_keywords() -> QueryDef {
    QueryDef::new(
        "top_keywords",
        "top keywords",
        Plan::Aggregate(unwound_top("keywords"), RowShape::CountList),
    )
}

pub fn top_authors() -> QueryDef {
    QueryDef::new(
        "top_authors",
        "top authors",
        Plan::Aggregate(top("author"), RowShape::CountList),
    )
}

pub fn top_classes() -> QueryDef {
    QueryDef::new(
        "top_classes",
        "top classes",
        Plan::Aggregate(unwound_top("classes"), RowShape::TaggedCountMap),
    )
    .or_not_found("No classes found.")
}

pub fn articles_by_date() -> QueryDef {
    let mut pipeline = vec![Stage::Match(Filter::Present("published_time"))];
    pipeline.extend(breakdown(GroupKey::Day("published_time")));
    QueryDef::new(
        "articles_by_date",
        "articles by date",
        Plan::Aggregate(pipeline, RowShape::CountMap { suffix: "" }),
    )
}

pub fn articles_by_word_count() -> QueryDef {
    QueryDef::new(
        "articles_by_word_count",
        "articles by word count",
        Plan::Aggregate(
            breakdown(GroupKey::Field("word_count")),
            RowShape::CountMap { suffix: " words" },
        ),
    )
}

pub fn articles_by_language() -> QueryDef {
    QueryDef::new(
        "articles_by_language",
        "articles by language",
        Plan::Aggregate(
            breakdown(GroupKey::Field("language")),
            RowShape::CountMap { suffix: "" },
        ),
    )
}

pub fn articles_by_classes() -> QueryDef {
    let mut pipeline = vec![Stage::Unwind("classes")];
    pipeline.extend(breakdown(GroupKey::Field("classes")));
    QueryDef::new(
        "articles_by_classes",
        "articles by classes",
        Plan::Aggregate(pipeline, RowShape::CountMap { suffix: "" }),
    )
}

pub fn articles_by_keyword_count() -> QueryDef {
    QueryDef::new(
        "articles_by_keyword_count",
        "articles by keyword count",
        Plan::Aggregate(breakdown(GroupKey::ArrayLen("keywords")), RowShape::KeywordCounts),
    )
}

/// Keyword frequencies over articles published in `[now - days, now]`.
pub fn popular_keywords_last_days(days: u32, now: DateTime<Utc>) -> Result<QueryDef> {
    let start = now
        .checked_sub_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| Error::validation("Number of days out of range."))?;

    let pipeline = vec![
        Stage::Match(Filter::between("published_time", start, now).and(Filter::Present("keywords"))),
        Stage::Unwind("keywords"),
        count_by(GroupKey::Field("keywords")),
        Stage::Sort(vec![SortKey::desc(COUNT)]),
    ];
    Ok(QueryDef::new(
        "popular_keywords_last_x_days",
        "popular keywords",
        Plan::Aggregate(pipeline, RowShape::KeyCountPairs),
    ))
}

// --- Ranking ---

/// Ten distinct titles with the highest word counts. Republished copies share
/// a title, so rows are grouped by title keeping the largest count.
pub fn longest_articles() -> QueryDef {
    let pipeline = vec![
        Stage::Sort(vec![SortKey::desc("word_count")]),
        Stage::Group {
            key: GroupKey::Field("title"),
            fields: vec![("word_count", Accumulator::First("word_count"))],
        },
        Stage::Sort(vec![SortKey::desc("word_count")]),
        Stage::Limit(TOP_N),
    ];
    QueryDef::new(
        "longest_articles",
        "longest articles",
        Plan::Aggregate(pipeline, RowShape::TitleWordCounts { title_field: ID }),
    )
}

pub fn shortest_articles() -> QueryDef {
    let pipeline = vec![
        Stage::Sort(vec![SortKey::asc("word_count")]),
        Stage::Limit(TOP_N),
    ];
    QueryDef::new(
        "shortest_articles",
        "shortest articles",
        Plan::Aggregate(pipeline, RowShape::TitleWordCounts { title_field: "title" }),
    )
}

pub fn recent_articles() -> QueryDef {
    let query = FindQuery::new(Filter::All)
        .sort(SortKey::desc("published_time"))
        .limit(TOP_N);
    QueryDef::new(
        "recent_articles",
        "recent articles",
        Plan::Find(query, FindShape::RecentLabels),
    )
}

// --- Lookups ---

pub fn articles_by_keyword(keyword: &str) -> QueryDef {
    titles(
        "articles_by_keyword",
        "articles by keyword",
        Filter::Contains {
            field: "title",
            text: keyword.to_string(),
        },
    )
}

pub fn articles_by_author(author: &str) -> QueryDef {
    titles(
        "articles_by_author",
        "articles by author",
        Filter::EqIgnoreCase {
            field: "author",
            value: author.to_string(),
        },
    )
    .or_not_found("No articles found for the specified author.")
}

pub fn article_details(postid: &str) -> QueryDef {
    let query = FindQuery::new(Filter::eq("postid", postid)).limit(1);
    QueryDef::new(
        "article_details",
        "article details",
        Plan::Find(query, FindShape::Details),
    )
    .or_not_found("Article not found.")
}

pub fn articles_by_coverage(coverage: &str) -> QueryDef {
    titles(
        "articles_by_coverage",
        "articles by coverage",
        Filter::In {
            field: "classes",
            values: vec![Scalar::from(coverage)],
        },
    )
}

pub fn articles_with_video() -> QueryDef {
    titles(
        "articles_with_video",
        "articles with video",
        Filter::Present("video_duration"),
    )
    .or_not_found("No articles with video found.")
}

pub fn articles_with_thumbnail() -> QueryDef {
    titles(
        "articles_with_thumbnail",
        "articles with thumbnail",
        Filter::Present("thumbnail"),
    )
}

pub fn articles_updated_after_publication() -> QueryDef {
    let filter = Filter::Present("published_time")
        .and(Filter::Present("last_updated"))
        .and(Filter::FieldGt {
            left: "last_updated",
            right: "published_time",
        });
    titles(
        "articles_updated_after_publication",
        "articles updated after publication",
        filter,
    )
}

// --- Counts ---

pub fn articles_by_year(year: i32, now: DateTime<Utc>) -> Result<QueryDef> {
    if !(MIN_YEAR..=now.year()).contains(&year) {
        return Err(Error::validation("Year out of range."));
    }
    let (start, end) = match (NaiveDate::from_ymd_opt(year, 1, 1), NaiveDate::from_ymd_opt(year + 1, 1, 1)) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(Error::validation("Year out of range.")),
    };

    Ok(QueryDef::new(
        "articles_by_year",
        "articles by year",
        Plan::Count(
            Filter::half_open("published_time", start_of_day(start), start_of_day(end)),
            CountShape::Year { year },
        ),
    ))
}

pub fn articles_by_month(year: i32, month: u32) -> Result<QueryDef> {
    if !(1..=12).contains(&month) {
        return Err(Error::validation("Month must be between 1 and 12."));
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(Error::validation("Year out of range."));
    }
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let (start, end) = match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(Error::validation("Year out of range.")),
    };

    Ok(labeled_count(
        "articles_by_month",
        "articles by month",
        Filter::half_open("published_time", start_of_day(start), start_of_day(end)),
        start.format("%B %Y").to_string(),
    ))
}

pub fn articles_by_word_count_range(min: i64, max: i64) -> Result<QueryDef> {
    if min > max {
        return Err(Error::validation(
            "Minimum word count must not exceed maximum word count.",
        ));
    }
    Ok(labeled_count(
        "articles_by_word_count_range",
        "articles by word count range",
        Filter::between("word_count", min, max),
        format!("Articles between {} and {} words", min, max),
    ))
}

pub fn articles_with_keyword_count(count: u32) -> QueryDef {
    labeled_count(
        "articles_with_specific_keyword_count",
        "articles with specific keyword count",
        Filter::ArrayLen {
            field: "keywords",
            len: count,
        },
        format!("Articles with exactly {} keywords", count),
    )
}

/// `date` must be `YYYY-MM-DD`; the label echoes it back as given.
pub fn articles_by_specific_date(date: &str) -> Result<QueryDef> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| Error::validation("Invalid date format. Expected YYYY-MM-DD."))?;
    let next = day
        .succ_opt()
        .ok_or_else(|| Error::validation("Date out of range."))?;

    Ok(labeled_count(
        "articles_by_specific_date",
        "articles by specific date",
        Filter::half_open("published_time", start_of_day(day), start_of_day(next)),
        format!("Articles published on {}", date),
    ))
}
