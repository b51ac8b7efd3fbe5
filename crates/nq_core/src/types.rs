use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const NO_TITLE: &str = "No Title";
pub const NO_URL: &str = "No URL";

/// Fields holding timestamps; the loader turns their string form into native dates.
pub const TIMESTAMP_FIELDS: &[&str] = &["published_time", "last_updated"];

/// A news article as stored in the collection. Nothing is guaranteed to be
/// present, and a field holding an unexpected type reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default, deserialize_with = "lenient")]
    pub postid: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub published_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub word_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub classes: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient")]
    pub language: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<Value>,
    #[serde(default)]
    pub video_duration: Option<Value>,
}

impl Article {
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or(NO_TITLE)
    }

    pub fn url_or_default(&self) -> &str {
        self.url.as_deref().unwrap_or(NO_URL)
    }

    pub fn word_count_or_default(&self) -> i64 {
        self.word_count.unwrap_or(0)
    }

    pub fn keywords_or_default(&self) -> &[String] {
        self.keywords.as_deref().unwrap_or(&[])
    }

    pub fn from_value(value: Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Parses the timestamp spellings found in article dumps: RFC 3339, or a
/// naive `YYYY-MM-DDTHH:MM:SS[.f]` taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Canonical string form of a timestamp: UTC, millisecond precision, `Z` suffix.
/// Strings in this form order the same way as the instants they name.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Rewrites parseable timestamp strings of a raw document into canonical form.
/// Returns how many fields were rewritten.
pub fn normalize_timestamps(doc: &mut serde_json::Map<String, Value>) -> usize {
    let mut rewritten = 0;
    for field in TIMESTAMP_FIELDS {
        if let Some(Value::String(raw)) = doc.get(*field) {
            if let Some(ts) = parse_timestamp(raw) {
                doc.insert(field.to_string(), Value::String(canonical_timestamp(&ts)));
                rewritten += 1;
            }
        }
    }
    rewritten
}
