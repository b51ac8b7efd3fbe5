//! Path segments are taken as strings and parsed here, so malformed numbers
//! come back as JSON validation errors instead of extractor rejections.

use nq_core::{Error, Result};
use std::str::FromStr;

fn parse<T: FromStr>(name: &str, raw: &str, expected: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::validation(format!("Invalid {}: expected {}, got '{}'.", name, expected, raw)))
}

/// Signed integer such as a year.
pub fn parse_int<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    parse(name, raw, "an integer")
}

/// Day counts, months, word and keyword counts.
pub fn parse_non_negative<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    parse(name, raw, "a non-negative integer")
}
