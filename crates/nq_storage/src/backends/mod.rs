pub mod eval;
pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongo;

pub use memory::MemoryStorage;

#[cfg(feature = "mongodb")]
pub use mongo::MongoStorage;

/// Pattern matching `text` literally, optionally anchored to the whole value.
/// Both backends build their case-insensitive matches from this.
pub fn literal_pattern(text: &str, whole: bool) -> String {
    let escaped = regex::escape(text);
    if whole {
        format!("^{}$", escaped)
    } else {
        escaped
    }
}
