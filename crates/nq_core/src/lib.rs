pub mod catalog;
pub mod dates;
pub mod error;
pub mod format;
pub mod query;
pub mod storage;
pub mod types;

pub use catalog::QueryDef;
pub use dates::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use storage::{ArticleStore, Row};
pub use types::Article;

pub mod prelude {
    pub use crate::query::{Filter, FindQuery, Scalar, SortKey, Stage};
    pub use crate::{Article, ArticleStore, Error, Result, Row};
}
