use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod error;
pub mod handlers;
pub mod params;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/top_keywords", get(handlers::top_keywords))
        .route("/top_authors", get(handlers::top_authors))
        .route("/top_classes", get(handlers::top_classes))
        .route("/articles_by_date", get(handlers::articles_by_date))
        .route("/articles_by_word_count", get(handlers::articles_by_word_count))
        .route("/articles_by_language", get(handlers::articles_by_language))
        .route("/articles_by_classes", get(handlers::articles_by_classes))
        .route("/articles_by_keyword_count", get(handlers::articles_by_keyword_count))
        .route("/recent_articles", get(handlers::recent_articles))
        .route("/articles_by_keyword/:keyword", get(handlers::articles_by_keyword))
        .route("/articles_by_author/:author", get(handlers::articles_by_author))
        .route("/article_details/:postid", get(handlers::article_details))
        .route("/articles_by_year/:year", get(handlers::articles_by_year))
        .route("/longest_articles", get(handlers::longest_articles))
        .route("/shortest_articles", get(handlers::shortest_articles))
        .route("/articles_with_video", get(handlers::articles_with_video))
        .route("/articles_with_thumbnail", get(handlers::articles_with_thumbnail))
        .route(
            "/articles_updated_after_publication",
            get(handlers::articles_updated_after_publication),
        )
        .route("/articles_by_coverage/:coverage", get(handlers::articles_by_coverage))
        .route(
            "/popular_keywords_last_X_days/:days",
            get(handlers::popular_keywords_last_days),
        )
        .route("/articles_by_month/:year/:month", get(handlers::articles_by_month))
        .route(
            "/articles_by_word_count_range/:min/:max",
            get(handlers::articles_by_word_count_range),
        )
        .route(
            "/articles_with_specific_keyword_count/:count",
            get(handlers::articles_with_specific_keyword_count),
        )
        .route("/articles_by_specific_date/:date", get(handlers::articles_by_specific_date))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use crate::{create_app, ApiError, AppState};
    pub use nq_core::{Clock, Error, Result, SystemClock};
}
