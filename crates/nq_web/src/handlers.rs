use axum::{
    extract::{Path, State},
    Json,
};
use nq_core::catalog;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::error::ApiResult;
use crate::params::{parse_int, parse_non_negative};
use crate::AppState;

type Shared = State<Arc<AppState>>;

pub async fn health(State(state): Shared) -> ApiResult<Json<Value>> {
    state.store.ping().await.map_err(|e| {
        error!(backend = state.store.name(), error = %e, "health check failed");
        e
    })?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn top_keywords(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::top_keywords()).await?))
}

pub async fn top_authors(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::top_authors()).await?))
}

pub async fn top_classes(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::top_classes()).await?))
}

pub async fn articles_by_date(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::articles_by_date()).await?))
}

pub async fn articles_by_word_count(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::articles_by_word_count()).await?))
}

pub async fn articles_by_language(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::articles_by_language()).await?))
}

pub async fn articles_by_classes(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::articles_by_classes()).await?))
}

pub async fn articles_by_keyword_count(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::articles_by_keyword_count()).await?))
}

pub async fn recent_articles(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::recent_articles()).await?))
}

pub async fn longest_articles(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::longest_articles()).await?))
}

pub async fn shortest_articles(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::shortest_articles()).await?))
}

pub async fn articles_with_video(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::articles_with_video()).await?))
}

pub async fn articles_with_thumbnail(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::articles_with_thumbnail()).await?))
}

pub async fn articles_updated_after_publication(State(state): Shared) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::articles_updated_after_publication()).await?))
}

pub async fn articles_by_keyword(State(state): Shared, Path(keyword): Path<String>) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::articles_by_keyword(&keyword)).await?))
}

pub async fn articles_by_author(State(state): Shared, Path(author): Path<String>) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::articles_by_author(&author)).await?))
}

pub async fn article_details(State(state): Shared, Path(postid): Path<String>) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::article_details(&postid)).await?))
}

pub async fn articles_by_coverage(State(state): Shared, Path(coverage): Path<String>) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::articles_by_coverage(&coverage)).await?))
}

pub async fn popular_keywords_last_days(State(state): Shared, Path(days): Path<String>) -> ApiResult<Json<Value>> {
    let days = parse_non_negative("days", &days)?;
    let def = catalog::popular_keywords_last_days(days, state.clock.now())?;
    Ok(Json(state.run(def).await?))
}

pub async fn articles_by_year(State(state): Shared, Path(year): Path<String>) -> ApiResult<Json<Value>> {
    let year = parse_int("year", &year)?;
    let def = catalog::articles_by_year(year, state.clock.now())?;
    Ok(Json(state.run(def).await?))
}

pub async fn articles_by_month(
    State(state): Shared,
    Path((year, month)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let year = parse_int("year", &year)?;
    let month = parse_non_negative("month", &month)?;
    let def = catalog::articles_by_month(year, month)?;
    Ok(Json(state.run(def).await?))
}

pub async fn articles_by_word_count_range(
    State(state): Shared,
    Path((min, max)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let min: u32 = parse_non_negative("min word count", &min)?;
    let max: u32 = parse_non_negative("max word count", &max)?;
    let def = catalog::articles_by_word_count_range(min.into(), max.into())?;
    Ok(Json(state.run(def).await?))
}

pub async fn articles_with_specific_keyword_count(
    State(state): Shared,
    Path(count): Path<String>,
) -> ApiResult<Json<Value>> {
    let count = parse_non_negative("keyword count", &count)?;
    Ok(Json(state.run(catalog::articles_with_keyword_count(count)).await?))
}

pub async fn articles_by_specific_date(State(state): Shared, Path(date): Path<String>) -> ApiResult<Json<Value>> {
    Ok(Json(state.run(catalog::articles_by_specific_date(&date)?).await?))
}
