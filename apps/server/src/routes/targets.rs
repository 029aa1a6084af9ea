use actix_web::{HttpResponse, get, web};
use beacon::TargetId;
use history::LibsqlHistory;

use super::LimitQuery;
use crate::error::ApiError;

/// Persisted state of every target
#[get("/api/targets")]
pub async fn list_targets(history: web::Data<LibsqlHistory>) -> Result<HttpResponse, ApiError> {
    let states = history.states().await?;
    Ok(HttpResponse::Ok().json(states))
}

/// Recent checks of one target, newest first
#[get("/api/targets/{name}/checks")]
pub async fn target_checks(
    history: web::Data<LibsqlHistory>,
    name: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let target = TargetId::new(name.into_inner());
    let checks = history.recent_checks(&target, query.limit_or(50)).await?;
    Ok(HttpResponse::Ok().json(checks))
}
