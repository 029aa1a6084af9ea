use actix_web::{HttpResponse, get, web};
use history::LibsqlHistory;

use super::LimitQuery;
use crate::error::ApiError;

#[get("/api/checks")]
pub async fn latest_checks(
    history: web::Data<LibsqlHistory>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let checks = history.latest_checks(query.limit_or(100)).await?;
    Ok(HttpResponse::Ok().json(checks))
}

#[get("/api/alerts")]
pub async fn recent_alerts(
    history: web::Data<LibsqlHistory>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let alerts = history.recent_alerts(query.limit_or(50)).await?;
    Ok(HttpResponse::Ok().json(alerts))
}
