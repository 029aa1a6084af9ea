use actix_web::web;
use serde::Deserialize;

mod checks;
mod dashboard;
mod health;
mod targets;

/// Upper bound for `?limit=`
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    fn limit_or(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health_route)
        .service(dashboard::index_route)
        .service(targets::list_targets)
        .service(targets::target_checks)
        .service(checks::latest_checks)
        .service(checks::recent_alerts);
}
