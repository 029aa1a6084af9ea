use std::fmt::Write;

use actix_web::{HttpResponse, get, web};
use beacon::CheckResult;
use history::LibsqlHistory;

use crate::error::ApiError;

const RECENT_CHECKS: usize = 100;

/// Plain HTML table of the most recent checks
#[get("/")]
pub async fn index_route(history: web::Data<LibsqlHistory>) -> Result<HttpResponse, ApiError> {
    let checks = history.latest_checks(RECENT_CHECKS).await?;
    Ok(HttpResponse::Ok().content_type("text/html; charset=utf-8").body(render(&checks)))
}

fn render(checks: &[CheckResult]) -> String {
    let mut html = String::from(
        "<html><head><meta charset='utf-8'><title>Beacon</title></head><body>\
         <h1>Beacon - recent checks</h1><table border='1' cellpadding='6'>\
         <tr><th>Name</th><th>Address</th><th>Status</th><th>Code</th><th>Latency ms</th><th>Time</th></tr>",
    );

    for check in checks {
        let status = if check.is_success() { "UP" } else { "DOWN" };
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(check.target.as_str()),
            escape(&check.address),
            status,
            check.status_code.map(|c| c.to_string()).unwrap_or_default(),
            check.latency_ms.map(|l| l.to_string()).unwrap_or_default(),
            check.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    }

    html.push_str("</table></body></html>");
    html
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
