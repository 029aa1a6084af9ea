#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::net::SocketAddr;

use actix_web::{App, HttpServer, web};
use history::LibsqlHistory;

mod error;
mod routes;

use error::AppError;
use logger::init_tracing;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB: &str = "beacon.db";

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let addr: SocketAddr = env::var("BEACON_SERVER_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;
    let db_path = env::var("BEACON_DB").unwrap_or_else(|_| DEFAULT_DB.to_string());

    let history = LibsqlHistory::open(&db_path).await?;
    tracing::info!(%addr, db = %db_path, "Serving Beacon dashboard");

    run_server(addr, history).await
}

async fn run_server(addr: SocketAddr, history: LibsqlHistory) -> Result<(), AppError> {
    let history = web::Data::new(history);

    HttpServer::new(move || App::new().app_data(history.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}
