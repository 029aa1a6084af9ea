//! Health checks behind the engine's prober
//!
//! - HTTP/HTTPS: GET the URL, 2xx and 3xx are up
//! - TCP: a completed connect is up

pub mod checker;
pub mod executor;

pub use executor::CheckExecutor;
