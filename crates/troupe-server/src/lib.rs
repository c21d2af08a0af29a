//! # troupe-server
//!
//! Axum HTTP bridge over one script session.
//!
//! - JSON routes for every driving operation (`/api/*`)
//! - Background "run N rounds" task with cooperative stop
//! - `/health` and a service descriptor at `/`
//! - Permissive CORS so browser front-ends can call it directly
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod routes;
pub mod runner;
pub mod server;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, TroupeServer};
