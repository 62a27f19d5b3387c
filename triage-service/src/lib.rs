pub mod config;
pub mod models;
pub mod service;
pub mod telemetry;

pub use config::ServiceConfig;
pub use service::{AppState, build_router, create_app};
pub use telemetry::{correlation_id_middleware, init_tracing};
