//! HTTP boundary for the homerisk pipeline: submission intake and report
//! polling. Everything downstream of the accept-and-return-id handshake is
//! asynchronous and owned by `homerisk-core`.

pub mod errors;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use errors::{AppError, AppResult};
pub use infra::app_state::AppState;
pub use infra::config::Config;
