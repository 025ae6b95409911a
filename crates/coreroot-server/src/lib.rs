//! # coreroot-server
//!
//! HTTP surface for CoreRoot: configuration loading, tracing setup, the
//! content request pipeline and the axum router.

pub mod config;
pub mod content;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod server;
pub mod state;
pub mod views;

pub use config::{AppConfig, ConfigError};
pub use content::{ContentService, Target};
pub use error::{ApiError, ApiResult, StartupError};
pub use server::{CoreRootServer, ServerBuilder, build_app};
pub use state::AppState;
