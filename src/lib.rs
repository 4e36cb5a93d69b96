pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod services;
pub mod state;

pub use app::app;
pub use error::ApiError;
pub use state::AppState;
