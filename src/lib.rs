pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::commands::AppState;
pub use application::mirror_sync::{AuthStatus, DashboardSync, MirrorView};
pub use infrastructure::error::InfraError;
