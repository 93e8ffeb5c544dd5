use crate::application::commands::AppState;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub app: Arc<AppState>,
    pub api_token: Arc<str>,
}

impl ApiState {
    pub fn new(app: Arc<AppState>, api_token: &str) -> Self {
        Self {
            app,
            api_token: Arc::from(api_token.trim()),
        }
    }
}
