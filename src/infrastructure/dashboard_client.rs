use crate::domain::models::{
    DashboardSettings, SettingsPatch, TimerAction, TimerActionRequest, TimerSettingsUpdate,
    TimerSnapshot,
};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn fetch_settings(&self, token: &str) -> Result<DashboardSettings, InfraError>;

    async fn push_settings(
        &self,
        token: &str,
        patch: &SettingsPatch,
    ) -> Result<DashboardSettings, InfraError>;

    async fn fetch_timer(&self, token: &str) -> Result<TimerSnapshot, InfraError>;

    async fn push_timer_settings(
        &self,
        token: &str,
        update: &TimerSettingsUpdate,
    ) -> Result<TimerSnapshot, InfraError>;

    async fn send_timer_action(
        &self,
        token: &str,
        action: TimerAction,
    ) -> Result<TimerSnapshot, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestDashboardClient {
    client: Client,
    base_url: Url,
}

impl ReqwestDashboardClient {
    pub fn new(server_url: &str) -> Result<Self, InfraError> {
        let base_url = Url::parse(server_url).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid server url '{server_url}': {error}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(InfraError::InvalidConfig(format!(
                "server url cannot be a base: {server_url}"
            )));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("server url cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            path.push("api");
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn ensure_token(token: &str) -> Result<(), InfraError> {
        if token.trim().is_empty() {
            return Err(InfraError::Unauthorized("no api token available".to_string()));
        }
        Ok(())
    }

    async fn send_json<T>(&self, request: RequestBuilder, context: &str) -> Result<T, InfraError>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("{context}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Network(format!("{context}: failed reading body: {error}")))?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> InfraError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(serde_json::Value::as_str)
                .map(ToOwned::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_string());

    if status == StatusCode::UNAUTHORIZED {
        return InfraError::Unauthorized(message);
    }
    InfraError::Http {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl DashboardApi for ReqwestDashboardClient {
    async fn fetch_settings(&self, token: &str) -> Result<DashboardSettings, InfraError> {
        Self::ensure_token(token)?;
        let request = self.client.get(self.endpoint(&["settings"])?).bearer_auth(token);
        self.send_json(request, "fetch settings").await
    }

    async fn push_settings(
        &self,
        token: &str,
        patch: &SettingsPatch,
    ) -> Result<DashboardSettings, InfraError> {
        Self::ensure_token(token)?;
        let request = self
            .client
            .post(self.endpoint(&["settings"])?)
            .bearer_auth(token)
            .json(patch);
        self.send_json(request, "push settings").await
    }

    async fn fetch_timer(&self, token: &str) -> Result<TimerSnapshot, InfraError> {
        Self::ensure_token(token)?;
        let request = self.client.get(self.endpoint(&["timer"])?).bearer_auth(token);
        self.send_json(request, "fetch timer").await
    }

    async fn push_timer_settings(
        &self,
        token: &str,
        update: &TimerSettingsUpdate,
    ) -> Result<TimerSnapshot, InfraError> {
        Self::ensure_token(token)?;
        let request = self
            .client
            .post(self.endpoint(&["timer", "settings"])?)
            .bearer_auth(token)
            .json(update);
        self.send_json(request, "push timer settings").await
    }

    async fn send_timer_action(
        &self,
        token: &str,
        action: TimerAction,
    ) -> Result<TimerSnapshot, InfraError> {
        Self::ensure_token(token)?;
        let request = self
            .client
            .post(self.endpoint(&["timer", "action"])?)
            .bearer_auth(token)
            .json(&TimerActionRequest { action });
        self.send_json(request, "timer action").await
    }
}
