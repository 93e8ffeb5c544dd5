use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const CLIENT_JSON: &str = "client.json";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8787";
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8787";

pub const API_TOKEN_ENV: &str = "DASHBOARD_API_TOKEN";
pub const SERVER_URL_ENV: &str = "DASHBOARD_SERVER_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerPolicy {
    #[serde(default)]
    pub reset_clears_cycles: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub timer: TimerPolicy,
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

impl AppConfig {
    pub fn with_overrides_from_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = optional_lookup_value(&lookup, API_TOKEN_ENV) {
            self.api_token = Some(token);
        }
        self
    }

    pub fn required_api_token(&self) -> Result<&str, InfraError> {
        self.api_token
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                InfraError::InvalidConfig(format!(
                    "apiToken is not configured (set it in {APP_JSON} or {API_TOKEN_ENV})"
                ))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_list_grace_ms")]
    pub list_grace_ms: u64,
    #[serde(default = "default_timer_settings_grace_ms")]
    pub timer_settings_grace_ms: u64,
    #[serde(default = "default_list_poll_ms")]
    pub list_poll_ms: u64,
    #[serde(default = "default_timer_poll_ms")]
    pub timer_poll_ms: u64,
    #[serde(default)]
    pub list_push_debounce_ms: u64,
    #[serde(default = "default_timer_settings_push_debounce_ms")]
    pub timer_settings_push_debounce_ms: u64,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_list_grace_ms() -> u64 {
    5000
}

fn default_timer_settings_grace_ms() -> u64 {
    3000
}

fn default_list_poll_ms() -> u64 {
    1500
}

fn default_timer_poll_ms() -> u64 {
    1000
}

fn default_timer_settings_push_debounce_ms() -> u64 {
    400
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            list_grace_ms: default_list_grace_ms(),
            timer_settings_grace_ms: default_timer_settings_grace_ms(),
            list_poll_ms: default_list_poll_ms(),
            timer_poll_ms: default_timer_poll_ms(),
            list_push_debounce_ms: 0,
            timer_settings_push_debounce_ms: default_timer_settings_push_debounce_ms(),
        }
    }
}

impl ClientConfig {
    pub fn with_overrides_from_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server_url) = optional_lookup_value(&lookup, SERVER_URL_ENV) {
            self.server_url = server_url;
        }
        self
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        url::Url::parse(&self.server_url).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid serverUrl '{}': {error}", self.server_url))
        })?;
        if self.list_poll_ms == 0 || self.timer_poll_ms == 0 {
            return Err(InfraError::InvalidConfig(
                "poll intervals must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "listenAddr": DEFAULT_LISTEN_ADDR,
                "apiToken": null,
                "timer": {
                    "resetClearsCycles": false
                }
            }),
        ),
        (
            CLIENT_JSON,
            serde_json::json!({
                "schema": 1,
                "serverUrl": DEFAULT_SERVER_URL,
                "listGraceMs": default_list_grace_ms(),
                "timerSettingsGraceMs": default_timer_settings_grace_ms(),
                "listPollMs": default_list_poll_ms(),
                "timerPollMs": default_timer_poll_ms(),
                "listPushDebounceMs": 0,
                "timerSettingsPushDebounceMs": default_timer_settings_push_debounce_ms()
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let value = read_config(&path)?;
    serde_json::from_value(value).map_err(|error| {
        InfraError::InvalidConfig(format!("invalid {}: {error}", path.display()))
    })
}

pub fn load_client_config(config_dir: &Path) -> Result<ClientConfig, InfraError> {
    let path = config_dir.join(CLIENT_JSON);
    let value = read_config(&path)?;
    let config: ClientConfig = serde_json::from_value(value).map_err(|error| {
        InfraError::InvalidConfig(format!("invalid {}: {error}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

fn optional_lookup_value<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
