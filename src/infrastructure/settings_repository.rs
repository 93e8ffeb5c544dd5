use crate::domain::models::DashboardSettings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::open_connection;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait SettingsRepository: Send + Sync {
    fn load(&self) -> Result<Option<DashboardSettings>, InfraError>;
    fn save(&self, settings: &DashboardSettings) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSettingsRepository {
    db_path: PathBuf,
}

impl SqliteSettingsRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        open_connection(&self.db_path)
    }
}

impl SettingsRepository for SqliteSettingsRepository {
    fn load(&self) -> Result<Option<DashboardSettings>, InfraError> {
        let connection = self.connect()?;
        let payload: Option<String> = connection
            .query_row(
                "SELECT payload FROM dashboard_settings WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        let settings = serde_json::from_str::<DashboardSettings>(&payload).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid dashboard_settings.payload: {error}"))
        })?;
        Ok(Some(settings))
    }

    fn save(&self, settings: &DashboardSettings) -> Result<(), InfraError> {
        let payload = serde_json::to_string(settings)?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO dashboard_settings (id, payload, updated_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
               payload = excluded.payload,
               updated_at = excluded.updated_at",
            params![payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySettingsRepository {
    settings: Mutex<Option<DashboardSettings>>,
}

impl SettingsRepository for InMemorySettingsRepository {
    fn load(&self) -> Result<Option<DashboardSettings>, InfraError> {
        let settings = self
            .settings
            .lock()
            .map_err(|error| InfraError::State(format!("settings lock poisoned: {error}")))?;
        Ok(settings.clone())
    }

    fn save(&self, settings: &DashboardSettings) -> Result<(), InfraError> {
        let mut stored = self
            .settings
            .lock()
            .map_err(|error| InfraError::State(format!("settings lock poisoned: {error}")))?;
        *stored = Some(settings.clone());
        Ok(())
    }
}
