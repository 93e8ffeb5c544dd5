use crate::domain::models::{TimerSession, TimerSettings};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::open_connection;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTimer {
    pub session: TimerSession,
    pub settings: TimerSettings,
}

pub trait TimerRepository: Send + Sync {
    fn load(&self) -> Result<Option<StoredTimer>, InfraError>;
    fn save(&self, session: &TimerSession, settings: &TimerSettings) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTimerRepository {
    db_path: PathBuf,
}

impl SqliteTimerRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        open_connection(&self.db_path)
    }
}

impl TimerRepository for SqliteTimerRepository {
    fn load(&self) -> Result<Option<StoredTimer>, InfraError> {
        let connection = self.connect()?;
        let row: Option<(String, String)> = connection
            .query_row(
                "SELECT session, settings FROM timer_state WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((session_raw, settings_raw)) = row else {
            return Ok(None);
        };

        let session = serde_json::from_str::<TimerSession>(&session_raw).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid timer_state.session: {error}"))
        })?;
        let settings = serde_json::from_str::<TimerSettings>(&settings_raw).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid timer_state.settings: {error}"))
        })?;
        Ok(Some(StoredTimer { session, settings }))
    }

    fn save(&self, session: &TimerSession, settings: &TimerSettings) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO timer_state (id, session, settings, updated_at)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
               session = excluded.session,
               settings = excluded.settings,
               updated_at = excluded.updated_at",
            params![
                serde_json::to_string(session)?,
                serde_json::to_string(settings)?,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTimerRepository {
    state: Mutex<Option<StoredTimer>>,
}

impl TimerRepository for InMemoryTimerRepository {
    fn load(&self) -> Result<Option<StoredTimer>, InfraError> {
        let state = self
            .state
            .lock()
            .map_err(|error| InfraError::State(format!("timer lock poisoned: {error}")))?;
        Ok(state.clone())
    }

    fn save(&self, session: &TimerSession, settings: &TimerSettings) -> Result<(), InfraError> {
        let mut state = self
            .state
            .lock()
            .map_err(|error| InfraError::State(format!("timer lock poisoned: {error}")))?;
        *state = Some(StoredTimer {
            session: session.clone(),
            settings: settings.clone(),
        });
        Ok(())
    }
}
