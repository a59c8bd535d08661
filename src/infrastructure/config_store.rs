use crate::domain::models::{ExtensionConfig, PomodoroStatus, Versioned};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::open_connection;
use chrono::Utc;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const CONFIG_KEY: &str = "extension_config";
const STATUS_KEY: &str = "pomodoro_status";
const MAX_UPDATE_ATTEMPTS: usize = 5;

/// Versioned key-value persistence for [`ExtensionConfig`].
///
/// Version 0 means the config was never written. Every successful
/// [`ConfigStore::compare_and_swap`] bumps the version by one, and a write
/// based on a stale version fails with [`InfraError::Conflict`].
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<Versioned<ExtensionConfig>, InfraError>;
    fn compare_and_swap(&self, expected_version: u64, config: &ExtensionConfig) -> Result<u64, InfraError>;
    fn load_status(&self) -> Result<Option<PomodoroStatus>, InfraError>;
    fn save_status(&self, status: PomodoroStatus) -> Result<(), InfraError>;
}

/// Read-modify-write under compare-and-swap. On conflict the closure is
/// re-applied to the freshly stored config, so concurrent edits merge.
pub fn update_config<S, T, F>(store: &S, mut apply: F) -> Result<T, InfraError>
where
    S: ConfigStore + ?Sized,
    F: FnMut(&mut ExtensionConfig) -> Result<T, InfraError>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let current = store.load()?;
        let mut next = current.value.clone();
        let outcome = apply(&mut next)?;
        next.validate().map_err(InfraError::InvalidConfig)?;
        if next == current.value {
            return Ok(outcome);
        }

        match store.compare_and_swap(current.version, &next) {
            Ok(_) => return Ok(outcome),
            Err(InfraError::Conflict { expected, actual }) if attempt < MAX_UPDATE_ATTEMPTS => {
                debug!("config write conflict (expected {expected}, found {actual}); retrying");
            }
            Err(error) => return Err(error),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteConfigStore {
    db_path: PathBuf,
}

impl SqliteConfigStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        open_connection(&self.db_path)
    }

    fn read_entry(connection: &Connection, key: &str) -> Result<Option<(String, u64)>, InfraError> {
        let row: Option<(String, i64)> = connection
            .query_row(
                "SELECT value, version FROM kv_store WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row.map(|(value, version)| (value, version.max(0) as u64)))
    }

    fn stored_version(connection: &Connection) -> Result<u64, InfraError> {
        Ok(Self::read_entry(connection, CONFIG_KEY)?
            .map(|(_, version)| version)
            .unwrap_or(0))
    }
}

impl ConfigStore for SqliteConfigStore {
    fn load(&self) -> Result<Versioned<ExtensionConfig>, InfraError> {
        let connection = self.connect()?;
        let Some((raw, version)) = Self::read_entry(&connection, CONFIG_KEY)? else {
            return Ok(Versioned {
                version: 0,
                value: ExtensionConfig::default(),
            });
        };

        let value = serde_json::from_str(&raw).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid stored extension config: {error}"))
        })?;
        Ok(Versioned { version, value })
    }

    fn compare_and_swap(&self, expected_version: u64, config: &ExtensionConfig) -> Result<u64, InfraError> {
        let connection = self.connect()?;
        let payload = serde_json::to_string(config)?;
        let now = Utc::now().to_rfc3339();

        let changed = if expected_version == 0 {
            connection.execute(
                "INSERT INTO kv_store (key, value, version, updated_at)
                 VALUES (?1, ?2, 1, ?3)
                 ON CONFLICT(key) DO NOTHING",
                params![CONFIG_KEY, payload, now],
            )?
        } else {
            connection.execute(
                "UPDATE kv_store
                 SET value = ?1, version = version + 1, updated_at = ?2
                 WHERE key = ?3 AND version = ?4",
                params![payload, now, CONFIG_KEY, expected_version as i64],
            )?
        };

        if changed == 1 {
            return Ok(expected_version + 1);
        }
        Err(InfraError::Conflict {
            expected: expected_version,
            actual: Self::stored_version(&connection)?,
        })
    }

    fn load_status(&self) -> Result<Option<PomodoroStatus>, InfraError> {
        let connection = self.connect()?;
        Ok(Self::read_entry(&connection, STATUS_KEY)?
            .and_then(|(raw, _)| PomodoroStatus::parse(&raw)))
    }

    fn save_status(&self, status: PomodoroStatus) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO kv_store (key, value, version, updated_at)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               version = kv_store.version + 1,
               updated_at = excluded.updated_at",
            params![STATUS_KEY, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    entries: Mutex<HashMap<&'static str, (String, u64)>>,
}

impl InMemoryConfigStore {
    pub fn with_config(config: &ExtensionConfig) -> Result<Self, InfraError> {
        let store = Self::default();
        store.compare_and_swap(0, config)?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<&'static str, (String, u64)>>, InfraError> {
        self.entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("config store lock poisoned: {error}")))
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load(&self) -> Result<Versioned<ExtensionConfig>, InfraError> {
        let entries = self.lock()?;
        match entries.get(CONFIG_KEY) {
            None => Ok(Versioned {
                version: 0,
                value: ExtensionConfig::default(),
            }),
            Some((raw, version)) => Ok(Versioned {
                version: *version,
                value: serde_json::from_str(raw)?,
            }),
        }
    }

    fn compare_and_swap(&self, expected_version: u64, config: &ExtensionConfig) -> Result<u64, InfraError> {
        let mut entries = self.lock()?;
        let actual = entries.get(CONFIG_KEY).map(|(_, version)| *version).unwrap_or(0);
        if actual != expected_version {
            return Err(InfraError::Conflict {
                expected: expected_version,
                actual,
            });
        }
        let next = expected_version + 1;
        entries.insert(CONFIG_KEY, (serde_json::to_string(config)?, next));
        Ok(next)
    }

    fn load_status(&self) -> Result<Option<PomodoroStatus>, InfraError> {
        let entries = self.lock()?;
        Ok(entries
            .get(STATUS_KEY)
            .and_then(|(raw, _)| PomodoroStatus::parse(raw)))
    }

    fn save_status(&self, status: PomodoroStatus) -> Result<(), InfraError> {
        let mut entries = self.lock()?;
        let version = entries.get(STATUS_KEY).map(|(_, version)| *version).unwrap_or(0);
        entries.insert(STATUS_KEY, (status.as_str().to_string(), version + 1));
        Ok(())
    }
}
