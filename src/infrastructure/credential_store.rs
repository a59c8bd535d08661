use crate::infrastructure::error::InfraError;
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const API_KEY_ENV_VAR: &str = "BREAKREEL_YOUTUBE_API_KEY";

/// Source of the YouTube Data API key. `Ok(None)` means no key is configured.
pub trait ApiKeySource: Send + Sync {
    fn load_api_key(&self) -> Result<Option<String>, InfraError>;
}

fn normalize_key(value: Option<String>) -> Option<String> {
    value
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

#[derive(Debug, Deserialize)]
struct EnvFile {
    #[serde(rename = "YOUTUBE_API_KEY")]
    youtube_api_key: Option<String>,
}

/// Reads `{"YOUTUBE_API_KEY": "..."}` from a JSON file next to the other configs.
#[derive(Debug, Clone)]
pub struct EnvFileApiKeySource {
    path: PathBuf,
}

impl EnvFileApiKeySource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ApiKeySource for EnvFileApiKeySource {
    fn load_api_key(&self) -> Result<Option<String>, InfraError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let parsed: EnvFile = serde_json::from_str(&raw).map_err(|error| {
            InfraError::Credential(format!("invalid {}: {error}", self.path.display()))
        })?;
        Ok(normalize_key(parsed.youtube_api_key))
    }
}

#[derive(Debug, Clone)]
pub struct KeyringApiKeySource {
    service_name: String,
    account_name: String,
}

impl KeyringApiKeySource {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    pub fn save_api_key(&self, api_key: &str) -> Result<(), InfraError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(InfraError::Credential("api key must not be empty".to_string()));
        }
        self.entry()?
            .set_password(api_key)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    pub fn delete_api_key(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

impl Default for KeyringApiKeySource {
    fn default() -> Self {
        Self::new("breakreel.youtube", "default")
    }
}

impl ApiKeySource for KeyringApiKeySource {
    fn load_api_key(&self) -> Result<Option<String>, InfraError> {
        let lookup = keyring::Entry::new(&self.service_name, &self.account_name)
            .and_then(|entry| entry.get_password());
        keyring_lookup(lookup)
    }
}

/// A host without a usable keyring backend has no stored key.
fn keyring_lookup(lookup: keyring::Result<String>) -> Result<Option<String>, InfraError> {
    match lookup {
        Ok(value) => Ok(normalize_key(Some(value))),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(keyring::Error::PlatformFailure(error) | keyring::Error::NoStorageAccess(error)) => {
            debug!("keyring unavailable, treating api key as absent: {error}");
            Ok(None)
        }
        Err(error) => Err(InfraError::Credential(error.to_string())),
    }
}

/// Looks a key up from an environment-style lookup function.
pub struct LookupApiKeySource {
    variable: String,
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl LookupApiKeySource {
    pub fn from_env() -> Self {
        Self::new(API_KEY_ENV_VAR, |name| std::env::var(name).ok())
    }

    pub fn new(
        variable: impl Into<String>,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            variable: variable.into(),
            lookup: Box::new(lookup),
        }
    }
}

impl ApiKeySource for LookupApiKeySource {
    fn load_api_key(&self) -> Result<Option<String>, InfraError> {
        Ok(normalize_key((self.lookup)(&self.variable)))
    }
}

/// First source that yields a key wins. A failing source is skipped, and its
/// error is reported only when no later source has a key.
pub struct ChainedApiKeySource {
    sources: Vec<Box<dyn ApiKeySource>>,
}

impl ChainedApiKeySource {
    pub fn new(sources: Vec<Box<dyn ApiKeySource>>) -> Self {
        Self { sources }
    }

    pub fn standard(env_json_path: impl AsRef<Path>) -> Self {
        Self::new(vec![
            Box::new(LookupApiKeySource::from_env()),
            Box::new(EnvFileApiKeySource::new(env_json_path)),
            Box::new(KeyringApiKeySource::default()),
        ])
    }
}

impl ApiKeySource for ChainedApiKeySource {
    fn load_api_key(&self) -> Result<Option<String>, InfraError> {
        let mut first_error = None;
        for source in &self.sources {
            match source.load_api_key() {
                Ok(Some(key)) => return Ok(Some(key)),
                Ok(None) => {}
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryApiKeySource {
    key: Mutex<Option<String>>,
}

impl InMemoryApiKeySource {
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Mutex::new(Some(key.into())),
        }
    }
}

impl ApiKeySource for InMemoryApiKeySource {
    fn load_api_key(&self) -> Result<Option<String>, InfraError> {
        let guard = self
            .key
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(normalize_key(guard.clone()))
    }
}
