use crate::domain::cooldown::DEFAULT_BREAK_COOLDOWN_MINUTES;
use crate::domain::models::DisplayMode;
use crate::domain::schedule::{ScheduleZone, SchedulePolicy, DEFAULT_BREAK_MINUTES, DEFAULT_WORK_MINUTES};
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const POLICIES_JSON: &str = "policies.json";
pub const ENV_JSON: &str = "env.json";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub app_name: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub display_mode: DisplayMode,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl AppSettings {
    pub fn schedule_zone(&self) -> Result<ScheduleZone, InfraError> {
        ScheduleZone::parse(self.timezone.as_deref()).map_err(InfraError::InvalidConfig)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Policies {
    pub break_minutes: Vec<u32>,
    pub work_minutes: Vec<u32>,
    pub break_cooldown_minutes: i64,
    pub retry: RetrySettings,
    pub rate_limit_interval_ms: u64,
    pub items_page_size: u32,
    pub max_item_pages: u32,
}

impl Policies {
    pub fn schedule(&self) -> SchedulePolicy {
        SchedulePolicy {
            break_minutes: self.break_minutes.clone(),
            work_minutes: self.work_minutes.clone(),
        }
    }

    fn validate(&self, path: &Path) -> Result<(), InfraError> {
        self.schedule()
            .validate()
            .map_err(|message| InfraError::InvalidConfig(format!("{message} in {}", path.display())))?;
        if self.break_cooldown_minutes < 0 {
            return Err(InfraError::InvalidConfig(format!(
                "breakCooldownMinutes must be >= 0 in {}",
                path.display()
            )));
        }
        if !(1..=50).contains(&self.items_page_size) {
            return Err(InfraError::InvalidConfig(format!(
                "itemsPageSize must be within 1..=50 in {}",
                path.display()
            )));
        }
        Ok(())
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "BreakReel",
                "timezone": null,
                "displayMode": "tab",
                "apiBaseUrl": DEFAULT_API_BASE_URL
            }),
        ),
        (
            POLICIES_JSON,
            serde_json::json!({
                "schema": 1,
                "breakMinutes": DEFAULT_BREAK_MINUTES,
                "workMinutes": DEFAULT_WORK_MINUTES,
                "breakCooldownMinutes": DEFAULT_BREAK_COOLDOWN_MINUTES,
                "retry": {
                    "maxAttempts": 3,
                    "baseDelayMs": 1000
                },
                "rateLimitIntervalMs": 1000,
                "itemsPageSize": 50,
                "maxItemPages": 1
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

fn read_typed<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, InfraError> {
    let value = read_config(path)?;
    serde_json::from_value(value)
        .map_err(|error| InfraError::InvalidConfig(format!("{error} in {}", path.display())))
}

pub fn read_app_settings(config_dir: &Path) -> Result<AppSettings, InfraError> {
    let path = config_dir.join(APP_JSON);
    let settings: AppSettings = read_typed(&path)?;
    settings.schedule_zone()?;
    Ok(settings)
}

pub fn read_policies(config_dir: &Path) -> Result<Policies, InfraError> {
    let path = config_dir.join(POLICIES_JSON);
    let policies: Policies = read_typed(&path)?;
    policies.validate(&path)?;
    Ok(policies)
}
