use crate::infrastructure::config::{ensure_default_configs, read_app_settings, read_policies, ENV_JSON};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub database_path: PathBuf,
    pub env_json_path: PathBuf,
    pub player_page_path: PathBuf,
}

impl WorkspacePaths {
    pub fn new(workspace_root: &Path) -> Self {
        let config_dir = workspace_root.join("config");
        let state_dir = workspace_root.join("state");
        Self {
            env_json_path: config_dir.join(ENV_JSON),
            database_path: state_dir.join("breakreel.sqlite"),
            player_page_path: state_dir.join("player.html"),
            logs_dir: workspace_root.join("logs"),
            config_dir,
            state_dir,
        }
    }
}

/// Creates the workspace layout, writes missing default configs, validates
/// them and applies the database schema. Safe to run repeatedly.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<WorkspacePaths, InfraError> {
    let paths = WorkspacePaths::new(workspace_root);

    fs::create_dir_all(&paths.config_dir)?;
    fs::create_dir_all(&paths.state_dir)?;
    fs::create_dir_all(&paths.logs_dir)?;

    ensure_default_configs(&paths.config_dir)?;
    read_app_settings(&paths.config_dir)?;
    read_policies(&paths.config_dir)?;
    initialize_database(&paths.database_path)?;

    Ok(paths)
}
