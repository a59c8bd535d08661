use crate::application::backoff::RetryPolicy;
use crate::application::bootstrap::{bootstrap_workspace, WorkspacePaths};
use crate::application::dispatcher::{ActionDispatcher, TickContext, TickOutcome};
use crate::application::item_pool::ItemPool;
use crate::application::playlist_resolver::PlaylistResolver;
use crate::application::rate_limiter::RateLimiter;
use crate::application::scheduler::TickScheduler;
use crate::domain::cooldown::CooldownGate;
use crate::domain::models::{parse_playlist_id, ItemId, PlaylistSource, PomodoroStatus, SchedulePhase};
use crate::domain::schedule::ScheduleZone;
use crate::infrastructure::config::{read_app_settings, read_policies, AppSettings, Policies};
use crate::infrastructure::config_store::{update_config, ConfigStore, SqliteConfigStore};
use crate::infrastructure::credential_store::{ApiKeySource, ChainedApiKeySource, KeyringApiKeySource};
use crate::infrastructure::display::{BrowserDisplay, VideoDisplay};
use crate::infrastructure::error::{InfraError, ResolveError};
use crate::infrastructure::notifier::{DesktopNotifier, Notifier};
use crate::infrastructure::youtube_client::ReqwestYouTubeClient;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

pub struct AppState {
    paths: WorkspacePaths,
    settings: AppSettings,
    policies: Policies,
    zone: ScheduleZone,
    store: Arc<SqliteConfigStore>,
    credentials: Arc<dyn ApiKeySource>,
    rate_limiter: Arc<RateLimiter>,
    display: Arc<dyn VideoDisplay>,
    notifier: Arc<dyn Notifier>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let paths = bootstrap_workspace(&workspace_root)?;
        let credentials = Arc::new(ChainedApiKeySource::standard(&paths.env_json_path));
        Self::from_paths(paths, credentials)
    }

    pub fn with_api_key_source(
        workspace_root: PathBuf,
        credentials: Arc<dyn ApiKeySource>,
    ) -> Result<Self, InfraError> {
        let paths = bootstrap_workspace(&workspace_root)?;
        Self::from_paths(paths, credentials)
    }

    fn from_paths(paths: WorkspacePaths, credentials: Arc<dyn ApiKeySource>) -> Result<Self, InfraError> {
        let settings = read_app_settings(&paths.config_dir)?;
        let policies = read_policies(&paths.config_dir)?;
        let zone = settings.schedule_zone()?;
        let store = Arc::new(SqliteConfigStore::new(&paths.database_path));
        let rate_limiter = Arc::new(RateLimiter::new(Duration::from_millis(policies.rate_limit_interval_ms)));
        let display = Arc::new(BrowserDisplay::new(settings.display_mode, &paths.player_page_path));
        let notifier = Arc::new(DesktopNotifier::new(settings.app_name.clone()));

        Ok(Self {
            paths,
            settings,
            policies,
            zone,
            store,
            credentials,
            rate_limiter,
            display,
            notifier,
            log_guard: Mutex::new(()),
        })
    }

    pub fn with_surfaces(mut self, display: Arc<dyn VideoDisplay>, notifier: Arc<dyn Notifier>) -> Self {
        self.display = display;
        self.notifier = notifier;
        self
    }

    pub fn database_path(&self) -> &Path {
        &self.paths.database_path
    }

    fn resolver(&self) -> Result<PlaylistResolver<ReqwestYouTubeClient>, InfraError> {
        let client = ReqwestYouTubeClient::new(&self.settings.api_base_url).map_err(ResolveError::from)?;
        Ok(PlaylistResolver::new(
            Arc::new(client),
            self.credentials.clone(),
            self.rate_limiter.clone(),
        )
        .with_retry_policy(RetryPolicy::from(&self.policies.retry))
        .with_paging(self.policies.items_page_size, self.policies.max_item_pages))
    }

    pub fn dispatcher(&self) -> Result<ActionDispatcher, InfraError> {
        let pool = ItemPool::new(Arc::new(self.resolver()?), self.store.clone());
        Ok(
            ActionDispatcher::new(self.store.clone(), pool, self.display.clone(), self.notifier.clone())
                .with_schedule(self.policies.schedule(), self.zone)
                .with_gate(CooldownGate::new(chrono::Duration::minutes(
                    self.policies.break_cooldown_minutes,
                ))),
        )
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        info!("{command}: {message}");
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        error!("{command}: {message}");
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.paths.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub position: usize,
    pub id: String,
    pub display_name: Option<String>,
    pub item_count: usize,
    pub items_resolved: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub enabled: bool,
    pub pomodoro_status: Option<PomodoroStatus>,
    pub current_phase: SchedulePhase,
    pub playlist_count: usize,
    pub resolved_playlist_count: usize,
    pub item_count: usize,
    pub config_version: u64,
    pub database_path: String,
}

pub async fn add_playlist_impl(state: &AppState, input: String) -> Result<PlaylistSource, InfraError> {
    let playlist_id = parse_playlist_id(&input)
        .ok_or_else(|| InfraError::InvalidConfig(format!("not a playlist URL or id: {}", input.trim())))?;

    let current = state.store.load()?;
    if current.value.find_playlist(&playlist_id).is_some() {
        return Err(duplicate_playlist(&playlist_id));
    }

    let display_name = match state.resolver()?.resolve_metadata(&playlist_id).await {
        Ok(metadata) => metadata.display_name,
        Err(error @ (ResolveError::NotFound(_) | ResolveError::InvalidPlaylistId(_))) => {
            return Err(error.into());
        }
        Err(error) => {
            warn!("adding playlist {playlist_id} without metadata: {error}");
            None
        }
    };

    let source = PlaylistSource {
        display_name,
        ..PlaylistSource::new(playlist_id.clone())
    };
    update_config(state.store.as_ref(), |config| {
        if config.find_playlist(&playlist_id).is_some() {
            return Err(duplicate_playlist(&playlist_id));
        }
        config.playlists.push(source.clone());
        Ok(())
    })?;

    state.log_info("add", &format!("added playlist {}", source.label()));
    Ok(source)
}

fn duplicate_playlist(playlist_id: &str) -> InfraError {
    InfraError::InvalidConfig(format!("playlist {playlist_id} is already added"))
}

/// Removes by exact id first, then by 1-based position (as shown by `list`),
/// then by URL.
pub fn remove_playlist_impl(state: &AppState, selector: String) -> Result<PlaylistSource, InfraError> {
    let selector = selector.trim().to_string();
    let removed = update_config(state.store.as_ref(), |config| {
        let by_exact_id = config.playlists.iter().position(|playlist| playlist.id == selector);
        let by_position = || {
            selector
                .parse::<usize>()
                .ok()
                .filter(|position| (1..=config.playlists.len()).contains(position))
                .map(|position| position - 1)
        };
        let by_url = || {
            let playlist_id = parse_playlist_id(&selector)?;
            config
                .playlists
                .iter()
                .position(|playlist| playlist.id == playlist_id)
        };

        let index = by_exact_id
            .or_else(by_position)
            .or_else(by_url)
            .ok_or_else(|| InfraError::InvalidConfig(format!("no playlist matches {selector:?}")))?;
        Ok(config.playlists.remove(index))
    })?;

    state.log_info("remove", &format!("removed playlist {}", removed.label()));
    Ok(removed)
}

pub fn list_playlists_impl(state: &AppState) -> Result<Vec<PlaylistSummary>, InfraError> {
    let config = state.store.load()?.value;
    Ok(config
        .playlists
        .iter()
        .enumerate()
        .map(|(index, playlist)| PlaylistSummary {
            position: index + 1,
            id: playlist.id.clone(),
            display_name: playlist.display_name.clone(),
            item_count: playlist.items.len(),
            items_resolved: playlist.items_resolved,
        })
        .collect())
}

pub fn set_enabled_impl(state: &AppState, enabled: bool) -> Result<bool, InfraError> {
    update_config(state.store.as_ref(), |config| {
        config.enabled = enabled;
        Ok(())
    })?;
    state.log_info(
        if enabled { "enable" } else { "disable" },
        &format!("break reminders enabled={enabled}"),
    );
    Ok(enabled)
}

pub fn status_impl(state: &AppState) -> Result<StatusResponse, InfraError> {
    let current = state.store.load()?;
    let config = current.value;
    Ok(StatusResponse {
        enabled: config.enabled,
        pomodoro_status: state.store.load_status()?,
        current_phase: state.zone.classify(&state.policies.schedule(), Utc::now()),
        playlist_count: config.playlists.len(),
        resolved_playlist_count: config
            .playlists
            .iter()
            .filter(|playlist| playlist.items_resolved)
            .count(),
        item_count: config.playlists.iter().map(|playlist| playlist.items.len()).sum(),
        config_version: current.version,
        database_path: state.database_path().display().to_string(),
    })
}

pub async fn open_now_impl(state: &AppState) -> Result<ItemId, InfraError> {
    let dispatcher = state.dispatcher()?;
    let mut rng = StdRng::from_entropy();
    let item = dispatcher.show_random_now(&mut rng).await.ok_or_else(|| {
        InfraError::InvalidConfig(
            "no videos available; add a playlist and configure a YouTube API key".to_string(),
        )
    })?;
    state.log_info("open-now", &format!("showing video {item}"));
    Ok(item)
}

pub async fn tick_impl(state: &AppState, at: Option<String>) -> Result<TickOutcome, InfraError> {
    let now = match at {
        Some(value) => parse_rfc3339_input(&value, "at")?,
        None => Utc::now(),
    };
    let dispatcher = state.dispatcher()?;
    let outcome = dispatcher.on_tick(now, &mut TickContext::default()).await;
    state.log_info("tick", &format!("tick at {} -> {outcome}", now.to_rfc3339()));
    Ok(outcome)
}

pub async fn run_impl(state: &AppState, shutdown: watch::Receiver<bool>) -> Result<u64, InfraError> {
    let dispatcher = Arc::new(state.dispatcher()?);
    state.log_info("run", "scheduler starting");
    let ticks = TickScheduler::new(dispatcher)
        .run(TickContext::default(), shutdown)
        .await;
    state.log_info("run", &format!("scheduler stopped after {ticks} tick(s)"));
    Ok(ticks)
}

pub fn set_api_key_impl(state: &AppState, api_key: String) -> Result<(), InfraError> {
    KeyringApiKeySource::default().save_api_key(&api_key)?;
    state.log_info("api-key", "stored api key in the OS keyring");
    Ok(())
}

pub fn clear_api_key_impl(state: &AppState) -> Result<(), InfraError> {
    KeyringApiKeySource::default().delete_api_key()?;
    state.log_info("api-key", "removed api key from the OS keyring");
    Ok(())
}

fn parse_rfc3339_input(value: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|datetime| datetime.with_timezone(&Utc))
        .map_err(|error| InfraError::InvalidConfig(format!("{field_name} must be RFC3339: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::tests::{RecordingDisplay, RecordingNotifier};
    use crate::infrastructure::credential_store::InMemoryApiKeySource;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
        display: Arc<RecordingDisplay>,
        notifier: Arc<RecordingNotifier>,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "breakreel-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            fs::create_dir_all(path.join("config")).expect("create config dir");
            fs::write(
                path.join("config").join("app.json"),
                r#"{"schema":1,"appName":"BreakReel","timezone":"UTC","displayMode":"tab"}"#,
            )
            .expect("seed app.json");
            Self {
                path,
                display: Arc::new(RecordingDisplay::default()),
                notifier: Arc::new(RecordingNotifier::default()),
            }
        }

        fn app_state(&self) -> AppState {
            AppState::with_api_key_source(self.path.clone(), Arc::new(InMemoryApiKeySource::default()))
                .expect("initialize app state")
                .with_surfaces(self.display.clone(), self.notifier.clone())
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[tokio::test]
    async fn add_without_credential_keeps_playlist_unnamed() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let added = add_playlist_impl(
            &state,
            "https://www.youtube.com/playlist?list=PLrAXtmErZgOe".to_string(),
        )
        .await
        .expect("add playlist");
        assert_eq!(added.id, "PLrAXtmErZgOe");
        assert_eq!(added.display_name, None);

        let listed = list_playlists_impl(&state).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].position, 1);
        assert!(!listed[0].items_resolved);
    }

    #[tokio::test]
    async fn add_rejects_duplicates_and_garbage() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        add_playlist_impl(&state, "PL1".to_string()).await.expect("first add");
        assert!(matches!(
            add_playlist_impl(&state, "https://youtube.com/watch?v=x&list=PL1".to_string()).await,
            Err(InfraError::InvalidConfig(_))
        ));
        assert!(matches!(
            add_playlist_impl(&state, "not a playlist!".to_string()).await,
            Err(InfraError::InvalidConfig(_))
        ));
        assert_eq!(list_playlists_impl(&state).expect("list").len(), 1);
    }

    #[tokio::test]
    async fn remove_by_position_or_id() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        for id in ["PL1", "PL2", "PL3"] {
            add_playlist_impl(&state, id.to_string()).await.expect("add");
        }

        assert_eq!(remove_playlist_impl(&state, "2".to_string()).expect("by position").id, "PL2");
        assert_eq!(remove_playlist_impl(&state, "PL3".to_string()).expect("by id").id, "PL3");
        assert!(remove_playlist_impl(&state, "9".to_string()).is_err());

        let remaining: Vec<String> = list_playlists_impl(&state)
            .expect("list")
            .into_iter()
            .map(|summary| summary.id)
            .collect();
        assert_eq!(remaining, vec!["PL1".to_string()]);
    }

    #[tokio::test]
    async fn remove_prefers_exact_id_over_position() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        for id in ["PL1", "PL2", "2"] {
            add_playlist_impl(&state, id.to_string()).await.expect("add");
        }

        assert_eq!(remove_playlist_impl(&state, "2".to_string()).expect("by exact id").id, "2");
        assert_eq!(remove_playlist_impl(&state, "2".to_string()).expect("by position").id, "PL2");
        assert_eq!(list_playlists_impl(&state).expect("list").len(), 1);
    }

    #[test]
    fn enable_disable_is_reflected_in_status() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        assert!(status_impl(&state).expect("status").enabled);
        set_enabled_impl(&state, false).expect("disable");
        let status = status_impl(&state).expect("status");
        assert!(!status.enabled);
        assert_eq!(status.pomodoro_status, None);
        assert!(status.config_version >= 1);
    }

    #[tokio::test]
    async fn tick_when_disabled_has_no_effects() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        set_enabled_impl(&state, false).expect("disable");

        let outcome = tick_impl(&state, Some("2026-03-02T09:30:00Z".to_string()))
            .await
            .expect("tick");
        assert_eq!(outcome, TickOutcome::Disabled);
        assert!(workspace.notifier.sent.lock().expect("sent").is_empty());
    }

    #[tokio::test]
    async fn tick_at_work_boundary_records_focus_status() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let outcome = tick_impl(&state, Some("2026-03-02T09:30:00Z".to_string()))
            .await
            .expect("tick");
        assert_eq!(outcome, TickOutcome::WorkAnnounced);
        assert_eq!(
            status_impl(&state).expect("status").pomodoro_status,
            Some(PomodoroStatus::FocusTime)
        );
        assert_eq!(workspace.notifier.sent.lock().expect("sent").len(), 1);
    }

    #[tokio::test]
    async fn break_tick_without_credential_shows_nothing() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        add_playlist_impl(&state, "PL1".to_string()).await.expect("add");

        let outcome = tick_impl(&state, Some("2026-03-02T09:25:00Z".to_string()))
            .await
            .expect("tick");
        assert_eq!(outcome, TickOutcome::BreakWithoutItem);
        assert!(workspace.display.shown.lock().expect("shown").is_empty());
        assert!(matches!(open_now_impl(&state).await, Err(InfraError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn tick_rejects_malformed_instant() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert!(matches!(
            tick_impl(&state, Some("yesterday".to_string())).await,
            Err(InfraError::InvalidConfig(_))
        ));
    }

    #[test]
    fn command_errors_are_appended_to_command_log() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let message = state.command_error("remove", &InfraError::InvalidConfig("no playlist".to_string()));
        assert!(message.contains("no playlist"));

        let log = fs::read_to_string(state.paths.logs_dir.join("commands.log")).expect("read log");
        let line: serde_json::Value = serde_json::from_str(log.lines().last().expect("log line")).expect("json");
        assert_eq!(line["level"], "error");
        assert_eq!(line["command"], "remove");
    }
}
