pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    add_playlist_impl, clear_api_key_impl, list_playlists_impl, open_now_impl, remove_playlist_impl,
    run_impl, set_api_key_impl, set_enabled_impl, status_impl, tick_impl, AppState,
};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::watch;

/// Break reminders with a random video from your playlists, on a fixed wall-clock schedule.
#[derive(Debug, Parser)]
#[command(name = "breakreel", version, about)]
struct Cli {
    /// Workspace directory holding config/, state/ and logs/.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Print command results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add a playlist by URL or id.
    Add { playlist: String },
    /// Remove a playlist by its id, its position in `list` or its URL. An exact id match wins over a position.
    Remove { selector: String },
    /// List configured playlists.
    List,
    /// Turn break reminders on.
    Enable,
    /// Turn break reminders off.
    Disable,
    /// Show the current state.
    Status,
    /// Show a random video right away.
    OpenNow,
    /// Run a single scheduling tick.
    Tick {
        /// Evaluate at this RFC3339 instant instead of now.
        #[arg(long)]
        at: Option<String>,
    },
    /// Run the scheduler until interrupted.
    Run,
    /// Manage the YouTube API key stored in the OS keyring.
    ApiKey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },
}

#[derive(Debug, Subcommand)]
enum ApiKeyAction {
    Set { key: String },
    Clear,
}

pub fn run() -> ExitCode {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("error: failed to start async runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn workspace_root(root: Option<PathBuf>) -> Result<PathBuf, String> {
    match root {
        Some(path) => Ok(path),
        None => dirs::data_dir()
            .map(|dir| dir.join("breakreel"))
            .ok_or_else(|| "could not determine the platform data directory; pass --root".to_string()),
    }
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce() -> String) -> Result<(), String> {
    if json {
        let rendered = serde_json::to_string_pretty(value).map_err(|error| error.to_string())?;
        println!("{rendered}");
    } else {
        println!("{}", human());
    }
    Ok(())
}

fn set_enabled(state: &AppState, json: bool, enabled: bool) -> Result<(), String> {
    let (command, label) = if enabled { ("enable", "enabled") } else { ("disable", "disabled") };
    set_enabled_impl(state, enabled).map_err(|error| state.command_error(command, &error))?;
    emit(json, &serde_json::json!({ "enabled": enabled }), || format!("break reminders {label}"))
}

async fn execute(cli: Cli) -> Result<(), String> {
    let state = AppState::new(workspace_root(cli.root)?).map_err(|error| error.to_string())?;
    let json = cli.json;

    match cli.command {
        Command::Add { playlist } => {
            let added = add_playlist_impl(&state, playlist)
                .await
                .map_err(|error| state.command_error("add", &error))?;
            emit(json, &added, || format!("added {} ({})", added.label(), added.id))
        }
        Command::Remove { selector } => {
            let removed =
                remove_playlist_impl(&state, selector).map_err(|error| state.command_error("remove", &error))?;
            emit(json, &removed, || format!("removed {} ({})", removed.label(), removed.id))
        }
        Command::List => {
            let playlists = list_playlists_impl(&state).map_err(|error| state.command_error("list", &error))?;
            emit(json, &playlists, || {
                if playlists.is_empty() {
                    return "no playlists configured".to_string();
                }
                playlists
                    .iter()
                    .map(|playlist| {
                        let items = if playlist.items_resolved {
                            format!("{} video(s)", playlist.item_count)
                        } else {
                            "not resolved yet".to_string()
                        };
                        format!(
                            "{}. {} [{}] {items}",
                            playlist.position,
                            playlist.display_name.as_deref().unwrap_or(&playlist.id),
                            playlist.id
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Command::Enable => set_enabled(&state, json, true),
        Command::Disable => set_enabled(&state, json, false),
        Command::Status => {
            let status = status_impl(&state).map_err(|error| state.command_error("status", &error))?;
            emit(json, &status, || {
                format!(
                    "enabled: {}\nlast phase: {}\ncurrent phase: {:?}\nplaylists: {} ({} resolved, {} videos)\ndatabase: {}",
                    status.enabled,
                    status.pomodoro_status.map(|phase| phase.as_str()).unwrap_or("none yet"),
                    status.current_phase,
                    status.playlist_count,
                    status.resolved_playlist_count,
                    status.item_count,
                    status.database_path
                )
            })
        }
        Command::OpenNow => {
            let item = open_now_impl(&state)
                .await
                .map_err(|error| state.command_error("open-now", &error))?;
            emit(json, &item, || format!("showing video {item}"))
        }
        Command::Tick { at } => {
            let outcome = tick_impl(&state, at)
                .await
                .map_err(|error| state.command_error("tick", &error))?;
            emit(json, &serde_json::json!({ "outcome": outcome.to_string() }), || outcome.to_string())
        }
        Command::Run => {
            let (stop, shutdown) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("shutdown requested");
                    let _ = stop.send(true);
                }
            });
            let ticks = run_impl(&state, shutdown)
                .await
                .map_err(|error| state.command_error("run", &error))?;
            emit(json, &serde_json::json!({ "ticks": ticks }), || format!("stopped after {ticks} tick(s)"))
        }
        Command::ApiKey { action } => match action {
            ApiKeyAction::Set { key } => {
                set_api_key_impl(&state, key).map_err(|error| state.command_error("api-key", &error))?;
                emit(json, &serde_json::json!({ "stored": true }), || "api key stored".to_string())
            }
            ApiKeyAction::Clear => {
                clear_api_key_impl(&state).map_err(|error| state.command_error("api-key", &error))?;
                emit(json, &serde_json::json!({ "stored": false }), || "api key removed".to_string())
            }
        },
    }
}
