use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Opaque identifier of a single video on the hosting service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistSource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemId>,
    #[serde(default)]
    pub items_resolved: bool,
}

impl PlaylistSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            items: Vec::new(),
            items_resolved: false,
        }
    }

    /// Replaces the cached items with the outcome of one resolution.
    pub fn set_resolved_items(&mut self, items: Vec<ItemId>) {
        self.items = items;
        self.items_resolved = true;
    }

    /// True until a resolution has produced at least one item. An empty
    /// result is cached but fetched again on the next pool assembly.
    pub fn needs_resolution(&self) -> bool {
        !self.items_resolved || self.items.is_empty()
    }

    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.id)
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "playlist.id")?;
        if !self.items_resolved && !self.items.is_empty() {
            return Err("playlist.items must be empty until resolved".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub playlists: Vec<PlaylistSource>,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            playlists: Vec::new(),
        }
    }
}

impl ExtensionConfig {
    pub fn find_playlist(&self, playlist_id: &str) -> Option<&PlaylistSource> {
        self.playlists
            .iter()
            .find(|playlist| playlist.id == playlist_id)
    }

    pub fn validate(&self) -> Result<(), String> {
        for (index, playlist) in self.playlists.iter().enumerate() {
            playlist.validate()?;
            if self.playlists[..index]
                .iter()
                .any(|earlier| earlier.id == playlist.id)
            {
                return Err(format!("duplicate playlist id {}", playlist.id));
            }
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

/// A stored value together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SchedulePhase {
    None,
    BreakTime,
    WorkTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PomodoroStatus {
    #[serde(rename = "Focus Time")]
    FocusTime,
    #[serde(rename = "Break Time")]
    BreakTime,
}

impl PomodoroStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FocusTime => "Focus Time",
            Self::BreakTime => "Break Time",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Focus Time" => Some(Self::FocusTime),
            "Break Time" => Some(Self::BreakTime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Tab,
    Window,
}

/// Accepts either a bare playlist id or any URL carrying a `list=` query parameter.
pub fn parse_playlist_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(trimmed) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "list")
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty());
    }

    if let Some((_, rest)) = trimmed.split_once("list=") {
        let id = rest.split('&').next().unwrap_or_default().trim();
        return (!id.is_empty()).then(|| id.to_string());
    }

    let looks_like_id = trimmed
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    looks_like_id.then(|| trimmed.to_string())
}

fn validate_non_empty(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ExtensionConfig {
        let mut resolved = PlaylistSource::new("PL-resolved");
        resolved.display_name = Some("Stretching".to_string());
        resolved.set_resolved_items(vec![ItemId::from("a"), ItemId::from("b")]);
        ExtensionConfig {
            enabled: true,
            playlists: vec![resolved, PlaylistSource::new("PL-pending")],
        }
    }

    #[test]
    fn playlist_validate_rejects_blank_id() {
        assert!(PlaylistSource::new("  ").validate().is_err());
    }

    #[test]
    fn playlist_validate_rejects_items_before_resolution() {
        let mut playlist = PlaylistSource::new("PL1");
        playlist.items.push(ItemId::from("a"));
        assert!(playlist.validate().is_err());
    }

    #[test]
    fn empty_resolution_still_needs_resolution() {
        let mut playlist = PlaylistSource::new("PL1");
        assert!(playlist.needs_resolution());
        playlist.set_resolved_items(Vec::new());
        assert!(playlist.items_resolved);
        assert!(playlist.needs_resolution());
        playlist.set_resolved_items(vec![ItemId::from("a")]);
        assert!(!playlist.needs_resolution());
    }

    #[test]
    fn set_resolved_items_overwrites_previous_items() {
        let mut playlist = PlaylistSource::new("PL1");
        playlist.set_resolved_items(vec![ItemId::from("a"), ItemId::from("b")]);
        playlist.set_resolved_items(vec![ItemId::from("c")]);
        assert_eq!(playlist.items, vec![ItemId::from("c")]);
        assert!(playlist.items_resolved);
    }

    #[test]
    fn config_validate_rejects_duplicate_playlists() {
        let mut config = sample_config();
        config.playlists.push(PlaylistSource::new("PL-pending"));
        assert!(config.validate().is_err());
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn label_falls_back_to_id() {
        let config = sample_config();
        assert_eq!(config.playlists[0].label(), "Stretching");
        assert_eq!(config.playlists[1].label(), "PL-pending");
    }

    #[test]
    fn config_defaults_to_enabled_when_field_missing() {
        let parsed: ExtensionConfig =
            serde_json::from_str(r#"{"playlists":[{"id":"PL1"}]}"#).expect("parse config");
        assert!(parsed.enabled);
        assert_eq!(parsed.playlists[0], PlaylistSource::new("PL1"));
    }

    #[test]
    fn config_serde_roundtrip() {
        let config = sample_config();
        let raw = serde_json::to_string(&config).expect("serialize config");
        let roundtrip: ExtensionConfig = serde_json::from_str(&raw).expect("deserialize config");
        assert_eq!(roundtrip, config);
    }

    #[test]
    fn parse_playlist_id_handles_urls_and_bare_ids() {
        assert_eq!(
            parse_playlist_id("https://www.youtube.com/playlist?list=PLabc123"),
            Some("PLabc123".to_string())
        );
        assert_eq!(
            parse_playlist_id("https://www.youtube.com/watch?v=xyz&list=PL_x-9&index=2"),
            Some("PL_x-9".to_string())
        );
        assert_eq!(parse_playlist_id("  PLbare  "), Some("PLbare".to_string()));
        assert_eq!(parse_playlist_id("youtube.com/playlist?list=PLnoscheme"), Some("PLnoscheme".to_string()));
        assert_eq!(parse_playlist_id("https://www.youtube.com/watch?v=xyz"), None);
        assert_eq!(parse_playlist_id("not an id"), None);
        assert_eq!(parse_playlist_id(""), None);
    }

    #[test]
    fn pomodoro_status_labels_roundtrip() {
        for status in [PomodoroStatus::FocusTime, PomodoroStatus::BreakTime] {
            assert_eq!(PomodoroStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PomodoroStatus::parse("Lunch"), None);
    }
}
