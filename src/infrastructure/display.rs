use crate::domain::models::{DisplayMode, ItemId};
use crate::infrastructure::error::DispatchError;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

const EMBED_BASE_URL: &str = "https://www.youtube.com/embed/";

type Opener = Box<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Opens a viewing surface for the selected video.
pub trait VideoDisplay: Send + Sync {
    fn show(&self, item: &ItemId) -> Result<(), DispatchError>;
}

pub fn embed_url(item: &ItemId) -> Result<Url, DispatchError> {
    let mut url = Url::parse(EMBED_BASE_URL)
        .map_err(|error| DispatchError::Display(format!("invalid embed base url: {error}")))?;
    url.path_segments_mut()
        .map_err(|_| DispatchError::Display("embed URL cannot be a base".to_string()))?
        .pop_if_empty()
        .push(item.as_str());
    url.query_pairs_mut().append_pair("autoplay", "1");
    Ok(url)
}

pub fn render_player_page(item: &ItemId) -> Result<String, DispatchError> {
    let src = embed_url(item)?;
    Ok(format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>Break time</title>\n\
         <style>html,body{{margin:0;height:100%;background:#000}}</style></head>\n\
         <body>\n<iframe width=\"100%\" height=\"100%\" src=\"{src}\" frameborder=\"0\" \
         allow=\"autoplay; fullscreen\" allowfullscreen></iframe>\n</body>\n</html>\n"
    ))
}

/// Shows videos in the default browser, either as a bare embed URL or through a
/// local player page that hosts the embed in a full-size iframe.
pub struct BrowserDisplay {
    mode: DisplayMode,
    player_page_path: PathBuf,
    opener: Opener,
}

impl BrowserDisplay {
    pub fn new(mode: DisplayMode, player_page_path: impl AsRef<Path>) -> Self {
        Self::with_opener(mode, player_page_path, |target| webbrowser::open(target))
    }

    pub fn with_opener(
        mode: DisplayMode,
        player_page_path: impl AsRef<Path>,
        opener: impl Fn(&str) -> std::io::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            mode,
            player_page_path: player_page_path.as_ref().to_path_buf(),
            opener: Box::new(opener),
        }
    }

    fn open(&self, target: &str) -> Result<(), DispatchError> {
        (self.opener)(target).map_err(|error| DispatchError::Display(format!("{target}: {error}")))
    }
}

impl VideoDisplay for BrowserDisplay {
    fn show(&self, item: &ItemId) -> Result<(), DispatchError> {
        match self.mode {
            DisplayMode::Tab => {
                let url = embed_url(item)?;
                info!("opening video {item} in a browser tab");
                self.open(url.as_str())
            }
            DisplayMode::Window => {
                let page = render_player_page(item)?;
                if let Some(parent) = self.player_page_path.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|error| DispatchError::Display(format!("create player dir: {error}")))?;
                }
                fs::write(&self.player_page_path, page)
                    .map_err(|error| DispatchError::Display(format!("write player page: {error}")))?;
                info!("opening video {item} in player page {}", self.player_page_path.display());
                self.open(&self.player_page_path.display().to_string())
            }
        }
    }
}
