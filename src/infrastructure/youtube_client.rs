use crate::infrastructure::error::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

pub const DEFAULT_ITEMS_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRecord {
    pub id: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItemsRequest {
    pub playlist_id: String,
    pub page_size: u32,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaylistItemsPage {
    /// One entry per returned record, in response order. `None` when the
    /// record carries no video id (deleted or private videos).
    pub video_ids: Vec<Option<String>>,
    pub next_page_token: Option<String>,
}

/// Read-only view of the YouTube Data API v3. Each method is one HTTP call.
#[async_trait]
pub trait YouTubeDataClient: Send + Sync {
    async fn list_playlists(&self, api_key: &str, playlist_id: &str) -> Result<Vec<PlaylistRecord>, FetchError>;

    async fn list_playlist_items(
        &self,
        api_key: &str,
        request: &PlaylistItemsRequest,
    ) -> Result<PlaylistItemsPage, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestYouTubeClient {
    client: Client,
    base_url: Url,
}

impl ReqwestYouTubeClient {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|error| FetchError::Transport(format!("invalid youtube api base url: {error}")))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|error| FetchError::Transport(format!("failed to create HTTP client: {error}")))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, resource: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(resource)
            .map_err(|error| FetchError::Transport(format!("invalid youtube endpoint {resource}: {error}")))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|error| FetchError::Transport(format!("network error while listing {what}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| FetchError::Transport(format!("failed reading {what} response: {error}")))?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|error| FetchError::Decode(format!("invalid {what} payload: {error}; body={body}")))
    }
}

#[derive(Debug, serde::Deserialize)]
struct PlaylistListResponse {
    items: Option<Vec<PlaylistResource>>,
}

#[derive(Debug, serde::Deserialize)]
struct PlaylistResource {
    id: String,
    snippet: Option<PlaylistSnippet>,
}

#[derive(Debug, serde::Deserialize)]
struct PlaylistSnippet {
    title: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct PlaylistItemListResponse {
    items: Option<Vec<PlaylistItemResource>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct PlaylistItemResource {
    snippet: Option<PlaylistItemSnippet>,
}

#[derive(Debug, serde::Deserialize)]
struct PlaylistItemSnippet {
    #[serde(rename = "resourceId")]
    resource_id: Option<ResourceId>,
}

#[derive(Debug, serde::Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

fn video_id_of(item: PlaylistItemResource) -> Option<String> {
    item.snippet
        .and_then(|snippet| snippet.resource_id)
        .and_then(|resource| resource.video_id)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

#[async_trait]
impl YouTubeDataClient for ReqwestYouTubeClient {
    async fn list_playlists(&self, api_key: &str, playlist_id: &str) -> Result<Vec<PlaylistRecord>, FetchError> {
        let endpoint = self.endpoint("playlists")?;
        let parsed: PlaylistListResponse = self
            .get_json(
                endpoint,
                &[("part", "snippet"), ("id", playlist_id), ("key", api_key)],
                "playlists",
            )
            .await?;

        Ok(parsed
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|item| PlaylistRecord {
                id: item.id,
                title: item
                    .snippet
                    .and_then(|snippet| snippet.title)
                    .map(|title| title.trim().to_string())
                    .filter(|title| !title.is_empty()),
            })
            .collect())
    }

    async fn list_playlist_items(
        &self,
        api_key: &str,
        request: &PlaylistItemsRequest,
    ) -> Result<PlaylistItemsPage, FetchError> {
        let endpoint = self.endpoint("playlistItems")?;
        let page_size = request.page_size.clamp(1, DEFAULT_ITEMS_PAGE_SIZE).to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("maxResults", page_size.as_str()),
            ("playlistId", request.playlist_id.as_str()),
            ("key", api_key),
        ];
        if let Some(page_token) = request.page_token.as_deref() {
            query.push(("pageToken", page_token));
        }

        let parsed: PlaylistItemListResponse = self.get_json(endpoint, &query, "playlist items").await?;
        Ok(PlaylistItemsPage {
            video_ids: parsed
                .items
                .unwrap_or_default()
                .into_iter()
                .map(video_id_of)
                .collect(),
            next_page_token: parsed.next_page_token.filter(|token| !token.is_empty()),
        })
    }
}
