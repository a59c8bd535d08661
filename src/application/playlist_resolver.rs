use crate::application::backoff::{fetch_with_backoff, RetryPolicy, Sleeper, TokioSleeper};
use crate::application::rate_limiter::RateLimiter;
use crate::domain::models::{ItemId, PlaylistSource};
use crate::infrastructure::credential_store::ApiKeySource;
use crate::infrastructure::error::ResolveError;
use crate::infrastructure::youtube_client::{
    PlaylistItemsRequest, YouTubeDataClient, DEFAULT_ITEMS_PAGE_SIZE,
};
use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

/// Resolves the member items of one playlist source.
#[async_trait]
pub trait ItemResolver: Send + Sync {
    async fn resolve_items(&self, source: &PlaylistSource) -> Result<Vec<ItemId>, ResolveError>;
}

pub struct PlaylistResolver<C>
where
    C: YouTubeDataClient,
{
    client: Arc<C>,
    credentials: Arc<dyn ApiKeySource>,
    rate_limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    page_size: u32,
    max_pages: u32,
}

impl<C> PlaylistResolver<C>
where
    C: YouTubeDataClient,
{
    pub fn new(client: Arc<C>, credentials: Arc<dyn ApiKeySource>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            credentials,
            rate_limiter,
            retry_policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            page_size: DEFAULT_ITEMS_PAGE_SIZE,
            max_pages: 1,
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_paging(mut self, page_size: u32, max_pages: u32) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_ITEMS_PAGE_SIZE);
        self.max_pages = max_pages.max(1);
        self
    }

    fn api_key(&self) -> Result<String, ResolveError> {
        match self.credentials.load_api_key() {
            Ok(Some(key)) => Ok(key),
            Ok(None) => Err(ResolveError::NoCredential),
            Err(error) => Err(ResolveError::Credential(error.to_string())),
        }
    }

    pub async fn resolve_metadata(&self, playlist_id: &str) -> Result<PlaylistSource, ResolveError> {
        let playlist_id = validated_id(playlist_id)?;
        let api_key = self.api_key()?;

        let client = self.client.as_ref();
        let rate_limiter = self.rate_limiter.as_ref();
        let key = api_key.as_str();
        let records = fetch_with_backoff(&self.retry_policy, self.sleeper.as_ref(), move || async move {
            rate_limiter.throttle().await;
            client.list_playlists(key, playlist_id).await
        })
        .await?;

        let record = records
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::NotFound(playlist_id.to_string()))?;
        info!("resolved playlist {playlist_id} metadata");
        Ok(PlaylistSource {
            display_name: record.title,
            ..PlaylistSource::new(record.id)
        })
    }

    async fn list_items(&self, playlist_id: &str) -> Result<Vec<ItemId>, ResolveError> {
        let playlist_id = validated_id(playlist_id)?;
        let api_key = self.api_key()?;

        let client = self.client.as_ref();
        let rate_limiter = self.rate_limiter.as_ref();
        let key = api_key.as_str();
        let mut items = Vec::new();
        let mut page_token = None;

        for page in 0..self.max_pages {
            let request = PlaylistItemsRequest {
                playlist_id: playlist_id.to_string(),
                page_size: self.page_size,
                page_token: page_token.take(),
            };
            let request = &request;
            let response = fetch_with_backoff(&self.retry_policy, self.sleeper.as_ref(), move || async move {
                rate_limiter.throttle().await;
                client.list_playlist_items(key, request).await
            })
            .await?;

            let before = items.len();
            items.extend(response.video_ids.into_iter().flatten().map(ItemId::new));
            debug!(
                "playlist {playlist_id} page {} yielded {} item(s)",
                page + 1,
                items.len() - before
            );

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!("resolved {} item(s) for playlist {playlist_id}", items.len());
        Ok(items)
    }
}

fn validated_id(playlist_id: &str) -> Result<&str, ResolveError> {
    let trimmed = playlist_id.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::InvalidPlaylistId(playlist_id.to_string()));
    }
    Ok(trimmed)
}

#[async_trait]
impl<C> ItemResolver for PlaylistResolver<C>
where
    C: YouTubeDataClient,
{
    async fn resolve_items(&self, source: &PlaylistSource) -> Result<Vec<ItemId>, ResolveError> {
        self.list_items(&source.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::backoff::tests::RecordingSleeper;
    use crate::infrastructure::credential_store::InMemoryApiKeySource;
    use crate::infrastructure::error::FetchError;
    use crate::infrastructure::youtube_client::{PlaylistItemsPage, PlaylistRecord};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct FakeYouTubeClient {
        playlists: Mutex<VecDeque<Result<Vec<PlaylistRecord>, FetchError>>>,
        pages: Mutex<VecDeque<Result<PlaylistItemsPage, FetchError>>>,
        requests: Mutex<Vec<PlaylistItemsRequest>>,
        playlist_calls: AtomicUsize,
        item_calls: AtomicUsize,
    }

    impl FakeYouTubeClient {
        fn with_playlists(responses: Vec<Result<Vec<PlaylistRecord>, FetchError>>) -> Self {
            Self {
                playlists: Mutex::new(responses.into()),
                ..Self::default()
            }
        }

        fn with_pages(responses: Vec<Result<PlaylistItemsPage, FetchError>>) -> Self {
            Self {
                pages: Mutex::new(responses.into()),
                ..Self::default()
            }
        }

        fn total_calls(&self) -> usize {
            self.playlist_calls.load(Ordering::SeqCst) + self.item_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl YouTubeDataClient for FakeYouTubeClient {
        async fn list_playlists(
            &self,
            _api_key: &str,
            _playlist_id: &str,
        ) -> Result<Vec<PlaylistRecord>, FetchError> {
            self.playlist_calls.fetch_add(1, Ordering::SeqCst);
            self.playlists
                .lock()
                .expect("playlists lock poisoned")
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn list_playlist_items(
            &self,
            _api_key: &str,
            request: &PlaylistItemsRequest,
        ) -> Result<PlaylistItemsPage, FetchError> {
            self.item_calls.fetch_add(1, Ordering::SeqCst);
            self.requests
                .lock()
                .expect("requests lock poisoned")
                .push(request.clone());
            self.pages
                .lock()
                .expect("pages lock poisoned")
                .pop_front()
                .unwrap_or_else(|| Ok(PlaylistItemsPage::default()))
        }
    }

    fn page(ids: &[Option<&str>], next: Option<&str>) -> PlaylistItemsPage {
        PlaylistItemsPage {
            video_ids: ids.iter().map(|id| id.map(str::to_string)).collect(),
            next_page_token: next.map(str::to_string),
        }
    }

    fn resolver(
        client: Arc<FakeYouTubeClient>,
        credentials: Arc<dyn ApiKeySource>,
    ) -> (PlaylistResolver<FakeYouTubeClient>, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let resolver = PlaylistResolver::new(
            client,
            credentials,
            Arc::new(RateLimiter::new(Duration::from_millis(1))),
        )
        .with_sleeper(sleeper.clone());
        (resolver, sleeper)
    }

    fn with_key() -> Arc<dyn ApiKeySource> {
        Arc::new(InMemoryApiKeySource::with_key("test-key"))
    }

    #[tokio::test]
    async fn metadata_maps_first_record() {
        let client = Arc::new(FakeYouTubeClient::with_playlists(vec![Ok(vec![PlaylistRecord {
            id: "PL123".to_string(),
            title: Some("Stretching".to_string()),
        }])]));
        let (resolver, _) = resolver(client.clone(), with_key());

        let source = resolver.resolve_metadata(" PL123 ").await.expect("metadata");
        assert_eq!(source.id, "PL123");
        assert_eq!(source.display_name.as_deref(), Some("Stretching"));
        assert!(source.items.is_empty());
        assert!(!source.items_resolved);
    }

    #[tokio::test]
    async fn metadata_without_records_is_not_found() {
        let client = Arc::new(FakeYouTubeClient::with_playlists(vec![Ok(Vec::new())]));
        let (resolver, _) = resolver(client, with_key());
        assert_eq!(
            resolver.resolve_metadata("PLmissing").await,
            Err(ResolveError::NotFound("PLmissing".to_string()))
        );
    }

    #[tokio::test]
    async fn missing_credential_short_circuits_without_api_calls() {
        let client = Arc::new(FakeYouTubeClient::default());
        let (resolver, _) = resolver(client.clone(), Arc::new(InMemoryApiKeySource::default()));

        assert_eq!(resolver.resolve_metadata("PL1").await, Err(ResolveError::NoCredential));
        assert_eq!(
            resolver.resolve_items(&PlaylistSource::new("PL1")).await,
            Err(ResolveError::NoCredential)
        );
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn blank_playlist_id_is_rejected() {
        let client = Arc::new(FakeYouTubeClient::default());
        let (resolver, _) = resolver(client.clone(), with_key());
        assert!(matches!(
            resolver.resolve_items(&PlaylistSource::new("  ")).await,
            Err(ResolveError::InvalidPlaylistId(_))
        ));
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn items_preserve_order_and_skip_records_without_ids() {
        let client = Arc::new(FakeYouTubeClient::with_pages(vec![Ok(page(
            &[Some("a"), None, Some("b"), Some("a")],
            None,
        ))]));
        let (resolver, _) = resolver(client.clone(), with_key());

        let items = resolver
            .resolve_items(&PlaylistSource::new("PL1"))
            .await
            .expect("items");
        assert_eq!(items, vec![ItemId::from("a"), ItemId::from("b"), ItemId::from("a")]);
        let requests = client.requests.lock().expect("requests");
        assert_eq!(requests[0].page_size, 50);
        assert_eq!(requests[0].page_token, None);
    }

    #[tokio::test]
    async fn empty_playlist_yields_no_items() {
        let client = Arc::new(FakeYouTubeClient::with_pages(vec![Ok(page(&[], None))]));
        let (resolver, _) = resolver(client, with_key());
        assert_eq!(
            resolver.resolve_items(&PlaylistSource::new("PL1")).await,
            Ok(Vec::new())
        );
    }

    #[tokio::test]
    async fn follows_page_tokens_up_to_max_pages() {
        let client = Arc::new(FakeYouTubeClient::with_pages(vec![
            Ok(page(&[Some("a")], Some("p2"))),
            Ok(page(&[Some("b")], Some("p3"))),
            Ok(page(&[Some("c")], Some("p4"))),
        ]));
        let (resolver, _) = resolver(client.clone(), with_key());
        let resolver = resolver.with_paging(50, 2);

        let items = resolver
            .resolve_items(&PlaylistSource::new("PL1"))
            .await
            .expect("items");
        assert_eq!(items, vec![ItemId::from("a"), ItemId::from("b")]);
        let requests = client.requests.lock().expect("requests");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].page_token.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn default_paging_reads_only_the_first_page() {
        let client = Arc::new(FakeYouTubeClient::with_pages(vec![Ok(page(&[Some("a")], Some("p2")))]));
        let (resolver, _) = resolver(client.clone(), with_key());
        let items = resolver
            .resolve_items(&PlaylistSource::new("PL1"))
            .await
            .expect("items");
        assert_eq!(items, vec![ItemId::from("a")]);
        assert_eq!(client.item_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_with_backoff() {
        let client = Arc::new(FakeYouTubeClient::with_pages(vec![
            Err(FetchError::Transport("timeout".to_string())),
            Err(FetchError::Status {
                status: 500,
                body: String::new(),
            }),
            Ok(page(&[Some("x")], None)),
        ]));
        let (resolver, sleeper) = resolver(client.clone(), with_key());

        let items = resolver
            .resolve_items(&PlaylistSource::new("PL1"))
            .await
            .expect("items after retry");
        assert_eq!(items, vec![ItemId::from("x")]);
        assert_eq!(client.item_calls.load(Ordering::SeqCst), 3);
        assert!(sleeper.total() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn exhausted_fetch_surfaces_as_fetch_failed() {
        let client = Arc::new(FakeYouTubeClient::with_pages(
            (0..3)
                .map(|_| Err(FetchError::Transport("down".to_string())))
                .collect(),
        ));
        let (resolver, _) = resolver(client.clone(), with_key());

        match resolver.resolve_items(&PlaylistSource::new("PL1")).await {
            Err(ResolveError::FetchFailed(FetchError::Exhausted { attempts, .. })) => assert_eq!(attempts, 3),
            other => panic!("expected exhausted fetch, got {other:?}"),
        }
        assert_eq!(client.item_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_are_throttled_by_shared_limiter() {
        let client = Arc::new(FakeYouTubeClient::default());
        let limiter = Arc::new(RateLimiter::default());
        let resolver = PlaylistResolver::new(client, with_key(), limiter)
            .with_sleeper(Arc::new(RecordingSleeper::default()));

        let started = tokio::time::Instant::now();
        for _ in 0..3 {
            resolver
                .resolve_items(&PlaylistSource::new("PL1"))
                .await
                .expect("items");
        }
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
