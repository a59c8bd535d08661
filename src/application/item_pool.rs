use crate::application::playlist_resolver::ItemResolver;
use crate::domain::models::{ItemId, PlaylistSource};
use crate::infrastructure::config_store::{update_config, ConfigStore};
use crate::infrastructure::error::InfraError;
use log::{debug, warn};
use std::sync::Arc;

pub struct ItemPool {
    resolver: Arc<dyn ItemResolver>,
    store: Arc<dyn ConfigStore>,
}

impl ItemPool {
    pub fn new(resolver: Arc<dyn ItemResolver>, store: Arc<dyn ConfigStore>) -> Self {
        Self { resolver, store }
    }

    /// Resolves every source without cached items, then returns all items in
    /// configuration order. A source that fails to resolve is skipped for
    /// this call and stays unresolved. One that resolved to nothing is tried
    /// again next time.
    pub async fn get_pool(&self, sources: &mut [PlaylistSource]) -> Vec<ItemId> {
        let mut resolved = Vec::new();
        for source in sources.iter_mut().filter(|source| source.needs_resolution()) {
            match self.resolver.resolve_items(source).await {
                Ok(items) => {
                    debug!("playlist {} resolved to {} item(s)", source.id, items.len());
                    source.set_resolved_items(items);
                    resolved.push((source.id.clone(), source.items.clone()));
                }
                Err(error) => warn!("skipping playlist {}: {error}", source.label()),
            }
        }

        if !resolved.is_empty() {
            if let Err(error) = self.write_through(&resolved) {
                warn!("failed to persist resolved playlist items: {error}");
            }
        }

        sources
            .iter()
            .flat_map(|source| source.items.iter().cloned())
            .collect()
    }

    /// Merges resolutions into the latest stored config by playlist id.
    fn write_through(&self, resolved: &[(String, Vec<ItemId>)]) -> Result<(), InfraError> {
        update_config(self.store.as_ref(), |config| {
            for playlist in &mut config.playlists {
                if let Some((_, items)) = resolved.iter().find(|(id, _)| *id == playlist.id) {
                    playlist.set_resolved_items(items.clone());
                }
            }
            Ok(())
        })
    }
}
