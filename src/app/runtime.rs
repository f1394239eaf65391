use crate::adapters::http::HttpFetcher;
use crate::adapters::storage::LocalStorage;
use crate::app::commands::CommandHandler;
use crate::config::toml_config::ProbeConfig;
use crate::core::aggregator::ReportFormat;
use crate::core::cache::ProbeCache;
use crate::core::orchestrator::Orchestrator;
use crate::core::prober::{Prober, RetryPolicy};
use crate::core::store::SavedStore;
use crate::domain::ports::{Fetcher, Storage};
use crate::utils::error::Result;
use std::sync::Arc;

/// Explicitly constructed store, cache and orchestrator for one process.
pub struct Runtime<S: Storage, F: Fetcher> {
    pub store: Arc<SavedStore<S>>,
    pub cache: Arc<ProbeCache>,
    pub orchestrator: Arc<Orchestrator<F>>,
    pub handler: CommandHandler<S, F>,
}

impl Runtime<LocalStorage, HttpFetcher> {
    /// Filesystem store plus the reqwest fetcher.
    pub async fn from_config(config: &ProbeConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.probe)?;
        Ok(Self::assemble(config, LocalStorage::new(".".to_string()), fetcher).await)
    }
}

impl<S: Storage + 'static, F: Fetcher + 'static> Runtime<S, F> {
    pub async fn assemble(config: &ProbeConfig, storage: S, fetcher: F) -> Self {
        let store = Arc::new(
            SavedStore::load(storage, config.store.path.clone(), config.store.max_per_owner).await,
        );
        let cache = Arc::new(if config.cache.enabled {
            ProbeCache::new(config.cache_ttl()).with_unknown_ttl(config.unknown_ttl())
        } else {
            ProbeCache::disabled()
        });
        let prober = Prober::new(fetcher, &config.probe, RetryPolicy::from(&config.retry));
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            cache.clone(),
            prober,
            ReportFormat::from_config(&config.output, &config.probe.link_template),
            config.output.inline_max,
        ));
        let handler = CommandHandler::new(
            store.clone(),
            orchestrator.clone(),
            config.output.lines_per_chunk,
        );

        tracing::debug!(
            "Runtime ready: store={}, cap={}, cache_ttl={}s, max_concurrency={}",
            config.store.path,
            config.store.max_per_owner,
            config.cache.ttl_seconds,
            config.probe.max_concurrency
        );

        Self {
            store,
            cache,
            orchestrator,
            handler,
        }
    }
}
