//! Cache coordinator: serves lookups and refills the cache when needed.
//!
//! A read finds the cache in one of three states: fresh (served directly),
//! expired, or empty. Expired and empty both refill: probe the remote
//! version, download that version's content, write it through the store,
//! then serve the written document. A failed refill is reported to the
//! caller and leaves the previous cache in place; it never falls back to
//! serving the expired copy. A cache written for another locale counts as
//! expired.
//!
//! Refills are single-flight. A refill runs as its own task, so a caller
//! that gives up (a timeout, a dropped request) does not cancel the download
//! for everyone else. Callers arriving while it runs await the same task.
//! Every completed refill bumps a generation counter; a caller that saw an
//! older generation before deciding to refill takes the outcome of the
//! refill that finished in between, failure included, instead of starting
//! another. Fresh reads never touch the refill slot.
//!
//! Between processes sharing a cache directory, the refill task holds the
//! store's lock file while it probes, downloads and writes, and re-reads the
//! cache once it has the lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, ManifestFetcher, VersionProbe};
use crate::config::{Config, ConfigError};
use crate::error::{ManifestError, Result};
use crate::models::{CacheMetadata, CacheStatus, ManifestDocument, ManifestInfo, ManifestTable};

use super::policy;
use super::CacheStore;

#[derive(Clone)]
struct Refilled {
    metadata: CacheMetadata,
    document: Arc<ManifestDocument>,
}

type RefillFuture = Shared<BoxFuture<'static, Result<Refilled>>>;

#[derive(Default)]
struct RefillSlot {
    in_flight: Option<RefillFuture>,
    /// Outcome of the most recent refill, for callers that waited on it.
    last: Option<Result<Refilled>>,
}

impl RefillSlot {
    /// The running refill. A task that panicked never clears its slot, so a
    /// future that already resolved is not handed out again.
    fn pending(&self) -> Option<RefillFuture> {
        self.in_flight
            .as_ref()
            .filter(|refill| refill.peek().is_none())
            .cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefillMode {
    /// Skip the download if the cache became valid while waiting for the lock.
    IfStale,
    Always,
}

struct Inner<P, F> {
    probe: P,
    fetcher: F,
    store: CacheStore,
    max_age: Duration,
    locale: String,
    generation: AtomicU64,
    slot: Mutex<RefillSlot>,
}

pub struct CacheCoordinator<P = ApiClient, F = ApiClient> {
    inner: Arc<Inner<P, F>>,
}

impl CacheCoordinator<ApiClient, ApiClient> {
    /// Coordinator backed by the live API and the configured cache directory.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        let client = ApiClient::new(config)?;
        let store = CacheStore::new(config.cache_dir.clone());
        Ok(Self::new(
            client.clone(),
            client,
            store,
            config.max_age(),
            config.locale.clone(),
        ))
    }
}

impl<P, F> CacheCoordinator<P, F>
where
    P: VersionProbe + 'static,
    F: ManifestFetcher + 'static,
{
    pub fn new(
        probe: P,
        fetcher: F,
        store: CacheStore,
        max_age: Duration,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                probe,
                fetcher,
                store,
                max_age,
                locale: locale.into(),
                generation: AtomicU64::new(0),
                slot: Mutex::new(RefillSlot::default()),
            }),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    /// Compare the remote version with the cache. Always contacts the remote.
    ///
    /// A cache whose document is missing or does not match its metadata is
    /// reported as absent.
    pub async fn get_info(&self) -> Result<ManifestInfo> {
        let remote = self.inner.probe.current_version().await?;
        let metadata = self
            .inner
            .blocking(Inner::read_consistent)
            .await?
            .map(|cached| cached.metadata);

        let cache_valid = metadata
            .as_ref()
            .is_some_and(|m| self.inner.is_fresh(m, Utc::now()))
            && policy::matches_remote(metadata.as_ref(), &remote.version);

        Ok(ManifestInfo {
            remote_version: remote.version,
            cached_version: metadata.as_ref().map(|m| m.version.clone()),
            cache_valid,
            fetched_at: metadata.as_ref().map(|m| m.fetched_at),
            size_bytes: metadata.as_ref().map(|m| m.size_bytes),
        })
    }

    /// The whole manifest, refilling the cache first if it is empty or expired.
    pub async fn get_document(&self) -> Result<Arc<ManifestDocument>> {
        let observed = self.inner.generation.load(Ordering::Acquire);
        if let Some(cached) = self.inner.blocking(Inner::read_fresh).await? {
            debug!(version = %cached.metadata.version, "Manifest cache hit");
            return Ok(cached.document);
        }
        let refilled = self.refill(observed, RefillMode::IfStale).await?;
        Ok(refilled.document)
    }

    pub async fn get_table(&self, name: &str) -> Result<ManifestTable> {
        let document = self.get_document().await?;
        ManifestTable::new(document, name)
            .ok_or_else(|| ManifestError::TableNotFound(name.to_string()))
    }

    pub async fn get_definition(&self, table: &str, hash: &str) -> Result<Value> {
        let document = self.get_document().await?;
        if document.table(table).is_none() {
            return Err(ManifestError::TableNotFound(table.to_string()));
        }
        document
            .definition(table, hash)
            .cloned()
            .ok_or_else(|| ManifestError::DefinitionNotFound {
                table: table.to_string(),
                hash: hash.to_string(),
            })
    }

    /// Probe, download and write regardless of the cache's age.
    pub async fn force_refresh(&self) -> Result<CacheMetadata> {
        let observed = self.inner.generation.load(Ordering::Acquire);
        let refilled = self.refill(observed, RefillMode::Always).await?;
        Ok(refilled.metadata)
    }

    /// Remove the cached manifest. Waits for any in-flight refill.
    pub async fn clear(&self) -> Result<()> {
        let mut slot = loop {
            let slot = self.inner.slot.lock().await;
            match slot.pending() {
                Some(refill) => {
                    drop(slot);
                    let _ = refill.await;
                }
                None => break slot,
            }
        };

        self.inner
            .blocking(|inner| {
                let _lock = inner.store.lock()?;
                inner.store.invalidate()
            })
            .await?;

        slot.last = None;
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        info!("Manifest cache cleared");
        Ok(())
    }

    /// Local cache state without contacting the remote. `None` when nothing
    /// usable is cached.
    pub async fn status(&self) -> Result<Option<CacheStatus>> {
        let cached = self.inner.blocking(Inner::read_consistent).await?;

        let now = Utc::now();
        Ok(cached.map(|Refilled { metadata, document }| CacheStatus {
            valid: self.inner.is_fresh(&metadata, now),
            age: metadata.age_display(now),
            tables: document.table_names().map(str::to_string).collect(),
            metadata,
        }))
    }

    /// Join the running refill, take the outcome of one that completed since
    /// `observed`, or start a new one.
    async fn refill(&self, observed: u64, mode: RefillMode) -> Result<Refilled> {
        let refill = {
            let mut slot = self.inner.slot.lock().await;
            match slot.pending() {
                Some(refill) => {
                    debug!("Joining in-flight refill");
                    refill
                }
                None => {
                    if self.inner.generation.load(Ordering::Acquire) != observed {
                        if let Some(last) = &slot.last {
                            debug!("Using result of refill completed while waiting");
                            return last.clone();
                        }
                    }

                    let task = tokio::spawn(Arc::clone(&self.inner).run_refill(mode));
                    let refill: RefillFuture = task
                        .map(|joined| joined.unwrap_or_else(|e| Err(ManifestError::from(e))))
                        .boxed()
                        .shared();
                    slot.in_flight = Some(refill.clone());
                    refill
                }
            }
        };
        refill.await
    }
}

impl<P, F> Inner<P, F>
where
    P: VersionProbe + 'static,
    F: ManifestFetcher + 'static,
{
    /// Run blocking store work off the async workers.
    async fn blocking<T, G>(self: &Arc<Self>, op: G) -> Result<T>
    where
        G: FnOnce(&Self) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(self);
        tokio::task::spawn_blocking(move || op(inner.as_ref())).await?
    }

    /// Within the max age and for the configured locale.
    fn is_fresh(&self, metadata: &CacheMetadata, now: DateTime<Utc>) -> bool {
        policy::is_valid(Some(metadata), self.max_age, now)
            && policy::matches_locale(Some(metadata), &self.locale)
    }

    /// Metadata and document, if both are present and agree.
    fn read_consistent(&self) -> Result<Option<Refilled>> {
        match self.store.read_metadata()? {
            Some(metadata) => Ok(self
                .store
                .read_document_for(&metadata)?
                .map(|document| Refilled { metadata, document })),
            None => Ok(None),
        }
    }

    /// The cached manifest if it can be served without a refill.
    fn read_fresh(&self) -> Result<Option<Refilled>> {
        match self.store.read_metadata()? {
            Some(metadata) if self.is_fresh(&metadata, Utc::now()) => Ok(self
                .store
                .read_document_for(&metadata)?
                .map(|document| Refilled { metadata, document })),
            Some(metadata) => {
                debug!(
                    version = %metadata.version,
                    locale = %metadata.locale,
                    fetched_at = %metadata.fetched_at,
                    "Cached manifest expired or for another locale"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Body of the refill task. Records its outcome even if every caller
    /// has stopped waiting.
    async fn run_refill(self: Arc<Self>, mode: RefillMode) -> Result<Refilled> {
        let outcome = self.refill_exclusive(mode).await;

        let mut slot = self.slot.lock().await;
        slot.in_flight = None;
        slot.last = Some(outcome.clone());
        self.generation.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    async fn refill_exclusive(self: &Arc<Self>, mode: RefillMode) -> Result<Refilled> {
        let _lock = self.blocking(|inner| inner.store.lock()).await?;

        if mode == RefillMode::IfStale {
            // Another process sharing the cache directory may have refilled it.
            if let Some(cached) = self.blocking(Self::read_fresh).await? {
                debug!(version = %cached.metadata.version, "Cache refilled elsewhere while waiting");
                return Ok(cached);
            }
        }

        self.download_and_store().await
    }

    async fn download_and_store(self: &Arc<Self>) -> Result<Refilled> {
        let remote = self.probe.current_version().await?;
        let source_path = remote
            .content_path(&self.locale)
            .ok_or_else(|| {
                ApiError::UpstreamProtocol(format!(
                    "manifest {} has no '{}' content path (available: {})",
                    remote.version,
                    self.locale,
                    remote.locales().collect::<Vec<_>>().join(", ")
                ))
            })?
            .to_string();

        info!(version = %remote.version, path = %source_path, "Refilling manifest cache");
        let document = Arc::new(self.fetcher.fetch(&source_path).await?);
        if document.is_empty() {
            warn!(version = %remote.version, "Downloaded manifest has no tables");
        }

        let metadata = CacheMetadata {
            version: remote.version,
            fetched_at: Utc::now(),
            source_path,
            size_bytes: 0,
            locale: self.locale.clone(),
        };
        let written = Arc::clone(&document);
        let metadata = self
            .blocking(move |inner| inner.store.write(metadata, written))
            .await?;

        Ok(Refilled { metadata, document })
    }
}
