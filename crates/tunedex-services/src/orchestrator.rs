//! Request orchestrator
//!
//! The single entry point for inbound requests. Pipeline per request:
//! admission (shape + rate limit), cache lookup, in-flight coalescing,
//! handler dispatch under a deadline with bounded retries, then delivery
//! bookkeeping (usage recording, deferred artifact release, caching).
//!
//! Coalescing is keyed purely by the normalized input fingerprint: the first
//! request becomes the leader and executes; identical concurrent requests
//! wait on a watch channel and receive a clone of the leader's outcome.
//! Every coalesced requester is still charged their own rate-limit slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

use tunedex_adapters::{
    Capability, CapabilityContext, CapabilityRegistry, FingerprintAdapter, MediaLimits,
    PlatformAdapter, YtDlpExtractor,
};
use tunedex_core::hooks::{NoOpUsageReporter, UsageReporter};
use tunedex_core::models::{
    CacheKey, Outcome, Platform, Request, RequestKind, RequestPayload, RequesterId,
};
use tunedex_core::validation::is_valid_url;
use tunedex_core::{Config, RequestError};
use tunedex_store::ArtifactStore;

use crate::cache::ResultCache;
use crate::rate_limit::RequestRateLimiter;

// Plain mutex: the in-flight map is only ever locked for a lookup or an
// insert/remove, never across an await, and a synchronous lock lets the
// leader's drop guard clean up from inside Drop.
type InflightMap = Mutex<HashMap<CacheKey, watch::Receiver<Option<Outcome>>>>;

pub struct Orchestrator {
    registry: CapabilityRegistry,
    limiter: RequestRateLimiter,
    cache: ResultCache,
    store: Arc<ArtifactStore>,
    usage: Arc<dyn UsageReporter>,
    inflight: InflightMap,
    ctx: CapabilityContext,
    handler_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    artifact_grace: Duration,
}

impl Orchestrator {
    pub fn builder(config: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn usage(&self) -> &Arc<dyn UsageReporter> {
        &self.usage
    }

    /// Handle one inbound request to completion.
    pub async fn handle(&self, requester: RequesterId, payload: RequestPayload) -> Outcome {
        self.validate_shape(&payload)?;

        if let Err(e) = self.usage.record_requester(requester).await {
            tracing::warn!(error = %e, "Usage reporter failed to record requester");
        }

        // Every request is charged, coalesced or not
        if let Err(retry_in) = self.limiter.check_and_increment(requester).await {
            tracing::info!(requester = %requester, retry_in_secs = retry_in.as_secs(), "Rate limit hit");
            return Err(RequestError::RateLimited {
                retry_in_secs: retry_in.as_secs().max(1),
            });
        }

        let request = Request::new(requester, payload);
        let key = request.cache_key();

        if let Some(outcome) = self.cached(&key).await {
            tracing::debug!(key = %key, "Cache hit");
            self.record_delivery(&request, &outcome, false).await;
            return outcome;
        }

        // Single flight: first request for a key leads, the rest wait.
        // Decide under the lock, await after the guard's scope ends so the
        // future stays `Send`.
        let flight = {
            let mut inflight = self.lock_inflight();
            if let Some(rx) = inflight.get(&key) {
                Err(rx.clone())
            } else {
                let (tx, rx) = watch::channel(None);
                inflight.insert(key.clone(), rx);
                let guard = FlightGuard {
                    orchestrator: self,
                    key: key.clone(),
                };
                Ok((tx, guard))
            }
        };
        let (tx, guard) = match flight {
            Err(rx) => {
                tracing::debug!(key = %key, "Joining in-flight request");
                let outcome = self.wait_for_leader(rx).await;
                self.record_delivery(&request, &outcome, false).await;
                return outcome;
            }
            Ok(pair) => pair,
        };

        let outcome = self.execute(&request).await;

        if let Ok(fulfillment) = &outcome {
            if let Some(artifact) = &fulfillment.artifact {
                let _ = self
                    .store
                    .schedule_release(artifact.id, self.artifact_grace);
            }
            self.cache.put(key.clone(), outcome.clone()).await;
        }

        drop(guard);
        // Waiters hold their own receiver; send after removal is fine
        let _ = tx.send(Some(outcome.clone()));

        self.record_delivery(&request, &outcome, true).await;
        outcome
    }

    /// Totals from the usage reporter.
    pub async fn usage_snapshot(
        &self,
    ) -> Result<tunedex_core::hooks::UsageSnapshot, RequestError> {
        self.usage
            .snapshot()
            .await
            .map_err(RequestError::Internal)
    }

    /// Spawn the periodic maintenance task: cache sweep plus rate-limit
    /// bucket cleanup. The artifact sweeper runs separately on the store.
    pub fn start_maintenance(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.tick().await;
            loop {
                tick.tick().await;
                let swept = orchestrator.cache.sweep().await;
                let cleaned = orchestrator.limiter.cleanup_expired_buckets().await;
                tracing::debug!(cache_swept = swept, buckets_cleaned = cleaned, "Maintenance pass");
            }
        })
    }

    fn validate_shape(&self, payload: &RequestPayload) -> Result<(), RequestError> {
        match payload {
            RequestPayload::Clip { data, filename } => {
                if data.is_empty() {
                    return Err(RequestError::UnsupportedInput("empty clip".to_string()));
                }
                if filename.trim().is_empty() {
                    return Err(RequestError::UnsupportedInput(
                        "clip has no filename".to_string(),
                    ));
                }
                if data.len() as u64 > self.ctx.limits.max_bytes {
                    return Err(RequestError::SizeOrDurationExceeded(format!(
                        "clip is {} bytes, limit is {}",
                        data.len(),
                        self.ctx.limits.max_bytes
                    )));
                }
            }
            RequestPayload::Link { url } => {
                if !is_valid_url(url) {
                    return Err(RequestError::UnsupportedInput(format!(
                        "not a valid url: {}",
                        url
                    )));
                }
            }
        }
        Ok(())
    }

    /// Cache lookup. An entry whose artifact was already reclaimed is a
    /// miss, not a hit pointing at a missing file.
    async fn cached(&self, key: &CacheKey) -> Option<Outcome> {
        let outcome = self.cache.get(key).await?;
        if let Ok(fulfillment) = &outcome {
            if let Some(artifact) = &fulfillment.artifact {
                if !self.store.contains(artifact.id).await {
                    tracing::debug!(key = %key, artifact_id = %artifact.id, "Cached artifact reclaimed, treating as miss");
                    self.cache.invalidate(key).await;
                    return None;
                }
            }
        }
        Some(outcome)
    }

    fn lock_inflight(&self) -> MutexGuard<'_, HashMap<CacheKey, watch::Receiver<Option<Outcome>>>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn wait_for_leader(&self, mut rx: watch::Receiver<Option<Outcome>>) -> Outcome {
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                // Leader dropped without publishing; its guard has already
                // freed the key for the next requester
                return Err(RequestError::Internal(
                    "coalesced request was aborted".to_string(),
                ));
            }
        }
    }

    /// Dispatch to the resolved handler with a per-attempt deadline and a
    /// bounded retry budget for transient failures.
    async fn execute(&self, request: &Request) -> Outcome {
        let Some(handler) = self.registry.resolve(&request.payload).await else {
            return Err(RequestError::UnsupportedInput(
                "no handler for this input".to_string(),
            ));
        };

        let mut attempt: u32 = 1;
        loop {
            let outcome = self.attempt(&handler, request).await;

            match &outcome {
                Ok(_) => return outcome,
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = self.retry_backoff * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        handler = handler.name(),
                        attempt,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::info!(handler = handler.name(), attempt, error = %e, "Request failed");
                    return outcome;
                }
            }
        }
    }

    async fn attempt(&self, handler: &Arc<dyn Capability>, request: &Request) -> Outcome {
        match tokio::time::timeout(self.handler_timeout, handler.execute(request, &self.ctx)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(RequestError::Timeout {
                elapsed_secs: self.handler_timeout.as_secs(),
            }),
        }
    }

    /// Record a delivered success. `fresh` distinguishes handler work from
    /// cache and coalesced deliveries; both count, the requester got a
    /// result either way.
    async fn record_delivery(&self, request: &Request, outcome: &Outcome, fresh: bool) {
        if outcome.is_err() {
            return;
        }
        let result = match request.kind() {
            Some(RequestKind::Recognition) => self.usage.record_recognition().await,
            Some(RequestKind::Retrieval(platform)) => self.usage.record_retrieval(platform).await,
            None => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, fresh, "Usage reporter failed to record delivery");
        }
    }
}

/// Frees the leader's in-flight entry on every exit path, including the
/// leader future being dropped before it publishes.
struct FlightGuard<'a> {
    orchestrator: &'a Orchestrator,
    key: CacheKey,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.lock_inflight().remove(&self.key);
    }
}

/// Wires an `Orchestrator` from configuration plus optional collaborators.
pub struct OrchestratorBuilder {
    config: Config,
    registry: CapabilityRegistry,
    store: Option<Arc<ArtifactStore>>,
    usage: Option<Arc<dyn UsageReporter>>,
    default_capabilities: bool,
}

impl OrchestratorBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: CapabilityRegistry::new(),
            store: None,
            usage: None,
            default_capabilities: false,
        }
    }

    pub fn registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn store(mut self, store: Arc<ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn usage_reporter(mut self, usage: Arc<dyn UsageReporter>) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Register the production capability set: the fingerprint recognition
    /// adapter plus one retrieval adapter per supported platform, all on the
    /// configured extractor binary.
    pub fn with_default_capabilities(mut self) -> Self {
        self.default_capabilities = true;
        self
    }

    pub async fn build(self) -> anyhow::Result<Arc<Orchestrator>> {
        self.config.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => Arc::new(
                ArtifactStore::new(self.config.artifact_dir.clone(), self.config.artifact_grace)
                    .await?,
            ),
        };

        if self.default_capabilities {
            let recognition = FingerprintAdapter::new(&self.config)?;
            self.registry
                .register_recognition(Arc::new(recognition))
                .await;

            let extractor: Arc<YtDlpExtractor> =
                Arc::new(YtDlpExtractor::new(self.config.extractor_bin.clone()));
            for platform in Platform::ALL {
                self.registry
                    .register_platform(
                        platform,
                        Arc::new(PlatformAdapter::for_platform(platform, extractor.clone())),
                    )
                    .await;
            }
        }

        let ctx = CapabilityContext {
            store: Arc::clone(&store),
            limits: MediaLimits::from_config(&self.config),
        };

        Ok(Arc::new(Orchestrator {
            registry: self.registry,
            limiter: RequestRateLimiter::new(
                self.config.rate_limit_ceiling,
                self.config.rate_limit_window,
            ),
            cache: ResultCache::new(self.config.cache_capacity, self.config.cache_ttl),
            store,
            usage: self.usage.unwrap_or_else(|| Arc::new(NoOpUsageReporter)),
            inflight: Mutex::new(HashMap::new()),
            ctx,
            handler_timeout: self.config.handler_timeout,
            max_retries: self.config.max_retries.max(1),
            retry_backoff: self.config.retry_backoff,
            artifact_grace: self.config.artifact_grace,
        }))
    }
}
