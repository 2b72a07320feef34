use crate::dispatch::DedupSet;
use crate::error::{Result, ScanError};
use crate::harvest::{HarvestClient, HarvestConfig, HarvestStep};
use crate::output::{OutputSink, Stream};
use crate::record::{CandidateRecord, DiscoveryEdge, ResolvedAddress};
use crate::resolver::{EndpointResolver, NameResolver, locator_host};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Called with each newly dispatched address and the running dispatch count
pub type ProgressCallback = Arc<dyn Fn(&ResolvedAddress, usize) + Send + Sync>;

#[derive(Debug, Default)]
struct CrawlStats {
    edges: AtomicUsize,
    dispatched: AtomicUsize,
    summaries: AtomicUsize,
    tests: AtomicUsize,
    results: AtomicUsize,
    abandoned: AtomicUsize,
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub edges: usize,
    pub dispatched: usize,
    pub summaries: usize,
    pub tests: usize,
    pub results: usize,
    pub abandoned: usize,
}

/// Resolves records, dedups addresses and harvests each one once.
///
/// Clones share the same dedup set, output sink and task tracker, so a clone
/// moved into a spawned task feeds the same run.
#[derive(Clone)]
pub struct Mapper {
    client: HarvestClient,
    resolver: EndpointResolver,
    seen: Arc<DedupSet>,
    sink: OutputSink,
    tracker: TaskTracker,
    stats: Arc<CrawlStats>,
    progress_callback: Option<ProgressCallback>,
}

impl Mapper {
    pub fn new(config: HarvestConfig, sink: OutputSink) -> Result<Self> {
        let resolver = EndpointResolver::new().with_max_depth(config.max_resolve_depth);
        Ok(Self {
            client: HarvestClient::new(config)?,
            resolver,
            seen: Arc::new(DedupSet::new()),
            sink,
            tracker: TaskTracker::new(),
            stats: Arc::new(CrawlStats::default()),
            progress_callback: None,
        })
    }

    pub fn with_resolver(mut self, names: Arc<dyn NameResolver>) -> Self {
        let depth = self.client.config().max_resolve_depth;
        self.resolver = EndpointResolver::with_resolver(names).with_max_depth(depth);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Resolve a record's locator and dispatch every address it leads to
    pub async fn resolve(&self, record: &CandidateRecord) {
        let host = match locator_host(&record.locator) {
            Ok(Some(host)) => host,
            Ok(None) => {
                debug!(origin = %record.origin, "No host in locator {:?}", record.locator);
                return;
            }
            Err(e) => {
                warn!(origin = %record.origin, "Dropping record: {}", e);
                return;
            }
        };

        self.resolve_host(&host, &record.origin).await;
    }

    async fn resolve_host(&self, host: &str, origin: &str) {
        for address in self.resolver.resolve_host(host).await {
            self.dispatch(address, origin);
        }
    }

    /// Record the edge, then start a harvest if this address has not had one
    pub fn dispatch(&self, address: ResolvedAddress, origin: &str) {
        let edge = DiscoveryEdge {
            address,
            origin: origin.to_string(),
        };
        match serde_json::to_vec(&edge) {
            Ok(line) => {
                self.sink.send(Stream::Edges, line);
                self.stats.edges.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => warn!(address = %address, origin = %origin, "Failed to encode edge: {}", e),
        }

        if !self.seen.try_insert(&address) {
            debug!(address = %address, origin = %origin, "Already dispatched");
            return;
        }

        let count = self.stats.dispatched.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(ref callback) = self.progress_callback {
            callback(&address, count);
        }

        let mapper = self.clone();
        self.tracker.spawn(async move {
            mapper.harvest(address).await;
        });
    }

    /// Run the harvest protocol against one address. Failures stay local to it.
    pub async fn harvest(&self, address: ResolvedAddress) {
        match self.run_protocol(&address).await {
            Ok(()) => debug!(address = %address, "Harvest complete"),
            Err((step, e)) => {
                self.stats.abandoned.fetch_add(1, Ordering::Relaxed);
                warn!(address = %address, step = %step, "Abandoning host: {}", e);
            }
        }
    }

    async fn run_protocol(
        &self,
        address: &ResolvedAddress,
    ) -> std::result::Result<(), (HarvestStep, ScanError)> {
        info!(address = %address, "Getting summary");
        let summary = self
            .client
            .fetch_summary(address)
            .await
            .map_err(|e| (HarvestStep::Summary, e))?;
        self.sink.send(Stream::Summaries, summary);
        self.stats.summaries.fetch_add(1, Ordering::Relaxed);

        info!(address = %address, "Getting test list");
        let tests = self
            .client
            .fetch_tests(address)
            .await
            .map_err(|e| (HarvestStep::TestList, e))?;
        self.stats.tests.fetch_add(tests.len(), Ordering::Relaxed);

        let origin = address.to_string();
        for test in &tests {
            self.dispatch_discovered(&test.destination_ip, &origin).await;
            self.dispatch_discovered(&test.source_ip, &origin).await;
        }

        info!(address = %address, "Getting test results");
        let results = self
            .client
            .fetch_results(address)
            .await
            .map_err(|e| (HarvestStep::Results, e))?;
        self.stats.results.fetch_add(results.len(), Ordering::Relaxed);
        for result in results {
            self.sink.send(Stream::Results, result.get().as_bytes().to_vec());
        }

        Ok(())
    }

    /// Test endpoints are usually literal addresses but may be hostnames
    async fn dispatch_discovered(&self, endpoint: &str, origin: &str) {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return;
        }
        match ResolvedAddress::parse(endpoint) {
            Some(address) => self.dispatch(address, origin),
            None => self.resolve_host(endpoint, origin).await,
        }
    }

    /// Spawn work that the run must finish before it ends
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    /// Wait for every tracked task, including harvests spawned while waiting
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn dispatched_count(&self) -> usize {
        self.seen.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            edges: self.stats.edges.load(Ordering::Relaxed),
            dispatched: self.stats.dispatched.load(Ordering::Relaxed),
            summaries: self.stats.summaries.load(Ordering::Relaxed),
            tests: self.stats.tests.load(Ordering::Relaxed),
            results: self.stats.results.load(Ordering::Relaxed),
            abandoned: self.stats.abandoned.load(Ordering::Relaxed),
        }
    }
}
