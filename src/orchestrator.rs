//! Background fetch orchestration.
//!
//! The UI publishes a [`PassPlan`] on a `watch` channel after every state
//! change. A single [`Orchestrator`] task runs one pass per plan, fetching
//! each selected prefecture that is not cached under the plan's category,
//! and reports back through an `mpsc` channel of [`PassEvent`]s.
//!
//! Passes never overlap. Plans that arrive while a pass is running
//! coalesce to the newest one, and the running pass stops before its next
//! network fetch. The rate limiter lives with the worker, so spacing holds
//! across pass boundaries as well as within a pass. Directory reloads are
//! requested through the plan too and share the same limiter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::PopulationCache;
use crate::models::{find_region, CachedSeries, Category, Region};

/// Where population data comes from. Implementations swallow their own
/// failures: an empty directory or `None` means the fetch did not succeed.
pub trait PopulationSource: Send + Sync + 'static {
    fn prefectures(&self) -> impl Future<Output = Vec<Region>> + Send;

    fn population(
        &self,
        region: &Region,
        category: Category,
    ) -> impl Future<Output = Option<CachedSeries>> + Send;
}

/// Snapshot of the state a pass works from.
#[derive(Debug, Clone, Default)]
pub struct PassPlan {
    /// Bumped on every state change.
    pub generation: u64,
    /// Bumped on every cache clear.
    pub epoch: u64,
    /// Selected codes in selection order.
    pub selection: Vec<u32>,
    pub category: Category,
    pub directory: Arc<Vec<Region>>,
    /// Bumped each time the directory should be (re)loaded.
    pub directory_request: u64,
}

/// Messages sent from background tasks back to the application.
#[derive(Debug, Clone)]
pub enum PassEvent {
    /// Prefecture directory loaded (empty on failure)
    Directory(Vec<Region>),
    /// A pass with a non-empty selection began
    Started { generation: u64 },
    /// A series was fetched and cached
    Cached {
        epoch: u64,
        code: u32,
        series: CachedSeries,
    },
    /// A fetch failed; the region stays uncached
    Failed { epoch: u64, code: u32, name: String },
    /// A pass ended, completed or superseded
    Finished {
        generation: u64,
        outcome: PassOutcome,
    },
}

/// Counters describing one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    pub fetched: usize,
    pub failed: usize,
    pub cache_hits: usize,
    pub skipped: usize,
    pub superseded: bool,
}

/// Enforces a minimum interval between the starts of consecutive fetches.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_start: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_start: None,
        }
    }

    /// Wait until a fetch may start.
    pub async fn ready(&self) {
        if let Some(last) = self.last_start {
            tokio::time::sleep_until(last + self.interval).await;
        }
    }

    /// Record that a fetch is starting now.
    pub fn mark(&mut self) {
        self.last_start = Some(Instant::now());
    }
}

/// Helper to send events, logging any channel errors
async fn emit(events: &mpsc::Sender<PassEvent>, event: PassEvent) {
    if let Err(e) = events.send(event).await {
        error!(error = %e, "Failed to send pass event - channel closed");
    }
}

pub struct Orchestrator<S> {
    source: S,
    cache: PopulationCache,
    epoch: u64,
    limiter: RateLimiter,
    directory_served: u64,
}

impl<S: PopulationSource> Orchestrator<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            source,
            cache: PopulationCache::new(),
            epoch: 0,
            limiter: RateLimiter::new(interval),
            directory_served: 0,
        }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &PopulationCache {
        &self.cache
    }

    /// Load the prefecture directory and report it.
    pub async fn load_directory(&mut self, events: &mpsc::Sender<PassEvent>) {
        self.limiter.ready().await;
        self.limiter.mark();

        let regions = self.source.prefectures().await;
        if regions.is_empty() {
            warn!("Prefecture directory is empty");
        } else {
            info!(count = regions.len(), "Prefecture directory loaded");
        }
        emit(events, PassEvent::Directory(regions)).await;
    }

    /// Run one orchestration pass.
    ///
    /// Fetches every selected region lacking a valid entry for the plan's
    /// category, in selection order. Failures are counted and reported but
    /// never stop the loop. `superseded` is polled before each network
    /// fetch; when it returns true the pass ends early.
    pub async fn run_pass<F>(
        &mut self,
        plan: &PassPlan,
        events: &mpsc::Sender<PassEvent>,
        superseded: F,
    ) -> PassOutcome
    where
        F: Fn() -> bool,
    {
        if plan.epoch != self.epoch {
            debug!(from = self.epoch, to = plan.epoch, "Cache epoch changed, clearing");
            self.cache.clear();
            self.epoch = plan.epoch;
        }

        let mut outcome = PassOutcome::default();

        if !plan.selection.is_empty() {
            emit(events, PassEvent::Started { generation: plan.generation }).await;
            self.fetch_missing(plan, events, &superseded, &mut outcome).await;
        }

        debug!(generation = plan.generation, ?outcome, "Pass finished");
        emit(
            events,
            PassEvent::Finished {
                generation: plan.generation,
                outcome,
            },
        )
        .await;
        outcome
    }

    async fn fetch_missing<F>(
        &mut self,
        plan: &PassPlan,
        events: &mpsc::Sender<PassEvent>,
        superseded: &F,
        outcome: &mut PassOutcome,
    ) where
        F: Fn() -> bool,
    {
        for &code in &plan.selection {
            if self.cache.is_valid(code, plan.category) {
                outcome.cache_hits += 1;
                continue;
            }

            let Some(region) = find_region(&plan.directory, code) else {
                debug!(code, "Selected code not in directory, skipping");
                outcome.skipped += 1;
                continue;
            };

            self.limiter.ready().await;
            if superseded() {
                debug!(generation = plan.generation, "Pass superseded");
                outcome.superseded = true;
                return;
            }
            self.limiter.mark();

            match self.source.population(region, plan.category).await {
                Some(series) => {
                    debug!(code, category = %plan.category, points = series.points.len(), "Series cached");
                    self.cache.insert(code, series.clone());
                    outcome.fetched += 1;
                    emit(
                        events,
                        PassEvent::Cached {
                            epoch: plan.epoch,
                            code,
                            series,
                        },
                    )
                    .await;
                }
                None => {
                    outcome.failed += 1;
                    emit(
                        events,
                        PassEvent::Failed {
                            epoch: plan.epoch,
                            code,
                            name: region.name.clone(),
                        },
                    )
                    .await;
                }
            }
        }
    }

    /// Serve plans until the UI side drops its sender.
    pub async fn run(mut self, mut plans: watch::Receiver<PassPlan>, events: mpsc::Sender<PassEvent>) {
        info!("Orchestrator started");
        while plans.changed().await.is_ok() {
            let plan = plans.borrow_and_update().clone();
            if plan.directory_request != self.directory_served {
                self.directory_served = plan.directory_request;
                self.load_directory(&events).await;
            }
            self.run_pass(&plan, &events, || plans.has_changed().unwrap_or(true))
                .await;
        }
        info!("Orchestrator stopped");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use crate::models::SeriesPoint;

    type Calls = Arc<Mutex<Vec<(u32, Category, Instant)>>>;
    type DirectoryCalls = Arc<Mutex<Vec<Instant>>>;

    /// Scripted source recording when each fetch started.
    #[derive(Clone, Default)]
    struct FakeSource {
        calls: Calls,
        directory_calls: DirectoryCalls,
        failing: Arc<HashSet<u32>>,
        directory_fails: bool,
    }

    impl FakeSource {
        fn failing(codes: &[u32]) -> Self {
            Self {
                failing: Arc::new(codes.iter().copied().collect()),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(u32, Category, Instant)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PopulationSource for FakeSource {
        async fn prefectures(&self) -> Vec<Region> {
            self.directory_calls.lock().unwrap().push(Instant::now());
            if self.directory_fails {
                Vec::new()
            } else {
                directory().as_ref().clone()
            }
        }

        async fn population(&self, region: &Region, category: Category) -> Option<CachedSeries> {
            self.calls
                .lock()
                .unwrap()
                .push((region.code, category, Instant::now()));
            if self.failing.contains(&region.code) {
                return None;
            }
            Some(CachedSeries {
                region_name: region.name.clone(),
                points: vec![SeriesPoint {
                    year: 2020,
                    value: region.code as i64 * 1000,
                }],
                category,
                boundary_year: Some(2020),
            })
        }
    }

    fn directory() -> Arc<Vec<Region>> {
        Arc::new(vec![
            Region::new(1, "北海道"),
            Region::new(13, "東京都"),
            Region::new(27, "大阪府"),
        ])
    }

    fn plan(generation: u64, epoch: u64, selection: &[u32], category: Category) -> PassPlan {
        PassPlan {
            generation,
            epoch,
            selection: selection.to_vec(),
            category,
            directory: directory(),
            directory_request: 0,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<PassEvent>) -> Vec<PassEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn assert_spaced(calls: &[(u32, Category, Instant)], min: Duration) {
        for pair in calls.windows(2) {
            assert!(
                pair[1].2 - pair[0].2 >= min,
                "fetches for {} and {} started too close together",
                pair[0].0,
                pair[1].0
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_region_total() {
        let source = FakeSource::default();
        let mut orchestrator = Orchestrator::new(source.clone(), Duration::from_secs(1));
        let (tx, mut rx) = mpsc::channel(16);

        let outcome = orchestrator
            .run_pass(&plan(1, 0, &[13], Category::Total), &tx, || false)
            .await;

        assert_eq!(outcome.fetched, 1);
        let calls = source.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!((calls[0].0, calls[0].1.index()), (13, 0));

        let cached = orchestrator.cache().get_valid(13, Category::Total).unwrap();
        assert_eq!(cached.region_name, "東京都");

        let events = drain(&mut rx);
        assert!(matches!(events[0], PassEvent::Started { generation: 1 }));
        assert!(matches!(events[1], PassEvent::Cached { code: 13, epoch: 0, .. }));
        assert!(matches!(events[2], PassEvent::Finished { generation: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_category_switch_refetches_with_spacing() {
        let source = FakeSource::default();
        let mut orchestrator = Orchestrator::new(source.clone(), Duration::from_secs(1));
        let (tx, _rx) = mpsc::channel(64);

        orchestrator
            .run_pass(&plan(1, 0, &[13, 27], Category::Total), &tx, || false)
            .await;
        assert!(orchestrator.cache().is_valid(27, Category::Total));

        // Switching to youth clears the cache (new epoch).
        let outcome = orchestrator
            .run_pass(&plan(2, 1, &[13, 27], Category::Youth), &tx, || false)
            .await;
        assert_eq!(outcome.fetched, 2);
        assert_eq!(outcome.cache_hits, 0);

        let calls = source.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(
            calls[2..].iter().map(|c| (c.0, c.1)).collect::<Vec<_>>(),
            vec![(13, Category::Youth), (27, Category::Youth)]
        );
        assert_spaced(&calls, Duration::from_secs(1));

        for code in [13, 27] {
            assert_eq!(orchestrator.cache().get(code).unwrap().category_tag(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hits_do_not_fetch_or_wait() {
        let source = FakeSource::default();
        let mut orchestrator = Orchestrator::new(source.clone(), Duration::from_secs(1));
        let (tx, _rx) = mpsc::channel(64);

        orchestrator
            .run_pass(&plan(1, 0, &[13], Category::Total), &tx, || false)
            .await;

        let before = Instant::now();
        let outcome = orchestrator
            .run_pass(&plan(2, 0, &[13], Category::Total), &tx, || false)
            .await;
        assert_eq!(Instant::now(), before);
        assert_eq!(outcome.cache_hits, 1);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_region_is_omitted_and_retried() {
        let source = FakeSource::failing(&[27]);
        let mut orchestrator = Orchestrator::new(source.clone(), Duration::from_secs(1));
        let (tx, mut rx) = mpsc::channel(64);

        let outcome = orchestrator
            .run_pass(&plan(1, 0, &[27, 13], Category::Total), &tx, || false)
            .await;
        assert_eq!((outcome.fetched, outcome.failed), (1, 1));
        assert!(orchestrator.cache().get(27).is_none());
        assert!(orchestrator.cache().is_valid(13, Category::Total));

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, PassEvent::Failed { code: 27, name, .. } if name == "大阪府")));

        // Next pass retries only the failed region.
        orchestrator
            .run_pass(&plan(2, 0, &[27, 13], Category::Total), &tx, || false)
            .await;
        let codes: Vec<u32> = source.calls().iter().map(|c| c.0).collect();
        assert_eq!(codes, vec![27, 13, 27]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_region_skipped() {
        let source = FakeSource::default();
        let mut orchestrator = Orchestrator::new(source.clone(), Duration::from_secs(1));
        let (tx, _rx) = mpsc::channel(16);

        let outcome = orchestrator
            .run_pass(&plan(1, 0, &[99, 1], Category::Elderly), &tx, || false)
            .await;
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.fetched, 1);
        assert_eq!(source.calls()[0].0, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_selection_only_finishes() {
        let mut orchestrator = Orchestrator::new(FakeSource::default(), Duration::from_secs(1));
        let (tx, mut rx) = mpsc::channel(16);

        orchestrator
            .run_pass(&plan(7, 0, &[], Category::Total), &tx, || false)
            .await;
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PassEvent::Finished { generation: 7, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_pass_stops_before_next_fetch() {
        let source = FakeSource::default();
        let mut orchestrator = Orchestrator::new(source.clone(), Duration::from_secs(1));
        let (tx, _rx) = mpsc::channel(16);

        let calls = source.calls.clone();
        let outcome = orchestrator
            .run_pass(&plan(1, 0, &[1, 13, 27], Category::Total), &tx, move || {
                !calls.lock().unwrap().is_empty()
            })
            .await;
        assert!(outcome.superseded);
        assert_eq!(outcome.fetched, 1);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_holds_across_passes() {
        let source = FakeSource::default();
        let mut orchestrator = Orchestrator::new(source.clone(), Duration::from_secs(1));
        let (tx, _rx) = mpsc::channel(64);

        orchestrator
            .run_pass(&plan(1, 0, &[13], Category::Total), &tx, || false)
            .await;
        orchestrator
            .run_pass(&plan(2, 0, &[13, 27], Category::Total), &tx, || false)
            .await;

        let calls = source.calls();
        assert_eq!(calls.len(), 2);
        assert_spaced(&calls, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_serves_latest_plan() {
        let source = FakeSource::default();
        let orchestrator = Orchestrator::new(source.clone(), Duration::from_secs(1));
        let (plan_tx, plan_rx) = watch::channel(PassPlan::default());
        let (tx, mut rx) = mpsc::channel(64);

        let worker = tokio::spawn(orchestrator.run(plan_rx, tx));
        plan_tx.send_replace(plan(1, 0, &[13, 27], Category::Total));

        loop {
            match rx.recv().await {
                Some(PassEvent::Finished { generation: 1, outcome }) => {
                    assert_eq!(outcome.fetched, 2);
                    break;
                }
                Some(_) => {}
                None => panic!("orchestrator exited early"),
            }
        }

        drop(plan_tx);
        worker.await.unwrap();
        assert_spaced(&source.calls(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_directory_failure_reports_empty() {
        let source = FakeSource {
            directory_fails: true,
            ..FakeSource::default()
        };
        let mut orchestrator = Orchestrator::new(source, Duration::from_secs(1));
        let (tx, mut rx) = mpsc::channel(4);
        orchestrator.load_directory(&tx).await;
        assert!(matches!(rx.recv().await, Some(PassEvent::Directory(regions)) if regions.is_empty()));

        let mut orchestrator = Orchestrator::new(FakeSource::default(), Duration::from_secs(1));
        orchestrator.load_directory(&tx).await;
        assert!(matches!(rx.recv().await, Some(PassEvent::Directory(regions)) if regions.len() == 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_directory_reload_waits_for_rate_limit() {
        let source = FakeSource::default();
        let mut orchestrator = Orchestrator::new(source.clone(), Duration::from_secs(1));
        let (tx, _rx) = mpsc::channel(16);

        orchestrator
            .run_pass(&plan(1, 0, &[13], Category::Total), &tx, || false)
            .await;
        orchestrator.load_directory(&tx).await;

        let fetch_start = source.calls()[0].2;
        let directory_start = source.directory_calls.lock().unwrap()[0];
        assert!(directory_start - fetch_start >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loads_directory_once_per_request() {
        let source = FakeSource::default();
        let orchestrator = Orchestrator::new(source.clone(), Duration::from_secs(1));
        let (plan_tx, plan_rx) = watch::channel(PassPlan::default());
        let (tx, mut rx) = mpsc::channel(64);

        let worker = tokio::spawn(orchestrator.run(plan_rx, tx));
        plan_tx.send_replace(PassPlan {
            generation: 1,
            directory_request: 1,
            ..PassPlan::default()
        });

        assert!(matches!(rx.recv().await, Some(PassEvent::Directory(regions)) if regions.len() == 3));
        assert!(matches!(rx.recv().await, Some(PassEvent::Finished { generation: 1, .. })));

        // A later plan with the same request does not reload.
        let mut next = plan(2, 0, &[13], Category::Total);
        next.directory_request = 1;
        plan_tx.send_replace(next);
        loop {
            match rx.recv().await {
                Some(PassEvent::Finished { generation: 2, .. }) => break,
                Some(PassEvent::Directory(_)) => panic!("directory reloaded without a request"),
                Some(_) => {}
                None => panic!("orchestrator exited early"),
            }
        }

        drop(plan_tx);
        worker.await.unwrap();
        assert_eq!(source.directory_calls.lock().unwrap().len(), 1);
    }
}
