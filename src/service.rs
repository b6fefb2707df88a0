//! Run coordination on top of the calculator
//!
//! - Completed result sets are cached per `"{city_code}:{uf}"` and served while
//!   younger than the caller's freshness window.
//! - A request for a key that is already being computed attaches to that run,
//!   unless the run has been superseded; then a new run replaces it.
//! - Starting a new run supersedes older ones; they stop between zones and
//!   their results are never cached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use futures::future::{BoxFuture, Shared};
use tracing::{debug, info};

use crate::RiskError;
use crate::cache::ResultCache;
use crate::config::CacheConfig;
use crate::models::ZoneRiskResult;
use crate::orchestrator::{CityRiskCalculator, ProgressReporter, RunTracker};

pub type RunOutcome = std::result::Result<Arc<Vec<ZoneRiskResult>>, RiskError>;

type SharedRun = Shared<BoxFuture<'static, RunOutcome>>;

struct InFlightRun {
    generation: u64,
    run: SharedRun,
}

type InFlightRuns = Arc<Mutex<HashMap<String, InFlightRun>>>;

/// Cache key of a municipality
#[must_use]
pub fn cache_key(city_code: &str, uf: &str) -> String {
    format!("{}:{}", city_code.trim(), uf.trim().to_uppercase())
}

fn lock(runs: &InFlightRuns) -> MutexGuard<'_, HashMap<String, InFlightRun>> {
    runs.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct RiskService {
    calculator: Arc<CityRiskCalculator>,
    cache: Arc<ResultCache<Arc<Vec<ZoneRiskResult>>>>,
    in_flight: InFlightRuns,
    tracker: Arc<RunTracker>,
    default_freshness: Duration,
}

impl RiskService {
    #[must_use]
    pub fn new(calculator: CityRiskCalculator, cache_config: &CacheConfig) -> Self {
        Self {
            calculator: Arc::new(calculator),
            cache: Arc::new(ResultCache::new(cache_config.retention())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            tracker: RunTracker::new(),
            default_freshness: cache_config.freshness(),
        }
    }

    #[must_use]
    pub fn calculator(&self) -> &CityRiskCalculator {
        &self.calculator
    }

    /// Ranked results for a municipality, computed at most once per key at a time
    ///
    /// `max_age` defaults to the configured freshness window. `progress` only
    /// receives events when this call starts a new run.
    pub async fn calculate(
        &self,
        city_code: &str,
        uf: &str,
        max_age: Option<Duration>,
        progress: ProgressReporter,
    ) -> RunOutcome {
        let key = cache_key(city_code, uf);
        let max_age = max_age.unwrap_or(self.default_freshness);

        if let Some(results) = self.cache.get(&key, max_age).await {
            info!("Serving cached results for {key}");
            return Ok(results);
        }

        let run = {
            let mut runs = lock(&self.in_flight);
            let current = self.tracker.current_generation();
            if let Some(existing) = runs.get(&key).filter(|run| run.generation == current) {
                debug!("Attaching to in-flight run for {key}");
                existing.run.clone()
            } else {
                if runs.contains_key(&key) {
                    debug!("In-flight run for {key} was superseded, starting a new one");
                }
                let (generation, run) = self.start_run(&key, city_code, uf, progress);
                runs.insert(
                    key.clone(),
                    InFlightRun {
                        generation,
                        run: run.clone(),
                    },
                );
                run
            }
        };

        run.await
    }

    /// Cached results no older than `max_age`, without computing anything
    pub async fn cached(&self, city_code: &str, uf: &str, max_age: Duration) -> Option<Arc<Vec<ZoneRiskResult>>> {
        self.cache.get(&cache_key(city_code, uf), max_age).await
    }

    /// Supersede every run in flight
    pub fn abandon_runs(&self) {
        let ticket = self.tracker.begin();
        info!("Abandoning runs older than generation {}", ticket.generation());
    }

    #[must_use]
    pub fn is_running(&self, city_code: &str, uf: &str) -> bool {
        lock(&self.in_flight).contains_key(&cache_key(city_code, uf))
    }

    /// Drop cache entries past their retention
    pub async fn purge_cache(&self) -> usize {
        self.cache.purge_expired().await
    }

    /// Purge the cache once per retention window until the task is aborted
    pub fn spawn_cache_purge(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.cache.retention());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = service.purge_cache().await;
                if purged > 0 {
                    info!("Purged {purged} expired result sets");
                }
            }
        })
    }

    fn start_run(
        &self,
        key: &str,
        city_code: &str,
        uf: &str,
        progress: ProgressReporter,
    ) -> (u64, SharedRun) {
        let ticket = self.tracker.begin();
        let generation = ticket.generation();
        info!("Starting run {generation} for {key}");

        let calculator = Arc::clone(&self.calculator);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let key = key.to_string();
        let city_code = city_code.trim().to_string();
        let uf = uf.trim().to_uppercase();

        // Spawned so the run survives the first caller going away
        let task = tokio::spawn(async move {
            let outcome = calculator
                .calculate_run(&city_code, &uf, &progress, &ticket)
                .await
                .map(Arc::new);

            if let Ok(results) = &outcome {
                if ticket.is_current() {
                    cache.put(&key, Arc::clone(results)).await;
                }
            }

            let mut runs = lock(&in_flight);
            if runs.get(&key).is_some_and(|run| run.generation == generation) {
                runs.remove(&key);
            }
            drop(runs);

            outcome
        });

        let run = async move {
            task.await
                .map_err(|e| RiskError::general(format!("calculation task failed: {e}")))?
        }
        .boxed()
        .shared();

        (generation, run)
    }
}
