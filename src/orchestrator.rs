//! City-wide risk calculation run
//!
//! A run walks the state machine `fetching_data → calculating → done`, or ends
//! in `error` when the municipality cannot be resolved or partitioned. Zones
//! are processed one after another; within a zone the elevation and
//! infrastructure fetches run concurrently. A zone whose data cannot be
//! gathered or scored gets a fixed low-risk fallback and the run goes on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};

use futures::{StreamExt, TryStreamExt, stream};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, error, info, instrument, warn};

use crate::RiskError;
use crate::analysis::grid::grid_side;
use crate::analysis::scoring::{INSUFFICIENT_DATA_NOTE, SCORING_ERROR_NOTE, fallback_result};
use crate::analysis::{
    InfrastructureSummary, RiskDistribution, ZoneSignals, partition, score_zone, slope_percent,
    validate_grid, validate_weights,
};
use crate::config::GridConfig;
use crate::geodata::{GeodataProvider, sample_elevation_with_fallback};
use crate::models::{
    BoundingBox, CalculationProgress, CalculationStatus, Zone, ZoneRiskResult,
};
use crate::municipality::{HistoricalRiskSource, MunicipalityDirectory};

/// Percentage reached once the bounding box is known
pub const BBOX_CHECKPOINT: u8 = 5;
/// Percentage reached once the zones exist
pub const PARTITION_CHECKPOINT: u8 = 10;

/// Side channel for progress events of one run
///
/// Events are dropped silently when nobody listens.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    sender: Option<UnboundedSender<CalculationProgress>>,
    last_percentage: AtomicU8,
    last_completed: AtomicU32,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(sender: UnboundedSender<CalculationProgress>) -> Self {
        Self {
            sender: Some(sender),
            ..Self::default()
        }
    }

    /// Reporter plus the receiving end of its events
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<CalculationProgress>) {
        let (sender, receiver) = unbounded_channel();
        (Self::new(sender), receiver)
    }

    /// Reporter that discards every event
    #[must_use]
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn report(&self, progress: CalculationProgress) {
        self.last_percentage
            .store(progress.percentage, Ordering::Relaxed);
        self.last_completed
            .store(progress.completed, Ordering::Relaxed);
        if let Some(sender) = &self.sender {
            let _ = sender.send(progress);
        }
    }

    #[must_use]
    pub fn last_percentage(&self) -> u8 {
        self.last_percentage.load(Ordering::Relaxed)
    }

    fn checkpoint(&self, total: u32, percentage: u8, status: CalculationStatus) {
        self.report(CalculationProgress {
            total,
            completed: 0,
            percentage,
            current_zone: None,
            status,
            error: None,
        });
    }

    fn zone_done(&self, total: u32, index: usize, zone_id: u32) {
        let completed = u32::try_from(index + 1).unwrap_or(total);
        self.report(CalculationProgress {
            total,
            completed,
            percentage: zone_percentage(index, total),
            current_zone: Some(zone_id),
            status: CalculationStatus::Calculating,
            error: None,
        });
    }

    fn done(&self, total: u32) {
        self.report(CalculationProgress {
            total,
            completed: total,
            percentage: 100,
            current_zone: None,
            status: CalculationStatus::Done,
            error: None,
        });
    }

    /// Terminal error event, keeping the last percentage reached
    fn failed(&self, total: u32, message: String) {
        self.report(CalculationProgress {
            total,
            completed: self.last_completed.load(Ordering::Relaxed),
            percentage: self.last_percentage(),
            current_zone: None,
            status: CalculationStatus::Error,
            error: Some(message),
        });
    }
}

/// `10 + round((index + 1) / total · 90)`
#[must_use]
pub fn zone_percentage(index: usize, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    let fraction = (index + 1) as f64 / f64::from(total);
    let percentage = f64::from(PARTITION_CHECKPOINT) + (fraction * 90.0).round();
    percentage.clamp(0.0, 100.0) as u8
}

/// Hands out run identities; only the latest one stays current
#[derive(Debug, Default)]
pub struct RunTracker {
    generation: AtomicU64,
}

impl RunTracker {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start a new run, superseding every earlier ticket
    #[must_use]
    pub fn begin(self: &Arc<Self>) -> RunTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RunTicket {
            tracker: Some(Arc::clone(self)),
            generation,
        }
    }

    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Identity of one run
#[derive(Debug, Clone)]
pub struct RunTicket {
    tracker: Option<Arc<RunTracker>>,
    generation: u64,
}

impl RunTicket {
    /// Ticket that is never superseded
    #[must_use]
    pub fn detached() -> Self {
        Self {
            tracker: None,
            generation: 0,
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_current(&self) -> bool {
        self.tracker
            .as_ref()
            .is_none_or(|tracker| tracker.current_generation() == self.generation)
    }
}

/// Runs the full pipeline for one municipality
pub struct CityRiskCalculator {
    provider: Arc<dyn GeodataProvider>,
    directory: Arc<dyn MunicipalityDirectory>,
    history: Arc<dyn HistoricalRiskSource>,
    zone_count: usize,
    elevation_grid_size: usize,
}

impl CityRiskCalculator {
    /// Create a calculator, checking the scoring weights and grid settings once
    pub fn new(
        provider: Arc<dyn GeodataProvider>,
        directory: Arc<dyn MunicipalityDirectory>,
        history: Arc<dyn HistoricalRiskSource>,
        grid: &GridConfig,
    ) -> crate::Result<Self> {
        validate_weights()?;

        if grid_side(grid.zone_count).is_none() {
            return Err(RiskError::config(format!(
                "zone count must be a perfect square, got {}",
                grid.zone_count
            )));
        }

        Ok(Self {
            provider,
            directory,
            history,
            zone_count: grid.zone_count,
            elevation_grid_size: grid.elevation_grid_size,
        })
    }

    #[must_use]
    pub fn zone_count(&self) -> usize {
        self.zone_count
    }

    fn total(&self) -> u32 {
        u32::try_from(self.zone_count).unwrap_or(u32::MAX)
    }

    /// Compute ranked zone results for a municipality
    pub async fn calculate(
        &self,
        city_code: &str,
        uf: &str,
        progress: &ProgressReporter,
    ) -> crate::Result<Vec<ZoneRiskResult>> {
        self.calculate_run(city_code, uf, progress, &RunTicket::detached())
            .await
    }

    /// Like [`calculate`](Self::calculate), abandoning the run between zones
    /// once `ticket` is superseded
    #[instrument(skip(self, progress, ticket), fields(generation = ticket.generation()))]
    pub async fn calculate_run(
        &self,
        city_code: &str,
        uf: &str,
        progress: &ProgressReporter,
        ticket: &RunTicket,
    ) -> crate::Result<Vec<ZoneRiskResult>> {
        match self.run(city_code, uf, progress, ticket).await {
            Ok(results) => Ok(results),
            Err(err) => {
                if matches!(err, RiskError::Superseded { .. }) {
                    info!("Run for {city_code} superseded, discarding partial results");
                } else {
                    error!("Risk calculation for {city_code} failed: {err}");
                }
                progress.failed(self.total(), err.to_string());
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        city_code: &str,
        uf: &str,
        progress: &ProgressReporter,
        ticket: &RunTicket,
    ) -> crate::Result<Vec<ZoneRiskResult>> {
        let city_code = city_code.trim();
        let uf = uf.trim();
        if city_code.is_empty() {
            return Err(RiskError::validation("city code must not be empty"));
        }
        if uf.is_empty() {
            return Err(RiskError::validation("UF must not be empty"));
        }

        let total = self.total();
        progress.checkpoint(total, 0, CalculationStatus::FetchingData);

        let bbox = self.resolve_bounding_box(city_code, uf).await?;
        progress.checkpoint(total, BBOX_CHECKPOINT, CalculationStatus::Calculating);

        let zones = partition(&bbox, self.zone_count)?;
        let grid_check = validate_grid(&zones, &bbox);
        if !grid_check.is_valid {
            warn!("Grid sanity check failed: {:?}", grid_check.errors);
        }
        info!(
            "Divided {city_code} into {} zones ({:.1}% coverage)",
            zones.len(),
            grid_check.coverage_percent
        );
        progress.checkpoint(total, PARTITION_CHECKPOINT, CalculationStatus::Calculating);

        let historical_factor = self.history.historical_factor(uf);
        debug!("Historical factor for {uf}: {historical_factor}");

        let mut results = stream::iter(zones.into_iter().enumerate())
            .map(Ok::<_, RiskError>)
            .try_fold(
                Vec::with_capacity(self.zone_count),
                |mut results, (index, mut zone)| async move {
                    if !ticket.is_current() {
                        return Err(RiskError::superseded(city_code));
                    }

                    let result = self.assess_zone(&zone, uf, historical_factor).await;
                    zone.apply(&result);
                    progress.zone_done(total, index, zone.id);

                    if (index + 1) % 10 == 0 {
                        debug!("Progress: {}/{} zones", index + 1, total);
                    }

                    results.push(result);
                    Ok(results)
                },
            )
            .await?;

        if !ticket.is_current() {
            return Err(RiskError::superseded(city_code));
        }

        // stable, so ties keep ascending zone id
        results.sort_by(|a, b| b.normalized_score.cmp(&a.normalized_score));

        let distribution = RiskDistribution::from_results(&results);
        info!(
            "Calculation for {city_code} done: {} zones, {} very high, {} high ({} shown on the map), average {:.1}",
            distribution.total,
            distribution.muito_alto,
            distribution.alto,
            distribution.high_or_above(),
            distribution.average_score
        );

        progress.done(total);
        Ok(results)
    }

    async fn resolve_bounding_box(&self, city_code: &str, uf: &str) -> crate::Result<BoundingBox> {
        let municipality = self.directory.lookup(city_code).ok_or_else(|| {
            RiskError::resolution(format!("municipality {city_code} is not in the directory"))
        })?;

        if !municipality.uf.eq_ignore_ascii_case(uf) {
            warn!(
                "Requested UF {uf} differs from directory UF {} for {city_code}",
                municipality.uf
            );
        }

        info!(
            "Resolving bounding box for {}/{} ({city_code})",
            municipality.name, municipality.uf
        );

        let bbox = self
            .provider
            .resolve_bounding_box(&municipality.name, &municipality.uf, city_code)
            .await
            .map_err(|failure| {
                RiskError::resolution(format!(
                    "could not determine the bounding box of {city_code}: {failure}"
                ))
            })?;

        bbox.validate().map_err(|e| {
            RiskError::resolution(format!("resolved bounding box of {city_code} is invalid: {e}"))
        })?;

        Ok(bbox)
    }

    /// Fetch, score and classify one zone, never failing
    async fn assess_zone(&self, zone: &Zone, uf: &str, historical_factor: f64) -> ZoneRiskResult {
        let (elevation, infrastructure) = tokio::join!(
            sample_elevation_with_fallback(
                self.provider.as_ref(),
                &zone.bbox,
                self.elevation_grid_size
            ),
            self.provider.fetch_infrastructure(&zone.bbox),
        );

        let (samples, elements) = match (elevation, infrastructure) {
            (Ok(samples), Ok(elements)) => (samples, elements),
            (Err(failure), _) | (_, Err(failure)) => {
                warn!("Zone {}: {failure}, using fallback", zone.id);
                return fallback_result(zone, INSUFFICIENT_DATA_NOTE);
            }
        };

        let infrastructure = InfrastructureSummary::from_elements(elements);
        debug!(
            "Zone {}: {} elements, {:.1}/km²",
            zone.id,
            infrastructure.total_elements,
            infrastructure.density_per_km2(&zone.bbox)
        );
        let signals = ZoneSignals {
            uf: uf.to_string(),
            historical_factor,
            slope_percent: slope_percent(&samples),
            river_count: infrastructure.rivers.len(),
            building_count: infrastructure.buildings.len(),
            road_count: infrastructure.roads.len(),
            vegetation_count: infrastructure.vegetation.len(),
        };

        match score_zone(zone, &signals) {
            Ok(result) => {
                debug!(
                    "Zone {}: score {} ({}), slope {:.2}%",
                    zone.id, result.normalized_score, result.level, result.slope_percent
                );
                result
            }
            Err(err) => {
                warn!("Zone {}: scoring failed: {err}, using fallback", zone.id);
                fallback_result(zone, SCORING_ERROR_NOTE)
            }
        }
    }
}
