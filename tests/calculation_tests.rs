//! End-to-end runs of the city calculator against an in-memory provider

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use climarisk::analysis::classify_risk;
use climarisk::analysis::scoring::INSUFFICIENT_DATA_NOTE;
use climarisk::{
    CalculationProgress, CalculationStatus, FetchFailure, ProgressReporter, RiskError, RiskLevel,
};
use common::{INFRASTRUCTURE_TIMEOUT, StubProvider, buildings, calculator, element};

fn drain(mut events: tokio::sync::mpsc::UnboundedReceiver<CalculationProgress>) -> Vec<CalculationProgress> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

#[tokio::test]
async fn test_hundred_zone_run_covers_the_grid() {
    let provider = Arc::new(StubProvider::new());
    let calculator = calculator(Arc::clone(&provider), 100);

    let results = calculator
        .calculate("4106902", "PR", &ProgressReporter::silent())
        .await
        .unwrap();

    assert_eq!(results.len(), 100);
    let ids: BTreeSet<u32> = results.iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=100).collect());

    let first = results.iter().find(|r| r.id == 1).unwrap();
    assert!((first.coordinates.lat - (-25.495)).abs() < 1e-9);
    assert!((first.coordinates.lon - (-49.295)).abs() < 1e-9);

    let last = results.iter().find(|r| r.id == 100).unwrap();
    assert!((last.coordinates.lat - (-25.405)).abs() < 1e-9);
    assert!((last.coordinates.lon - (-49.205)).abs() < 1e-9);

    assert_eq!(provider.resolve_calls(), 1);
    assert_eq!(provider.infrastructure_calls(), 100);
}

#[tokio::test]
async fn test_flat_zone_with_five_buildings_scores_from_formula() {
    let provider = Arc::new(StubProvider::new());
    let calculator = calculator(provider, 4);

    let results = calculator
        .calculate("4106902", "PR", &ProgressReporter::silent())
        .await
        .unwrap();

    // H .55, S .10 (flat), R .1 (no rivers), U .2 (5 buildings), V 1.0 (no green)
    let expected = 0.55 * 0.20 + 0.10 * 0.30 + 0.1 * 0.25 + 0.2 * 0.15 + 1.0 * 0.10;
    for result in &results {
        assert!((result.score - expected).abs() < 1e-9);
        assert_eq!(result.slope_percent, 0.0);
        assert_eq!(result.factors.len(), 5);
        assert_eq!(result.level, classify_risk(f64::from(result.normalized_score)));
        assert_eq!(result.priority, result.level.priority());
    }
}

#[tokio::test]
async fn test_results_are_ranked_by_score_then_zone_id() {
    // Zones north of -25.45 get rivers and buildings, the southern half stays quiet
    let provider = Arc::new(StubProvider::new().with_infrastructure(Box::new(|bbox| {
        if bbox.center_lat > -25.45 {
            let mut elements = buildings(80);
            elements.extend((100..110).map(|id| element(id, &[("waterway", "river")])));
            Ok(elements)
        } else {
            Ok(vec![element(1, &[("landuse", "forest")]); 12])
        }
    })));
    let calculator = calculator(provider, 4);

    let results = calculator
        .calculate("4106902", "PR", &ProgressReporter::silent())
        .await
        .unwrap();

    let ids: Vec<u32> = results.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![3, 4, 1, 2]);
    assert!(results[0].normalized_score > results[2].normalized_score);
    assert!(
        results
            .windows(2)
            .all(|w| w[0].normalized_score >= w[1].normalized_score)
    );
}

#[tokio::test]
async fn test_failed_infrastructure_fetch_falls_back_for_that_zone_only() {
    let provider = Arc::new(StubProvider::new().with_infrastructure(Box::new(|bbox| {
        // zone 1 is the south-western cell
        if bbox.min_lat == -25.5 && bbox.min_lon == -49.3 {
            Err(FetchFailure::new("overpass", "timed out after 30s"))
        } else {
            Ok(buildings(40))
        }
    })));
    let calculator = calculator(provider, 4);
    let (progress, events) = ProgressReporter::channel();

    let results = calculator.calculate("4106902", "PR", &progress).await.unwrap();
    drop(progress);

    let fallback = results.iter().find(|r| r.id == 1).unwrap();
    assert_eq!(fallback.normalized_score, 10);
    assert_eq!(fallback.score, 0.1);
    assert_eq!(fallback.level, RiskLevel::Baixo);
    assert_eq!(fallback.color, "#16a34a");
    assert_eq!(fallback.priority, 1);
    assert!(fallback.factors.is_empty());
    assert_eq!(fallback.recommendations, vec![INSUFFICIENT_DATA_NOTE.to_string()]);

    for sibling in results.iter().filter(|r| r.id != 1) {
        assert_eq!(sibling.factors.len(), 5);
        assert!(sibling.normalized_score > 10);
    }

    let events = drain(events);
    assert_eq!(events.last().unwrap().status, CalculationStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_infrastructure_fetch_falls_back() {
    // zone 4 is the north-eastern cell; its query never answers
    let provider = Arc::new(
        StubProvider::new()
            .with_stall(Box::new(|bbox| bbox.center_lat > -25.45 && bbox.center_lon > -49.25)),
    );
    let calculator = calculator(Arc::clone(&provider), 4);
    let (progress, events) = ProgressReporter::channel();

    let started = tokio::time::Instant::now();
    let results = calculator.calculate("4106902", "PR", &progress).await.unwrap();
    drop(progress);

    let elapsed = started.elapsed();
    assert!(elapsed >= INFRASTRUCTURE_TIMEOUT);
    assert!(elapsed < 2 * INFRASTRUCTURE_TIMEOUT);

    let stalled = results.iter().find(|r| r.id == 4).unwrap();
    assert_eq!(stalled.normalized_score, 10);
    assert_eq!(stalled.level, RiskLevel::Baixo);
    assert_eq!(stalled.recommendations, vec![INSUFFICIENT_DATA_NOTE.to_string()]);
    assert!(results.iter().filter(|r| r.id != 4).all(|r| r.factors.len() == 5));
    assert_eq!(provider.infrastructure_calls(), 4);

    let events = drain(events);
    assert_eq!(events.last().unwrap().status, CalculationStatus::Done);
}

#[tokio::test]
async fn test_sloped_terrain_is_classified() {
    // ~10 m rise per 0.001° of latitude, roughly 9% slope north-south
    let provider = Arc::new(
        StubProvider::new().with_elevation(Box::new(|point| 920.0 + (point.lat + 25.5) * 10_000.0)),
    );
    let calculator = calculator(provider, 4);

    let results = calculator
        .calculate("4106902", "PR", &ProgressReporter::silent())
        .await
        .unwrap();

    for result in &results {
        assert!(result.slope_percent.is_finite());
        assert!(result.slope_percent > 0.0);
        assert!(
            result.factors[1].description.contains("ondulado")
                || result.factors[1].description.contains("suave"),
            "unexpected terrain: {}",
            result.factors[1].description
        );
    }
}

#[tokio::test]
async fn test_progress_events_are_ordered() {
    let provider = Arc::new(StubProvider::new());
    let calculator = calculator(provider, 9);
    let (progress, events) = ProgressReporter::channel();

    calculator.calculate("4106902", "PR", &progress).await.unwrap();
    drop(progress);
    let events = drain(events);

    // 3 checkpoints, 9 zones, done
    assert_eq!(events.len(), 13);
    assert_eq!(events[0].status, CalculationStatus::FetchingData);
    assert_eq!(events[0].percentage, 0);
    assert_eq!(events[1].percentage, 5);
    assert_eq!(events[2].percentage, 10);
    assert!(events.windows(2).all(|w| w[0].percentage <= w[1].percentage));

    let zone_ids: Vec<u32> = events.iter().filter_map(|e| e.current_zone).collect();
    assert_eq!(zone_ids, (1..=9).collect::<Vec<_>>());

    let done = events.last().unwrap();
    assert_eq!(done.status, CalculationStatus::Done);
    assert_eq!(done.percentage, 100);
    assert_eq!(done.completed, 9);
}

#[tokio::test]
async fn test_unknown_municipality_is_a_resolution_error() {
    let provider = Arc::new(StubProvider::new());
    let calculator = calculator(Arc::clone(&provider), 4);
    let (progress, events) = ProgressReporter::channel();

    let err = calculator.calculate("9999999", "PR", &progress).await.unwrap_err();
    drop(progress);

    assert!(matches!(err, RiskError::Resolution { .. }));
    assert_eq!(provider.resolve_calls(), 0);

    let events = drain(events);
    let last = events.last().unwrap();
    assert_eq!(last.status, CalculationStatus::Error);
    assert_eq!(last.percentage, 0);
    assert!(last.error.as_deref().unwrap().contains("9999999"));
}

#[tokio::test]
async fn test_unresolvable_bbox_aborts_before_any_zone() {
    let provider = Arc::new(StubProvider::new().with_bbox(None));
    let calculator = calculator(Arc::clone(&provider), 4);

    let err = calculator
        .calculate("4106902", "PR", &ProgressReporter::silent())
        .await
        .unwrap_err();

    assert!(matches!(err, RiskError::Resolution { .. }));
    assert!(err.user_message().contains("try again"));
    assert_eq!(provider.infrastructure_calls(), 0);
}

#[tokio::test]
async fn test_degenerate_bbox_is_rejected() {
    let degenerate = climarisk::BoundingBox::new(-25.4, -25.5, -49.3, -49.2);
    let provider = Arc::new(StubProvider::new().with_bbox(Some(degenerate)));
    let calculator = calculator(Arc::clone(&provider), 4);

    let err = calculator
        .calculate("4106902", "PR", &ProgressReporter::silent())
        .await
        .unwrap_err();

    assert!(err.is_fatal_to_run());
    assert_eq!(provider.infrastructure_calls(), 0);
}

#[tokio::test]
async fn test_empty_inputs_are_validation_errors() {
    let calculator = calculator(Arc::new(StubProvider::new()), 4);

    let err = calculator
        .calculate("  ", "PR", &ProgressReporter::silent())
        .await
        .unwrap_err();
    assert!(matches!(err, RiskError::Validation { .. }));
}
