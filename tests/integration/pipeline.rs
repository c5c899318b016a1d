//! End-to-end refresh cycles.

use std::sync::Arc;
use std::time::Duration;

use matchcast::config::{AppConfig, LeagueSpec};
use matchcast::data::DeepStatsEvent;
use matchcast::engine::ledger::RecommendationLedger;
use matchcast::engine::pipeline::{Pipeline, Providers};
use matchcast::storage;
use matchcast::strategy::signals::LagPolicy;
use matchcast::types::*;

use crate::mock_providers::*;

fn temp_path(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("matchcast_it_{name}_{}.json", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string()
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.engine.seed = Some(2024);
    config.engine.days_ahead = 0;
    config.engine.request_timeout_secs = 1;
    config.simulation.soccer_trials = 4_000;
    config.simulation.basketball_trials = 4_000;
    config.paths.ledger = temp_path("ledger");
    config.paths.forecasts = temp_path("forecasts");
    config.paths.identity_cache = temp_path("ids");
    config.paths.league_weights = temp_path("weights");
    config.paths.classifier = temp_path("classifier");
    config.leagues = vec![
        LeagueSpec::new("eng.1", "Premier League", Sport::Soccer, 2.9, 0.35),
        LeagueSpec::new("nba", "NBA", Sport::Basketball, 230.0, 3.5),
    ];
    config
}

fn cleanup(config: &AppConfig) {
    let paths = &config.paths;
    for path in [&paths.ledger, &paths.forecasts, &paths.identity_cache, &paths.league_weights] {
        let _ = std::fs::remove_file(path);
    }
}

fn providers(feed: &MockFeed, deep: bool) -> Providers {
    Providers {
        fixtures: Arc::new(feed.clone()),
        standings: Arc::new(feed.clone()),
        deep_stats: if deep { Some(Arc::new(feed.clone())) } else { None },
    }
}

fn seeded_feed() -> MockFeed {
    let feed = MockFeed::new();
    feed.set_standings("eng.1", premier_league_table());
    feed.set_standings("nba", nba_table());
    feed.add_fixture(soccer_fixture("E1", "eng.1", "Arsenal", "Chelsea"));
    feed.add_fixture(soccer_fixture("E2", "eng.1", "Everton", "Fulham"));
    feed.add_fixture(basketball_fixture("B1", "Boston Celtics", "Detroit Pistons"));
    feed
}

#[tokio::test]
async fn test_cycle_emits_one_record_per_fixture() {
    let config = test_config();
    let feed = seeded_feed();
    let mut pipeline = Pipeline::new(config.clone(), providers(&feed, false));

    let out = pipeline.run_cycle(match_day()).await.unwrap();
    assert_eq!(out.records.len(), 3);
    assert_eq!(out.report.attempted, 3);
    assert_eq!(out.report.provider_failures, 0);

    let saved = storage::load_forecasts(&config.paths.forecasts).unwrap().unwrap();
    assert_eq!(saved.len(), 3);

    let basketball = out.records.iter().find(|r| r.fixture.id == "B1").unwrap();
    let sim = basketball.simulation.as_ref().unwrap();
    assert!(sim.btts.is_none());
    assert_eq!(sim.thresholds.len(), 5);
    assert!(sim.home_win > sim.away_win);
    cleanup(&config);
}

#[tokio::test]
async fn test_strong_home_side_gets_staked_pick() {
    let config = test_config();
    let feed = seeded_feed();
    let mut pipeline = Pipeline::new(config.clone(), providers(&feed, false));

    let out = pipeline.run_cycle(match_day()).await.unwrap();
    let record = out.records.iter().find(|r| r.fixture.id == "E1").unwrap();
    let sim = record.simulation.as_ref().unwrap();
    assert!(sim.home_win > sim.away_win);
    // Arsenal 13-3-2 at 1.55 against a bottom side: well above the floor.
    let rec = &record.recommendation;
    assert_eq!(rec.pick, Pick::MatchResult { outcome: Outcome::Home });
    assert_eq!(rec.origin, PickOrigin::Statistical);
    assert!(rec.confidence > 65.0);
    assert!(rec.tier.is_some());
    assert!(rec.edge.unwrap() > 0.0);
    assert!(rec.stake_pct > 0.0 && rec.stake_pct <= 5.0);
    assert_eq!(rec.price, Some(1.55));
    cleanup(&config);
}

#[tokio::test]
async fn test_ledger_lifecycle_across_cycles() {
    let config = test_config();
    let feed = seeded_feed();
    let mut pipeline = Pipeline::new(config.clone(), providers(&feed, false));

    pipeline.run_cycle(match_day()).await.unwrap();
    assert!(!pipeline.ledger().get("E1").unwrap().frozen);

    feed.update_fixture("E1", FixtureStatus::Live, Some(Score::new(1, 0)));
    pipeline.run_cycle(match_day()).await.unwrap();
    let entry = pipeline.ledger().get("E1").unwrap();
    assert_eq!(entry.fixture.status, FixtureStatus::Live);
    assert!(!entry.frozen);

    feed.update_fixture("E1", FixtureStatus::Final, Some(Score::new(3, 0)));
    let out = pipeline.run_cycle(match_day()).await.unwrap();
    assert_eq!(out.report.frozen, 1);
    let frozen = pipeline.ledger().get("E1").unwrap().clone();
    assert!(frozen.frozen);
    assert_ne!(frozen.verdict, Verdict::Pending);

    // A later cycle cannot rewrite the frozen pick.
    pipeline.run_cycle(match_day()).await.unwrap();
    assert_eq!(pipeline.ledger().get("E1").unwrap().recommendation, frozen.recommendation);

    // The ledger survives a restart.
    let reloaded = RecommendationLedger::load(&config.paths.ledger).unwrap();
    assert_eq!(reloaded.get("E1").unwrap().verdict, frozen.verdict);
    cleanup(&config);
}

#[tokio::test]
async fn test_status_regression_recorded_as_issue() {
    let config = test_config();
    let feed = seeded_feed();
    let mut pipeline = Pipeline::new(config.clone(), providers(&feed, false));

    feed.update_fixture("E2", FixtureStatus::Live, Some(Score::new(0, 0)));
    pipeline.run_cycle(match_day()).await.unwrap();
    feed.update_fixture("E2", FixtureStatus::Scheduled, None);
    let out = pipeline.run_cycle(match_day()).await.unwrap();

    let record = out.records.iter().find(|r| r.fixture.id == "E2").unwrap();
    assert!(record
        .issues
        .iter()
        .any(|e| matches!(e, EngineError::InvalidStatusTransition { .. })));
    assert_eq!(pipeline.ledger().get("E2").unwrap().fixture.status, FixtureStatus::Live);
    cleanup(&config);
}

#[tokio::test]
async fn test_standings_timeout_degrades_without_aborting() {
    let config = test_config();
    let feed = seeded_feed();
    feed.stall_standings(Duration::from_secs(3));
    let mut pipeline = Pipeline::new(config.clone(), providers(&feed, false));

    let out = pipeline.run_cycle(match_day()).await.unwrap();
    assert_eq!(out.records.len(), 3);
    assert_eq!(out.report.provider_failures, 2);
    for record in &out.records {
        assert!(matches!(
            &record.issues[0],
            EngineError::ProviderUnavailable { message, .. } if message.contains("timed out")
        ));
    }
    cleanup(&config);
}

#[tokio::test]
async fn test_deep_stats_failure_keeps_primary_data() {
    let config = test_config();
    let feed = seeded_feed();
    feed.fail_deep_stats("403 Forbidden");
    let mut pipeline = Pipeline::new(config.clone(), providers(&feed, true));

    let out = pipeline.run_cycle(match_day()).await.unwrap();
    assert_eq!(out.records.len(), 3);
    assert!(out.records.iter().all(|r| r.simulation.is_some()));
    assert!(out.records.iter().all(|r| r
        .issues
        .iter()
        .any(|e| matches!(e, EngineError::ProviderUnavailable { provider, .. } if provider == "deep-stats"))));
    cleanup(&config);
}

fn lagging_feed() -> MockFeed {
    let feed = seeded_feed();
    let mut stats = ProviderObservation::new("sofascore", 0.5);
    stats.consensus = Some(ConsensusPrices {
        home: Some(1.6),
        draw: Some(4.0),
        away: Some(4.0),
    });
    feed.add_event(
        DeepStatsEvent {
            id: 9001,
            home_team: "Arsenal FC".into(),
            away_team: "Chelsea FC".into(),
            home_team_id: Some(42),
            away_team_id: Some(38),
        },
        stats,
    );
    feed
}

#[tokio::test]
async fn test_market_lag_overrides_pick() {
    let config = test_config();
    let feed = lagging_feed();
    let mut pipeline = Pipeline::new(config.clone(), providers(&feed, true));

    let out = pipeline.run_cycle(match_day()).await.unwrap();
    let record = out.records.iter().find(|r| r.fixture.id == "E1").unwrap();
    let lag = record
        .signals
        .iter()
        .find(|s| s.kind == SignalKind::Lag)
        .expect("lag signal");
    assert_eq!(lag.side, Side::Away);
    assert_eq!(record.recommendation.origin, PickOrigin::MarketSignal);
    assert_eq!(record.recommendation.pick, Pick::MatchResult { outcome: Outcome::Away });
    assert_eq!(pipeline.resolver().external_id("Arsenal"), Some(42));
    cleanup(&config);
}

#[tokio::test]
async fn test_market_lag_annotate_keeps_statistical_pick() {
    let mut config = test_config();
    config.signals.lag_policy = LagPolicy::Annotate;
    let feed = lagging_feed();
    let mut pipeline = Pipeline::new(config.clone(), providers(&feed, true));

    let out = pipeline.run_cycle(match_day()).await.unwrap();
    let rec = &out.records.iter().find(|r| r.fixture.id == "E1").unwrap().recommendation;
    assert_eq!(rec.origin, PickOrigin::Statistical);
    assert_ne!(rec.pick, Pick::MatchResult { outcome: Outcome::Away });
    assert!(rec.rationale.contains("MARKET LAG AWAY"));
    cleanup(&config);
}

#[tokio::test]
async fn test_no_data_fixture_is_neutral_record() {
    let config = test_config();
    let feed = MockFeed::new();
    let mut bare = soccer_fixture("X1", "eng.1", "Unknown Rovers", "Nobody Athletic");
    bare.observation = ProviderObservation::new("espn", 1.0);
    feed.add_fixture(bare);
    let mut pipeline = Pipeline::new(config.clone(), providers(&feed, false));

    let out = pipeline.run_cycle(match_day()).await.unwrap();
    assert_eq!(out.records.len(), 1);
    let record = &out.records[0];
    assert!(record.simulation.is_none());
    assert_eq!(record.recommendation.origin, PickOrigin::NoData);
    assert_eq!(record.recommendation.pick, Pick::Pass);
    assert_eq!(out.report.passed, 1);
    cleanup(&config);
}

#[tokio::test]
async fn test_league_weights_reloaded_each_cycle() {
    let config = test_config();
    let feed = seeded_feed();
    let mut pipeline = Pipeline::new(config.clone(), providers(&feed, false));

    let first = pipeline.run_cycle(match_day()).await.unwrap();
    let before = first.records.iter().find(|r| r.fixture.id == "E1").unwrap().recommendation.confidence;

    std::fs::write(&config.paths.league_weights, r#"{"eng.1": {"confidence_modifier": -10.0}}"#).unwrap();
    let second = pipeline.run_cycle(match_day()).await.unwrap();
    let record = second.records.iter().find(|r| r.fixture.id == "E1").unwrap();
    assert!((before - record.recommendation.confidence - 10.0).abs() < 1e-9);
    assert!(record.recommendation.rationale.contains("league modifier -10"));

    // Basketball is outside the table and keeps its confidence.
    let nba = |out: &matchcast::engine::pipeline::CycleOutput| {
        out.records.iter().find(|r| r.fixture.id == "B1").unwrap().recommendation.confidence
    };
    assert_eq!(nba(&first), nba(&second));
    cleanup(&config);
}
