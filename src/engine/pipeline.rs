//! Refresh cycle: standings → fixtures → deep stats → fuse → simulate →
//! recommend → ledger.
//!
//! Every fixture the primary provider returns yields exactly one
//! [`ForecastRecord`]. Provider failures degrade the fixtures they touch
//! (recorded as issues) and never abort the cycle.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::fusion::{build_input, FusedFixture};
use super::ledger::{LedgerSummary, LedgerUpdate, RecommendationLedger};
use crate::config::{self, AppConfig};
use crate::data::{DeepStatsEvent, DeepStatsProvider, FixtureProvider, FixtureSnapshot, StandingsProvider};
use crate::identity::IdentityResolver;
use crate::model::expected::{ExpectedOutcome, ExpectedOutcomeModel};
use crate::model::ratings::{LeagueRatings, RatingAggregator};
use crate::model::simulator::OutcomeSimulator;
use crate::storage;
use crate::strategy::classifier::{detect_classifier, WinClassifier};
use crate::strategy::signals::MarketSignalDetector;
use crate::strategy::{RecommendationEngine, RecommendationInput};
use crate::types::{
    EngineError, Fixture, LeagueWeights, MarketSignal, PickOrigin, ProviderObservation,
    Recommendation, SimulationResult, Sport, Verdict,
};

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Everything produced for one fixture in one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub fixture: Fixture,
    /// Absent for no-data fixtures, which are not simulated.
    pub expected: Option<ExpectedOutcome>,
    pub simulation: Option<SimulationResult>,
    pub recommendation: Recommendation,
    pub signals: Vec<MarketSignal>,
    /// Degradations met while building this record.
    pub issues: Vec<EngineError>,
}

/// Counts for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub seed: u64,
    pub attempted: usize,
    pub simulated: usize,
    pub recommended: usize,
    pub passed: usize,
    /// Records carrying at least one issue.
    pub degraded: usize,
    pub provider_failures: usize,
    /// Ledger entries frozen this cycle.
    pub frozen: usize,
    pub won: usize,
    pub lost: usize,
    pub ledger: LedgerSummary,
    /// Snapshots that could not be written this cycle.
    pub storage_issues: Vec<EngineError>,
}

#[derive(Debug, Clone)]
pub struct CycleOutput {
    pub report: CycleReport,
    pub records: Vec<ForecastRecord>,
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// The data sources a pipeline reads from.
#[derive(Clone)]
pub struct Providers {
    pub fixtures: Arc<dyn FixtureProvider>,
    pub standings: Arc<dyn StandingsProvider>,
    pub deep_stats: Option<Arc<dyn DeepStatsProvider>>,
}

/// Await a provider call under the request timeout.
async fn bounded<T, F>(timeout: Duration, provider: &str, call: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(EngineError::ProviderUnavailable {
            provider: provider.to_string(),
            message: format!("{e:#}"),
        }),
        Err(_) => Err(EngineError::ProviderUnavailable {
            provider: provider.to_string(),
            message: format!("timed out after {}s", timeout.as_secs()),
        }),
    }
}

/// Find the deep-stats event for a fixture: cached team ids first, then names.
fn match_event<'a>(
    resolver: &IdentityResolver,
    fixture: &Fixture,
    events: &'a [DeepStatsEvent],
) -> Option<&'a DeepStatsEvent> {
    if let (Some(home), Some(away)) = (
        resolver.external_id(&fixture.home_team),
        resolver.external_id(&fixture.away_team),
    ) {
        let by_id = events
            .iter()
            .find(|e| e.home_team_id == Some(home) && e.away_team_id == Some(away));
        if by_id.is_some() {
            return by_id;
        }
    }

    let home = resolver.resolve(&fixture.home_team, events.iter().map(|e| e.home_team.as_str()))?;
    events
        .iter()
        .filter(|e| e.home_team == home)
        .find(|e| resolver.resolve(&fixture.away_team, [e.away_team.as_str()]).is_some())
}

/// Per-fixture RNG seed: the cycle seed mixed with an FNV-1a hash of the id.
fn fixture_seed(cycle_seed: u64, fixture_id: &str) -> u64 {
    let hash = fixture_id
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3));
    cycle_seed ^ hash
}

// ---------------------------------------------------------------------------
// Per-fixture computation
// ---------------------------------------------------------------------------

/// Read-only model stack shared by the simulation workers for one cycle.
struct Forecaster {
    model: ExpectedOutcomeModel,
    simulator: OutcomeSimulator,
    detector: MarketSignalDetector,
    engine: RecommendationEngine,
}

impl Forecaster {
    fn new(config: &AppConfig, weights: LeagueWeights, classifier: Option<Arc<dyn WinClassifier>>) -> Self {
        Self {
            model: ExpectedOutcomeModel::new(config.model.clone()),
            simulator: OutcomeSimulator::new(config.simulation.clone()),
            detector: MarketSignalDetector::new(config.signals.clone()),
            engine: RecommendationEngine::new(
                config.staking.clone(),
                config.signals.lag_policy,
                weights,
                classifier,
            ),
        }
    }

    fn forecast(&self, fused: FusedFixture, seed: u64) -> ForecastRecord {
        let FusedFixture {
            fixture,
            observation,
            input,
            mut issues,
            low_confidence,
            no_data,
        } = fused;

        let signals = self.detector.detect(&fixture.id, &observation);

        if no_data {
            debug!(fixture_id = %fixture.id, "No usable data, emitting neutral record");
            let recommendation = Recommendation::pass(
                &fixture.id,
                PickOrigin::NoData,
                "No standings, records or deep stats available",
            );
            return ForecastRecord {
                fixture,
                expected: None,
                simulation: None,
                recommendation,
                signals,
                issues,
            };
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let expected = self.model.estimate(&input, &mut rng);
        let degenerate = !expected.issues.is_empty();
        issues.extend(expected.issues.iter().cloned());
        let simulation = self.simulator.simulate(fixture.sport, &expected, &mut rng);
        let recommendation = self.engine.recommend(&RecommendationInput {
            fixture: &fixture,
            simulation: &simulation,
            observation: &observation,
            signals: &signals,
            low_confidence: low_confidence || degenerate,
        });

        ForecastRecord {
            fixture,
            expected: Some(expected),
            simulation: Some(simulation),
            recommendation,
            signals,
            issues,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    config: AppConfig,
    providers: Providers,
    aggregator: RatingAggregator,
    resolver: IdentityResolver,
    ledger: RecommendationLedger,
    cycle: u64,
}

impl Pipeline {
    /// Build a pipeline, restoring the ledger and id cache from `config.paths`.
    ///
    /// League weights and the classifier artifact are read at the start of
    /// every cycle, so offline updates apply from the next refresh.
    pub fn new(config: AppConfig, providers: Providers) -> Self {
        let resolver = IdentityResolver::load(&config.paths.identity_cache).unwrap_or_else(|e| {
            warn!(error = %e, "Identity cache unreadable, starting empty");
            IdentityResolver::new()
        });
        let ledger = RecommendationLedger::load_or_default(&config.paths.ledger);

        Self {
            config,
            providers,
            aggregator: RatingAggregator::default(),
            resolver,
            ledger,
            cycle: 0,
        }
    }

    pub fn ledger(&self) -> &RecommendationLedger {
        &self.ledger
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Run one refresh cycle for `today` and the configured days ahead.
    pub async fn run_cycle(&mut self, today: NaiveDate) -> Result<CycleOutput> {
        self.cycle += 1;
        let seed = self.config.engine.seed.unwrap_or_else(rand::random);
        let timeout = Duration::from_secs(self.config.engine.request_timeout_secs.max(1));
        let providers = self.providers.clone();
        let leagues = self.config.leagues.clone();
        let dates: Vec<NaiveDate> = (0..=self.config.engine.days_ahead)
            .map(|d| today + ChronoDuration::days(i64::from(d)))
            .collect();

        let mut report = CycleReport {
            cycle: self.cycle,
            seed,
            ..Default::default()
        };
        info!(cycle = self.cycle, leagues = leagues.len(), days = dates.len(), "Starting cycle");

        // 0. Capabilities for this cycle.
        let weights = config::load_league_weights(&self.config.paths.league_weights);
        let classifier = detect_classifier(&self.config.paths.classifier);
        let forecaster = Arc::new(Forecaster::new(&self.config, weights, classifier));

        // 1. Standings for every league; nothing is fused until all are in.
        let standings = join_all(
            leagues
                .iter()
                .map(|league| bounded(timeout, "standings", providers.standings.standings(league))),
        )
        .await;

        let mut ratings: HashMap<String, LeagueRatings> = HashMap::new();
        let mut league_issues: HashMap<String, EngineError> = HashMap::new();
        for (league, result) in leagues.iter().zip(standings) {
            match result {
                Ok(rows) => {
                    ratings.insert(league.code.clone(), self.aggregator.aggregate(&league.code, &rows));
                }
                Err(e) => {
                    report.provider_failures += 1;
                    warn!(league = %league.code, error = %e, "Standings unavailable, using neutral ratings");
                    ratings.insert(league.code.clone(), LeagueRatings::neutral(&league.code));
                    league_issues.insert(league.code.clone(), e);
                }
            }
        }

        // 2. Fixtures per (league, date).
        let pairs: Vec<_> = leagues
            .iter()
            .flat_map(|league| dates.iter().map(move |date| (league, *date)))
            .collect();
        let listings = join_all(
            pairs
                .iter()
                .map(|(league, date)| bounded(timeout, "fixtures", providers.fixtures.fixtures(league, *date))),
        )
        .await;

        let mut seen = HashSet::new();
        let mut attempted: Vec<(NaiveDate, FixtureSnapshot)> = Vec::new();
        for ((league, date), result) in pairs.iter().zip(listings) {
            match result {
                Ok(snapshots) => {
                    for snapshot in snapshots {
                        if seen.insert(snapshot.fixture.id.clone()) {
                            attempted.push((*date, snapshot));
                        } else {
                            debug!(fixture_id = %snapshot.fixture.id, "Duplicate fixture listing skipped");
                        }
                    }
                }
                Err(e) => {
                    report.provider_failures += 1;
                    warn!(league = %league.code, %date, error = %e, "Fixture listing unavailable");
                }
            }
        }
        info!(count = attempted.len(), "Fixtures collected");

        // 3. Deep stats, matched through the identity resolver.
        let (mut deep_obs, mut deep_issues) = match providers
            .deep_stats
            .as_ref()
            .filter(|_| self.config.engine.deep_stats_enabled)
        {
            Some(provider) => self.enrich(provider.as_ref(), &attempted, timeout, &mut report).await,
            None => (HashMap::new(), HashMap::new()),
        };

        // 4. Fuse and validate.
        let mut fused = Vec::with_capacity(attempted.len());
        for (_, snapshot) in attempted {
            let FixtureSnapshot { fixture, observation } = snapshot;
            let league = self.config.league(&fixture.league, fixture.sport);
            let league_ratings = ratings
                .entry(fixture.league.clone())
                .or_insert_with(|| LeagueRatings::neutral(&fixture.league));

            let mut observations = vec![observation];
            if let Some(extra) = deep_obs.remove(&fixture.id) {
                observations.push(extra);
            }
            let mut record = build_input(&fixture, &observations, league_ratings, &self.resolver, &league);
            if let Some(e) = league_issues.get(&fixture.league) {
                record.issues.insert(0, e.clone());
            }
            if let Some(extra) = deep_issues.remove(&fixture.id) {
                record.issues.extend(extra);
            }
            fused.push(record);
        }

        // 5. Simulate and recommend on the worker pool.
        let mut records = tokio::task::spawn_blocking(move || {
            fused
                .into_par_iter()
                .map(|f| {
                    let seed = fixture_seed(seed, &f.fixture.id);
                    forecaster.forecast(f, seed)
                })
                .collect::<Vec<_>>()
        })
        .await
        .context("Simulation workers panicked")?;

        // 6. Ledger: overwrite open entries, freeze and verify final ones.
        for record in &mut records {
            match self.ledger.record(&record.fixture, record.recommendation.clone()) {
                Ok(LedgerUpdate::Frozen(verdict)) => {
                    report.frozen += 1;
                    match verdict {
                        Verdict::Won => report.won += 1,
                        Verdict::Lost => report.lost += 1,
                        Verdict::Pending | Verdict::Skipped => {}
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(fixture_id = %record.fixture.id, error = %e, "Ledger rejected update");
                    record.issues.push(e);
                }
            }
        }
        let settled = self.ledger.verify_final();
        if settled > 0 {
            info!(settled, "Pending verdicts settled");
        }

        for record in &records {
            if record.simulation.is_some() {
                report.simulated += 1;
            }
            if record.recommendation.pick.is_actionable() {
                report.recommended += 1;
            } else {
                report.passed += 1;
            }
            if !record.issues.is_empty() {
                report.degraded += 1;
            }
        }
        report.attempted = records.len();
        report.ledger = self.ledger.summary();

        // 7. Persist.
        report.storage_issues = self.persist(&records);

        info!(
            cycle = report.cycle,
            attempted = report.attempted,
            simulated = report.simulated,
            recommended = report.recommended,
            passed = report.passed,
            degraded = report.degraded,
            provider_failures = report.provider_failures,
            won = report.won,
            lost = report.lost,
            "Cycle complete"
        );

        Ok(CycleOutput { report, records })
    }

    /// Fetch deep stats for the attempted fixtures.
    ///
    /// Returns the matched observations and the per-fixture issues, both
    /// keyed by fixture id.
    async fn enrich(
        &mut self,
        provider: &dyn DeepStatsProvider,
        attempted: &[(NaiveDate, FixtureSnapshot)],
        timeout: Duration,
        report: &mut CycleReport,
    ) -> (HashMap<String, ProviderObservation>, HashMap<String, Vec<EngineError>>) {
        let mut keys: Vec<(NaiveDate, Sport)> = Vec::new();
        for (date, snapshot) in attempted {
            let key = (*date, snapshot.fixture.sport);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        let listings = join_all(
            keys.iter()
                .map(|(date, sport)| bounded(timeout, "deep-stats", provider.events_on(*date, *sport))),
        )
        .await;
        let mut events: HashMap<(NaiveDate, Sport), Result<Vec<DeepStatsEvent>, EngineError>> = HashMap::new();
        for (key, result) in keys.into_iter().zip(listings) {
            if let Err(e) = &result {
                report.provider_failures += 1;
                warn!(date = %key.0, sport = %key.1, error = %e, "Deep-stats listing unavailable");
            }
            events.insert(key, result);
        }

        let mut issues: HashMap<String, Vec<EngineError>> = HashMap::new();
        let mut matched: Vec<(&Fixture, DeepStatsEvent)> = Vec::new();
        for (date, snapshot) in attempted {
            let fixture = &snapshot.fixture;
            match events.get(&(*date, fixture.sport)) {
                Some(Ok(list)) => match match_event(&self.resolver, fixture, list) {
                    Some(event) => matched.push((fixture, event.clone())),
                    None => {
                        debug!(fixture_id = %fixture.id, "No deep-stats event matched");
                        issues.entry(fixture.id.clone()).or_default().push(
                            EngineError::IdentityUnresolved(format!(
                                "no deep-stats event for {} vs {}",
                                fixture.home_team, fixture.away_team
                            )),
                        );
                    }
                },
                Some(Err(e)) => issues.entry(fixture.id.clone()).or_default().push(e.clone()),
                None => {}
            }
        }

        for (fixture, event) in &matched {
            if let Some(id) = event.home_team_id {
                self.resolver.remember(&fixture.home_team, id);
            }
            if let Some(id) = event.away_team_id {
                self.resolver.remember(&fixture.away_team, id);
            }
        }

        let stats = join_all(
            matched
                .iter()
                .map(|(_, event)| bounded(timeout, "deep-stats", provider.event_stats(event))),
        )
        .await;

        let mut observations = HashMap::new();
        for ((fixture, _), result) in matched.iter().zip(stats) {
            match result {
                Ok(observation) => {
                    observations.insert(fixture.id.clone(), observation);
                }
                Err(e) => {
                    report.provider_failures += 1;
                    warn!(fixture_id = %fixture.id, error = %e, "Deep stats unavailable");
                    issues.entry(fixture.id.clone()).or_default().push(e);
                }
            }
        }
        debug!(matched = observations.len(), "Deep stats collected");
        (observations, issues)
    }

    /// Write the cycle's snapshots. Failures are returned, never raised.
    fn persist(&mut self, records: &[ForecastRecord]) -> Vec<EngineError> {
        let paths = &self.config.paths;
        let mut failed = Vec::new();
        if let Err(e) = self.ledger.save(&paths.ledger) {
            error!(error = %e, "Failed to save ledger");
            failed.push(EngineError::Storage(format!("ledger: {e:#}")));
        }
        if let Err(e) = storage::save_forecasts(records, &paths.forecasts) {
            error!(error = %e, "Failed to save forecasts");
            failed.push(EngineError::Storage(format!("forecasts: {e:#}")));
        }
        if self.resolver.is_dirty() {
            if let Err(e) = self.resolver.save(&paths.identity_cache) {
                error!(error = %e, "Failed to save identity cache");
                failed.push(EngineError::Storage(format!("identity cache: {e:#}")));
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LeagueSpec;
    use crate::data::{MockDeepStatsProvider, MockFixtureProvider, MockStandingsProvider};
    use crate::types::{ExpectedGoals, FixtureStatus, PriceQuote, Score, StandingsRow};
    use chrono::Utc;

    fn temp_config(seed: u64) -> AppConfig {
        let dir = std::env::temp_dir();
        let path = |name: &str| {
            dir.join(format!("matchcast_{name}_{}.json", uuid::Uuid::new_v4()))
                .to_string_lossy()
                .to_string()
        };
        let mut config = AppConfig::default();
        config.engine.seed = Some(seed);
        config.engine.days_ahead = 0;
        config.simulation.soccer_trials = 2_000;
        config.paths.ledger = path("ledger");
        config.paths.forecasts = path("forecasts");
        config.paths.identity_cache = path("ids");
        config.paths.league_weights = path("weights");
        config.paths.classifier = path("classifier");
        config.leagues = vec![LeagueSpec::new("eng.1", "Premier League", Sport::Soccer, 2.9, 0.35)];
        config
    }

    fn cleanup(config: &AppConfig) {
        for path in [&config.paths.ledger, &config.paths.forecasts, &config.paths.identity_cache] {
            let _ = std::fs::remove_file(path);
        }
    }

    fn snapshot(id: &str, home: &str, away: &str, status: FixtureStatus, score: Option<Score>) -> FixtureSnapshot {
        let mut observation = ProviderObservation::new("espn", 1.0);
        observation.home_record = Some("12-3-3".into());
        observation.away_record = Some("4-4-10".into());
        observation.home_price = PriceQuote::new(Some(1.6), Some(1.55));
        observation.away_price = PriceQuote::new(Some(5.5), Some(6.0));
        FixtureSnapshot {
            fixture: Fixture {
                id: id.into(),
                sport: Sport::Soccer,
                league: "eng.1".into(),
                home_team: home.into(),
                away_team: away.into(),
                scheduled_at: Utc::now(),
                status,
                score,
            },
            observation,
        }
    }

    fn table() -> Vec<StandingsRow> {
        let row = |team: &str, won: u32, lost: u32, scored: f64, conceded: f64| StandingsRow {
            team: team.into(),
            played: 18,
            won,
            drawn: 18 - won - lost,
            lost,
            scored: Some(scored),
            conceded: Some(conceded),
        };
        vec![
            row("Arsenal FC", 12, 3, 40.0, 15.0),
            row("Chelsea FC", 4, 10, 20.0, 32.0),
            row("Everton FC", 7, 6, 24.0, 24.0),
            row("Fulham FC", 6, 7, 22.0, 26.0),
        ]
    }

    fn fixtures_mock(snapshots: Vec<FixtureSnapshot>) -> MockFixtureProvider {
        let mut mock = MockFixtureProvider::new();
        mock.expect_fixtures().returning(move |_, _| Ok(snapshots.clone()));
        mock
    }

    fn standings_ok() -> MockStandingsProvider {
        let mut mock = MockStandingsProvider::new();
        mock.expect_standings().returning(|_| Ok(table()));
        mock
    }

    fn providers(fixtures: MockFixtureProvider, standings: MockStandingsProvider) -> Providers {
        Providers {
            fixtures: Arc::new(fixtures),
            standings: Arc::new(standings),
            deep_stats: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
    }

    #[tokio::test]
    async fn test_one_record_per_fixture() {
        let config = temp_config(7);
        let snaps = vec![
            snapshot("1", "Arsenal", "Chelsea", FixtureStatus::Scheduled, None),
            snapshot("2", "Everton", "Fulham", FixtureStatus::Scheduled, None),
        ];
        let mut pipeline = Pipeline::new(config.clone(), providers(fixtures_mock(snaps), standings_ok()));

        let out = pipeline.run_cycle(today()).await.unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.report.attempted, 2);
        assert_eq!(out.report.simulated, 2);
        assert_eq!(out.report.recommended + out.report.passed, 2);
        for record in &out.records {
            let sim = record.simulation.as_ref().unwrap();
            assert!((sim.home_win + sim.draw + sim.away_win - 1.0).abs() < 1e-9);
        }
        assert_eq!(pipeline.ledger().len(), 2);
        assert!(storage::load_forecasts(&config.paths.forecasts).unwrap().is_some());
        cleanup(&config);
    }

    #[tokio::test]
    async fn test_standings_failure_degrades_league() {
        let config = temp_config(7);
        let mut standings = MockStandingsProvider::new();
        standings
            .expect_standings()
            .returning(|_| Err(anyhow::anyhow!("503 Service Unavailable")));
        let snaps = vec![snapshot("1", "Arsenal", "Chelsea", FixtureStatus::Scheduled, None)];
        let mut pipeline = Pipeline::new(config.clone(), providers(fixtures_mock(snaps), standings));

        let out = pipeline.run_cycle(today()).await.unwrap();
        assert_eq!(out.records.len(), 1);
        let record = &out.records[0];
        assert!(matches!(record.issues[0], EngineError::ProviderUnavailable { .. }));
        // Records still carry win rates, so the fixture is simulated on neutral ratings.
        assert!(record.simulation.is_some());
        assert_eq!(out.report.provider_failures, 1);
        assert_eq!(out.report.degraded, 1);
        cleanup(&config);
    }

    #[tokio::test]
    async fn test_fixture_failure_yields_no_records() {
        let config = temp_config(7);
        let mut fixtures = MockFixtureProvider::new();
        fixtures
            .expect_fixtures()
            .returning(|_, _| Err(anyhow::anyhow!("connection reset")));
        let mut pipeline = Pipeline::new(config.clone(), providers(fixtures, standings_ok()));

        let out = pipeline.run_cycle(today()).await.unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.report.provider_failures, 1);
        cleanup(&config);
    }

    #[tokio::test]
    async fn test_no_data_fixture_is_neutral_pass() {
        let config = temp_config(7);
        let mut bare = snapshot("9", "Nowhere United", "Ghost Town", FixtureStatus::Scheduled, None);
        bare.observation = ProviderObservation::new("espn", 1.0);
        let mut standings = MockStandingsProvider::new();
        standings.expect_standings().returning(|_| Ok(Vec::new()));
        let mut pipeline = Pipeline::new(config.clone(), providers(fixtures_mock(vec![bare]), standings));

        let out = pipeline.run_cycle(today()).await.unwrap();
        let record = &out.records[0];
        assert!(record.simulation.is_none());
        assert_eq!(record.recommendation.origin, PickOrigin::NoData);
        assert_eq!(record.recommendation.confidence, 0.0);
        assert!(!record.recommendation.pick.is_actionable());
        cleanup(&config);
    }

    #[tokio::test]
    async fn test_fixed_seed_is_reproducible() {
        let run = || async {
            let config = temp_config(42);
            let snaps = vec![snapshot("1", "Arsenal", "Chelsea", FixtureStatus::Scheduled, None)];
            let mut pipeline = Pipeline::new(config.clone(), providers(fixtures_mock(snaps), standings_ok()));
            let out = pipeline.run_cycle(today()).await.unwrap();
            cleanup(&config);
            out.records[0].simulation.clone().unwrap()
        };
        assert_eq!(run().await, run().await);
    }

    #[tokio::test]
    async fn test_deep_stats_matched_and_ids_cached() {
        let config = temp_config(7);
        let snaps = vec![snapshot("1", "Arsenal", "Chelsea", FixtureStatus::Scheduled, None)];
        let mut deep = MockDeepStatsProvider::new();
        deep.expect_events_on().returning(|_, _| {
            Ok(vec![DeepStatsEvent {
                id: 555,
                home_team: "Arsenal FC".into(),
                away_team: "Chelsea FC".into(),
                home_team_id: Some(42),
                away_team_id: Some(38),
            }])
        });
        deep.expect_event_stats().returning(|event| {
            assert_eq!(event.id, 555);
            let mut obs = ProviderObservation::new("sofascore", 0.5);
            obs.expected_goals = Some(ExpectedGoals { home: 2.1, away: 0.6 });
            Ok(obs)
        });
        let mut providers = providers(fixtures_mock(snaps), standings_ok());
        providers.deep_stats = Some(Arc::new(deep));
        let mut pipeline = Pipeline::new(config.clone(), providers);

        let out = pipeline.run_cycle(today()).await.unwrap();
        assert!(out.records[0].issues.is_empty(), "{:?}", out.records[0].issues);
        assert_eq!(pipeline.resolver().external_id("Arsenal"), Some(42));
        assert_eq!(pipeline.resolver().external_id("Chelsea"), Some(38));
        assert!(std::path::Path::new(&config.paths.identity_cache).exists());
        cleanup(&config);
    }

    #[tokio::test]
    async fn test_unmatched_deep_stats_is_identity_issue() {
        let config = temp_config(7);
        let snaps = vec![snapshot("1", "Arsenal", "Chelsea", FixtureStatus::Scheduled, None)];
        let mut deep = MockDeepStatsProvider::new();
        deep.expect_events_on().returning(|_, _| Ok(Vec::new()));
        deep.expect_event_stats().never();
        let mut providers = providers(fixtures_mock(snaps), standings_ok());
        providers.deep_stats = Some(Arc::new(deep));
        let mut pipeline = Pipeline::new(config.clone(), providers);

        let out = pipeline.run_cycle(today()).await.unwrap();
        assert!(matches!(out.records[0].issues[0], EngineError::IdentityUnresolved(_)));
        assert!(out.records[0].simulation.is_some());
        cleanup(&config);
    }

    #[tokio::test]
    async fn test_final_fixture_frozen_in_ledger() {
        let config = temp_config(7);
        let snaps = vec![snapshot("1", "Arsenal", "Chelsea", FixtureStatus::Final, Some(Score::new(3, 0)))];
        let mut pipeline = Pipeline::new(config.clone(), providers(fixtures_mock(snaps), standings_ok()));

        let out = pipeline.run_cycle(today()).await.unwrap();
        assert_eq!(out.report.frozen, 1);
        let entry = pipeline.ledger().get("1").unwrap();
        assert!(entry.frozen);
        assert_ne!(entry.verdict, Verdict::Pending);
        cleanup(&config);
    }

    #[test]
    fn test_fixture_seed_differs_per_fixture() {
        assert_ne!(fixture_seed(1, "401"), fixture_seed(1, "402"));
        assert_eq!(fixture_seed(1, "401"), fixture_seed(1, "401"));
    }

    #[test]
    fn test_match_event_prefers_cached_ids() {
        let mut resolver = IdentityResolver::new();
        resolver.remember("Arsenal", 1);
        resolver.remember("Chelsea", 2);
        let events = vec![
            DeepStatsEvent { id: 10, home_team: "Arsenal Women".into(), away_team: "Chelsea Women".into(), home_team_id: Some(91), away_team_id: Some(92) },
            DeepStatsEvent { id: 11, home_team: "Arsenal".into(), away_team: "Chelsea".into(), home_team_id: Some(1), away_team_id: Some(2) },
        ];
        let fixture = snapshot("1", "Arsenal", "Chelsea", FixtureStatus::Scheduled, None).fixture;
        assert_eq!(match_event(&resolver, &fixture, &events).map(|e| e.id), Some(11));
    }

    #[tokio::test]
    async fn test_unwritable_snapshot_reported_as_storage_issue() {
        let mut config = temp_config(7);
        let missing_dir = std::env::temp_dir().join(format!("matchcast_missing_{}", uuid::Uuid::new_v4()));
        config.paths.ledger = missing_dir.join("ledger.json").to_string_lossy().to_string();
        let snaps = vec![snapshot("1", "Arsenal", "Chelsea", FixtureStatus::Scheduled, None)];
        let mut pipeline = Pipeline::new(config.clone(), providers(fixtures_mock(snaps), standings_ok()));

        let out = pipeline.run_cycle(today()).await.unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.report.storage_issues.len(), 1);
        assert!(matches!(&out.report.storage_issues[0], EngineError::Storage(m) if m.starts_with("ledger")));
        assert!(storage::load_forecasts(&config.paths.forecasts).unwrap().is_some());
        cleanup(&config);
    }
}
