//! In-memory providers for integration testing.
//!
//! `MockFeed` fills all three provider roles from state the test controls:
//! fixtures can be advanced between cycles, and any role can be forced to
//! fail or to stall past the request timeout.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use matchcast::config::LeagueSpec;
use matchcast::data::{
    DeepStatsEvent, DeepStatsProvider, FixtureProvider, FixtureSnapshot, StandingsProvider,
};
use matchcast::types::*;

#[derive(Default)]
struct FeedState {
    fixtures: Vec<FixtureSnapshot>,
    standings: HashMap<String, Vec<StandingsRow>>,
    events: Vec<DeepStatsEvent>,
    stats: HashMap<u64, ProviderObservation>,
    standings_error: Option<String>,
    standings_delay: Option<Duration>,
    deep_error: Option<String>,
}

/// A deterministic feed shared between the three provider roles.
#[derive(Clone, Default)]
pub struct MockFeed {
    state: Arc<Mutex<FeedState>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fixture(&self, snapshot: FixtureSnapshot) {
        self.state.lock().unwrap().fixtures.push(snapshot);
    }

    pub fn set_standings(&self, league: &str, rows: Vec<StandingsRow>) {
        self.state.lock().unwrap().standings.insert(league.to_string(), rows);
    }

    pub fn add_event(&self, event: DeepStatsEvent, stats: ProviderObservation) {
        let mut state = self.state.lock().unwrap();
        state.stats.insert(event.id, stats);
        state.events.push(event);
    }

    /// Move a fixture along its lifecycle for the next cycle.
    pub fn update_fixture(&self, id: &str, status: FixtureStatus, score: Option<Score>) {
        let mut state = self.state.lock().unwrap();
        if let Some(snapshot) = state.fixtures.iter_mut().find(|s| s.fixture.id == id) {
            snapshot.fixture.status = status;
            snapshot.fixture.score = score;
        }
    }

    pub fn fail_standings(&self, msg: &str) {
        self.state.lock().unwrap().standings_error = Some(msg.to_string());
    }

    pub fn stall_standings(&self, delay: Duration) {
        self.state.lock().unwrap().standings_delay = Some(delay);
    }

    pub fn fail_deep_stats(&self, msg: &str) {
        self.state.lock().unwrap().deep_error = Some(msg.to_string());
    }
}

#[async_trait]
impl FixtureProvider for MockFeed {
    async fn fixtures(&self, league: &LeagueSpec, date: NaiveDate) -> Result<Vec<FixtureSnapshot>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .fixtures
            .iter()
            .filter(|s| s.fixture.league == league.code && s.fixture.scheduled_at.date_naive() == date)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StandingsProvider for MockFeed {
    async fn standings(&self, league: &LeagueSpec) -> Result<Vec<StandingsRow>> {
        let (delay, error, rows) = {
            let state = self.state.lock().unwrap();
            (
                state.standings_delay,
                state.standings_error.clone(),
                state.standings.get(&league.code).cloned().unwrap_or_default(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match error {
            Some(msg) => Err(anyhow!(msg)),
            None => Ok(rows),
        }
    }
}

#[async_trait]
impl DeepStatsProvider for MockFeed {
    async fn events_on(&self, _date: NaiveDate, _sport: Sport) -> Result<Vec<DeepStatsEvent>> {
        let state = self.state.lock().unwrap();
        match &state.deep_error {
            Some(msg) => Err(anyhow!(msg.clone())),
            None => Ok(state.events.clone()),
        }
    }

    async fn event_stats(&self, event: &DeepStatsEvent) -> Result<ProviderObservation> {
        let state = self.state.lock().unwrap();
        state
            .stats
            .get(&event.id)
            .cloned()
            .ok_or_else(|| anyhow!("no stats for event {}", event.id))
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn match_day() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn soccer_fixture(id: &str, league: &str, home: &str, away: &str) -> FixtureSnapshot {
    let mut observation = ProviderObservation::new("espn", 1.0);
    observation.home_record = Some("13-3-2".into());
    observation.away_record = Some("3-5-10".into());
    observation.home_price = PriceQuote::new(Some(1.60), Some(1.55));
    observation.draw_price = PriceQuote::new(Some(4.0), Some(4.2));
    observation.away_price = PriceQuote::new(Some(5.5), Some(6.0));
    FixtureSnapshot {
        fixture: Fixture {
            id: id.into(),
            sport: Sport::Soccer,
            league: league.into(),
            home_team: home.into(),
            away_team: away.into(),
            scheduled_at: Utc::now(),
            status: FixtureStatus::Scheduled,
            score: None,
        },
        observation,
    }
}

pub fn basketball_fixture(id: &str, home: &str, away: &str) -> FixtureSnapshot {
    let mut observation = ProviderObservation::new("espn", 1.0);
    observation.home_record = Some("40-12".into());
    observation.away_record = Some("18-34".into());
    observation.home_price = PriceQuote::new(Some(1.35), Some(1.30));
    observation.away_price = PriceQuote::new(Some(3.3), Some(3.6));
    FixtureSnapshot {
        fixture: Fixture {
            id: id.into(),
            sport: Sport::Basketball,
            league: "nba".into(),
            home_team: home.into(),
            away_team: away.into(),
            scheduled_at: Utc::now(),
            status: FixtureStatus::Scheduled,
            score: None,
        },
        observation,
    }
}

pub fn standings_row(team: &str, won: u32, drawn: u32, lost: u32, scored: f64, conceded: f64) -> StandingsRow {
    StandingsRow {
        team: team.into(),
        played: won + drawn + lost,
        won,
        drawn,
        lost,
        scored: Some(scored),
        conceded: Some(conceded),
    }
}

pub fn premier_league_table() -> Vec<StandingsRow> {
    vec![
        standings_row("Arsenal FC", 13, 3, 2, 42.0, 14.0),
        standings_row("Chelsea FC", 3, 5, 10, 18.0, 33.0),
        standings_row("Everton FC", 7, 5, 6, 24.0, 23.0),
        standings_row("Fulham FC", 6, 6, 6, 22.0, 24.0),
    ]
}

pub fn nba_table() -> Vec<StandingsRow> {
    vec![
        standings_row("Boston Celtics", 40, 0, 12, 6100.0, 5600.0),
        standings_row("Detroit Pistons", 18, 0, 34, 5700.0, 6000.0),
    ]
}
