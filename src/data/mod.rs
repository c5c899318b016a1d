//! External data providers.
//!
//! Three roles: the primary fixture provider (fixtures, scores, records,
//! moneyline prices), the standings provider (league tables) and the
//! secondary deep-stats provider (xG, momentum, consensus prices). One
//! HTTP adapter can fill several roles.

pub mod espn;
pub mod sofascore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::LeagueSpec;
use crate::types::{Fixture, ProviderObservation, Sport, StandingsRow};

/// A fixture together with what the primary provider knows about it.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureSnapshot {
    pub fixture: Fixture,
    pub observation: ProviderObservation,
}

/// One event listed by the deep-stats provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepStatsEvent {
    pub id: u64,
    pub home_team: String,
    pub away_team: String,
    pub home_team_id: Option<u64>,
    pub away_team_id: Option<u64>,
}

/// Fixtures, live scores and prices for one league and date.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FixtureProvider: Send + Sync {
    async fn fixtures(&self, league: &LeagueSpec, date: NaiveDate) -> Result<Vec<FixtureSnapshot>>;
}

/// League tables.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StandingsProvider: Send + Sync {
    async fn standings(&self, league: &LeagueSpec) -> Result<Vec<StandingsRow>>;
}

/// Per-event deep statistics, queried by date and sport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeepStatsProvider: Send + Sync {
    /// Events scheduled on `date`.
    async fn events_on(&self, date: NaiveDate, sport: Sport) -> Result<Vec<DeepStatsEvent>>;

    /// Expected goals, momentum and consensus prices for one event.
    async fn event_stats(&self, event: &DeepStatsEvent) -> Result<ProviderObservation>;
}
