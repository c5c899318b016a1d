//! Rating aggregation from league tables.
//!
//! Offensive index = team scoring rate / league scoring rate, defensive
//! index = team conceding rate / league conceding rate, both clamped to
//! `[RATING_MIN, RATING_MAX]`. Teams below the minimum sample get neutral
//! indices.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::identity::{normalize_team_name, IdentityResolver};
use crate::types::{StandingsRow, TeamRating, NEUTRAL_RATING, RATING_MAX, RATING_MIN};

/// Games a team must have played before its raw rates are trusted.
pub const MIN_GAMES: u32 = 3;

/// Read-only ratings for one league, valid for one refresh cycle.
#[derive(Debug, Clone, Default)]
pub struct LeagueRatings {
    league: String,
    /// Keyed by the standings provider's raw team name.
    ratings: BTreeMap<String, TeamRating>,
    available: bool,
}

impl LeagueRatings {
    /// Ratings for a league whose table could not be fetched. Every lookup misses.
    pub fn neutral(league: &str) -> Self {
        Self {
            league: league.to_string(),
            ratings: BTreeMap::new(),
            available: false,
        }
    }

    pub fn league(&self) -> &str {
        &self.league
    }

    /// Whether a league table backed these ratings.
    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Look up a team by any provider spelling.
    pub fn get(&self, resolver: &IdentityResolver, name: &str) -> Option<&TeamRating> {
        let raw = resolver.resolve(name, self.ratings.keys().map(String::as_str))?;
        self.ratings.get(raw)
    }
}

/// Converts league tables into per-team indices.
#[derive(Debug, Clone)]
pub struct RatingAggregator {
    min_games: u32,
}

impl Default for RatingAggregator {
    fn default() -> Self {
        Self { min_games: MIN_GAMES }
    }
}

impl RatingAggregator {
    pub fn new(min_games: u32) -> Self {
        Self { min_games }
    }

    pub fn aggregate(&self, league: &str, rows: &[StandingsRow]) -> LeagueRatings {
        // Rows without scoring totals stay out of the league averages.
        let (games, scored, conceded) = rows
            .iter()
            .filter(|r| r.played > 0)
            .filter_map(|r| Some((r.played, r.scored?, r.conceded?)))
            .fold((0u32, 0.0, 0.0), |(g, s, c), (p, rs, rc)| (g + p, s + rs, c + rc));

        let avg_for = if games > 0 { scored / games as f64 } else { 0.0 };
        let avg_against = if games > 0 { conceded / games as f64 } else { 0.0 };
        if avg_for <= 0.0 || avg_against <= 0.0 {
            warn!(league, teams = rows.len(), "League averages unusable, ratings neutral");
        }

        let ratings = rows
            .iter()
            .map(|row| {
                let mut rating = TeamRating::neutral(&normalize_team_name(&row.team), league);
                rating.played = row.played;
                match (row.scored, row.conceded) {
                    (Some(team_for), Some(team_against)) => {
                        rating.scored = team_for;
                        rating.conceded = team_against;
                        if row.played >= self.min_games && avg_for > 0.0 && avg_against > 0.0 {
                            let played = row.played as f64;
                            rating.offensive = index(team_for / played, avg_for);
                            rating.defensive = index(team_against / played, avg_against);
                        }
                    }
                    _ => {
                        debug!(league, team = %row.team, "Standings row missing scoring totals");
                        rating.incomplete = true;
                    }
                }
                (row.team.clone(), rating)
            })
            .collect::<BTreeMap<_, _>>();

        debug!(league, teams = ratings.len(), avg_for, avg_against, "League ratings built");

        LeagueRatings {
            league: league.to_string(),
            ratings,
            available: true,
        }
    }
}

fn index(rate: f64, league_rate: f64) -> f64 {
    let value = rate / league_rate;
    if value.is_finite() {
        value.clamp(RATING_MIN, RATING_MAX)
    } else {
        NEUTRAL_RATING
    }
}
