//! Data fusion boundary.
//!
//! Observations for the same fixture from several providers are blended
//! deterministically: numeric fields take the weight-averaged value over
//! the providers that supply them, text fields come from the
//! highest-weight provider (ties broken by source name). The fused record
//! is then validated once into a [`ModelInput`]; every gap found here
//! becomes an issue on the fixture's output record.

use tracing::debug;

use crate::config::LeagueSpec;
use crate::identity::{normalize_team_name, IdentityResolver};
use crate::model::expected::ModelInput;
use crate::model::ratings::LeagueRatings;
use crate::types::{
    ConsensusPrices, EngineError, ExpectedGoals, Fixture, PriceQuote, ProviderObservation, Side,
    Sport, TeamRecord, TeamRating, DEFAULT_WIN_RATE,
};

/// Words in momentum text that mark the named side as dominant.
const MOMENTUM_WORDS: [&str; 5] = ["dominant", "dominating", "pressing", "superior", "momentum"];

/// A fixture ready for the model, with everything learned on the way.
#[derive(Debug, Clone)]
pub struct FusedFixture {
    pub fixture: Fixture,
    pub observation: ProviderObservation,
    pub input: ModelInput,
    pub issues: Vec<EngineError>,
    /// Some inputs fell back to neutral defaults.
    pub low_confidence: bool,
    /// Nothing beyond defaults is known; the fixture should not be simulated.
    pub no_data: bool,
}

/// Blend several observations of the same fixture into one.
pub fn fuse_observations(observations: &[ProviderObservation]) -> ProviderObservation {
    let mut ranked: Vec<&ProviderObservation> = observations.iter().collect();
    ranked.sort_by(|a, b| {
        weight_of(b)
            .total_cmp(&weight_of(a))
            .then_with(|| a.source.cmp(&b.source))
    });

    let first_text = |f: fn(&ProviderObservation) -> &Option<String>| {
        ranked.iter().find_map(|o| f(o).clone())
    };
    let quote = |f: fn(&ProviderObservation) -> &PriceQuote| PriceQuote {
        open: weighted(&ranked, |o| f(o).usable_open()),
        current: weighted(&ranked, |o| f(o).usable_current()),
    };

    let expected_goals = match (
        weighted(&ranked, |o| o.expected_goals.map(|x| x.home)),
        weighted(&ranked, |o| o.expected_goals.map(|x| x.away)),
    ) {
        (Some(home), Some(away)) => Some(ExpectedGoals { home, away }),
        _ => None,
    };
    let consensus = ranked.iter().any(|o| o.consensus.is_some()).then(|| ConsensusPrices {
        home: weighted(&ranked, |o| o.consensus.and_then(|c| c.home)),
        draw: weighted(&ranked, |o| o.consensus.and_then(|c| c.draw)),
        away: weighted(&ranked, |o| o.consensus.and_then(|c| c.away)),
    });

    ProviderObservation {
        source: ranked.iter().map(|o| o.source.as_str()).collect::<Vec<_>>().join("+"),
        weight: ranked.iter().map(|o| weight_of(o)).sum(),
        home_record: first_text(|o| &o.home_record),
        away_record: first_text(|o| &o.away_record),
        home_price: quote(|o| &o.home_price),
        draw_price: quote(|o| &o.draw_price),
        away_price: quote(|o| &o.away_price),
        momentum: first_text(|o| &o.momentum),
        expected_goals,
        consensus,
    }
}

fn weight_of(o: &ProviderObservation) -> f64 {
    if o.weight.is_finite() && o.weight > 0.0 {
        o.weight
    } else {
        0.0
    }
}

/// Weighted mean of a field over the observations that supply it.
/// Falls back to a plain mean when every supplier has zero weight.
fn weighted<F>(observations: &[&ProviderObservation], field: F) -> Option<f64>
where
    F: Fn(&ProviderObservation) -> Option<f64>,
{
    let values: Vec<(f64, f64)> = observations
        .iter()
        .filter_map(|o| field(o).filter(|v| v.is_finite()).map(|v| (weight_of(o), v)))
        .collect();
    if values.is_empty() {
        return None;
    }
    let total: f64 = values.iter().map(|(w, _)| w).sum();
    if total > 0.0 {
        Some(values.iter().map(|(w, v)| w * v).sum::<f64>() / total)
    } else {
        Some(values.iter().map(|(_, v)| v).sum::<f64>() / values.len() as f64)
    }
}

/// Which side, if exactly one, the momentum text names as dominant.
pub fn momentum_side(text: &str, home_team: &str, away_team: &str) -> Option<Side> {
    let text = normalize_team_name(text);
    if !MOMENTUM_WORDS.iter().any(|w| text.contains(w)) {
        return None;
    }
    let names = |team: &str| {
        let key = normalize_team_name(team);
        !key.is_empty() && text.contains(&key)
    };
    match (names(home_team), names(away_team)) {
        (true, false) => Some(Side::Home),
        (false, true) => Some(Side::Away),
        _ => None,
    }
}

/// Validate a fixture and its observations into model input.
pub fn build_input(
    fixture: &Fixture,
    observations: &[ProviderObservation],
    ratings: &LeagueRatings,
    resolver: &IdentityResolver,
    league: &LeagueSpec,
) -> FusedFixture {
    let observation = fuse_observations(observations);
    let mut issues = Vec::new();

    if fixture.home_team.trim().is_empty() || fixture.away_team.trim().is_empty() {
        issues.push(EngineError::DataIncomplete(format!("fixture {} is missing a team name", fixture.id)));
    }
    if fixture.is_final() && fixture.score.is_none() {
        issues.push(EngineError::DataIncomplete(format!("fixture {} is final without a score", fixture.id)));
    }

    let home_win_rate = win_rate(observation.home_record.as_deref(), &fixture.home_team, &mut issues);
    let away_win_rate = win_rate(observation.away_record.as_deref(), &fixture.away_team, &mut issues);

    if !ratings.is_available() {
        issues.push(EngineError::DataIncomplete(format!("standings unavailable for {}", fixture.league)));
    }
    let home = rating(ratings, resolver, &fixture.home_team, &mut issues);
    let away = rating(ratings, resolver, &fixture.away_team, &mut issues);

    let momentum = observation
        .momentum
        .as_deref()
        .and_then(|text| momentum_side(text, &fixture.home_team, &fixture.away_team));

    let no_data = fixture.sport == Sport::Soccer
        && home.is_none()
        && away.is_none()
        && observation.expected_goals.is_none()
        && (home_win_rate - DEFAULT_WIN_RATE).abs() < 0.01
        && (away_win_rate - DEFAULT_WIN_RATE).abs() < 0.01;
    let low_confidence = !issues.is_empty() || home.is_none() || away.is_none();

    let input = ModelInput {
        sport: fixture.sport,
        baseline: league.baseline,
        home_advantage: league.home_advantage,
        home: home.unwrap_or_else(|| TeamRating::neutral(&normalize_team_name(&fixture.home_team), &fixture.league)),
        away: away.unwrap_or_else(|| TeamRating::neutral(&normalize_team_name(&fixture.away_team), &fixture.league)),
        home_win_rate,
        away_win_rate,
        home_price: observation.home_price.usable_current(),
        draw_price: observation.draw_price.usable_current(),
        away_price: observation.away_price.usable_current(),
        expected_goals: observation.expected_goals,
        momentum,
    };

    debug!(
        fixture_id = %fixture.id,
        sources = %observation.source,
        issues = issues.len(),
        no_data,
        "Fixture fused"
    );

    FusedFixture {
        fixture: fixture.clone(),
        observation,
        input,
        issues,
        low_confidence,
        no_data,
    }
}

fn win_rate(record: Option<&str>, team: &str, issues: &mut Vec<EngineError>) -> f64 {
    match record.and_then(TeamRecord::parse).and_then(|r| r.win_rate()) {
        Some(rate) => rate,
        None => {
            issues.push(EngineError::DataIncomplete(format!("no usable record for {team}")));
            DEFAULT_WIN_RATE
        }
    }
}

fn rating(
    ratings: &LeagueRatings,
    resolver: &IdentityResolver,
    team: &str,
    issues: &mut Vec<EngineError>,
) -> Option<TeamRating> {
    if !ratings.is_available() {
        return None;
    }
    let found = ratings.get(resolver, team).cloned();
    match &found {
        Some(rating) if rating.incomplete => issues.push(EngineError::DataIncomplete(format!(
            "{team} has no scoring totals in {} standings",
            ratings.league()
        ))),
        Some(_) => {}
        None => issues.push(EngineError::IdentityUnresolved(format!(
            "{team} not found in {} standings",
            ratings.league()
        ))),
    }
    found
}
