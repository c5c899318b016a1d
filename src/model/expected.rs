//! Expected-outcome model.
//!
//! Soccer: per-side expected goals from ratings and home advantage,
//! corrected by the blended (history + market) win probability, secondary
//! xG, momentum and a small symmetric jitter. Basketball: expected points
//! from the league baseline, home advantage, a win-rate spread and a
//! rating-derived style offset.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{EngineError, ExpectedGoals, Side, Sport, TeamRating};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Weight of the record-derived win rate when blending with the market.
    pub history_weight: f64,
    /// Blended win probability above which the favourite boost applies.
    pub favourite_threshold: f64,
    /// Minimum expected-goal lead of a boosted favourite.
    pub favourite_margin: f64,
    pub favourite_boost: f64,
    /// Strength gap below which a match counts as tight.
    pub tight_match_gap: f64,
    /// League total-goal baseline below which tight matches are dampened.
    pub tight_match_baseline: f64,
    pub tight_match_factor: f64,
    /// Half-width of the uniform per-side perturbation, in goals.
    pub jitter_goals: f64,
    /// Weight of secondary-provider xG against the model's expected goals.
    pub xg_weight: f64,
    /// Multiplier for the side named dominant in momentum text.
    pub momentum_factor: f64,
    /// Floor for expected values handed to the simulator.
    pub min_expected: f64,
    /// Points of spread per unit of win-rate difference (basketball).
    pub spread_per_win_rate: f64,
    /// Share of the per-side baseline moved by the rating style offset (basketball).
    pub style_weight: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            history_weight: 0.40,
            favourite_threshold: 0.60,
            favourite_margin: 0.6,
            favourite_boost: 1.10,
            tight_match_gap: 0.15,
            tight_match_baseline: 2.4,
            tight_match_factor: 0.95,
            jitter_goals: 0.05,
            xg_weight: 0.60,
            momentum_factor: 1.045,
            min_expected: 0.05,
            spread_per_win_rate: 20.0,
            style_weight: 0.25,
        }
    }
}

// ---------------------------------------------------------------------------
// Input / output
// ---------------------------------------------------------------------------

/// Everything the model needs for one fixture, validated at the fusion boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub sport: Sport,
    /// League total goals (soccer) or points (basketball).
    pub baseline: f64,
    pub home_advantage: f64,
    pub home: TeamRating,
    pub away: TeamRating,
    pub home_win_rate: f64,
    pub away_win_rate: f64,
    /// Current decimal prices, if usable.
    pub home_price: Option<f64>,
    pub draw_price: Option<f64>,
    pub away_price: Option<f64>,
    pub expected_goals: Option<ExpectedGoals>,
    /// Side named dominant by the secondary provider's momentum text.
    pub momentum: Option<Side>,
}

/// Expected goals/points handed to the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    pub home: f64,
    pub away: f64,
    /// Blended win probability per side.
    pub home_strength: f64,
    pub away_strength: f64,
    /// Non-fatal problems met while computing the values.
    #[serde(skip)]
    pub issues: Vec<EngineError>,
}

/// Margin-free probabilities implied by a set of decimal prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpliedProbabilities {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl ImpliedProbabilities {
    pub fn for_side(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.home,
            Side::Away => self.away,
        }
    }
}

/// Convert decimal prices to implied probabilities normalized to sum to 1.
///
/// Needs usable home and away prices; the draw price is optional (two-way
/// markets).
pub fn implied_probabilities(
    home: Option<f64>,
    draw: Option<f64>,
    away: Option<f64>,
) -> Option<ImpliedProbabilities> {
    let usable = |p: Option<f64>| p.filter(|v| v.is_finite() && *v > 1.0);
    let home = 1.0 / usable(home)?;
    let away = 1.0 / usable(away)?;
    let draw = usable(draw).map(|p| 1.0 / p).unwrap_or(0.0);
    let total = home + draw + away;
    Some(ImpliedProbabilities {
        home: home / total,
        draw: draw / total,
        away: away / total,
    })
}

/// Blend a record-derived win rate with a market-implied probability.
pub fn blend_probability(history: f64, market: Option<f64>, history_weight: f64) -> f64 {
    match market {
        Some(m) => history_weight * history + (1.0 - history_weight) * m,
        None => history,
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

pub struct ExpectedOutcomeModel {
    config: ModelConfig,
}

impl ExpectedOutcomeModel {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Blended win probability for each side.
    pub fn strengths(&self, input: &ModelInput) -> (f64, f64) {
        let implied = implied_probabilities(input.home_price, input.draw_price, input.away_price);
        let w = self.config.history_weight;
        (
            blend_probability(input.home_win_rate, implied.map(|p| p.home), w),
            blend_probability(input.away_win_rate, implied.map(|p| p.away), w),
        )
    }

    pub fn estimate<R: Rng + ?Sized>(&self, input: &ModelInput, rng: &mut R) -> ExpectedOutcome {
        match input.sport {
            Sport::Soccer => self.soccer(input, rng),
            Sport::Basketball => self.basketball(input),
        }
    }

    pub fn soccer<R: Rng + ?Sized>(&self, input: &ModelInput, rng: &mut R) -> ExpectedOutcome {
        let cfg = &self.config;
        let (home_strength, away_strength) = self.strengths(input);

        let per_side = input.baseline / 2.0;
        let mut home = per_side * input.home.offensive * input.away.defensive + input.home_advantage;
        let mut away = per_side * input.away.offensive * input.home.defensive;

        if let Some(xg) = input.expected_goals {
            home = (1.0 - cfg.xg_weight) * home + cfg.xg_weight * xg.home;
            away = (1.0 - cfg.xg_weight) * away + cfg.xg_weight * xg.away;
        }

        match input.momentum {
            Some(Side::Home) => home *= cfg.momentum_factor,
            Some(Side::Away) => away *= cfg.momentum_factor,
            None => {}
        }

        if home_strength > cfg.favourite_threshold {
            home = home.max(away + cfg.favourite_margin) * cfg.favourite_boost;
        } else if away_strength > cfg.favourite_threshold {
            away = away.max(home + cfg.favourite_margin) * cfg.favourite_boost;
        }

        if (home_strength - away_strength).abs() < cfg.tight_match_gap
            && input.baseline < cfg.tight_match_baseline
        {
            home *= cfg.tight_match_factor;
            away *= cfg.tight_match_factor;
        }

        home += self.jitter(rng);
        away += self.jitter(rng);

        let mut issues = Vec::new();
        let home = self.floor(Side::Home, home, &mut issues);
        let away = self.floor(Side::Away, away, &mut issues);

        debug!(home, away, home_strength, away_strength, "Soccer expected goals");
        ExpectedOutcome {
            home,
            away,
            home_strength,
            away_strength,
            issues,
        }
    }

    /// Basketball expected points. No jitter: the normal sampler's spread dwarfs it.
    pub fn basketball(&self, input: &ModelInput) -> ExpectedOutcome {
        let cfg = &self.config;
        let (home_strength, away_strength) = self.strengths(input);

        let per_side = input.baseline / 2.0;
        let spread = (input.home_win_rate - input.away_win_rate) * cfg.spread_per_win_rate;
        let style = (input.home.offensive * input.away.defensive
            - input.away.offensive * input.home.defensive)
            * per_side
            * cfg.style_weight;
        let shift = (input.home_advantage + spread + style) / 2.0;

        let mut issues = Vec::new();
        let home = self.floor(Side::Home, per_side + shift, &mut issues);
        let away = self.floor(Side::Away, per_side - shift, &mut issues);

        debug!(home, away, spread, style, "Basketball expected points");
        ExpectedOutcome {
            home,
            away,
            home_strength,
            away_strength,
            issues,
        }
    }

    fn jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let j = self.config.jitter_goals;
        if j > 0.0 {
            rng.gen_range(-j..=j)
        } else {
            0.0
        }
    }

    fn floor(&self, side: Side, value: f64, issues: &mut Vec<EngineError>) -> f64 {
        if value.is_finite() && value >= self.config.min_expected {
            return value;
        }
        warn!(%side, value, floor = self.config.min_expected, "Expected value floored");
        issues.push(EngineError::SimulationDegenerate { side, value });
        self.config.min_expected
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
