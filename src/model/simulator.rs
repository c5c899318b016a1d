//! Monte Carlo outcome simulation.
//!
//! Soccer trials draw independent Poisson goal counts per side; basketball
//! trials draw normal point totals around the expected points. Each sample
//! consumes exactly one uniform (Poisson) or two (normal), so a fixed seed
//! replays the same trial sequence and larger means never produce smaller
//! samples.

use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::debug;

use super::expected::ExpectedOutcome;
use crate::types::{
    MarketPick, Pick, Score, ScorelineFrequency, Side, SimulationResult, Sport,
    ThresholdProbability, TotalDirection,
};

/// Soccer total-goal lines tracked by the simulator.
pub const SOCCER_LINES: [f64; 4] = [0.5, 1.5, 2.5, 3.5];

/// Hard cap on a single Poisson draw.
const MAX_GOALS: u32 = 30;

// Best-market cutoffs.
const OVER_2_5_MIN: f64 = 0.65;
const OVER_3_5_MIN: f64 = 0.55;
const UNDER_2_5_MAX: f64 = 0.35;
const UNDER_1_5_MAX: f64 = 0.45;
const OVER_1_5_MIN: f64 = 0.80;
const BTTS_YES_MIN: f64 = 0.60;
const BTTS_NO_MAX: f64 = 0.40;
const BASKETBALL_TOTAL_MIN: f64 = 0.60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub soccer_trials: u32,
    pub basketball_trials: u32,
    /// Per-side standard deviation of basketball points.
    pub basketball_std_dev: f64,
    /// Runner-up scorelines within this share of the leader's count are ties.
    pub modal_tolerance: f64,
    /// Expected-goal gap that makes one side a clear favourite.
    pub clear_favourite_gap: f64,
    /// Number of ranked scorelines kept on the result.
    pub top_scorelines: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            soccer_trials: 10_000,
            basketball_trials: 10_000,
            basketball_std_dev: 11.5,
            modal_tolerance: 0.10,
            clear_favourite_gap: 0.4,
            top_scorelines: 10,
        }
    }
}

pub struct OutcomeSimulator {
    config: SimulationConfig,
}

impl OutcomeSimulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn simulate<R: Rng + ?Sized>(
        &self,
        sport: Sport,
        expected: &ExpectedOutcome,
        rng: &mut R,
    ) -> SimulationResult {
        match sport {
            Sport::Soccer => self.simulate_soccer(expected, rng),
            Sport::Basketball => self.simulate_basketball(expected, rng),
        }
    }

    pub fn simulate_soccer<R: Rng + ?Sized>(
        &self,
        expected: &ExpectedOutcome,
        rng: &mut R,
    ) -> SimulationResult {
        let trials = self.config.soccer_trials.max(1);
        let (mut home_wins, mut draws, mut away_wins, mut btts) = (0u32, 0u32, 0u32, 0u32);
        let mut overs = [0u32; SOCCER_LINES.len()];
        let mut table: BTreeMap<Score, u32> = BTreeMap::new();

        for _ in 0..trials {
            let score = Score::new(
                sample_poisson(rng, expected.home),
                sample_poisson(rng, expected.away),
            );
            match score.home.cmp(&score.away) {
                std::cmp::Ordering::Greater => home_wins += 1,
                std::cmp::Ordering::Equal => draws += 1,
                std::cmp::Ordering::Less => away_wins += 1,
            }
            if score.home > 0 && score.away > 0 {
                btts += 1;
            }
            let total = score.total() as f64;
            for (count, line) in overs.iter_mut().zip(SOCCER_LINES) {
                if total > line {
                    *count += 1;
                }
            }
            *table.entry(score).or_insert(0) += 1;
        }

        let n = trials as f64;
        let mut scorelines: Vec<ScorelineFrequency> = table
            .into_iter()
            .map(|(score, count)| ScorelineFrequency { score, count })
            .collect();
        rank_scorelines(&mut scorelines);
        let modal = select_modal_scoreline(
            &scorelines,
            expected.home,
            expected.away,
            self.config.modal_tolerance,
            self.config.clear_favourite_gap,
        );
        scorelines.truncate(self.config.top_scorelines);

        let result = SimulationResult {
            trials,
            home_win: home_wins as f64 / n,
            draw: draws as f64 / n,
            away_win: away_wins as f64 / n,
            thresholds: SOCCER_LINES
                .iter()
                .zip(overs)
                .map(|(line, count)| ThresholdProbability { line: *line, over: count as f64 / n })
                .collect(),
            btts: Some(btts as f64 / n),
            scorelines,
            modal,
            expected_home: expected.home,
            expected_away: expected.away,
        };
        debug!(%result, "Soccer simulation complete");
        result
    }

    pub fn simulate_basketball<R: Rng + ?Sized>(
        &self,
        expected: &ExpectedOutcome,
        rng: &mut R,
    ) -> SimulationResult {
        let trials = self.config.basketball_trials.max(1);
        let std_dev = self.config.basketball_std_dev;
        let lines = basketball_lines(expected.home + expected.away);
        let mut overs = vec![0u32; lines.len()];
        let mut home_wins = 0u32;

        for _ in 0..trials {
            let home = sample_normal(rng, expected.home, std_dev);
            let away = sample_normal(rng, expected.away, std_dev);
            if home > away {
                home_wins += 1;
            }
            let total = home + away;
            for (count, line) in overs.iter_mut().zip(&lines) {
                if total > *line {
                    *count += 1;
                }
            }
        }

        let n = trials as f64;
        let result = SimulationResult {
            trials,
            home_win: home_wins as f64 / n,
            draw: 0.0,
            away_win: (trials - home_wins) as f64 / n,
            thresholds: lines
                .iter()
                .zip(overs)
                .map(|(line, count)| ThresholdProbability { line: *line, over: count as f64 / n })
                .collect(),
            btts: None,
            scorelines: Vec::new(),
            modal: None,
            expected_home: expected.home,
            expected_away: expected.away,
        };
        debug!(%result, "Basketball simulation complete");
        result
    }
}

/// Inverse-CDF Poisson draw from a single uniform.
fn sample_poisson<R: Rng + ?Sized>(rng: &mut R, lambda: f64) -> u32 {
    let u: f64 = rng.gen();
    let mut k = 0;
    let mut p = (-lambda).exp();
    let mut cdf = p;
    while u > cdf && k < MAX_GOALS {
        k += 1;
        p *= lambda / k as f64;
        cdf += p;
    }
    k
}

/// Box–Muller normal draw.
fn sample_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std: f64) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    mean + std * z
}

/// Half-point lines around the expected total, 5 and 10 points either side.
fn basketball_lines(expected_total: f64) -> Vec<f64> {
    let centre = expected_total.floor() + 0.5;
    [-10.0, -5.0, 0.0, 5.0, 10.0]
        .iter()
        .map(|offset| centre + offset)
        .filter(|line| *line > 0.0)
        .collect()
}

/// Most frequent first; ties by lower total, then lower home score.
fn rank_scorelines(scorelines: &mut [ScorelineFrequency]) {
    scorelines.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(a.score.total().cmp(&b.score.total()))
            .then(a.score.home.cmp(&b.score.home))
    });
}

/// Pick the representative scoreline from a ranked frequency table.
///
/// The leader stands unless the runner-up is within `tolerance` of its
/// count. Then a clear favourite (expected-goal gap above `favourite_gap`)
/// takes the runner-up if only the runner-up is a win for it; without a
/// clear favourite the lower-scoring of the two wins.
pub fn select_modal_scoreline(
    ranked: &[ScorelineFrequency],
    expected_home: f64,
    expected_away: f64,
    tolerance: f64,
    favourite_gap: f64,
) -> Option<Score> {
    let leader = ranked.first()?;
    let runner = match ranked.get(1) {
        Some(r) if r.count as f64 >= leader.count as f64 * (1.0 - tolerance) => r,
        _ => return Some(leader.score),
    };

    let gap = expected_home - expected_away;
    if gap.abs() > favourite_gap {
        let favourite = if gap > 0.0 { Side::Home } else { Side::Away };
        if runner.score.is_win_for(favourite) && !leader.score.is_win_for(favourite) {
            return Some(runner.score);
        }
        Some(leader.score)
    } else if runner.score.total() < leader.score.total() {
        Some(runner.score)
    } else {
        Some(leader.score)
    }
}

/// Choose the strongest goals/points market from a simulation.
///
/// Soccer checks lines in a fixed priority order, then both-teams-score.
/// A pick that clears no cutoff comes back as `Pass` at probability 0.5.
pub fn select_best_market(sport: Sport, sim: &SimulationResult) -> MarketPick {
    match sport {
        Sport::Soccer => best_soccer_market(sim),
        Sport::Basketball => best_basketball_market(sim),
    }
}

fn total(line: f64, direction: TotalDirection, probability: f64) -> MarketPick {
    MarketPick {
        pick: Pick::Total { line, direction },
        probability,
    }
}

fn best_soccer_market(sim: &SimulationResult) -> MarketPick {
    let over_1_5 = sim.over(1.5).unwrap_or(0.0);
    let over_2_5 = sim.over(2.5).unwrap_or(0.0);
    let over_3_5 = sim.over(3.5).unwrap_or(0.0);

    let pick = if over_2_5 > OVER_2_5_MIN {
        total(2.5, TotalDirection::Over, over_2_5)
    } else if over_3_5 > OVER_3_5_MIN {
        total(3.5, TotalDirection::Over, over_3_5)
    } else if over_2_5 < UNDER_2_5_MAX {
        if over_1_5 < UNDER_1_5_MAX {
            total(1.5, TotalDirection::Under, 1.0 - over_1_5)
        } else {
            total(2.5, TotalDirection::Under, 1.0 - over_2_5)
        }
    } else if over_1_5 > OVER_1_5_MIN {
        total(1.5, TotalDirection::Over, over_1_5)
    } else {
        match sim.btts {
            Some(p) if p > BTTS_YES_MIN => MarketPick {
                pick: Pick::BothTeamsScore { yes: true },
                probability: p,
            },
            Some(p) if p < BTTS_NO_MAX => MarketPick {
                pick: Pick::BothTeamsScore { yes: false },
                probability: 1.0 - p,
            },
            _ => MarketPick { pick: Pick::Pass, probability: 0.5 },
        }
    };

    // An Over 3.5 call must agree with the modal scoreline.
    match (pick.pick, sim.modal) {
        (Pick::Total { line, direction: TotalDirection::Over }, Some(modal))
            if line == 3.5 && modal.total() < 4 =>
        {
            total(2.5, TotalDirection::Over, over_2_5)
        }
        _ => pick,
    }
}

fn best_basketball_market(sim: &SimulationResult) -> MarketPick {
    sim.thresholds
        .iter()
        .flat_map(|t| {
            [
                total(t.line, TotalDirection::Over, t.over),
                total(t.line, TotalDirection::Under, t.under()),
            ]
        })
        .filter(|c| c.probability > BASKETBALL_TOTAL_MIN)
        .max_by(|a, b| a.probability.total_cmp(&b.probability))
        .unwrap_or(MarketPick { pick: Pick::Pass, probability: 0.5 })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
