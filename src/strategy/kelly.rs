//! Kelly criterion stake sizing.
//!
//! Fractional Kelly against a decimal price, capped at a fixed share of
//! bankroll. A non-positive edge always means a zero stake.

use serde::Deserialize;
use tracing::debug;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StakingConfig {
    /// Fractional Kelly multiplier (0.25 = quarter-Kelly).
    pub kelly_multiplier: f64,
    /// Maximum stake as a fraction of bankroll.
    pub max_stake_pct: f64,
    /// Confidence (0–100) below which no pick is made.
    pub confidence_floor: f64,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            kelly_multiplier: 0.25, // Quarter-Kelly
            max_stake_pct: 0.05,    // Max 5% of bankroll
            confidence_floor: 65.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// Sized stake for one pick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stake {
    /// Model probability minus price-implied probability.
    pub edge: f64,
    /// Raw (full) Kelly fraction.
    pub kelly_fraction: f64,
    /// Stake as a percentage of bankroll, after multiplier and cap.
    pub stake_pct: f64,
}

pub struct StakeCalculator {
    config: StakingConfig,
}

impl StakeCalculator {
    pub fn new(config: StakingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StakingConfig {
        &self.config
    }

    /// Size a stake for win probability `probability` at decimal `price`.
    ///
    /// Kelly formula: f* = (p(price − 1) − (1 − p)) / (price − 1).
    /// Returns `None` when the price is unusable (≤ 1.0) or the probability
    /// is outside `[0, 1]`.
    pub fn size(&self, probability: f64, price: f64) -> Option<Stake> {
        if !price.is_finite() || price <= 1.0 || !(0.0..=1.0).contains(&probability) {
            return None;
        }

        let edge = probability - 1.0 / price;
        let net = price - 1.0;
        let kelly = (probability * net - (1.0 - probability)) / net;

        if edge <= 0.0 || kelly <= 0.0 {
            debug!(probability, price, edge, "No edge, stake suppressed");
            return Some(Stake {
                edge,
                kelly_fraction: kelly,
                stake_pct: 0.0,
            });
        }

        let fraction = (kelly * self.config.kelly_multiplier).min(self.config.max_stake_pct);
        let stake_pct = fraction * 100.0;

        debug!(
            probability,
            price,
            raw_kelly = format!("{:.2}%", kelly * 100.0),
            stake = format!("{:.2}%", stake_pct),
            "Stake sized"
        );

        Some(Stake {
            edge,
            kelly_fraction: kelly,
            stake_pct,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
