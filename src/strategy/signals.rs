//! Market signal detection.
//!
//! Two signals per side: a price drop from open to current at the primary
//! provider, and a lag where the primary provider's current price still
//! sits well above an independent consensus price.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{MarketSignal, ProviderObservation, Side, SignalKind};

/// What a lag signal does to the statistical recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LagPolicy {
    /// The lag side replaces the pick and rationale.
    #[default]
    Override,
    /// The statistical pick stands; the lag is appended to the rationale.
    Annotate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Minimum open → current drop, in percent.
    pub drop_threshold_pct: f64,
    /// Primary price must exceed consensus by this ratio to count as lagging.
    pub lag_ratio: f64,
    pub lag_policy: LagPolicy,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            drop_threshold_pct: 1.1,
            lag_ratio: 1.05,
            lag_policy: LagPolicy::Override,
        }
    }
}

pub struct MarketSignalDetector {
    config: SignalConfig,
}

impl MarketSignalDetector {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// All signals for one fixture's fused observation. Drops first, then lags,
    /// home before away.
    pub fn detect(&self, fixture_id: &str, observation: &ProviderObservation) -> Vec<MarketSignal> {
        let sides = [Side::Home, Side::Away];
        let drops: Vec<Option<MarketSignal>> =
            sides.iter().map(|s| self.detect_drop(observation, *s)).collect();

        let mut signals: Vec<MarketSignal> = drops.iter().flatten().copied().collect();
        for (side, drop) in sides.iter().zip(&drops) {
            let drop_pct = drop
                .map(|d| d.pct)
                .or_else(|| drop_pct(observation, *side))
                .unwrap_or(0.0)
                .max(0.0);
            if let Some(lag) = self.detect_lag(observation, *side, drop_pct) {
                signals.push(lag);
            }
        }

        for signal in &signals {
            info!(fixture_id, %signal, "Market signal");
        }
        signals
    }

    fn detect_drop(&self, observation: &ProviderObservation, side: Side) -> Option<MarketSignal> {
        let quote = observation.price(side);
        let (open, current) = (quote.usable_open()?, quote.usable_current()?);
        let pct = (open - current) / open * 100.0;
        if pct > self.config.drop_threshold_pct {
            Some(MarketSignal {
                kind: SignalKind::Drop,
                side,
                pct,
                reference: open,
                current,
            })
        } else {
            None
        }
    }

    fn detect_lag(
        &self,
        observation: &ProviderObservation,
        side: Side,
        drop_pct: f64,
    ) -> Option<MarketSignal> {
        let primary = observation.price(side).usable_current()?;
        let consensus = observation
            .consensus?
            .for_side(side)
            .filter(|p| p.is_finite() && *p > 1.0)?;
        if primary <= consensus * self.config.lag_ratio {
            return None;
        }
        let gap = (primary - consensus) / primary * 100.0;
        debug!(%side, primary, consensus, gap, drop_pct, "Lag candidate");
        if gap > drop_pct {
            Some(MarketSignal {
                kind: SignalKind::Lag,
                side,
                pct: gap,
                reference: primary,
                current: consensus,
            })
        } else {
            None
        }
    }
}

/// Raw open → current movement in percent, whether or not it clears the threshold.
fn drop_pct(observation: &ProviderObservation, side: Side) -> Option<f64> {
    let quote = observation.price(side);
    let (open, current) = (quote.usable_open()?, quote.usable_current()?);
    Some((open - current) / open * 100.0)
}

/// The largest lag signal, if any.
pub fn strongest_lag(signals: &[MarketSignal]) -> Option<&MarketSignal> {
    signals
        .iter()
        .filter(|s| s.kind == SignalKind::Lag)
        .max_by(|a, b| a.pct.total_cmp(&b.pct))
}
