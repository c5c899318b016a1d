//! Strategy: recommendation, market signals, staking, classifier nudge.
//!
//! The recommendation engine turns a simulation into one structured pick
//! with a confidence, a tier and a fractional-Kelly stake. Market signals
//! run independently on raw prices and may replace or annotate the pick.

pub mod classifier;
pub mod kelly;
pub mod signals;

use std::sync::Arc;
use tracing::{debug, info};

use crate::model::simulator::select_best_market;
use crate::types::{
    ConfidenceTier, Fixture, LeagueWeights, MarketSignal, Outcome, Pick, PickOrigin,
    ProviderObservation, Recommendation, SignalKind, SimulationResult,
};
use classifier::{confidence_nudge, ClassifierFeatures, WinClassifier};
use kelly::{StakeCalculator, StakingConfig};
use signals::{strongest_lag, LagPolicy};

/// Everything the engine reads for one fixture.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationInput<'a> {
    pub fixture: &'a Fixture,
    pub simulation: &'a SimulationResult,
    /// Fused provider observation (prices, consensus).
    pub observation: &'a ProviderObservation,
    pub signals: &'a [MarketSignal],
    /// Set when the fixture was modelled on neutral defaults.
    pub low_confidence: bool,
}

/// Builds recommendations for one refresh cycle.
///
/// League weights and the classifier are read-only for the cycle; build a
/// fresh engine when either changes.
pub struct RecommendationEngine {
    stakes: StakeCalculator,
    lag_policy: LagPolicy,
    weights: LeagueWeights,
    classifier: Option<Arc<dyn WinClassifier>>,
}

impl RecommendationEngine {
    pub fn new(
        staking: StakingConfig,
        lag_policy: LagPolicy,
        weights: LeagueWeights,
        classifier: Option<Arc<dyn WinClassifier>>,
    ) -> Self {
        Self {
            stakes: StakeCalculator::new(staking),
            lag_policy,
            weights,
            classifier,
        }
    }

    pub fn recommend(&self, input: &RecommendationInput<'_>) -> Recommendation {
        let fixture = input.fixture;
        let sim = input.simulation;
        let obs = input.observation;

        let alternative = Some(select_best_market(fixture.sport, sim)).filter(|m| m.pick.is_actionable());
        let (side, probability) = sim.favourite();
        let mut notes = vec![format!("Simulated {side} win {:.1}%", probability * 100.0)];

        let mut confidence = probability * 100.0;
        let modifier = self.weights.modifier(&fixture.league);
        if modifier != 0.0 {
            confidence += modifier;
            notes.push(format!("league modifier {modifier:+.0}"));
        }
        if let Some(classifier) = &self.classifier {
            let features = ClassifierFeatures::new(
                &fixture.league,
                obs.home_price.usable_current(),
                obs.away_price.usable_current(),
                confidence,
            );
            let estimate = classifier.win_probability(&features);
            let nudge = confidence_nudge(estimate);
            if nudge != 0.0 {
                confidence += nudge;
                notes.push(format!("classifier {:.0}% ({nudge:+.0})", estimate * 100.0));
            }
        }
        let confidence = confidence.clamp(0.0, 100.0);

        let drop = strongest(input.signals, SignalKind::Drop);
        let lag = strongest_lag(input.signals);
        let floor = self.stakes.config().confidence_floor;
        let live = fixture.is_live();
        if live && confidence < floor {
            notes.push("live fixture, floor lifted".to_string());
        }

        let mut rec = if confidence < floor && drop.is_none() && lag.is_none() && !live {
            debug!(fixture_id = %fixture.id, confidence, floor, "Below confidence floor");
            let mut pass = Recommendation::pass(
                &fixture.id,
                PickOrigin::Statistical,
                format!("{} | confidence {confidence:.0} below {floor:.0}", notes.join(" | ")),
            );
            pass.confidence = confidence;
            pass.low_confidence = input.low_confidence;
            pass
        } else {
            let mut rec = Recommendation {
                fixture_id: fixture.id.clone(),
                pick: Pick::MatchResult { outcome: Outcome::from(side) },
                origin: PickOrigin::Statistical,
                confidence,
                tier: ConfidenceTier::from_confidence(confidence),
                stake_pct: 0.0,
                edge: None,
                price: None,
                rationale: String::new(),
                market_signal: None,
                alternative: None,
                low_confidence: input.low_confidence,
            };
            if let Some(price) = obs.price(side).usable_current() {
                notes.push(self.apply_stake(&mut rec, confidence / 100.0, price));
            }
            rec.rationale = notes.join(" | ");
            rec
        };
        rec.alternative = alternative;

        if let Some(drop) = drop {
            rec.market_signal = Some(*drop);
            rec.rationale.push_str(&format!(" | {drop}"));
        }
        if let Some(lag) = lag {
            rec.market_signal = Some(*lag);
            match self.lag_policy {
                LagPolicy::Override => self.apply_lag_override(&mut rec, sim, lag),
                LagPolicy::Annotate => rec.rationale.push_str(&format!(" | {lag}")),
            }
        }

        info!(fixture_id = %fixture.id, fixture = %fixture, recommendation = %rec, "Recommendation");
        rec
    }

    /// Size the stake for `rec` and describe it.
    fn apply_stake(&self, rec: &mut Recommendation, probability: f64, price: f64) -> String {
        rec.price = Some(price);
        match self.stakes.size(probability, price) {
            Some(stake) => {
                rec.edge = Some(stake.edge);
                rec.stake_pct = stake.stake_pct;
                if stake.stake_pct > 0.0 {
                    format!(
                        "Kelly stake {:.2}% at {price:.2} (edge {:+.1}%)",
                        stake.stake_pct,
                        stake.edge * 100.0
                    )
                } else {
                    format!("no value at {price:.2} (edge {:+.1}%)", stake.edge * 100.0)
                }
            }
            None => {
                rec.stake_pct = 0.0;
                format!("price {price:.2} unusable")
            }
        }
    }

    /// Replace the statistical pick with the lagging side.
    fn apply_lag_override(&self, rec: &mut Recommendation, sim: &SimulationResult, lag: &MarketSignal) {
        rec.pick = Pick::MatchResult { outcome: Outcome::from(lag.side) };
        rec.origin = PickOrigin::MarketSignal;
        rec.edge = None;
        rec.stake_pct = 0.0;
        if rec.tier.is_none() {
            rec.tier = ConfidenceTier::from_confidence(rec.confidence);
        }
        let mut rationale = format!(
            "Consensus price moved to {:.2}; primary price {:.2} lags by {:.1}%",
            lag.current, lag.reference, lag.pct
        );
        let stake_note = self.apply_stake(rec, sim.win_probability(lag.side), lag.reference);
        rationale.push_str(&format!(" | {stake_note}"));
        rec.rationale = rationale;
    }
}

fn strongest(signals: &[MarketSignal], kind: SignalKind) -> Option<&MarketSignal> {
    signals
        .iter()
        .filter(|s| s.kind == kind)
        .max_by(|a, b| a.pct.total_cmp(&b.pct))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
