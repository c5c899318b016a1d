//! Recommendation ledger.
//!
//! One entry per fixture. The entry is overwritten every cycle until its
//! fixture is final; then it is frozen and verified. Frozen entries only
//! accept a late score (to settle a pending verdict), never a new pick.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use super::verifier::verify;
use crate::types::{EngineError, Fixture, Recommendation, Verdict};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub fixture: Fixture,
    pub recommendation: Recommendation,
    pub verdict: Verdict,
    /// Verdict of the alternative goals/points pick, if one was made.
    pub alternative_verdict: Option<Verdict>,
    pub frozen: bool,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn settle(&mut self) {
        self.verdict = verify(&self.recommendation.pick, &self.fixture);
        self.alternative_verdict = self
            .recommendation
            .alternative
            .map(|alt| verify(&alt.pick, &self.fixture));
    }
}

/// What `record` did with a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerUpdate {
    Inserted,
    Updated,
    /// The fixture went final: entry frozen and verified.
    Frozen(Verdict),
    /// Entry was already frozen; the new recommendation was dropped.
    Ignored,
}

/// Verdict counts across the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub open: usize,
    pub won: usize,
    pub lost: usize,
    pub pending: usize,
    pub skipped: usize,
}

impl LedgerSummary {
    /// Won share of settled picks, if any are settled.
    pub fn hit_rate(&self) -> Option<f64> {
        match self.won + self.lost {
            0 => None,
            n => Some(self.won as f64 / n as f64),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecommendationLedger {
    entries: BTreeMap<String, LedgerEntry>,
}

impl RecommendationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fixture_id: &str) -> Option<&LedgerEntry> {
        self.entries.get(fixture_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    /// Store this cycle's recommendation for a fixture.
    ///
    /// Rejects a fixture whose status went backwards since the last cycle.
    pub fn record(
        &mut self,
        fixture: &Fixture,
        recommendation: Recommendation,
    ) -> Result<LedgerUpdate, EngineError> {
        let now = Utc::now();
        let update = match self.entries.get_mut(&fixture.id) {
            Some(entry) if entry.frozen => {
                if entry.verdict == Verdict::Pending && fixture.score.is_some() {
                    entry.fixture.score = fixture.score;
                    entry.settle();
                    entry.updated_at = now;
                    debug!(fixture_id = %fixture.id, verdict = %entry.verdict, "Late score settled frozen entry");
                }
                LedgerUpdate::Ignored
            }
            Some(entry) => {
                let mut advanced = entry.fixture.clone();
                advanced.advance(fixture.status)?;
                advanced.score = fixture.score.or(advanced.score);
                entry.fixture = advanced;
                entry.recommendation = recommendation;
                entry.updated_at = now;
                LedgerUpdate::Updated
            }
            None => {
                self.entries.insert(
                    fixture.id.clone(),
                    LedgerEntry {
                        fixture: fixture.clone(),
                        recommendation,
                        verdict: Verdict::Pending,
                        alternative_verdict: None,
                        frozen: false,
                        updated_at: now,
                    },
                );
                LedgerUpdate::Inserted
            }
        };

        if update == LedgerUpdate::Ignored {
            return Ok(update);
        }
        match self.entries.get_mut(&fixture.id) {
            Some(entry) if entry.fixture.is_final() => {
                entry.frozen = true;
                entry.settle();
                info!(
                    fixture_id = %fixture.id,
                    pick = %entry.recommendation.pick,
                    verdict = %entry.verdict,
                    "Recommendation frozen"
                );
                Ok(LedgerUpdate::Frozen(entry.verdict))
            }
            _ => Ok(update),
        }
    }

    /// Re-run verification on frozen entries still pending.
    ///
    /// Returns the number of entries that settled.
    pub fn verify_final(&mut self) -> usize {
        let mut settled = 0;
        for entry in self.entries.values_mut().filter(|e| e.frozen && e.verdict == Verdict::Pending) {
            entry.settle();
            if entry.verdict != Verdict::Pending {
                settled += 1;
            }
        }
        settled
    }

    pub fn summary(&self) -> LedgerSummary {
        let mut summary = LedgerSummary::default();
        for entry in self.entries.values() {
            if !entry.frozen {
                summary.open += 1;
                continue;
            }
            match entry.verdict {
                Verdict::Won => summary.won += 1,
                Verdict::Lost => summary.lost += 1,
                Verdict::Pending => summary.pending += 1,
                Verdict::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    /// Load the ledger. A missing file yields an empty ledger.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!(path, "No ledger found, starting empty");
            return Ok(Self::new());
        }
        let ledger: Self = crate::storage::read_json(path)?;
        info!(path, entries = ledger.len(), "Ledger loaded");
        Ok(ledger)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        crate::storage::write_json(path, self)?;
        debug!(path, entries = self.len(), "Ledger saved");
        Ok(())
    }

    /// Load, falling back to an empty ledger on a corrupt file.
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(path, error = %e, "Ledger unreadable, starting empty");
                Self::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        FixtureStatus, MarketPick, Outcome, Pick, PickOrigin, Score, Sport, TotalDirection,
    };

    fn fixture(status: FixtureStatus, score: Option<Score>) -> Fixture {
        Fixture {
            id: "401".into(),
            sport: Sport::Soccer,
            league: "eng.1".into(),
            home_team: "Arsenal".into(),
            away_team: "Chelsea".into(),
            scheduled_at: Utc::now(),
            status,
            score,
        }
    }

    fn home_pick(confidence: f64) -> Recommendation {
        let mut rec = Recommendation::pass("401", PickOrigin::Statistical, "test");
        rec.pick = Pick::MatchResult { outcome: Outcome::Home };
        rec.confidence = confidence;
        rec.alternative = Some(MarketPick {
            pick: Pick::Total { line: 2.5, direction: TotalDirection::Over },
            probability: 0.7,
        });
        rec
    }

    #[test]
    fn test_overwritten_until_final() {
        let mut ledger = RecommendationLedger::new();
        let sched = fixture(FixtureStatus::Scheduled, None);
        assert_eq!(ledger.record(&sched, home_pick(70.0)).unwrap(), LedgerUpdate::Inserted);
        assert_eq!(ledger.record(&sched, home_pick(72.0)).unwrap(), LedgerUpdate::Updated);
        assert_eq!(ledger.get("401").unwrap().recommendation.confidence, 72.0);
        assert!(!ledger.get("401").unwrap().frozen);
    }

    #[test]
    fn test_frozen_on_final_and_verified() {
        let mut ledger = RecommendationLedger::new();
        ledger.record(&fixture(FixtureStatus::Live, Some(Score::new(1, 0))), home_pick(70.0)).unwrap();
        let update = ledger
            .record(&fixture(FixtureStatus::Final, Some(Score::new(2, 0))), home_pick(90.0))
            .unwrap();
        assert_eq!(update, LedgerUpdate::Frozen(Verdict::Won));
        let entry = ledger.get("401").unwrap();
        assert!(entry.frozen);
        assert_eq!(entry.alternative_verdict, Some(Verdict::Lost));

        // Later cycles cannot change a frozen pick.
        let mut other = home_pick(10.0);
        other.pick = Pick::Pass;
        let update = ledger.record(&fixture(FixtureStatus::Final, Some(Score::new(2, 0))), other).unwrap();
        assert_eq!(update, LedgerUpdate::Ignored);
        assert_eq!(ledger.get("401").unwrap().recommendation.confidence, 90.0);
    }

    #[test]
    fn test_first_seen_final_freezes_immediately() {
        let mut ledger = RecommendationLedger::new();
        let update = ledger
            .record(&fixture(FixtureStatus::Final, Some(Score::new(0, 1))), home_pick(70.0))
            .unwrap();
        assert_eq!(update, LedgerUpdate::Frozen(Verdict::Lost));
    }

    #[test]
    fn test_status_regression_rejected() {
        let mut ledger = RecommendationLedger::new();
        ledger.record(&fixture(FixtureStatus::Live, None), home_pick(70.0)).unwrap();
        let err = ledger.record(&fixture(FixtureStatus::Scheduled, None), home_pick(75.0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidStatusTransition { .. }));
        assert_eq!(ledger.get("401").unwrap().recommendation.confidence, 70.0);
    }

    #[test]
    fn test_late_score_settles_pending() {
        let mut ledger = RecommendationLedger::new();
        let update = ledger.record(&fixture(FixtureStatus::Final, None), home_pick(70.0)).unwrap();
        assert_eq!(update, LedgerUpdate::Frozen(Verdict::Pending));
        ledger.record(&fixture(FixtureStatus::Final, Some(Score::new(3, 1))), home_pick(70.0)).unwrap();
        assert_eq!(ledger.get("401").unwrap().verdict, Verdict::Won);
        assert_eq!(ledger.verify_final(), 0);
    }

    #[test]
    fn test_summary() {
        let mut ledger = RecommendationLedger::new();
        ledger.record(&fixture(FixtureStatus::Final, Some(Score::new(2, 0))), home_pick(70.0)).unwrap();
        let mut open = fixture(FixtureStatus::Scheduled, None);
        open.id = "402".into();
        ledger.record(&open, home_pick(70.0)).unwrap();
        let summary = ledger.summary();
        assert_eq!(summary.won, 1);
        assert_eq!(summary.open, 1);
        assert_eq!(summary.hit_rate(), Some(1.0));
    }

    #[test]
    fn test_save_and_load() {
        let mut path = std::env::temp_dir();
        path.push(format!("matchcast_ledger_{}.json", uuid::Uuid::new_v4()));
        let path = path.to_string_lossy().to_string();

        let mut ledger = RecommendationLedger::new();
        ledger.record(&fixture(FixtureStatus::Final, Some(Score::new(1, 1))), home_pick(70.0)).unwrap();
        ledger.save(&path).unwrap();

        let loaded = RecommendationLedger::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("401").unwrap().verdict, Verdict::Lost);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_is_empty() {
        assert!(RecommendationLedger::load("/tmp/matchcast_no_ledger.json").unwrap().is_empty());
    }
}
