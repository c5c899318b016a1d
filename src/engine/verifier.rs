//! Outcome verification.
//!
//! Labels a structured pick against a final score. Anything that cannot be
//! settled with certainty (not final, no score, a push, a malformed line)
//! stays `Pending`: an unknown verdict is preferred to a wrong one.

use crate::types::{Fixture, Pick, Score, TotalDirection, Verdict};

/// Settle `pick` against the fixture's final score.
pub fn verify(pick: &Pick, fixture: &Fixture) -> Verdict {
    if !fixture.is_final() {
        return Verdict::Pending;
    }
    if !pick.is_actionable() {
        return Verdict::Skipped;
    }
    match fixture.score {
        Some(score) => settle(pick, score),
        None => Verdict::Pending,
    }
}

fn settle(pick: &Pick, score: Score) -> Verdict {
    match *pick {
        Pick::Pass => Verdict::Skipped,
        Pick::MatchResult { outcome } => won_if(score.outcome() == outcome),
        Pick::Total { line, direction } => {
            if !line.is_finite() || line < 0.0 {
                return Verdict::Pending;
            }
            let total = score.total() as f64;
            if total == line {
                return Verdict::Pending;
            }
            match direction {
                TotalDirection::Over => won_if(total > line),
                TotalDirection::Under => won_if(total < line),
            }
        }
        Pick::BothTeamsScore { yes } => won_if((score.home > 0 && score.away > 0) == yes),
    }
}

fn won_if(condition: bool) -> Verdict {
    if condition {
        Verdict::Won
    } else {
        Verdict::Lost
    }
}
