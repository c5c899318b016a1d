//! Shared types for the MATCHCAST engine.
//!
//! These types form the data model used across all modules. Fixtures and
//! ratings are rebuilt every refresh cycle; recommendations are rebuilt
//! every cycle until their fixture is final.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Supported sports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Soccer,
    Basketball,
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sport::Soccer => write!(f, "soccer"),
            Sport::Basketball => write!(f, "basketball"),
        }
    }
}

impl std::str::FromStr for Sport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "soccer" | "football" => Ok(Sport::Soccer),
            "basketball" => Ok(Sport::Basketball),
            _ => Err(anyhow::anyhow!("Unknown sport: {s}")),
        }
    }
}

/// Fixture lifecycle. Ordered so that transitions can only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FixtureStatus {
    Scheduled,
    Live,
    Final,
}

impl fmt::Display for FixtureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureStatus::Scheduled => write!(f, "Scheduled"),
            FixtureStatus::Live => write!(f, "Live"),
            FixtureStatus::Final => write!(f, "Final"),
        }
    }
}

/// One side of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Home => write!(f, "HOME"),
            Side::Away => write!(f, "AWAY"),
        }
    }
}

/// Full-time match result direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl From<Side> for Outcome {
    fn from(side: Side) -> Self {
        match side {
            Side::Home => Outcome::Home,
            Side::Away => Outcome::Away,
        }
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// Running or final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    pub fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }

    pub fn total(&self) -> u32 {
        self.home + self.away
    }

    pub fn outcome(&self) -> Outcome {
        match self.home.cmp(&self.away) {
            std::cmp::Ordering::Greater => Outcome::Home,
            std::cmp::Ordering::Less => Outcome::Away,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    /// Whether this score is a win for the given side.
    pub fn is_win_for(&self, side: Side) -> bool {
        self.outcome() == Outcome::from(side)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

/// One scheduled or completed match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: String,
    pub sport: Sport,
    /// League code, e.g. `eng.1` or `nba`.
    pub league: String,
    /// Team names exactly as the primary provider spells them.
    pub home_team: String,
    pub away_team: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: FixtureStatus,
    pub score: Option<Score>,
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} vs {} ({}",
            self.league, self.home_team, self.away_team, self.status
        )?;
        if let Some(score) = self.score {
            write!(f, " {score}")?;
        }
        write!(f, ")")
    }
}

impl Fixture {
    /// Move the fixture forward in its lifecycle. Regressions are rejected.
    pub fn advance(&mut self, next: FixtureStatus) -> Result<(), EngineError> {
        if next < self.status {
            return Err(EngineError::InvalidStatusTransition {
                fixture_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn is_final(&self) -> bool {
        self.status == FixtureStatus::Final
    }

    pub fn is_live(&self) -> bool {
        self.status == FixtureStatus::Live
    }
}

// ---------------------------------------------------------------------------
// Records & ratings
// ---------------------------------------------------------------------------

/// Win rate assumed when a team's record is missing or unparseable.
pub const DEFAULT_WIN_RATE: f64 = 0.40;

/// Season record parsed from a provider summary string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeamRecord {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl TeamRecord {
    /// Parse `"W-D-L"` (soccer) or `"W-L"` (basketball).
    pub fn parse(summary: &str) -> Option<Self> {
        let parts: Vec<u32> = summary
            .trim()
            .split('-')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [w, d, l] => Some(Self { wins: *w, draws: *d, losses: *l }),
            [w, l] => Some(Self { wins: *w, draws: 0, losses: *l }),
            _ => None,
        }
    }

    pub fn played(&self) -> u32 {
        self.wins + self.draws + self.losses
    }

    /// Share of games won. `None` when no games have been played.
    pub fn win_rate(&self) -> Option<f64> {
        match self.played() {
            0 => None,
            n => Some(self.wins as f64 / n as f64),
        }
    }
}

/// One row of a league table as delivered by the standings provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsRow {
    pub team: String,
    pub played: u32,
    pub won: u32,
    pub drawn: u32,
    pub lost: u32,
    /// Goals (soccer) or points (basketball) scored. `None` when the
    /// provider left the field out.
    pub scored: Option<f64>,
    /// Goals or points conceded.
    pub conceded: Option<f64>,
}


/// Lower clamp for offensive/defensive indices.
pub const RATING_MIN: f64 = 0.6;
/// Upper clamp for offensive/defensive indices.
pub const RATING_MAX: f64 = 1.6;
/// Index assigned when a team has too few games or no data.
pub const NEUTRAL_RATING: f64 = 1.0;

/// Per-team strength derived from the league table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRating {
    /// Normalized team name.
    pub team: String,
    pub league: String,
    pub played: u32,
    pub scored: f64,
    pub conceded: f64,
    /// Scoring rate relative to the league average, in `[0.6, 1.6]`.
    pub offensive: f64,
    /// Conceding rate relative to the league average, in `[0.6, 1.6]`.
    pub defensive: f64,
    /// The standings row lacked scoring totals; the indices are neutral defaults.
    #[serde(default)]
    pub incomplete: bool,
}

impl TeamRating {
    pub fn neutral(team: &str, league: &str) -> Self {
        Self {
            team: team.to_string(),
            league: league.to_string(),
            played: 0,
            scored: 0.0,
            conceded: 0.0,
            offensive: NEUTRAL_RATING,
            defensive: NEUTRAL_RATING,
            incomplete: false,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.offensive == NEUTRAL_RATING && self.defensive == NEUTRAL_RATING
    }
}

impl fmt::Display for TeamRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] off={:.2} def={:.2} (gp={})",
            self.team, self.league, self.offensive, self.defensive, self.played
        )
    }
}

// ---------------------------------------------------------------------------
// Provider observations
// ---------------------------------------------------------------------------

/// Opening and current decimal price for one side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceQuote {
    pub open: Option<f64>,
    pub current: Option<f64>,
}

impl PriceQuote {
    pub fn new(open: Option<f64>, current: Option<f64>) -> Self {
        Self { open, current }
    }

    /// Current price if it is a usable decimal price (> 1.0).
    pub fn usable_current(&self) -> Option<f64> {
        self.current.filter(|p| p.is_finite() && *p > 1.0)
    }

    /// Opening price if it is a usable decimal price (> 1.0).
    pub fn usable_open(&self) -> Option<f64> {
        self.open.filter(|p| p.is_finite() && *p > 1.0)
    }
}

/// Cross-market consensus decimal prices from an independent source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsensusPrices {
    pub home: Option<f64>,
    pub draw: Option<f64>,
    pub away: Option<f64>,
}

impl ConsensusPrices {
    pub fn for_side(&self, side: Side) -> Option<f64> {
        match side {
            Side::Home => self.home,
            Side::Away => self.away,
        }
    }
}

/// Expected-goal estimate for both sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedGoals {
    pub home: f64,
    pub away: f64,
}

/// Per-fixture data delivered by one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderObservation {
    /// Source name, e.g. `espn` or `sofascore`.
    pub source: String,
    /// Relative fusion weight of this source.
    pub weight: f64,
    pub home_record: Option<String>,
    pub away_record: Option<String>,
    pub home_price: PriceQuote,
    pub draw_price: PriceQuote,
    pub away_price: PriceQuote,
    pub momentum: Option<String>,
    pub expected_goals: Option<ExpectedGoals>,
    pub consensus: Option<ConsensusPrices>,
}

impl ProviderObservation {
    pub fn new(source: &str, weight: f64) -> Self {
        Self {
            source: source.to_string(),
            weight,
            ..Default::default()
        }
    }

    pub fn price(&self, side: Side) -> &PriceQuote {
        match side {
            Side::Home => &self.home_price,
            Side::Away => &self.away_price,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation output
// ---------------------------------------------------------------------------

/// Probability that the total goes over a fixed line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProbability {
    pub line: f64,
    pub over: f64,
}

impl ThresholdProbability {
    pub fn under(&self) -> f64 {
        1.0 - self.over
    }
}

/// How often a scoreline came up in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorelineFrequency {
    pub score: Score,
    pub count: u32,
}

/// Outcome distribution produced by the Monte Carlo simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub trials: u32,
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
    /// Over probabilities at fixed total lines, ascending by line.
    pub thresholds: Vec<ThresholdProbability>,
    /// Both-teams-scored probability (soccer only).
    pub btts: Option<f64>,
    /// Candidate scorelines ranked by frequency (soccer only).
    pub scorelines: Vec<ScorelineFrequency>,
    /// Tie-broken modal scoreline (soccer only).
    pub modal: Option<Score>,
    pub expected_home: f64,
    pub expected_away: f64,
}

impl SimulationResult {
    pub fn win_probability(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.home_win,
            Side::Away => self.away_win,
        }
    }

    /// The side with the higher simulated win probability (home on ties).
    pub fn favourite(&self) -> (Side, f64) {
        if self.away_win > self.home_win {
            (Side::Away, self.away_win)
        } else {
            (Side::Home, self.home_win)
        }
    }

    /// Over probability at `line`, if that line was simulated.
    pub fn over(&self, line: f64) -> Option<f64> {
        self.thresholds
            .iter()
            .find(|t| (t.line - line).abs() < 1e-9)
            .map(|t| t.over)
    }
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "H {:.1}% | D {:.1}% | A {:.1}% ({} trials)",
            self.home_win * 100.0,
            self.draw * 100.0,
            self.away_win * 100.0,
            self.trials
        )?;
        if let Some(modal) = self.modal {
            write!(f, " modal={modal}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Picks & recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TotalDirection {
    Over,
    Under,
}

/// Structured pick. Verification reads this value, never the rationale text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "market", rename_all = "snake_case")]
pub enum Pick {
    /// No actionable recommendation.
    Pass,
    MatchResult { outcome: Outcome },
    Total { line: f64, direction: TotalDirection },
    BothTeamsScore { yes: bool },
}

impl Pick {
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Pick::Pass)
    }
}

impl fmt::Display for Pick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pick::Pass => write!(f, "PASS"),
            Pick::MatchResult { outcome: Outcome::Home } => write!(f, "HOME WIN"),
            Pick::MatchResult { outcome: Outcome::Draw } => write!(f, "DRAW"),
            Pick::MatchResult { outcome: Outcome::Away } => write!(f, "AWAY WIN"),
            Pick::Total { line, direction: TotalDirection::Over } => write!(f, "OVER {line}"),
            Pick::Total { line, direction: TotalDirection::Under } => write!(f, "UNDER {line}"),
            Pick::BothTeamsScore { yes: true } => write!(f, "BTTS YES"),
            Pick::BothTeamsScore { yes: false } => write!(f, "BTTS NO"),
        }
    }
}

/// A pick together with the simulated probability backing it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketPick {
    pub pick: Pick,
    /// Probability in `[0, 1]`; 0.5 for the neutral "no strong signal" pick.
    pub probability: f64,
}

/// Where the primary pick came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickOrigin {
    Statistical,
    MarketSignal,
    NoData,
}

/// Discrete confidence label. Purely presentational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceTier {
    Standard,
    High,
    Maximum,
}

impl ConfidenceTier {
    /// Tier for a confidence on the 0–100 scale; `None` below 65.
    pub fn from_confidence(confidence: f64) -> Option<Self> {
        if confidence >= 85.0 {
            Some(ConfidenceTier::Maximum)
        } else if confidence >= 75.0 {
            Some(ConfidenceTier::High)
        } else if confidence >= 65.0 {
            Some(ConfidenceTier::Standard)
        } else {
            None
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceTier::Standard => write!(f, "STANDARD"),
            ConfidenceTier::High => write!(f, "HIGH"),
            ConfidenceTier::Maximum => write!(f, "MAXIMUM"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    /// Current price dropped from the opening price at the primary provider.
    Drop,
    /// Primary provider lags an independent consensus price.
    Lag,
}

/// Significant price movement for one side of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketSignal {
    pub kind: SignalKind,
    pub side: Side,
    /// Movement in percent.
    pub pct: f64,
    /// Opening price (drop) or primary current price (lag).
    pub reference: f64,
    /// Current price (drop) or consensus price (lag).
    pub current: f64,
}

impl fmt::Display for MarketSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            SignalKind::Drop => "PRICE DROP",
            SignalKind::Lag => "MARKET LAG",
        };
        write!(
            f,
            "{label} {}: {:.2} -> {:.2} ({:.1}%)",
            self.side, self.reference, self.current, self.pct
        )
    }
}

/// Per-fixture output of the recommendation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub fixture_id: String,
    pub pick: Pick,
    pub origin: PickOrigin,
    /// Confidence on the 0–100 scale.
    pub confidence: f64,
    pub tier: Option<ConfidenceTier>,
    /// Stake as a percentage of bankroll.
    pub stake_pct: f64,
    /// Model probability minus price-implied probability.
    pub edge: Option<f64>,
    /// Decimal price the stake was sized against.
    pub price: Option<f64>,
    pub rationale: String,
    pub market_signal: Option<MarketSignal>,
    /// Best goals/points market from the simulation.
    pub alternative: Option<MarketPick>,
    /// Set when the fixture was processed with neutral defaults.
    pub low_confidence: bool,
}

impl Recommendation {
    /// A neutral record with no actionable pick.
    pub fn pass(fixture_id: &str, origin: PickOrigin, rationale: impl Into<String>) -> Self {
        Self {
            fixture_id: fixture_id.to_string(),
            pick: Pick::Pass,
            origin,
            confidence: 0.0,
            tier: None,
            stake_pct: 0.0,
            edge: None,
            price: None,
            rationale: rationale.into(),
            market_signal: None,
            alternative: None,
            low_confidence: true,
        }
    }

    pub fn has_market_signal(&self) -> bool {
        self.market_signal.is_some()
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} conf={:.0}", self.pick, self.confidence)?;
        if let Some(tier) = self.tier {
            write!(f, " [{tier}]")?;
        }
        if self.stake_pct > 0.0 {
            write!(f, " stake={:.2}%", self.stake_pct)?;
        }
        if let Some(edge) = self.edge {
            write!(f, " edge={:+.1}%", edge * 100.0)?;
        }
        if let Some(signal) = &self.market_signal {
            write!(f, " | {signal}")?;
        }
        Ok(())
    }
}

/// Verification state of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Verdict {
    #[default]
    Pending,
    Won,
    Lost,
    Skipped,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pending => write!(f, "pending"),
            Verdict::Won => write!(f, "won"),
            Verdict::Lost => write!(f, "lost"),
            Verdict::Skipped => write!(f, "skipped"),
        }
    }
}

// ---------------------------------------------------------------------------
// League weights
// ---------------------------------------------------------------------------

/// Largest absolute confidence modifier honoured from the weight table.
pub const MAX_LEAGUE_MODIFIER: f64 = 30.0;

/// Additive confidence modifier for one league.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LeagueWeight {
    #[serde(default)]
    pub confidence_modifier: f64,
}

/// Externally learned per-league weights, read-only for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeagueWeights {
    weights: HashMap<String, LeagueWeight>,
}

impl LeagueWeights {
    pub fn new(weights: HashMap<String, LeagueWeight>) -> Self {
        Self { weights }
    }

    /// Bounded modifier for a league; 0 when the league is unknown.
    pub fn modifier(&self, league: &str) -> f64 {
        self.weights
            .get(league)
            .map(|w| w.confidence_modifier)
            .filter(|m| m.is_finite())
            .map(|m| m.clamp(-MAX_LEAGUE_MODIFIER, MAX_LEAGUE_MODIFIER))
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain errors. None of these escape a single fixture's processing:
/// the pipeline attaches them to the fixture's record instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum EngineError {
    #[error("Provider unavailable ({provider}): {message}")]
    ProviderUnavailable { provider: String, message: String },

    #[error("Data incomplete: {0}")]
    DataIncomplete(String),

    #[error("Identity unresolved: {0}")]
    IdentityUnresolved(String),

    #[error("Degenerate simulation input ({side}): {value}")]
    SimulationDegenerate { side: Side, value: f64 },

    #[error("Invalid status transition for {fixture_id}: {from} -> {to}")]
    InvalidStatusTransition {
        fixture_id: String,
        from: FixtureStatus,
        to: FixtureStatus,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
