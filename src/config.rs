//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section falls back to defaults, so a partial file (or none, in tests)
//! still yields a working engine configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::model::expected::ModelConfig;
use crate::model::simulator::SimulationConfig;
use crate::strategy::kelly::StakingConfig;
use crate::strategy::signals::SignalConfig;
use crate::types::{EngineError, LeagueWeights, Sport};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub signals: SignalConfig,
    #[serde(default)]
    pub staking: StakingConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default = "default_leagues")]
    pub leagues: Vec<LeagueSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            model: ModelConfig::default(),
            simulation: SimulationConfig::default(),
            signals: SignalConfig::default(),
            staking: StakingConfig::default(),
            paths: PathsConfig::default(),
            leagues: default_leagues(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub name: String,
    pub refresh_interval_secs: u64,
    /// Number of days after today to fetch (today is always included).
    pub days_ahead: u32,
    /// Per-request timeout for provider calls.
    pub request_timeout_secs: u64,
    /// Fixed RNG seed for reproducible cycles. Random per cycle when unset.
    pub seed: Option<u64>,
    /// Query the secondary deep-stats provider.
    pub deep_stats_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "MATCHCAST-001".to_string(),
            refresh_interval_secs: 900,
            days_ahead: 4,
            request_timeout_secs: 5,
            seed: None,
            deep_stats_enabled: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// Per-league confidence modifiers (JSON), produced offline.
    pub league_weights: String,
    /// Frozen auxiliary classifier artifact (JSON).
    pub classifier: String,
    /// Team-name → external-id cache.
    pub identity_cache: String,
    /// Recommendation ledger.
    pub ledger: String,
    /// Latest cycle output.
    pub forecasts: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            league_weights: "model_weights.json".to_string(),
            classifier: "classifier.json".to_string(),
            identity_cache: "team_ids.json".to_string(),
            ledger: "ledger.json".to_string(),
            forecasts: "forecasts.json".to_string(),
        }
    }
}

/// One league processed per refresh cycle.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LeagueSpec {
    /// Provider league code, e.g. `eng.1`.
    pub code: String,
    pub name: String,
    pub sport: Sport,
    /// League scoring baseline: total goals (soccer) or total points (basketball).
    pub baseline: f64,
    /// Home advantage in goals or points.
    pub home_advantage: f64,
}

impl LeagueSpec {
    pub fn new(code: &str, name: &str, sport: Sport, baseline: f64, home_advantage: f64) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            sport,
            baseline,
            home_advantage,
        }
    }

    /// Fallback parameters for a league missing from the table.
    pub fn fallback(code: &str, sport: Sport) -> Self {
        match sport {
            Sport::Soccer => Self::new(code, code, sport, 2.7, 0.35),
            Sport::Basketball => Self::new(code, code, sport, 220.0, 3.0),
        }
    }
}

fn default_leagues() -> Vec<LeagueSpec> {
    vec![
        LeagueSpec::new("eng.1", "Premier League", Sport::Soccer, 2.9, 0.35),
        LeagueSpec::new("esp.1", "La Liga", Sport::Soccer, 2.5, 0.30),
        LeagueSpec::new("ita.1", "Serie A", Sport::Soccer, 2.6, 0.32),
        LeagueSpec::new("ger.1", "Bundesliga", Sport::Soccer, 3.2, 0.38),
        LeagueSpec::new("fra.1", "Ligue 1", Sport::Soccer, 2.7, 0.35),
        LeagueSpec::new("tur.1", "Super Lig", Sport::Soccer, 2.8, 0.45),
        LeagueSpec::new("uefa.champions", "Champions League", Sport::Soccer, 3.0, 0.25),
        LeagueSpec::new("uefa.europa", "Europa League", Sport::Soccer, 2.9, 0.30),
        LeagueSpec::new("nba", "NBA", Sport::Basketball, 230.0, 3.5),
    ]
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the refresh loop cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.engine.refresh_interval_secs == 0 {
            return Err(EngineError::Config(
                "engine.refresh_interval_secs must be at least 1".into(),
            ));
        }
        if let Some(league) = self.leagues.iter().find(|l| !l.baseline.is_finite() || l.baseline <= 0.0) {
            return Err(EngineError::Config(format!(
                "league {} needs a positive baseline",
                league.code
            )));
        }
        Ok(())
    }

    /// Parameters for a league code, falling back to sport defaults.
    pub fn league(&self, code: &str, sport: Sport) -> LeagueSpec {
        self.leagues
            .iter()
            .find(|l| l.code == code)
            .cloned()
            .unwrap_or_else(|| LeagueSpec::fallback(code, sport))
    }
}

/// Load the per-league weight table for one cycle.
///
/// A missing or unreadable table yields empty weights: the modifiers are
/// an optional refinement and never block a cycle.
pub fn load_league_weights(path: &str) -> LeagueWeights {
    if !Path::new(path).exists() {
        debug!(path, "No league weight table, using neutral modifiers");
        return LeagueWeights::default();
    }
    let parsed = fs::read_to_string(path)
        .context("read")
        .and_then(|json| serde_json::from_str::<LeagueWeights>(&json).context("parse"));
    match parsed {
        Ok(weights) => {
            info!(path, leagues = weights.len(), "League weights loaded");
            weights
        }
        Err(e) => {
            warn!(path, error = %e, "League weight table unusable, using neutral modifiers");
            LeagueWeights::default()
        }
    }
}
