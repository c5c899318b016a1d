//! ESPN public site API: primary fixture provider and standings provider.
//!
//! Scoreboard: `{BASE}/{sport}/{league}/scoreboard?dates=YYYYMMDD`
//! Standings:  `{STANDINGS}/{sport}/{league}/standings`
//! Auth: none. Moneyline prices arrive in American format.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{FixtureProvider, FixtureSnapshot, StandingsProvider};
use crate::config::LeagueSpec;
use crate::types::{
    Fixture, FixtureStatus, PriceQuote, ProviderObservation, Score, Sport, StandingsRow,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://site.api.espn.com/apis/site/v2/sports";
const STANDINGS_URL: &str = "https://site.api.espn.com/apis/v2/sports";
pub const PROVIDER_NAME: &str = "espn";

/// Fusion weight of ESPN observations.
const PROVIDER_WEIGHT: f64 = 1.0;

// ---------------------------------------------------------------------------
// API response types (ESPN JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ScoreboardResponse {
    #[serde(default)]
    events: Vec<EspnEvent>,
}

#[derive(Debug, Deserialize)]
struct EspnEvent {
    id: String,
    /// ISO timestamp, usually without seconds (`2024-03-02T15:00Z`).
    #[serde(default)]
    date: String,
    #[serde(default)]
    status: Option<EspnStatus>,
    #[serde(default)]
    competitions: Vec<EspnCompetition>,
}

#[derive(Debug, Deserialize)]
struct EspnStatus {
    #[serde(rename = "type")]
    kind: EspnStatusType,
}

#[derive(Debug, Deserialize)]
struct EspnStatusType {
    /// "pre", "in" or "post".
    #[serde(default)]
    state: String,
    #[serde(default)]
    completed: bool,
}

#[derive(Debug, Deserialize)]
struct EspnCompetition {
    #[serde(default)]
    competitors: Vec<EspnCompetitor>,
    #[serde(default)]
    odds: Vec<EspnOdds>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnCompetitor {
    /// "home" or "away".
    #[serde(default)]
    home_away: String,
    team: EspnTeam,
    /// A string on the scoreboard, occasionally a number.
    #[serde(default)]
    score: Option<serde_json::Value>,
    #[serde(default)]
    records: Vec<EspnRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnTeam {
    #[serde(default)]
    name: String,
    #[serde(default)]
    display_name: String,
}

impl EspnTeam {
    fn label(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.display_name
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Deserialize)]
struct EspnRecord {
    #[serde(default)]
    summary: String,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct EspnOdds {
    #[serde(default)]
    moneyline: Option<EspnMoneyline>,
}

#[derive(Debug, Deserialize)]
struct EspnMoneyline {
    #[serde(default)]
    home: Option<EspnMoneylineSide>,
    #[serde(default)]
    draw: Option<EspnMoneylineSide>,
    #[serde(default)]
    away: Option<EspnMoneylineSide>,
}

#[derive(Debug, Deserialize)]
struct EspnMoneylineSide {
    #[serde(default)]
    open: Option<EspnOddsValue>,
    #[serde(default)]
    current: Option<EspnOddsValue>,
    #[serde(default)]
    close: Option<EspnOddsValue>,
}

#[derive(Debug, Deserialize)]
struct EspnOddsValue {
    #[serde(default)]
    odds: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StandingsResponse {
    #[serde(default)]
    children: Vec<StandingsGroup>,
    #[serde(default)]
    standings: Option<StandingsTable>,
}

#[derive(Debug, Deserialize)]
struct StandingsGroup {
    #[serde(default)]
    standings: Option<StandingsTable>,
}

#[derive(Debug, Deserialize)]
struct StandingsTable {
    #[serde(default)]
    entries: Vec<StandingsEntry>,
}

#[derive(Debug, Deserialize)]
struct StandingsEntry {
    team: EspnTeam,
    #[serde(default)]
    stats: Vec<StandingsStat>,
}

#[derive(Debug, Deserialize)]
struct StandingsStat {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: Option<f64>,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// American moneyline to decimal price, rounded to two places.
///
/// `+150` → 2.50, `-200` → 1.50, `EVEN` → 2.00. Zero and garbage yield `None`.
pub fn american_to_decimal(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("even") || raw.eq_ignore_ascii_case("ev") {
        return Some(2.0);
    }
    let value: f64 = raw.trim_start_matches('+').parse().ok()?;
    if !value.is_finite() || value == 0.0 {
        return None;
    }
    let decimal = if value > 0.0 {
        1.0 + value / 100.0
    } else {
        1.0 + 100.0 / value.abs()
    };
    Some((decimal * 100.0).round() / 100.0)
}

fn json_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn odds_value(value: &Option<EspnOddsValue>) -> Option<f64> {
    value
        .as_ref()
        .and_then(|v| v.odds.as_ref())
        .and_then(json_text)
        .and_then(|s| american_to_decimal(&s))
}

fn quote(side: &Option<EspnMoneylineSide>) -> PriceQuote {
    match side {
        Some(s) => PriceQuote::new(odds_value(&s.open), odds_value(&s.current).or(odds_value(&s.close))),
        None => PriceQuote::default(),
    }
}

fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_status(status: &Option<EspnStatus>) -> FixtureStatus {
    match status {
        Some(s) if s.kind.completed || s.kind.state == "post" => FixtureStatus::Final,
        Some(s) if s.kind.state == "in" => FixtureStatus::Live,
        _ => FixtureStatus::Scheduled,
    }
}

fn parse_score(competitor: &EspnCompetitor) -> Option<u32> {
    competitor
        .score
        .as_ref()
        .and_then(json_text)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u32)
}

fn overall_record(competitor: &EspnCompetitor) -> Option<String> {
    competitor
        .records
        .iter()
        .find(|r| r.kind == "total")
        .or_else(|| competitor.records.first())
        .map(|r| r.summary.clone())
        .filter(|s| !s.trim().is_empty())
}

/// Parse a scoreboard body into fixtures with their ESPN observations.
///
/// Events without both a home and an away competitor are skipped.
pub fn parse_scoreboard(body: &str, league: &LeagueSpec) -> Result<Vec<FixtureSnapshot>> {
    let response: ScoreboardResponse =
        serde_json::from_str(body).context("Failed to parse ESPN scoreboard response")?;

    let mut snapshots = Vec::with_capacity(response.events.len());
    for event in response.events {
        let Some(competition) = event.competitions.first() else {
            debug!(event_id = %event.id, "ESPN event without competition, skipping");
            continue;
        };
        let home = competition.competitors.iter().find(|c| c.home_away == "home");
        let away = competition.competitors.iter().find(|c| c.home_away == "away");
        let (Some(home), Some(away)) = (home, away) else {
            debug!(event_id = %event.id, "ESPN event missing a side, skipping");
            continue;
        };

        let status = parse_status(&event.status);
        let score = match (status, parse_score(home), parse_score(away)) {
            (FixtureStatus::Scheduled, _, _) => None,
            (_, Some(h), Some(a)) => Some(Score::new(h, a)),
            _ => None,
        };
        let scheduled_at = parse_event_date(&event.date).unwrap_or_else(|| {
            warn!(event_id = %event.id, date = %event.date, "Unparseable ESPN date");
            Utc::now()
        });

        let mut observation = ProviderObservation::new(PROVIDER_NAME, PROVIDER_WEIGHT);
        observation.home_record = overall_record(home);
        observation.away_record = overall_record(away);
        if let Some(moneyline) = competition.odds.first().and_then(|o| o.moneyline.as_ref()) {
            observation.home_price = quote(&moneyline.home);
            observation.draw_price = quote(&moneyline.draw);
            observation.away_price = quote(&moneyline.away);
        }

        snapshots.push(FixtureSnapshot {
            fixture: Fixture {
                id: event.id,
                sport: league.sport,
                league: league.code.clone(),
                home_team: home.team.label().to_string(),
                away_team: away.team.label().to_string(),
                scheduled_at,
                status,
                score,
            },
            observation,
        });
    }
    Ok(snapshots)
}

/// Parse a standings body into rows. Conference tables are concatenated.
pub fn parse_standings(body: &str) -> Result<Vec<StandingsRow>> {
    let response: StandingsResponse =
        serde_json::from_str(body).context("Failed to parse ESPN standings response")?;

    let tables = response
        .children
        .into_iter()
        .filter_map(|g| g.standings)
        .chain(response.standings);

    let mut rows = Vec::new();
    for table in tables {
        for entry in table.entries {
            let stat = |name: &str| {
                entry
                    .stats
                    .iter()
                    .find(|s| s.name == name)
                    .and_then(|s| s.value)
                    .filter(|v| v.is_finite() && *v >= 0.0)
            };
            let won = stat("wins").unwrap_or(0.0) as u32;
            let drawn = stat("ties").unwrap_or(0.0) as u32;
            let lost = stat("losses").unwrap_or(0.0) as u32;
            let played = stat("gamesPlayed")
                .map(|v| v as u32)
                .unwrap_or(won + drawn + lost);
            rows.push(StandingsRow {
                team: entry.team.label().to_string(),
                played,
                won,
                drawn,
                lost,
                scored: stat("pointsFor"),
                conceded: stat("pointsAgainst"),
            });
        }
    }
    Ok(rows)
}

fn sport_path(sport: Sport) -> &'static str {
    match sport {
        Sport::Soccer => "soccer",
        Sport::Basketball => "basketball",
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// ESPN site API client.
pub struct EspnClient {
    http: Client,
    base_url: String,
    standings_url: String,
}

impl EspnClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("MATCHCAST/0.1.0 (fixture-forecaster)")
            .build()
            .context("Failed to build HTTP client for ESPN")?;

        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            standings_url: STANDINGS_URL.to_string(),
        })
    }

    /// Point both endpoints at another host (used for local mirrors).
    pub fn with_base_urls(mut self, base_url: &str, standings_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self.standings_url = standings_url.trim_end_matches('/').to_string();
        self
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("ESPN API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("ESPN API error {status}: {body}");
        }

        resp.text().await.context("Failed to read ESPN response body")
    }
}

#[async_trait]
impl FixtureProvider for EspnClient {
    async fn fixtures(&self, league: &LeagueSpec, date: NaiveDate) -> Result<Vec<FixtureSnapshot>> {
        let url = format!(
            "{}/{}/{}/scoreboard?dates={}",
            self.base_url,
            sport_path(league.sport),
            league.code,
            date.format("%Y%m%d")
        );
        let body = self.get_text(&url).await?;
        let snapshots = parse_scoreboard(&body, league)?;
        debug!(league = %league.code, %date, count = snapshots.len(), "ESPN fixtures fetched");
        Ok(snapshots)
    }
}

#[async_trait]
impl StandingsProvider for EspnClient {
    async fn standings(&self, league: &LeagueSpec) -> Result<Vec<StandingsRow>> {
        let url = format!(
            "{}/{}/{}/standings",
            self.standings_url,
            sport_path(league.sport),
            league.code
        );
        let body = self.get_text(&url).await?;
        let rows = parse_standings(&body)?;
        debug!(league = %league.code, rows = rows.len(), "ESPN standings fetched");
        Ok(rows)
    }
}
