//! SofaScore deep-stats provider.
//!
//! Supplies expected goals, a momentum reading and consensus 1X2 prices.
//! Base URL: https://api.sofascore.com/api/v1
//! Auth: none, but requests without a browser Referer are often refused.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{DeepStatsEvent, DeepStatsProvider};
use crate::types::{ConsensusPrices, ExpectedGoals, ProviderObservation, Sport};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://api.sofascore.com/api/v1";
const REFERER: &str = "https://www.sofascore.com/";
pub const PROVIDER_NAME: &str = "sofascore";

/// Fusion weight of SofaScore observations.
const PROVIDER_WEIGHT: f64 = 0.5;

/// Graph points averaged for the momentum reading.
const MOMENTUM_WINDOW: usize = 10;

/// Mean graph value beyond which one side is called dominant.
const MOMENTUM_THRESHOLD: f64 = 20.0;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ScheduledEventsResponse {
    #[serde(default)]
    events: Vec<SofaEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SofaEvent {
    id: u64,
    home_team: SofaTeam,
    away_team: SofaTeam,
}

#[derive(Debug, Deserialize)]
struct SofaTeam {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct OddsResponse {
    #[serde(default)]
    markets: Vec<SofaMarket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SofaMarket {
    #[serde(default)]
    market_name: String,
    #[serde(default)]
    choice_group: Option<String>,
    #[serde(default)]
    choices: Vec<SofaChoice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SofaChoice {
    #[serde(default)]
    name: String,
    #[serde(default)]
    fractional_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatisticsResponse {
    #[serde(default)]
    statistics: Vec<StatisticsPeriod>,
}

#[derive(Debug, Deserialize)]
struct StatisticsPeriod {
    #[serde(default)]
    period: String,
    #[serde(default)]
    groups: Vec<StatisticsGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatisticsGroup {
    #[serde(default)]
    statistics_items: Vec<StatisticsItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatisticsItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    home_value: Option<f64>,
    #[serde(default)]
    away_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphResponse {
    #[serde(default)]
    graph_points: Vec<GraphPoint>,
}

#[derive(Debug, Deserialize)]
struct GraphPoint {
    #[serde(default)]
    value: f64,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Fractional price to decimal: `15/4` → 4.75. A bare number is taken as decimal.
pub fn fractional_to_decimal(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let decimal = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den + 1.0
        }
        None => raw.parse().ok()?,
    };
    (decimal.is_finite() && decimal > 1.0).then(|| (decimal * 100.0).round() / 100.0)
}

/// Extract consensus 1X2 prices from the "Full time" market.
pub fn parse_full_time_odds(body: &str) -> Result<Option<ConsensusPrices>> {
    let response: OddsResponse =
        serde_json::from_str(body).context("Failed to parse SofaScore odds response")?;

    let Some(market) = response
        .markets
        .iter()
        .find(|m| m.market_name == "Full time" && m.choice_group.is_none())
    else {
        return Ok(None);
    };

    let price = |label: &str| {
        market
            .choices
            .iter()
            .find(|c| c.name == label)
            .and_then(|c| c.fractional_value.as_deref())
            .and_then(fractional_to_decimal)
    };
    let prices = ConsensusPrices {
        home: price("1"),
        draw: price("X"),
        away: price("2"),
    };
    if prices.home.is_none() && prices.away.is_none() {
        return Ok(None);
    }
    Ok(Some(prices))
}

/// Whole-match expected goals, if reported.
pub fn parse_expected_goals(body: &str) -> Result<Option<ExpectedGoals>> {
    let response: StatisticsResponse =
        serde_json::from_str(body).context("Failed to parse SofaScore statistics response")?;

    let xg = response
        .statistics
        .iter()
        .filter(|p| p.period == "ALL")
        .flat_map(|p| p.groups.iter())
        .flat_map(|g| g.statistics_items.iter())
        .find(|item| item.name == "Expected goals")
        .and_then(|item| match (item.home_value, item.away_value) {
            (Some(home), Some(away)) if home >= 0.0 && away >= 0.0 => {
                Some(ExpectedGoals { home, away })
            }
            _ => None,
        });
    Ok(xg)
}

/// Momentum reading from the attack-pressure graph.
///
/// Positive points favour the home side. Returns `"<team> dominant"` when the
/// recent mean clears the threshold, `None` for a balanced or empty graph.
pub fn parse_momentum(body: &str, home: &str, away: &str) -> Result<Option<String>> {
    let response: GraphResponse =
        serde_json::from_str(body).context("Failed to parse SofaScore graph response")?;

    let points = &response.graph_points;
    if points.is_empty() {
        return Ok(None);
    }
    let recent = &points[points.len().saturating_sub(MOMENTUM_WINDOW)..];
    let mean = recent.iter().map(|p| p.value).sum::<f64>() / recent.len() as f64;

    Ok(if mean > MOMENTUM_THRESHOLD {
        Some(format!("{home} dominant"))
    } else if mean < -MOMENTUM_THRESHOLD {
        Some(format!("{away} dominant"))
    } else {
        None
    })
}

fn sport_path(sport: Sport) -> &'static str {
    match sport {
        Sport::Soccer => "football",
        Sport::Basketball => "basketball",
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct SofaScoreClient {
    http: Client,
    base_url: String,
}

impl SofaScoreClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) MATCHCAST/0.1.0")
            .build()
            .context("Failed to build HTTP client for SofaScore")?;

        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .header("Referer", REFERER)
            .header("Origin", REFERER.trim_end_matches('/'))
            .send()
            .await
            .context("SofaScore API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("SofaScore API error {status}: {body}");
        }

        resp.text().await.context("Failed to read SofaScore response body")
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.get_text(path).await?;
        serde_json::from_str(&body).with_context(|| format!("Failed to parse SofaScore {path}"))
    }
}

/// Log a failed optional fetch and carry on without it.
fn keep<T>(event_id: u64, what: &str, result: Result<Option<T>>) -> (Option<T>, bool) {
    match result {
        Ok(value) => (value, true),
        Err(e) => {
            warn!(event_id, what, error = %e, "SofaScore fetch failed");
            (None, false)
        }
    }
}

#[async_trait]
impl DeepStatsProvider for SofaScoreClient {
    async fn events_on(&self, date: NaiveDate, sport: Sport) -> Result<Vec<DeepStatsEvent>> {
        let path = format!(
            "/sport/{}/scheduled-events/{}",
            sport_path(sport),
            date.format("%Y-%m-%d")
        );
        let response: ScheduledEventsResponse = self.get_json(&path).await?;
        let events: Vec<DeepStatsEvent> = response
            .events
            .into_iter()
            .map(|e| DeepStatsEvent {
                id: e.id,
                home_team: e.home_team.name,
                away_team: e.away_team.name,
                home_team_id: e.home_team.id,
                away_team_id: e.away_team.id,
            })
            .collect();
        debug!(%date, %sport, count = events.len(), "SofaScore events fetched");
        Ok(events)
    }

    async fn event_stats(&self, event: &DeepStatsEvent) -> Result<ProviderObservation> {
        let odds_path = format!("/event/{}/odds/1/all", event.id);
        let stats_path = format!("/event/{}/statistics", event.id);
        let graph_path = format!("/event/{}/graph", event.id);

        let (odds, stats, graph) = tokio::join!(
            self.get_text(&odds_path),
            self.get_text(&stats_path),
            self.get_text(&graph_path),
        );

        let (consensus, odds_ok) =
            keep(event.id, "odds", odds.and_then(|b| parse_full_time_odds(&b)));
        let (expected_goals, stats_ok) =
            keep(event.id, "statistics", stats.and_then(|b| parse_expected_goals(&b)));
        let (momentum, graph_ok) = keep(
            event.id,
            "graph",
            graph.and_then(|b| parse_momentum(&b, &event.home_team, &event.away_team)),
        );

        if !(odds_ok || stats_ok || graph_ok) {
            anyhow::bail!("SofaScore returned nothing for event {}", event.id);
        }

        let mut observation = ProviderObservation::new(PROVIDER_NAME, PROVIDER_WEIGHT);
        observation.consensus = consensus;
        observation.expected_goals = expected_goals;
        observation.momentum = momentum;
        Ok(observation)
    }
}
