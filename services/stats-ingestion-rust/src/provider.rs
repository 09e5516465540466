//! Statistics provider API: payload types and the HTTP client.

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::time::Duration;
use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::error::FetchError;

/// One game as the provider returns it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderEvent {
    #[serde(rename = "eventID", alias = "event_id")]
    pub event_id: Option<String>,
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    pub sportsbook: Option<String>,
    pub players: Vec<ProviderPlayer>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderPlayer {
    pub name: String,
    pub team: String,
    pub position: Option<String>,
    /// Stat identifier -> value. Values are usually numbers but the feed
    /// also sends strings and nulls.
    pub stats: BTreeMap<String, serde_json::Value>,
    pub odds: BTreeMap<String, StatOdds>,
}

/// American odds for the over/under on one stat line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StatOdds {
    pub over: Option<i32>,
    pub under: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EventPage {
    pub events: Vec<ProviderEvent>,
    #[serde(rename = "nextCursor", alias = "next_cursor")]
    pub next_cursor: Option<String>,
}

/// Anything that can serve one page of events for a league and season.
#[async_trait]
pub trait EventPageSource: Send + Sync {
    async fn fetch_page(
        &self,
        league: &str,
        season: &str,
        cursor: Option<&str>,
    ) -> Result<EventPage, FetchError>;
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// reqwest client for `GET <base>/<league>/events`.
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    page_size: u32,
    rate_limiter: DirectLimiter,
}

impl ProviderClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        requests_per_minute: u32,
        page_size: u32,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .build()
            .context("Failed to create HTTP client")?;

        let quota = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            page_size,
            rate_limiter: RateLimiter::direct(Quota::per_minute(quota)),
        })
    }

    pub fn events_url(&self, league: &str) -> String {
        format!("{}/{}/events", self.base_url, league)
    }
}

#[async_trait]
impl EventPageSource for ProviderClient {
    async fn fetch_page(
        &self,
        league: &str,
        season: &str,
        cursor: Option<&str>,
    ) -> Result<EventPage, FetchError> {
        self.rate_limiter.until_ready().await;

        let mut query: Vec<(&str, String)> = vec![
            ("season", season.to_string()),
            ("limit", self.page_size.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        debug!("GET {} {:?}", self.events_url(league), query);
        let response = self
            .http
            .get(self.events_url(league))
            .header("x-api-key", &self.api_key)
            .query(&query)
            .send()
            .await?;

        if let Some(remaining) = response.headers().get("x-requests-remaining") {
            info!(
                "Provider requests remaining: {}",
                remaining.to_str().unwrap_or("?")
            );
        }

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_decodes_provider_shape() {
        let body = r#"{
            "events": [{
                "eventID": "ev-1",
                "date": "2024-10-20T17:00:00Z",
                "home_team": "Kansas City Chiefs",
                "away_team": "Buffalo Bills",
                "players": [{
                    "name": "Josh Allen",
                    "team": "Buffalo Bills",
                    "position": "QB",
                    "stats": {"passing_yards": 281.5, "rushing_yards": null},
                    "odds": {"passing_yards": {"over": -115, "under": -105}}
                }]
            }],
            "nextCursor": "abc"
        }"#;
        let page: EventPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
        let event = &page.events[0];
        assert_eq!(event.event_id.as_deref(), Some("ev-1"));
        assert!(event.sportsbook.is_none());
        let player = &event.players[0];
        assert_eq!(player.stats.len(), 2);
        assert_eq!(
            player.odds.get("passing_yards"),
            Some(&StatOdds { over: Some(-115), under: Some(-105) })
        );
    }

    #[test]
    fn missing_fields_default() {
        let page: EventPage = serde_json::from_str(r#"{"events":[{"date":"2024-01-01"}]}"#).unwrap();
        assert!(page.next_cursor.is_none());
        assert!(page.events[0].players.is_empty());
        assert_eq!(page.events[0].home_team, "");
    }

    #[test]
    fn events_url_trims_trailing_slash() {
        let client = ProviderClient::new("http://localhost:9000/v1/", "k", 60, 100).unwrap();
        assert_eq!(client.events_url("nfl"), "http://localhost:9000/v1/nfl/events");
    }
}
