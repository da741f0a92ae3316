/*!
 * Where the weekly game schedule comes from: the season bundled with the binary, or an upstream
 * feed serving the same document.
 */

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::models::NewGame;
use crate::teams::Team;

const BUNDLED_SEASON: &str = include_str!("../data/season-2025.json");

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Season {
    pub season: SeasonInfo,
    pub weeks: HashMap<String, WeekSchedule>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SeasonInfo {
    pub year: i32,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct WeekSchedule {
    pub games: Vec<ScheduledGame>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScheduledGame {
    pub id: String,
    pub scheduled: DateTime<Utc>,
    pub status: String,
    pub home: Team,
    pub away: Team,
    pub venue: Option<Venue>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub city: String,
    pub state: String,
}

impl Season {
    pub fn week(&self, week: i32) -> Option<&WeekSchedule> {
        self.weeks.get(&week.to_string())
    }
}

impl ScheduledGame {
    pub fn to_new_game(&self, week: i32) -> NewGame {
        NewGame {
            id: self.id.clone(),
            week,
            scheduled: self.scheduled,
            home_team: self.home.id.clone(),
            away_team: self.away.id.clone(),
            status: self.status.clone(),
        }
    }
}

#[async_trait]
pub trait ScheduleProvider: Send + Sync {
    async fn season(&self) -> Result<Season>;
}

/// Season compiled into the binary
#[derive(Debug, Clone)]
pub struct BundledSchedule {
    season: Season,
}

impl BundledSchedule {
    pub fn new() -> Result<Self> {
        let season = serde_json::from_str(BUNDLED_SEASON)
            .map_err(|e| Error::UpstreamFailure(format!("bundled season is malformed: {e}")))?;
        Ok(Self { season })
    }
}

#[async_trait]
impl ScheduleProvider for BundledSchedule {
    async fn season(&self) -> Result<Season> {
        Ok(self.season.clone())
    }
}

/// Season fetched over HTTP on every call
#[derive(Debug, Clone)]
pub struct FeedSchedule {
    client: reqwest::Client,
    url: String,
}

impl FeedSchedule {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl ScheduleProvider for FeedSchedule {
    #[instrument(skip(self), fields(url = %self.url), err)]
    async fn season(&self) -> Result<Season> {
        let season: Season = self.client.get(&self.url).send().await?.error_for_status()?.json().await?;
        debug!(weeks = season.weeks.len(), "Fetched season from feed");
        Ok(season)
    }
}
