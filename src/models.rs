/*!
 * DB models for the pick'em service
 */

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_derive::Serialize;
use uuid::Uuid;

pub use crate::schema::{games, picks, users};

/// Value stored in `games.winner_team` when a game ends in a tie
pub const TIE: &str = "TIE";

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub username: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = games)]
pub struct Game {
    pub id: String,
    pub week: i32,
    pub scheduled: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    pub winner_team: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Game {
    /// Whether `team` is one of the two participants
    pub fn is_playing(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    pub fn has_kicked_off(&self, now: DateTime<Utc>) -> bool {
        self.scheduled <= now
    }
}

/// Schedule data for a game. The winner is never part of it: only results recording sets it.
#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = games)]
pub struct NewGame {
    pub id: String,
    pub week: i32,
    pub scheduled: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    pub status: String,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = picks)]
pub struct Pick {
    pub id: Uuid,
    pub user_id: String,
    pub game_id: String,
    pub week: i32,
    pub picked_team: String,
    pub is_correct: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pick as submitted. Correctness is unknown until the game's result is recorded.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = picks)]
pub struct NewPick<'a> {
    pub user_id: &'a str,
    pub game_id: &'a str,
    pub week: i32,
    pub picked_team: &'a str,
    pub is_correct: Option<bool>,
}

/// One pick as seen by the leaderboard. `username` is `None` when the user row is missing.
#[derive(Queryable, Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub pick_id: Uuid,
    pub user_id: String,
    pub username: Option<String>,
    pub is_correct: Option<bool>,
}

/// A pick on a game whose outcome is known and not a tie
#[derive(Queryable, Debug, Clone, PartialEq)]
pub struct DecidedPick {
    pub picked_team: String,
    pub is_correct: bool,
}

#[derive(Queryable, Debug, Clone, PartialEq)]
pub struct PickerRow {
    pub user_id: String,
    pub username: Option<String>,
}

/// Authoritative result of a game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Winner(String),
    Tie,
}

impl Outcome {
    pub fn parse(s: &str) -> Option<Outcome> {
        match s.trim() {
            "" => None,
            TIE => Some(Outcome::Tie),
            team => Some(Outcome::Winner(team.to_owned())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Winner(team) => team,
            Outcome::Tie => TIE,
        }
    }
}
