/*!
 * Scoring rules and read-side aggregations.
 *
 * Everything in here is a pure function of rows already loaded from the store, so the same code
 * backs every store implementation and is re-runnable at will.
 */

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde_derive::Serialize;
use tracing::warn;

use crate::models::{DecidedPick, Game, LeaderboardRow, Outcome, Pick, PickerRow};
use crate::teams;

/// Correctness of a pick given the game's outcome.
///
/// `None` while the game is undecided, and for every pick on a tied game.
pub fn correctness(outcome: Option<&Outcome>, picked_team: &str) -> Option<bool> {
    match outcome {
        Some(Outcome::Winner(team)) => Some(team == picked_team),
        Some(Outcome::Tie) | None => None,
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    pub points: u32,
    pub total_picks: u32,
    pub correct_picks: u32,
    pub incorrect_picks: u32,
    pub pending_picks: u32,
    /// Percentage of decided picks that were right, 0 when nothing is decided yet
    pub accuracy: u32,
}

impl LeaderboardEntry {
    fn new(user_id: String, username: String) -> Self {
        Self {
            user_id,
            username,
            points: 0,
            total_picks: 0,
            correct_picks: 0,
            incorrect_picks: 0,
            pending_picks: 0,
            accuracy: 0,
        }
    }

    fn count(&mut self, is_correct: Option<bool>) {
        self.total_picks += 1;
        match is_correct {
            Some(true) => self.correct_picks += 1,
            Some(false) => self.incorrect_picks += 1,
            None => self.pending_picks += 1,
        }
    }

    fn finish(mut self) -> Self {
        self.points = self.correct_picks;
        self.accuracy = accuracy(self.correct_picks, self.incorrect_picks);
        self
    }
}

pub fn accuracy(correct: u32, incorrect: u32) -> u32 {
    let decided = correct + incorrect;
    if decided == 0 {
        return 0;
    }
    (100.0 * f64::from(correct) / f64::from(decided)).round() as u32
}

/// Ranks users by points, then accuracy. Username and id only break the remaining ties so that the
/// output does not depend on row order.
pub fn leaderboard(rows: impl IntoIterator<Item = LeaderboardRow>) -> Vec<LeaderboardEntry> {
    let mut board: BTreeMap<String, LeaderboardEntry> = BTreeMap::new();
    let mut orphans = 0usize;

    for row in rows {
        let username = match row.username {
            Some(username) => username,
            None => {
                orphans += 1;
                continue;
            }
        };
        board
            .entry(row.user_id.clone())
            .or_insert_with(|| LeaderboardEntry::new(row.user_id, username))
            .count(row.is_correct);
    }

    if orphans > 0 {
        warn!(orphans, "Skipped picks without a user");
    }

    board
        .into_values()
        .map(LeaderboardEntry::finish)
        .sorted_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then(b.accuracy.cmp(&a.accuracy))
                .then_with(|| a.username.cmp(&b.username))
                .then_with(|| a.user_id.cmp(&b.user_id))
        })
        .collect()
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameTrend {
    pub game_id: String,
    pub away_team_id: String,
    pub home_team_id: String,
    pub away_team: String,
    pub home_team: String,
    pub away_picks: u32,
    pub home_picks: u32,
    pub total_picks: u32,
    pub scheduled: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamPopularity {
    pub team_id: String,
    pub team_name: String,
    /// Picks on this team for the requested week
    pub pick_count: u32,
    /// Share of all-time decided picks on this team that were right
    pub win_rate: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    pub week: i32,
    pub total_users: u32,
    pub average_picks_per_user: f64,
    pub pick_trends: Vec<GameTrend>,
    pub popular_teams: Vec<TeamPopularity>,
}

impl Trends {
    pub fn empty(week: i32) -> Self {
        Self {
            week,
            total_users: 0,
            average_picks_per_user: 0.0,
            pick_trends: vec![],
            popular_teams: vec![],
        }
    }
}

/// Pick distribution for one week.
///
/// `games` and `picks` are the week's games and picks, `history` holds the decided picks of every
/// week and only feeds the win rates.
pub fn trends(week: i32, games: &[Game], picks: &[Pick], history: &[DecidedPick]) -> Trends {
    let total_users = picks.iter().map(|p| p.user_id.as_str()).collect::<HashSet<_>>().len() as u32;
    let by_game = picks.iter().into_group_map_by(|p| p.game_id.clone());

    let pick_trends = games
        .iter()
        .map(|game| {
            let game_picks = by_game.get(&game.id).map(Vec::as_slice).unwrap_or_default();
            let away_picks = game_picks.iter().filter(|p| p.picked_team == game.away_team).count() as u32;
            let home_picks = game_picks.iter().filter(|p| p.picked_team == game.home_team).count() as u32;
            let stray = (game_picks.len() as u32).saturating_sub(away_picks + home_picks);
            if stray > 0 {
                warn!(game = %game.id, stray, "Picks on a team not playing the game");
            }

            GameTrend {
                game_id: game.id.clone(),
                away_team_id: game.away_team.clone(),
                home_team_id: game.home_team.clone(),
                away_team: teams::display_name(&game.away_team),
                home_team: teams::display_name(&game.home_team),
                away_picks,
                home_picks,
                total_picks: away_picks + home_picks,
                scheduled: game.scheduled,
            }
        })
        .sorted_by_key(|trend| trend.scheduled)
        .collect();

    let mut records: HashMap<&str, (u32, u32)> = HashMap::new();
    for pick in history {
        let (correct, total) = records.entry(pick.picked_team.as_str()).or_default();
        *total += 1;
        if pick.is_correct {
            *correct += 1;
        }
    }

    let popular_teams = picks
        .iter()
        .counts_by(|p| p.picked_team.as_str())
        .into_iter()
        .map(|(team_id, count)| TeamPopularity {
            team_id: team_id.to_owned(),
            team_name: teams::display_name(team_id),
            pick_count: count as u32,
            win_rate: match records.get(team_id) {
                Some((correct, total)) if *total > 0 => f64::from(*correct) / f64::from(*total),
                _ => 0.0,
            },
        })
        .sorted_by(|a, b| b.pick_count.cmp(&a.pick_count).then_with(|| a.team_id.cmp(&b.team_id)))
        .collect();

    let average_picks_per_user = if total_users > 0 {
        (picks.len() as f64 / f64::from(total_users) * 10.0).round() / 10.0
    } else {
        0.0
    };

    Trends { week, total_users, average_picks_per_user, pick_trends, popular_teams }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Picker {
    pub user_id: String,
    pub username: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TeamPickers {
    pub game_id: String,
    pub picked_team: String,
    pub pickers: Vec<Picker>,
    pub count: usize,
}

pub fn team_pickers(game_id: &str, picked_team: &str, rows: Vec<PickerRow>) -> TeamPickers {
    let pickers = rows
        .into_iter()
        .map(|row| Picker {
            user_id: row.user_id,
            username: row.username.unwrap_or_else(|| "Unknown User".to_owned()),
        })
        .collect::<Vec<_>>();

    TeamPickers {
        game_id: game_id.to_owned(),
        picked_team: picked_team.to_owned(),
        count: pickers.len(),
        pickers,
    }
}
