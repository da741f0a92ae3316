/*!
 * Admin gate and results recording
 */

use serde_derive::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::error::{Error, Result};
use crate::models::Outcome;
use crate::season;
use super::AppContext;

/// Whether a user may record results. Unknown users, and lookup failures, are never admins.
#[instrument(skip(ctx))]
pub async fn is_admin(ctx: &AppContext, user_id: Option<&str>) -> bool {
    let user_id = match user_id {
        Some(id) if !id.is_empty() => id,
        _ => return false,
    };

    match ctx.store.user(user_id).await {
        Ok(Some(user)) => user.is_admin,
        Ok(None) => false,
        Err(e) => {
            warn!("Admin lookup failed, denying: {e}");
            false
        }
    }
}

pub async fn require_admin(ctx: &AppContext, user_id: Option<&str>) -> Result<()> {
    if is_admin(ctx, user_id).await {
        Ok(())
    } else {
        Err(Error::Unauthorized)
    }
}

/// Sets the winner of a game (a participant, or `TIE`) and rescores all picks on it.
///
/// When `week` is given the game must belong to it. Returns the number of picks rescored.
#[instrument(skip(ctx), err)]
pub async fn record_result(ctx: &AppContext, game_id: &str, week: Option<i32>, winner: &str) -> Result<usize> {
    let game = ctx
        .store
        .game(game_id)
        .await?
        .filter(|game| week.map_or(true, |week| game.week == week))
        .ok_or_else(|| match week {
            Some(week) => Error::NotFound(format!("Game {game_id} in week {week}")),
            None => Error::NotFound(format!("Game {game_id}")),
        })?;

    let outcome = Outcome::parse(winner).ok_or_else(|| Error::InvalidInput("winnerTeam is required".to_owned()))?;
    if let Outcome::Winner(ref team) = outcome {
        if !game.is_playing(team) {
            return Err(Error::InvalidInput(format!(
                "{team} does not play in game {game_id} ({} at {})",
                game.away_team, game.home_team
            )));
        }
    }

    let rescored = ctx.store.record_result(game_id, &outcome).await?;
    info!(game = game_id, winner = outcome.as_str(), rescored, "Recorded result");

    Ok(rescored)
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub game_id: Option<String>,
    pub winner_team: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
    pub game_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescored: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub week: i32,
    pub results: Vec<ItemReport>,
    /// Game id and details of the first item that failed
    pub first_failure: Option<ItemReport>,
    #[serde(skip)]
    pub first_error: Option<Error>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.first_failure.is_none()
    }
}

/// Records the results of several games of a week.
///
/// A malformed item rejects the whole batch before anything is written. Otherwise every item is
/// applied on its own: a failing game does not stop the following ones, and games already recorded
/// stay recorded.
#[instrument(skip(ctx, results), fields(results = results.len()))]
pub async fn record_results(ctx: &AppContext, week: i32, results: &[GameResult]) -> Result<BatchReport> {
    if !season::is_valid_week(week) {
        return Err(Error::InvalidInput(format!("Invalid week {week}")));
    }

    let items = results
        .iter()
        .map(|r| match (r.game_id.as_deref(), r.winner_team.as_deref()) {
            (Some(game_id), Some(winner)) if !game_id.is_empty() && !winner.is_empty() => Ok((game_id, winner)),
            _ => Err(Error::InvalidInput("gameId and winnerTeam are required for each result".to_owned())),
        })
        .collect::<Result<Vec<_>>>()?;

    let mut report = BatchReport { week, results: Vec::with_capacity(items.len()), first_failure: None, first_error: None };
    for (game_id, winner) in items {
        match record_result(ctx, game_id, Some(week), winner).await {
            Ok(rescored) => report.results.push(ItemReport {
                game_id: game_id.to_owned(),
                ok: true,
                rescored: Some(rescored),
                error: None,
            }),
            Err(e) => {
                error!(game = game_id, "Failed to record result: {e}");
                let item = ItemReport {
                    game_id: game_id.to_owned(),
                    ok: false,
                    rescored: None,
                    error: Some(Failure { kind: e.kind(), message: e.as_message() }),
                };
                if report.first_failure.is_none() {
                    report.first_failure = Some(item.clone());
                    report.first_error = Some(e);
                }
                report.results.push(item);
            }
        }
    }

    Ok(report)
}
