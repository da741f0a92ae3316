/*!
 * Regular player operation handlers: picks, and the read views built from them
 */

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::error::{Error, Result};
use crate::extensions::Caller;
use crate::models::{NewPick, NewUser, Outcome};
use crate::schedule::{ScheduledGame, SeasonInfo, Venue};
use crate::scoring::{self, LeaderboardEntry, TeamPickers, Trends};
use crate::season;
use crate::teams::Team;
use super::AppContext;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PickInput {
    pub game_id: Option<String>,
    pub team_id: Option<String>,
}

fn check_week(week: i32) -> Result<()> {
    if season::is_valid_week(week) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid week {week}")))
    }
}

/// Saves the caller's picks for a week, replacing earlier picks on the same games.
///
/// Every pick is checked before anything is written. Returns the number of picks saved.
#[instrument(skip(ctx, caller, picks), fields(user = %caller.id, picks = picks.len()), err)]
pub async fn submit_picks(ctx: &AppContext, caller: &Caller, week: i32, picks: &[PickInput]) -> Result<usize> {
    check_week(week)?;

    // Last pick wins when a game shows up twice
    let mut wanted: BTreeMap<&str, &str> = BTreeMap::new();
    for pick in picks {
        match (pick.game_id.as_deref(), pick.team_id.as_deref()) {
            (Some(game_id), Some(team_id)) if !game_id.is_empty() && !team_id.is_empty() => {
                wanted.insert(game_id, team_id);
            }
            _ => return Err(Error::InvalidInput("gameId and teamId are required for each pick".to_owned())),
        }
    }

    let now = Utc::now();
    let mut new_picks = Vec::with_capacity(wanted.len());
    for (game_id, team_id) in wanted {
        let game = ctx.store.game(game_id).await?.ok_or_else(|| Error::NotFound(format!("Game {game_id}")))?;
        if !game.is_playing(team_id) {
            return Err(Error::InvalidInput(format!("{team_id} does not play in game {game_id}")));
        }
        if ctx.enforce_kickoff && game.has_kicked_off(now) {
            return Err(Error::InvalidInput(format!("Game {game_id} already started")));
        }
        if game.week != week {
            warn!(game = game_id, game_week = game.week, week, "Pick submitted for the wrong week");
        }
        // Late picks on a decided game are scored right away
        let outcome = game.winner_team.as_deref().and_then(Outcome::parse);
        new_picks.push(NewPick {
            user_id: &caller.id,
            game_id,
            week: game.week,
            picked_team: team_id,
            is_correct: scoring::correctness(outcome.as_ref(), team_id),
        });
    }

    let username = caller.username.as_deref().filter(|n| !n.is_empty()).unwrap_or(&caller.id);
    ctx.store.ensure_user(NewUser { id: &caller.id, username }).await?;
    ctx.store.upsert_picks(&new_picks).await?;
    info!("Saved {} picks", new_picks.len());

    Ok(new_picks.len())
}

/// The caller's picks for a week, as game id to picked team
pub async fn user_picks(ctx: &AppContext, user_id: &str, week: i32) -> Result<BTreeMap<String, String>> {
    check_week(week)?;
    let picks = ctx.store.user_picks(user_id, week).await?;
    Ok(picks.into_iter().map(|p| (p.game_id, p.picked_team)).collect())
}

/// Ranking of every user over all weeks. Empty if the store can't be read.
pub async fn leaderboard(ctx: &AppContext) -> Vec<LeaderboardEntry> {
    match try_leaderboard(ctx).await {
        Ok(board) => board,
        Err(e) => {
            error!("Failed to compute leaderboard: {e}");
            vec![]
        }
    }
}

#[instrument(skip_all, err)]
async fn try_leaderboard(ctx: &AppContext) -> Result<Vec<LeaderboardEntry>> {
    let per_page = ctx.batch_size.max(1);
    let mut rows = vec![];
    let mut page = 1;
    loop {
        let (batch, total) = ctx.store.leaderboard_page(page, per_page).await?;
        let done = batch.is_empty() || (rows.len() + batch.len()) as i64 >= total;
        rows.extend(batch);
        if done {
            break;
        }
        page += 1;
    }
    Ok(scoring::leaderboard(rows))
}

/// Pick distribution for a week. An empty summary if the store can't be read.
pub async fn trends(ctx: &AppContext, week: i32) -> Trends {
    match try_trends(ctx, week).await {
        Ok(trends) => trends,
        Err(e) => {
            error!(week, "Failed to compute trends: {e}");
            Trends::empty(week)
        }
    }
}

#[instrument(skip(ctx), err)]
async fn try_trends(ctx: &AppContext, week: i32) -> Result<Trends> {
    let games = ctx.store.week_games(week).await?;
    let picks = ctx.store.week_picks(week).await?;
    // Without history every win rate is 0, the rest of the summary still holds
    let history = ctx.store.decided_picks().await.unwrap_or_else(|e| {
        error!(week, "Failed to load pick history: {e}");
        vec![]
    });
    Ok(scoring::trends(week, &games, &picks, &history))
}

pub async fn team_pickers(ctx: &AppContext, game_id: &str, team: &str) -> Result<TeamPickers> {
    if game_id.is_empty() || team.is_empty() {
        return Err(Error::InvalidInput("gameId and pickedTeam are required".to_owned()));
    }
    let rows = ctx.store.pickers(game_id, team).await?;
    Ok(scoring::team_pickers(game_id, team, rows))
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeekInfo {
    pub year: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub week: i32,
    pub label: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameDetails {
    pub id: String,
    pub scheduled: DateTime<Utc>,
    pub status: String,
    pub home: Team,
    pub away: Team,
    pub venue: Option<Venue>,
    pub winner_team: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WeekGames {
    pub season: WeekInfo,
    pub games: Vec<GameDetails>,
}

/// Fetches a week from the schedule provider and caches its games in the store
#[instrument(skip(ctx), err)]
pub async fn sync_week(ctx: &AppContext, week: i32) -> Result<(SeasonInfo, Vec<ScheduledGame>)> {
    check_week(week)?;
    let season = ctx.schedule.season().await?;
    let games = season
        .week(week)
        .map(|w| w.games.clone())
        .ok_or_else(|| Error::NotFound(format!("Games for week {week}")))?;

    let new_games = games.iter().map(|g| g.to_new_game(week)).collect::<Vec<_>>();
    ctx.store.upsert_games(&new_games).await?;
    info!(week, games = new_games.len(), "Synced schedule");

    Ok((season.season, games))
}

/// Games of a week with team and venue details, and their winner if recorded
pub async fn week_games(ctx: &AppContext, week: i32) -> Result<WeekGames> {
    let (info, games) = sync_week(ctx, week).await?;

    let winners = ctx
        .store
        .week_games(week)
        .await?
        .into_iter()
        .map(|g| (g.id, g.winner_team))
        .collect::<HashMap<_, _>>();

    let mut games = games
        .into_iter()
        .map(|g| GameDetails {
            winner_team: winners.get(&g.id).cloned().flatten(),
            id: g.id,
            scheduled: g.scheduled,
            status: g.status,
            home: g.home,
            away: g.away,
            venue: g.venue,
        })
        .collect::<Vec<_>>();
    games.sort_by_key(|g| g.scheduled);

    Ok(WeekGames {
        season: WeekInfo { year: info.year, kind: info.kind, week, label: season::week_label(week) },
        games,
    })
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use super::*;
    use crate::cmd::admin::record_result;
    use crate::cmd::testing::{context, new_game, seeded};
    use crate::schedule::FeedSchedule;
    use crate::store::{memory::FlakyStore, MemoryStore, Store};

    fn caller(id: &str) -> Caller {
        Caller { id: id.to_owned(), username: Some(id.to_uppercase()) }
    }

    fn pick(game: &str, team: &str) -> PickInput {
        PickInput { game_id: Some(game.to_owned()), team_id: Some(team.to_owned()) }
    }

    #[tokio::test]
    async fn submit_creates_user_and_picks() {
        let (store, ctx) = seeded().await;

        let saved = submit_picks(&ctx, &caller("u1"), 1, &[pick("G", "A")]).await.unwrap();
        assert_eq!(saved, 1);
        assert_eq!(store.user("u1").await.unwrap().unwrap().username, "U1");

        let picks = user_picks(&ctx, "u1", 1).await.unwrap();
        assert_eq!(picks.get("G").map(String::as_str), Some("A"));
    }

    #[tokio::test]
    async fn resubmitting_replaces_pick() {
        let (store, ctx) = seeded().await;
        submit_picks(&ctx, &caller("u1"), 1, &[pick("G", "A")]).await.unwrap();
        record_result(&ctx, "G", Some(1), "A").await.unwrap();

        submit_picks(&ctx, &caller("u1"), 1, &[pick("G", "B"), pick("G", "B")]).await.unwrap();
        let picks = store.user_picks("u1", 1).await.unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].picked_team, "B");
        assert_eq!(picks[0].is_correct, Some(false));
    }

    #[tokio::test]
    async fn late_picks_are_scored_against_the_result() {
        let (store, ctx) = seeded().await;
        record_result(&ctx, "G", Some(1), "A").await.unwrap();

        submit_picks(&ctx, &caller("late"), 1, &[pick("G", "A")]).await.unwrap();
        assert_eq!(store.user_picks("late", 1).await.unwrap()[0].is_correct, Some(true));
        let board = leaderboard(&ctx).await;
        assert_eq!((board[0].points, board[0].pending_picks), (1, 0));

        record_result(&ctx, "G", Some(1), "TIE").await.unwrap();
        submit_picks(&ctx, &caller("later"), 1, &[pick("G", "B")]).await.unwrap();
        assert_eq!(store.user_picks("later", 1).await.unwrap()[0].is_correct, None);
    }

    #[tokio::test]
    async fn pending_picks_stay_undecided() {
        let (store, ctx) = seeded().await;
        submit_picks(&ctx, &caller("u1"), 1, &[pick("G", "A")]).await.unwrap();
        assert_eq!(store.user_picks("u1", 1).await.unwrap()[0].is_correct, None);
    }

    #[tokio::test]
    async fn username_falls_back_on_id() {
        let (store, ctx) = seeded().await;
        let anonymous = Caller { id: "u9".to_owned(), username: None };
        submit_picks(&ctx, &anonymous, 1, &[]).await.unwrap();
        assert_eq!(store.user("u9").await.unwrap().unwrap().username, "u9");
    }

    #[tokio::test]
    async fn invalid_picks_write_nothing() {
        let (store, ctx) = seeded().await;
        let u1 = caller("u1");

        let res = submit_picks(&ctx, &u1, 1, &[pick("G", "A"), pick("G", "Z")]).await;
        assert!(matches!(res, Err(Error::InvalidInput(_))));
        let res = submit_picks(&ctx, &u1, 1, &[pick("G", "A"), pick("nope", "A")]).await;
        assert!(matches!(res, Err(Error::NotFound(_))));
        let res = submit_picks(&ctx, &u1, 1, &[PickInput { game_id: Some("G".to_owned()), team_id: None }]).await;
        assert!(matches!(res, Err(Error::InvalidInput(_))));
        let res = submit_picks(&ctx, &u1, 19, &[pick("G", "A")]).await;
        assert!(matches!(res, Err(Error::InvalidInput(_))));

        assert!(store.user_picks("u1", 1).await.unwrap().is_empty());
        assert!(store.user("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn kickoff_enforcement() {
        let (_, mut ctx) = seeded().await;
        // Game G kicked off in September 2025
        assert!(submit_picks(&ctx, &caller("u1"), 1, &[pick("G", "A")]).await.is_ok());

        ctx.enforce_kickoff = true;
        let res = submit_picks(&ctx, &caller("u1"), 1, &[pick("G", "A")]).await;
        assert!(matches!(res, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn game_week_wins_over_request_week() {
        let (store, ctx) = seeded().await;
        submit_picks(&ctx, &caller("u1"), 2, &[pick("G", "A")]).await.unwrap();
        assert_eq!(store.user_picks("u1", 1).await.unwrap().len(), 1);
        assert!(store.user_picks("u1", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_write_is_reported() {
        let (store, _) = seeded().await;
        let flaky = FlakyStore { failing_games: HashSet::from(["G".to_owned()]), ..FlakyStore::new(store) };
        let ctx = context(Arc::new(flaky));
        let err = submit_picks(&ctx, &caller("u1"), 1, &[pick("G", "A")]).await.unwrap_err();
        assert_eq!(err.kind(), "write_failure");
    }

    #[tokio::test]
    async fn leaderboard_over_several_batches() {
        let (store, mut ctx) = seeded().await;
        store.upsert_games(&[new_game("G2", 1, "C", "D"), new_game("G3", 1, "E", "F")]).await.unwrap();
        ctx.batch_size = 2;

        submit_picks(&ctx, &caller("u1"), 1, &[pick("G", "A"), pick("G2", "C"), pick("G3", "E")]).await.unwrap();
        submit_picks(&ctx, &caller("u2"), 1, &[pick("G", "B"), pick("G2", "C")]).await.unwrap();
        record_result(&ctx, "G", Some(1), "A").await.unwrap();
        record_result(&ctx, "G2", Some(1), "C").await.unwrap();

        let board = leaderboard(&ctx).await;
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].user_id, "u1");
        assert_eq!(board[0].points, 2);
        assert_eq!(board[0].total_picks, 3);
        assert_eq!(board[0].pending_picks, 1);
        assert_eq!(board[0].accuracy, 100);
        assert_eq!(board[1].user_id, "u2");
        assert_eq!(board[1].points, 1);
        assert_eq!(board[1].accuracy, 50);
        assert_eq!(board.iter().map(|e| e.total_picks).sum::<u32>(), 5);

        assert_eq!(leaderboard(&ctx).await, board);
    }

    #[tokio::test]
    async fn leaderboard_skips_orphan_picks() {
        let (store, ctx) = seeded().await;
        submit_picks(&ctx, &caller("u1"), 1, &[pick("G", "A")]).await.unwrap();
        submit_picks(&ctx, &caller("u2"), 1, &[pick("G", "A")]).await.unwrap();
        store.forget_user("u2").await;

        let board = leaderboard(&ctx).await;
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].user_id, "u1");
    }

    #[tokio::test]
    async fn empty_store() {
        let ctx = context(Arc::new(MemoryStore::new()));
        assert!(leaderboard(&ctx).await.is_empty());
        let trends = trends(&ctx, 5).await;
        assert!(trends.pick_trends.is_empty());
        assert_eq!(trends.week, 5);
    }

    #[tokio::test]
    async fn reads_degrade_to_empty() {
        let (store, ctx) = seeded().await;
        submit_picks(&ctx, &caller("u1"), 1, &[pick("G", "A")]).await.unwrap();

        let flaky = FlakyStore { failing_reads: true, ..FlakyStore::new(store) };
        let ctx = context(Arc::new(flaky));
        assert!(leaderboard(&ctx).await.is_empty());
        assert_eq!(trends(&ctx, 1).await, Trends::empty(1));
    }

    #[tokio::test]
    async fn trends_survive_missing_history() {
        let (store, ctx) = seeded().await;
        for (user, team) in [("u1", "A"), ("u2", "B")] {
            submit_picks(&ctx, &caller(user), 1, &[pick("G", team)]).await.unwrap();
        }
        record_result(&ctx, "G", Some(1), "A").await.unwrap();

        let flaky = FlakyStore { failing_history: true, ..FlakyStore::new(store) };
        let ctx = context(Arc::new(flaky));
        let trends = trends(&ctx, 1).await;
        assert_eq!(trends.total_users, 2);
        assert_eq!(trends.pick_trends[0].total_picks, 2);
        assert_eq!(trends.popular_teams.len(), 2);
        assert!(trends.popular_teams.iter().all(|t| t.win_rate == 0.0));
    }

    #[tokio::test]
    async fn week_trends() {
        let (_, ctx) = seeded().await;
        for (user, team) in [("u1", "A"), ("u2", "B"), ("u3", "A")] {
            submit_picks(&ctx, &caller(user), 1, &[pick("G", team)]).await.unwrap();
        }
        record_result(&ctx, "G", Some(1), "A").await.unwrap();

        let trends = trends(&ctx, 1).await;
        assert_eq!(trends.total_users, 3);
        assert_eq!(trends.pick_trends[0].home_picks, 2);
        assert_eq!(trends.pick_trends[0].away_picks, 1);
        assert_eq!(trends.pick_trends[0].total_picks, 3);
        assert_eq!(trends.popular_teams[0].team_id, "A");
        assert_eq!(trends.popular_teams[0].win_rate, 1.0);
        assert_eq!(trends.popular_teams[1].win_rate, 0.0);
    }

    #[tokio::test]
    async fn pickers_of_a_team() {
        let (_, ctx) = seeded().await;
        submit_picks(&ctx, &caller("u1"), 1, &[pick("G", "A")]).await.unwrap();
        submit_picks(&ctx, &caller("u2"), 1, &[pick("G", "B")]).await.unwrap();

        let pickers = team_pickers(&ctx, "G", "A").await.unwrap();
        assert_eq!(pickers.count, 1);
        assert_eq!(pickers.pickers[0].user_id, "u1");
        assert_eq!(pickers.pickers[0].username, "U1");
        assert!(matches!(team_pickers(&ctx, "", "A").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn week_games_are_cached() {
        let store = MemoryStore::new();
        let ctx = context(Arc::new(store.clone()));

        let week = week_games(&ctx, 1).await.unwrap();
        assert_eq!(week.season.year, 2025);
        assert_eq!(week.season.label, "Week 1 (Sep 4 - Sep 10)");
        assert_eq!(week.games.len(), 5);
        assert_eq!(week.games[0].id, "2025-REG-1-GAME-001");
        assert_eq!(store.week_games(1).await.unwrap().len(), 5);

        record_result(&ctx, "2025-REG-1-GAME-001", Some(1), "PHI").await.unwrap();
        let week = week_games(&ctx, 1).await.unwrap();
        assert_eq!(week.games[0].winner_team.as_deref(), Some("PHI"));

        assert!(matches!(week_games(&ctx, 9).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn week_games_with_feed_down() {
        let ctx = AppContext::new(Arc::new(MemoryStore::new()), Arc::new(FeedSchedule::new("http://127.0.0.1:9/")));
        let err = week_games(&ctx, 1).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_failure");
    }
}
