//! Store kept in process memory. Nothing survives a restart: meant for tests and local runs.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{instrument, trace};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::scoring::correctness;
use super::Store;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    games: HashMap<String, Game>,
    /// Keyed by (user id, game id), the pick identity
    picks: HashMap<(String, String), Pick>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags a user as admin, creating it if needed
    pub async fn grant_admin(&self, id: &str, username: &str) {
        let now = Utc::now();
        self.tables
            .write()
            .await
            .users
            .entry(id.to_owned())
            .or_insert_with(|| User {
                id: id.to_owned(),
                username: username.to_owned(),
                is_admin: false,
                created_at: now,
                updated_at: now,
            })
            .is_admin = true;
    }

    /// Drops a user while leaving its picks behind
    #[cfg(test)]
    pub async fn forget_user(&self, id: &str) {
        self.tables.write().await.users.remove(id);
    }

    fn sorted_picks(tables: &Tables) -> Vec<&Pick> {
        let mut picks = tables.picks.values().collect::<Vec<_>>();
        picks.sort_by_key(|p| p.id);
        picks
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn ensure_user(&self, user: NewUser<'_>) -> Result<()> {
        let now = Utc::now();
        self.tables.write().await.users.entry(user.id.to_owned()).or_insert_with(|| User {
            id: user.id.to_owned(),
            username: user.username.to_owned(),
            is_admin: false,
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    async fn game(&self, id: &str) -> Result<Option<Game>> {
        Ok(self.tables.read().await.games.get(id).cloned())
    }

    async fn week_games(&self, week: i32) -> Result<Vec<Game>> {
        let tables = self.tables.read().await;
        let mut games = tables.games.values().filter(|g| g.week == week).cloned().collect::<Vec<_>>();
        games.sort_by(|a, b| a.scheduled.cmp(&b.scheduled).then_with(|| a.id.cmp(&b.id)));
        Ok(games)
    }

    async fn upsert_games(&self, games: &[NewGame]) -> Result<()> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        for new in games {
            let game = tables.games.entry(new.id.clone()).or_insert_with(|| Game {
                id: new.id.clone(),
                week: new.week,
                scheduled: new.scheduled,
                home_team: new.home_team.clone(),
                away_team: new.away_team.clone(),
                winner_team: None,
                status: new.status.clone(),
                created_at: now,
                updated_at: now,
            });
            game.week = new.week;
            game.scheduled = new.scheduled;
            game.home_team = new.home_team.clone();
            game.away_team = new.away_team.clone();
            game.status = new.status.clone();
            game.updated_at = now;
        }
        Ok(())
    }

    async fn upsert_picks(&self, picks: &[NewPick<'_>]) -> Result<()> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        for new in picks {
            let key = (new.user_id.to_owned(), new.game_id.to_owned());
            let pick = tables.picks.entry(key).or_insert_with(|| Pick {
                id: Uuid::new_v4(),
                user_id: new.user_id.to_owned(),
                game_id: new.game_id.to_owned(),
                week: new.week,
                picked_team: new.picked_team.to_owned(),
                is_correct: new.is_correct,
                created_at: now,
                updated_at: now,
            });
            pick.week = new.week;
            pick.picked_team = new.picked_team.to_owned();
            pick.is_correct = new.is_correct;
            pick.updated_at = now;
        }
        Ok(())
    }

    async fn user_picks(&self, user_id: &str, week: i32) -> Result<Vec<Pick>> {
        let tables = self.tables.read().await;
        Ok(Self::sorted_picks(&tables)
            .into_iter()
            .filter(|p| p.user_id == user_id && p.week == week)
            .cloned()
            .collect())
    }

    async fn week_picks(&self, week: i32) -> Result<Vec<Pick>> {
        let tables = self.tables.read().await;
        Ok(Self::sorted_picks(&tables).into_iter().filter(|p| p.week == week).cloned().collect())
    }

    async fn leaderboard_page(&self, page: i64, per_page: i64) -> Result<(Vec<LeaderboardRow>, i64)> {
        let tables = self.tables.read().await;
        let picks = Self::sorted_picks(&tables);
        let total = picks.len() as i64;
        let rows = picks
            .into_iter()
            .skip(((page - 1) * per_page).max(0) as usize)
            .take(per_page.max(0) as usize)
            .map(|p| LeaderboardRow {
                pick_id: p.id,
                user_id: p.user_id.clone(),
                username: tables.users.get(&p.user_id).map(|u| u.username.clone()),
                is_correct: p.is_correct,
            })
            .collect();
        Ok((rows, total))
    }

    async fn decided_picks(&self) -> Result<Vec<DecidedPick>> {
        let tables = self.tables.read().await;
        Ok(Self::sorted_picks(&tables)
            .into_iter()
            .filter_map(|p| {
                p.is_correct.map(|is_correct| DecidedPick { picked_team: p.picked_team.clone(), is_correct })
            })
            .collect())
    }

    async fn pickers(&self, game_id: &str, team: &str) -> Result<Vec<PickerRow>> {
        let tables = self.tables.read().await;
        let mut picks = tables
            .picks
            .values()
            .filter(|p| p.game_id == game_id && p.picked_team == team)
            .collect::<Vec<_>>();
        picks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.user_id.cmp(&b.user_id)));
        Ok(picks
            .into_iter()
            .map(|p| PickerRow {
                user_id: p.user_id.clone(),
                username: tables.users.get(&p.user_id).map(|u| u.username.clone()),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn record_result(&self, game_id: &str, outcome: &Outcome) -> Result<usize> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;

        let game = tables.games.get_mut(game_id).ok_or_else(|| Error::NotFound(format!("Game {game_id}")))?;
        game.winner_team = Some(outcome.as_str().to_owned());
        game.updated_at = now;

        let mut rescored = 0;
        for pick in tables.picks.values_mut().filter(|p| p.game_id == game_id) {
            pick.is_correct = correctness(Some(outcome), &pick.picked_team);
            pick.updated_at = now;
            rescored += 1;
        }
        trace!(rescored, "Rescored picks");

        Ok(rescored)
    }
}

/// Store whose writes fail for a chosen set of games, to exercise failure paths
#[cfg(test)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub failing_games: std::collections::HashSet<String>,
    pub failing_reads: bool,
    /// Only the all-time decided picks fail to load
    pub failing_history: bool,
    pub user_lookups: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing_games: Default::default(),
            failing_reads: false,
            failing_history: false,
            user_lookups: Default::default(),
        }
    }

    pub fn lookups(&self) -> usize {
        self.user_lookups.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn read_guard(&self) -> Result<()> {
        if self.failing_reads {
            Err(Error::Db(diesel::result::Error::BrokenTransactionManager))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Store for FlakyStore {
    async fn user(&self, id: &str) -> Result<Option<User>> {
        self.user_lookups.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.read_guard()?;
        self.inner.user(id).await
    }

    async fn ensure_user(&self, user: NewUser<'_>) -> Result<()> {
        self.inner.ensure_user(user).await
    }

    async fn game(&self, id: &str) -> Result<Option<Game>> {
        self.read_guard()?;
        self.inner.game(id).await
    }

    async fn week_games(&self, week: i32) -> Result<Vec<Game>> {
        self.read_guard()?;
        self.inner.week_games(week).await
    }

    async fn upsert_games(&self, games: &[NewGame]) -> Result<()> {
        self.inner.upsert_games(games).await
    }

    async fn upsert_picks(&self, picks: &[NewPick<'_>]) -> Result<()> {
        if picks.iter().any(|p| self.failing_games.contains(p.game_id)) {
            return Err(Error::write(diesel::result::Error::RollbackTransaction));
        }
        self.inner.upsert_picks(picks).await
    }

    async fn user_picks(&self, user_id: &str, week: i32) -> Result<Vec<Pick>> {
        self.read_guard()?;
        self.inner.user_picks(user_id, week).await
    }

    async fn week_picks(&self, week: i32) -> Result<Vec<Pick>> {
        self.read_guard()?;
        self.inner.week_picks(week).await
    }

    async fn leaderboard_page(&self, page: i64, per_page: i64) -> Result<(Vec<LeaderboardRow>, i64)> {
        self.read_guard()?;
        self.inner.leaderboard_page(page, per_page).await
    }

    async fn decided_picks(&self) -> Result<Vec<DecidedPick>> {
        self.read_guard()?;
        if self.failing_history {
            return Err(Error::Db(diesel::result::Error::BrokenTransactionManager));
        }
        self.inner.decided_picks().await
    }

    async fn pickers(&self, game_id: &str, team: &str) -> Result<Vec<PickerRow>> {
        self.read_guard()?;
        self.inner.pickers(game_id, team).await
    }

    async fn record_result(&self, game_id: &str, outcome: &Outcome) -> Result<usize> {
        if self.failing_games.contains(game_id) {
            return Err(Error::write(diesel::result::Error::RollbackTransaction));
        }
        self.inner.record_result(game_id, outcome).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn new_game(id: &str, week: i32) -> NewGame {
        NewGame {
            id: id.to_owned(),
            week,
            scheduled: Utc.with_ymd_and_hms(2025, 9, 7, 17, 0, 0).unwrap(),
            home_team: "A".to_owned(),
            away_team: "B".to_owned(),
            status: "scheduled".to_owned(),
        }
    }

    fn new_pick<'a>(user: &'a str, game: &'a str, team: &'a str) -> NewPick<'a> {
        NewPick { user_id: user, game_id: game, week: 1, picked_team: team, is_correct: None }
    }

    #[tokio::test]
    async fn schedule_refresh_keeps_winner() {
        let store = MemoryStore::new();
        store.upsert_games(&[new_game("G", 1)]).await.unwrap();
        store.record_result("G", &Outcome::Winner("A".to_owned())).await.unwrap();

        let mut refreshed = new_game("G", 1);
        refreshed.status = "closed".to_owned();
        store.upsert_games(&[refreshed]).await.unwrap();

        let game = store.game("G").await.unwrap().unwrap();
        assert_eq!(game.status, "closed");
        assert_eq!(game.winner_team.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn one_pick_per_user_and_game() {
        let store = MemoryStore::new();
        store.upsert_picks(&[new_pick("u1", "G", "A")]).await.unwrap();
        store.upsert_picks(&[new_pick("u1", "G", "B")]).await.unwrap();

        let picks = store.user_picks("u1", 1).await.unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].picked_team, "B");
    }

    #[tokio::test]
    async fn ensure_user_keeps_existing() {
        let store = MemoryStore::new();
        store.grant_admin("u1", "Ann").await;
        store.ensure_user(NewUser { id: "u1", username: "Other" }).await.unwrap();

        let user = store.user("u1").await.unwrap().unwrap();
        assert_eq!(user.username, "Ann");
        assert!(user.is_admin);
    }

    #[tokio::test]
    async fn record_result_on_missing_game() {
        let store = MemoryStore::new();
        let res = store.record_result("nope", &Outcome::Tie).await;
        assert!(matches!(res, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn pages_cover_every_pick_once() {
        let store = MemoryStore::new();
        let users = (0..5).map(|i| format!("u{i}")).collect::<Vec<_>>();
        let picks = users.iter().map(|u| new_pick(u, "G", "A")).collect::<Vec<_>>();
        store.upsert_picks(&picks).await.unwrap();

        let (first, total) = store.leaderboard_page(1, 2).await.unwrap();
        let (second, _) = store.leaderboard_page(2, 2).await.unwrap();
        let (third, _) = store.leaderboard_page(3, 2).await.unwrap();
        let (fourth, _) = store.leaderboard_page(4, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!((first.len(), second.len(), third.len(), fourth.len()), (2, 2, 1, 0));

        let rows = first.into_iter().chain(second).chain(third).collect::<Vec<_>>();
        // Pages follow the pick id, so no pick shows up twice or goes missing between pages
        assert!(rows.windows(2).all(|w| w[0].pick_id < w[1].pick_id));
        let mut seen = rows.into_iter().map(|r| r.user_id).collect::<Vec<_>>();
        seen.sort();
        assert_eq!(seen, users);
    }
}
