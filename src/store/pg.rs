//! PostgreSQL store, through an async deadpool of diesel connections.

use async_trait::async_trait;
use diesel::{dsl::now, prelude::*, upsert::excluded};
use diesel_async::{
    pooled_connection::{
        deadpool::{Object, Pool},
        AsyncDieselConnectionManager,
    },
    scoped_futures::ScopedFutureExt,
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use tracing::{debug, info, instrument};

use crate::config::DbConfig;
use crate::error::{Error, Result};
use crate::models::*;
use crate::paginate::Paginate;
use super::Store;

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<AsyncPgConnection>,
}

impl PgStore {
    pub fn connect(config: &DbConfig) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to postgres...");
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
        let pool = Pool::builder(manager).build()?;
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<Object<AsyncPgConnection>> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self), err)]
    async fn user(&self, id: &str) -> Result<Option<User>> {
        let mut conn = self.conn().await?;
        let user = users::table
            .find(id)
            .select(User::as_select())
            .first(&mut *conn)
            .await
            .optional()?;
        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn ensure_user(&self, user: NewUser<'_>) -> Result<()> {
        let mut conn = self.conn().await.map_err(Error::write)?;
        diesel::insert_into(users::table)
            .values(&user)
            .on_conflict(users::id)
            .do_nothing()
            .execute(&mut *conn)
            .await
            .map_err(Error::write)?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn game(&self, id: &str) -> Result<Option<Game>> {
        let mut conn = self.conn().await?;
        let game = games::table
            .find(id)
            .select(Game::as_select())
            .first(&mut *conn)
            .await
            .optional()?;
        Ok(game)
    }

    #[instrument(skip(self), err)]
    async fn week_games(&self, week: i32) -> Result<Vec<Game>> {
        let mut conn = self.conn().await?;
        let games = games::table
            .filter(games::week.eq(week))
            .order_by((games::scheduled, games::id))
            .select(Game::as_select())
            .load(&mut *conn)
            .await?;
        Ok(games)
    }

    #[instrument(skip_all, fields(games = games.len()), err)]
    async fn upsert_games(&self, games: &[NewGame]) -> Result<()> {
        if games.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await.map_err(Error::write)?;
        diesel::insert_into(games::table)
            .values(games)
            .on_conflict(games::id)
            .do_update()
            .set((
                games::week.eq(excluded(games::week)),
                games::scheduled.eq(excluded(games::scheduled)),
                games::home_team.eq(excluded(games::home_team)),
                games::away_team.eq(excluded(games::away_team)),
                games::status.eq(excluded(games::status)),
                games::updated_at.eq(now),
            ))
            .execute(&mut *conn)
            .await
            .map_err(Error::write)?;
        Ok(())
    }

    #[instrument(skip_all, fields(picks = picks.len()), err)]
    async fn upsert_picks(&self, picks: &[NewPick<'_>]) -> Result<()> {
        if picks.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await.map_err(Error::write)?;
        diesel::insert_into(picks::table)
            .values(picks)
            .on_conflict((picks::user_id, picks::game_id))
            .do_update()
            .set((
                picks::week.eq(excluded(picks::week)),
                picks::picked_team.eq(excluded(picks::picked_team)),
                picks::is_correct.eq(excluded(picks::is_correct)),
                picks::updated_at.eq(now),
            ))
            .execute(&mut *conn)
            .await
            .map_err(Error::write)?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn user_picks(&self, user_id: &str, week: i32) -> Result<Vec<Pick>> {
        let mut conn = self.conn().await?;
        let picks = picks::table
            .filter(picks::user_id.eq(user_id))
            .filter(picks::week.eq(week))
            .select(Pick::as_select())
            .load(&mut *conn)
            .await?;
        Ok(picks)
    }

    #[instrument(skip(self), err)]
    async fn week_picks(&self, week: i32) -> Result<Vec<Pick>> {
        let mut conn = self.conn().await?;
        let picks = picks::table
            .filter(picks::week.eq(week))
            .order_by(picks::id)
            .select(Pick::as_select())
            .load(&mut *conn)
            .await?;
        Ok(picks)
    }

    #[instrument(skip(self), err)]
    async fn leaderboard_page(&self, page: i64, per_page: i64) -> Result<(Vec<LeaderboardRow>, i64)> {
        let mut conn = self.conn().await?;
        let (rows, count) = picks::table
            .left_join(users::table)
            .select((picks::id, picks::user_id, users::username.nullable(), picks::is_correct))
            .paginate_by("id", page)
            .per_page(per_page)
            .load_and_count::<LeaderboardRow>(&mut *conn)
            .await?;
        debug!(rows = rows.len(), count, "Loaded leaderboard page");
        Ok((rows, count))
    }

    #[instrument(skip(self), err)]
    async fn decided_picks(&self) -> Result<Vec<DecidedPick>> {
        let mut conn = self.conn().await?;
        let picks = picks::table
            .filter(picks::is_correct.is_not_null())
            .select((picks::picked_team, picks::is_correct.assume_not_null()))
            .load::<DecidedPick>(&mut *conn)
            .await?;
        Ok(picks)
    }

    #[instrument(skip(self), err)]
    async fn pickers(&self, game_id: &str, team: &str) -> Result<Vec<PickerRow>> {
        let mut conn = self.conn().await?;
        let pickers = picks::table
            .left_join(users::table)
            .filter(picks::game_id.eq(game_id))
            .filter(picks::picked_team.eq(team))
            .order_by((picks::created_at, picks::user_id))
            .select((picks::user_id, users::username.nullable()))
            .load::<PickerRow>(&mut *conn)
            .await?;
        Ok(pickers)
    }

    #[instrument(skip(self), err)]
    async fn record_result(&self, game_id: &str, outcome: &Outcome) -> Result<usize> {
        let mut conn = self.conn().await.map_err(Error::write)?;
        let game_id = game_id.to_owned();
        let outcome = outcome.clone();

        conn.transaction::<_, Error, _>(|conn| {
            async move {
                let updated = diesel::update(games::table.find(&game_id))
                    .set((
                        games::winner_team.eq(outcome.as_str()),
                        games::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .await
                    .map_err(Error::write)?;
                if updated == 0 {
                    return Err(Error::NotFound(format!("Game {game_id}")));
                }

                // Correctness is recomputed from the pick itself, so replaying is harmless
                let game_picks = picks::table.filter(picks::game_id.eq(&game_id));
                let rescored = match &outcome {
                    Outcome::Winner(team) => diesel::update(game_picks)
                        .set((
                            picks::is_correct.eq(picks::picked_team.eq(team).nullable()),
                            picks::updated_at.eq(now),
                        ))
                        .execute(conn)
                        .await,
                    Outcome::Tie => diesel::update(game_picks)
                        .set((picks::is_correct.eq(None::<bool>), picks::updated_at.eq(now)))
                        .execute(conn)
                        .await,
                }
                .map_err(Error::write)?;

                Ok(rescored)
            }
            .scope_boxed()
        })
        .await
    }
}
