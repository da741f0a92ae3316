/*!
 * Access to the relational store holding users, games and picks
 */

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn user(&self, id: &str) -> Result<Option<User>>;

    /// Creates the user unless it already exists. An existing user is left untouched.
    async fn ensure_user(&self, user: NewUser<'_>) -> Result<()>;

    async fn game(&self, id: &str) -> Result<Option<Game>>;

    /// Games of a week, by kickoff
    async fn week_games(&self, week: i32) -> Result<Vec<Game>>;

    /// Inserts or refreshes schedule data. Recorded winners are kept.
    async fn upsert_games(&self, games: &[NewGame]) -> Result<()>;

    /// Inserts or replaces picks, keyed on (user, game)
    async fn upsert_picks(&self, picks: &[NewPick<'_>]) -> Result<()>;

    async fn user_picks(&self, user_id: &str, week: i32) -> Result<Vec<Pick>>;

    async fn week_picks(&self, week: i32) -> Result<Vec<Pick>>;

    /// One page (1-based) of every pick joined with its user, and the total number of picks
    async fn leaderboard_page(&self, page: i64, per_page: i64) -> Result<(Vec<LeaderboardRow>, i64)>;

    /// Picks of all weeks whose correctness is known
    async fn decided_picks(&self) -> Result<Vec<DecidedPick>>;

    async fn pickers(&self, game_id: &str, team: &str) -> Result<Vec<PickerRow>>;

    /// Stores the outcome of a game and rescores all its picks, returning how many were rescored.
    ///
    /// Both writes succeed or fail together. Fails with `NotFound` if the game does not exist.
    async fn record_result(&self, game_id: &str, outcome: &Outcome) -> Result<usize>;
}
