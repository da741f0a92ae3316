//! Background jobs, like schedule sync

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;
use tracing::{error, info, instrument};

use crate::{cmd::{player, AppContext}, error::Result, season};

/// Keeps the games of the current week in sync with the schedule provider
pub async fn task_schedule_sync(ctx: AppContext, every: Duration) -> ! {
    let mut timer = interval(every);
    loop {
        timer.tick().await;
        if let Err(e) = try_task_schedule_sync(&ctx, Utc::now()).await {
            error!("task schedule sync failed: {e}");
        }
    }
}

#[instrument(skip(ctx), err)]
async fn try_task_schedule_sync(ctx: &AppContext, now: DateTime<Utc>) -> Result<()> {
    let week = season::current_week(now);
    let (_, games) = player::sync_week(ctx, week).await?;
    info!(week, games = games.len(), "Schedule sync done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::cmd::testing::context;
    use crate::store::{MemoryStore, Store};

    #[tokio::test]
    async fn syncs_the_current_week() {
        let store = MemoryStore::new();
        let ctx = context(Arc::new(store.clone()));

        // Friday of week 2
        let now = Utc.with_ymd_and_hms(2025, 9, 12, 18, 0, 0).unwrap();
        try_task_schedule_sync(&ctx, now).await.unwrap();

        assert_eq!(store.week_games(2).await.unwrap().len(), 5);
        assert!(store.week_games(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unbundled_week_is_reported() {
        let ctx = context(Arc::new(MemoryStore::new()));
        let now = Utc.with_ymd_and_hms(2025, 12, 1, 12, 0, 0).unwrap();
        let err = try_task_schedule_sync(&ctx, now).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
