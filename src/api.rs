/*!
 * HTTP surface: JSON routes over the operation handlers
 */

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_derive::Deserialize;
use serde_json::{json, Value};

use crate::cmd::{admin, player, AppContext};
use crate::error::{Error, Result};
use crate::extensions::{Caller, HeaderMapExt};

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/admin/check", get(admin_check))
        .route("/api/admin/update-winner", post(update_winner))
        .route("/api/update-results", post(update_results))
        .route("/api/save-picks", post(save_picks))
        .route("/api/picks", get(picks))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/trends", get(trends))
        .route("/api/team-pickers", get(team_pickers))
        .route("/api/games", get(games))
        .with_state(ctx)
}

fn caller(headers: &HeaderMap) -> Result<Caller> {
    headers.caller().ok_or(Error::Unauthorized)
}

/// Unwraps a JSON body, turning axum's rejection into our own error shape
fn body<T: DeserializeOwned>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload.map(|Json(t)| t).map_err(|e| Error::InvalidInput(e.body_text()))
}

fn required<T>(value: Option<T>, name: &str) -> Result<T> {
    value.ok_or_else(|| Error::InvalidInput(format!("{name} is required")))
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    user_id: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct WeekQuery {
    week: Option<i32>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct PickersQuery {
    game_id: Option<String>,
    picked_team: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct UpdateWinner {
    game_id: Option<String>,
    winner_team: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct UpdateResults {
    week: Option<i32>,
    #[serde(default)]
    game_results: Vec<admin::GameResult>,
}

#[derive(Deserialize, Debug, Default)]
struct SavePicks {
    week: Option<i32>,
    #[serde(default)]
    picks: Vec<player::PickInput>,
}

async fn admin_check(State(ctx): State<AppContext>, Query(q): Query<UserQuery>) -> Json<Value> {
    let is_admin = admin::is_admin(&ctx, q.user_id.as_deref()).await;
    Json(json!({ "isAdmin": is_admin }))
}

async fn update_winner(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    payload: std::result::Result<Json<UpdateWinner>, JsonRejection>,
) -> Result<Json<Value>> {
    let caller = caller(&headers)?;
    admin::require_admin(&ctx, Some(&caller.id)).await?;

    let req = body(payload)?;
    let game_id = required(req.game_id, "gameId")?;
    let winner = required(req.winner_team, "winnerTeam")?;
    let rescored = admin::record_result(&ctx, &game_id, None, &winner).await?;

    Ok(Json(json!({ "success": true, "rescored": rescored })))
}

async fn update_results(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    payload: std::result::Result<Json<UpdateResults>, JsonRejection>,
) -> Result<Response> {
    let caller = caller(&headers)?;
    admin::require_admin(&ctx, Some(&caller.id)).await?;

    let req = body(payload)?;
    let week = required(req.week, "week")?;
    let report = admin::record_results(&ctx, week, &req.game_results).await?;

    let status = if report.is_success() {
        StatusCode::OK
    } else {
        report.first_error.as_ref().map_or(StatusCode::INTERNAL_SERVER_ERROR, Error::status)
    };
    Ok((status, Json(report)).into_response())
}

async fn save_picks(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    payload: std::result::Result<Json<SavePicks>, JsonRejection>,
) -> Result<Json<Value>> {
    let caller = caller(&headers)?;
    let req = body(payload)?;
    let week = required(req.week, "week")?;
    let saved = player::submit_picks(&ctx, &caller, week, &req.picks).await?;

    Ok(Json(json!({ "success": true, "saved": saved })))
}

async fn picks(State(ctx): State<AppContext>, headers: HeaderMap, Query(q): Query<WeekQuery>) -> Result<Json<Value>> {
    let caller = caller(&headers)?;
    let week = required(q.week, "week")?;
    let picks = player::user_picks(&ctx, &caller.id, week).await?;
    Ok(Json(json!({ "picks": picks })))
}

async fn leaderboard(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(player::leaderboard(&ctx).await)
}

async fn trends(State(ctx): State<AppContext>, Query(q): Query<WeekQuery>) -> impl IntoResponse {
    Json(player::trends(&ctx, q.week.unwrap_or(1)).await)
}

async fn team_pickers(State(ctx): State<AppContext>, Query(q): Query<PickersQuery>) -> Result<impl IntoResponse> {
    let game_id = q.game_id.unwrap_or_default();
    let team = q.picked_team.unwrap_or_default();
    Ok(Json(player::team_pickers(&ctx, &game_id, &team).await?))
}

async fn games(State(ctx): State<AppContext>, Query(q): Query<WeekQuery>) -> Result<impl IntoResponse> {
    let week = required(q.week, "week")?;
    Ok(Json(player::week_games(&ctx, week).await?))
}
