mod actor;

use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::*;
use crate::services::class_label;
use crate::state::AppState;

pub use actor::{ACTOR_GROUP, ACTOR_ID, ACTOR_PROGRAM, ACTOR_ROLE};

#[derive(Deserialize)]
struct LabelRequest {
    label: String,
}

#[derive(Serialize)]
struct ParsedLabel {
    #[serde(flatten)]
    coordinates: ClassCoordinates,
    normalized: String,
}

#[derive(Serialize)]
struct ResolvedClass {
    program: Program,
    group: u32,
}

#[derive(Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
struct StatsQuery {
    date: Option<String>,
    program_id: Option<String>,
    group: Option<u32>,
}

#[derive(Deserialize)]
struct StatsRangeQuery {
    from: Option<String>,
    to: Option<String>,
    program_id: Option<String>,
    group: Option<u32>,
}

#[derive(Deserialize)]
struct DeclareRequest {
    session_id: String,
    date: String,
    status: PresenceStatus,
    arrival_time: Option<NaiveTime>,
    comment: Option<String>,
}

#[derive(Deserialize)]
struct EditRequest {
    status: PresenceStatus,
    arrival_time: Option<NaiveTime>,
    comment: Option<String>,
}

#[derive(Deserialize)]
struct RejectRequest {
    reason: Option<String>,
}

#[derive(Deserialize)]
struct OverrideRequest {
    status: PresenceStatus,
    comment: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/class-labels/parse", post(parse_label))
        .route("/class-labels/resolve", post(resolve_label))
        .route("/programs", get(list_programs).post(create_program))
        .route("/programs/{id}/groups/{group}/sessions", get(list_sessions))
        .route("/schedule-entries", post(create_schedule_entry))
        .route("/presences", post(declare_presence))
        .route(
            "/presences/{id}",
            get(get_presence).patch(edit_presence).delete(delete_presence),
        )
        .route("/presences/{id}/confirm", post(confirm_presence))
        .route("/presences/{id}/reject", post(reject_presence))
        .route("/presences/{id}/override", post(override_presence))
        .route("/presences/{id}/history", get(presence_history))
        .route("/stats", get(stats_for_date))
        .route("/stats/range", get(stats_for_range))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn parse_label(Json(req): Json<LabelRequest>) -> Result<Json<ParsedLabel>, AppError> {
    let coordinates = class_label::parse(&req.label)?;
    let normalized = class_label::format(&coordinates);
    Ok(Json(ParsedLabel {
        coordinates,
        normalized,
    }))
}

async fn resolve_label(
    State(state): State<AppState>,
    Json(req): Json<LabelRequest>,
) -> Result<Json<ResolvedClass>, AppError> {
    let (program, group) = state.schedules().resolve_label(&req.label).await?;
    Ok(Json(ResolvedClass { program, group }))
}

async fn list_programs(State(state): State<AppState>) -> Result<Json<Vec<Program>>, AppError> {
    let programs = state.schedules().catalog().await?;
    Ok(Json(programs))
}

async fn create_program(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<NewProgramRequest>,
) -> Result<(StatusCode, Json<Program>), AppError> {
    require_admin(&actor)?;
    let program = state.schedules().add_program(req).await?;
    Ok((StatusCode::CREATED, Json(program)))
}

async fn create_schedule_entry(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<NewTemplateEntryRequest>,
) -> Result<(StatusCode, Json<TemplateEntry>), AppError> {
    require_admin(&actor)?;
    let entry = state.schedules().add_template_entry(req).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_sessions(
    State(state): State<AppState>,
    Path((program_id, group)): Path<(String, u32)>,
    Query(params): Query<DateQuery>,
) -> Result<Json<DaySchedule>, AppError> {
    let date = parse_date("date", params.date.as_deref())?;
    let schedule = state
        .schedules()
        .sessions_for_date(&program_id, group, date)
        .await?;
    Ok(Json(schedule))
}

async fn declare_presence(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<DeclareRequest>,
) -> Result<(StatusCode, Json<PresenceRecord>), AppError> {
    let date = parse_date("date", Some(&req.date))?;
    let record = state
        .presences()
        .declare(
            &req.session_id,
            date,
            req.status,
            &actor,
            req.arrival_time,
            req.comment,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_presence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PresenceRecord>, AppError> {
    let record = state.presences().find(&id).await?;
    Ok(Json(record))
}

async fn edit_presence(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<EditRequest>,
) -> Result<Json<PresenceRecord>, AppError> {
    let record = state
        .presences()
        .edit(&id, &actor, req.status, req.arrival_time, req.comment)
        .await?;
    Ok(Json(record))
}

async fn delete_presence(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.presences().delete(&id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn confirm_presence(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<PresenceRecord>, AppError> {
    let record = state.presences().confirm(&id, &actor).await?;
    Ok(Json(record))
}

async fn reject_presence(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    body: Option<Json<RejectRequest>>,
) -> Result<Json<PresenceRecord>, AppError> {
    let reason = body.and_then(|Json(req)| req.reason);
    let record = state.presences().reject(&id, &actor, reason).await?;
    Ok(Json(record))
}

async fn override_presence(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<PresenceRecord>, AppError> {
    let record = state
        .presences()
        .override_status(&id, &actor, req.status, req.comment)
        .await?;
    Ok(Json(record))
}

async fn presence_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PresenceEvent>>, AppError> {
    let events = state.presences().history(&id).await?;
    Ok(Json(events))
}

async fn stats_for_date(
    State(state): State<AppState>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<StatsReport>, AppError> {
    let date = parse_date("date", params.date.as_deref())?;
    let scope = stats_scope(params.program_id, params.group)?;
    let report = state.stats().stats_for_date(date, scope).await?;
    Ok(Json(report))
}

async fn stats_for_range(
    State(state): State<AppState>,
    Query(params): Query<StatsRangeQuery>,
) -> Result<Json<StatsReport>, AppError> {
    let from = parse_date("from", params.from.as_deref())?;
    let to = parse_date("to", params.to.as_deref())?;
    let scope = stats_scope(params.program_id, params.group)?;
    let report = state.stats().stats_for_range(from, to, scope).await?;
    Ok(Json(report))
}

fn require_admin(actor: &Actor) -> Result<(), AppError> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("catalog changes are reserved to administrators".to_string()))
    }
}

fn parse_date(field: &str, raw: Option<&str>) -> Result<NaiveDate, AppError> {
    let raw = raw.ok_or_else(|| AppError::BadRequest(format!("missing {field}")))?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("{field} must read YYYY-MM-DD, got {raw:?}")))
}

fn stats_scope(program_id: Option<String>, group: Option<u32>) -> Result<StatsScope, AppError> {
    match (program_id, group) {
        (None, None) => Ok(StatsScope::AllClasses),
        (Some(program_id), Some(group)) => Ok(StatsScope::OneClass { program_id, group }),
        _ => Err(AppError::BadRequest(
            "program_id and group go together".to_string(),
        )),
    }
}
