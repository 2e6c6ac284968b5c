use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use common::EventKind;
use common::event_kind::parse_kind_list;
use tracing::instrument;
use wcl::ReportCode;

use crate::entity::report;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::ingest::Accepted;
use crate::models::report::*;
use crate::models::shared::Pagination;
use crate::state::AppState;
use crate::store::ReportQueries;

const DEFAULT_EVENT_LIMIT: u64 = 100;
const MAX_EVENT_LIMIT: u64 = 1000;

fn parse_code(input: &str) -> Result<ReportCode, AppError> {
    ReportCode::parse(input).map_err(|e| AppError::Validation(e.to_string()))
}

async fn find_report(state: &AppState, code: &ReportCode) -> Result<report::Model, AppError> {
    ReportQueries::new(&state.db)
        .report_by_code(code.as_str())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {code} not found")))
}

#[utoipa::path(
    post,
    path = "/ingest",
    tag = "Reports",
    operation_id = "ingestReport",
    summary = "Start ingesting a report",
    description = "Accepts a report code or report URL and starts ingestion in the background. Any previously stored copy of the report is replaced. Progress and outcome are available from the ingest status endpoint.",
    request_body = IngestRequest,
    responses(
        (status = 202, description = "Ingestion accepted", body = Accepted),
        (status = 400, description = "Invalid report identifier (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Report is already being ingested (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn ingest_report(
    State(state): State<AppState>,
    AppJson(payload): AppJson<IngestRequest>,
) -> Result<(StatusCode, Json<Accepted>), AppError> {
    let accepted = state.ingest.trigger(&payload.report).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Reports",
    operation_id = "listReports",
    summary = "List stored reports",
    description = "Returns a paginated list of stored reports, most recently created first.",
    params(ReportListQuery),
    responses(
        (status = 200, description = "List of reports", body = ReportListResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportListQuery>,
) -> Result<Json<ReportListResponse>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let (reports, total) = ReportQueries::new(&state.db)
        .list_reports(page, per_page)
        .await?;

    Ok(Json(ReportListResponse {
        data: reports.into_iter().map(Into::into).collect(),
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/{code}",
    tag = "Reports",
    operation_id = "getReport",
    summary = "Get a stored report",
    description = "Returns the report with its fights, players and stored event counts per kind.",
    params(("code" = String, Path, description = "Report code")),
    responses(
        (status = 200, description = "Report details", body = ReportDetailResponse),
        (status = 400, description = "Invalid report code (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Report not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_report(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ReportDetailResponse>, AppError> {
    let code = parse_code(&code)?;
    let model = find_report(&state, &code).await?;

    let queries = ReportQueries::new(&state.db);
    let fights = queries.fights(model.id).await?;
    let players = queries.players(model.id).await?;
    let event_counts = queries.event_counts_for_report(model.id).await?;

    Ok(Json(ReportDetailResponse {
        report: model.into(),
        fights: fights.into_iter().map(Into::into).collect(),
        players: players.into_iter().map(Into::into).collect(),
        event_counts,
    }))
}

#[utoipa::path(
    delete,
    path = "/{code}",
    tag = "Reports",
    operation_id = "deleteReport",
    summary = "Delete a stored report",
    description = "Deletes the report and everything it owns in one transaction. Refused while the report is being ingested.",
    params(("code" = String, Path, description = "Report code")),
    responses(
        (status = 204, description = "Report deleted"),
        (status = 400, description = "Invalid report code (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Report not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Report is being ingested (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_report(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    let code = parse_code(&code)?;
    if !state.ingest.delete_report(&code).await? {
        return Err(AppError::NotFound(format!("Report {code} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/{code}/ingest",
    tag = "Reports",
    operation_id = "getIngestStatus",
    summary = "Get ingestion status",
    description = "Returns the live phase of a running ingestion (if any) and the most recent run record with its summary or error.",
    params(("code" = String, Path, description = "Report code")),
    responses(
        (status = 200, description = "Ingestion status", body = IngestStatusResponse),
        (status = 400, description = "Invalid report code (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "No ingestion was ever started (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_ingest_status(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<IngestStatusResponse>, AppError> {
    let code = parse_code(&code)?;
    let phase = state.ingest.registry().phase_of(code.as_str());
    let last_run = ReportQueries::new(&state.db)
        .latest_run(code.as_str())
        .await?;

    if phase.is_none() && last_run.is_none() {
        return Err(AppError::NotFound(format!(
            "No ingestion recorded for report {code}"
        )));
    }

    Ok(Json(IngestStatusResponse {
        report_code: code.to_string(),
        phase,
        last_run: last_run.map(Into::into),
    }))
}

#[utoipa::path(
    get,
    path = "/{code}/fights/{fight_id}/events",
    tag = "Reports",
    operation_id = "listFightEvents",
    summary = "List events of a fight",
    description = "Returns stored events of one fight ordered by timestamp, optionally filtered by kind. Use `skip` and `limit` to page through long fights.",
    params(
        ("code" = String, Path, description = "Report code"),
        ("fight_id" = i32, Path, description = "Provider fight id"),
        FightEventsQuery,
    ),
    responses(
        (status = 200, description = "Fight events", body = FightEventsResponse),
        (status = 400, description = "Invalid code, kind or paging (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Report or fight not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_fight_events(
    State(state): State<AppState>,
    Path((code, fight_id)): Path<(String, i32)>,
    Query(query): Query<FightEventsQuery>,
) -> Result<Json<FightEventsResponse>, AppError> {
    let code = parse_code(&code)?;

    let mut kinds = parse_kind_list(query.kinds.as_deref().unwrap_or(""))
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if kinds.is_empty() {
        kinds = EventKind::ALL.to_vec();
    }
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    if limit == 0 || limit > MAX_EVENT_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_EVENT_LIMIT}"
        )));
    }

    let model = find_report(&state, &code).await?;
    let queries = ReportQueries::new(&state.db);
    let fight = queries
        .fight_by_external_id(model.id, fight_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Fight {fight_id} not found in {code}")))?;

    let rows = queries.fight_events(fight.id, &kinds, skip, limit).await?;
    let totals = queries.event_counts_for_fight(fight.id).await?;

    Ok(Json(FightEventsResponse {
        fight_id,
        kinds,
        skip,
        limit,
        totals,
        data: rows.into_iter().map(Into::into).collect(),
    }))
}
