//! HTTP request handlers for API endpoints

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::NaiveDate;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::error::ApiError;
use super::state::{AppState, OutputEnvelope, SessionEntry};
use crate::analytics::SymbolMetrics;
use crate::renderers::{DetailTable, RenderOutput, RendererKind, SortDirection, TableColumn};
use crate::selection::SelectionState;
use crate::session::DashboardConfig;
use crate::symbol::Symbol;
use crate::time_series::DateRange;

/// Health check endpoint
///
/// Returns a simple status response to verify the server is running
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "rows": state.table.len(),
    }))
}

/// Response for symbol listing
#[derive(Debug, Serialize)]
pub struct SymbolsResponse {
    pub symbols: Vec<SymbolMetrics>,
    pub date_range: Option<DateRange>,
}

/// GET /symbols - Per-symbol whole-history metrics
pub async fn list_symbols(State(state): State<Arc<AppState>>) -> Json<SymbolsResponse> {
    Json(SymbolsResponse {
        symbols: state.table.symbol_metrics().to_vec(),
        date_range: state.table.date_bounds(),
    })
}

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidParameter("Invalid session ID".to_string()))
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    Ok(NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")?)
}

/// Request body for session creation
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Overrides the configured number of initially active symbols
    pub top_n: Option<usize>,
}

impl CreateSessionRequest {
    /// An absent or blank body selects the server defaults; anything else
    /// must be a valid request object.
    fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(CreateSessionRequest::default());
        }
        serde_json::from_slice(body)
            .map_err(|err| ApiError::InvalidParameter(format!("Invalid session request: {}", err)))
    }
}

/// Session description returned by session endpoints
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub selection: SelectionState,
    pub created_at: String,
    pub stream_url: String,
}

impl SessionResponse {
    fn from_entry(entry: &SessionEntry) -> Self {
        SessionResponse {
            session_id: entry.id.to_string(),
            selection: entry.session.selection().clone(),
            created_at: entry.created_at.to_rfc3339(),
            stream_url: entry.stream_url(),
        }
    }
}

/// POST /sessions - Create a new dashboard session
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let request = CreateSessionRequest::from_body(&body)?;

    let mut sessions = state.sessions.write().await;
    if sessions.len() >= state.max_sessions {
        return Err(ApiError::SessionLimitReached);
    }

    let config = DashboardConfig {
        top_n: request.top_n.unwrap_or(state.dashboard.top_n),
        ..state.dashboard.clone()
    };
    let entry = SessionEntry::new(state.table.clone(), &config)?;
    let response = SessionResponse::from_entry(&entry);

    tracing::info!(
        session_id = %entry.id,
        active = entry.session.selection().active_symbols().len(),
        "Created dashboard session"
    );
    sessions.insert(entry.id, entry);

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /sessions/{session_id} - Current selection of a session
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session_id = parse_session_id(&session_id)?;

    let sessions = state.sessions.read().await;
    let entry = sessions
        .get(&session_id)
        .ok_or(ApiError::SessionNotFound(session_id))?;

    Ok(Json(SessionResponse::from_entry(entry)))
}

/// DELETE /sessions/{session_id} - Close a session and its streams
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session_id = parse_session_id(&session_id)?;

    let mut sessions = state.sessions.write().await;
    sessions
        .remove(&session_id)
        .ok_or(ApiError::SessionNotFound(session_id))?;

    tracing::info!(%session_id, "Closed dashboard session");

    Ok(Json(json!({
        "session_id": session_id.to_string(),
        "status": "closed",
    })))
}

/// Response after an accepted selection event
#[derive(Debug, Serialize)]
pub struct SelectionUpdateResponse {
    pub session_id: String,
    pub version: u64,
    pub selection: SelectionState,
}

/// Applies `event` to a session and reports the resulting selection.
async fn update_session<F>(
    state: &AppState,
    session_id: &str,
    event: F,
) -> Result<Json<SelectionUpdateResponse>, ApiError>
where
    F: FnOnce(&mut SessionEntry) -> Result<u64, ApiError>,
{
    let session_id = parse_session_id(session_id)?;

    let mut sessions = state.sessions.write().await;
    let entry = sessions
        .get_mut(&session_id)
        .ok_or(ApiError::SessionNotFound(session_id))?;

    let version = event(entry)?;

    Ok(Json(SelectionUpdateResponse {
        session_id: session_id.to_string(),
        version,
        selection: entry.session.selection().clone(),
    }))
}

/// POST /sessions/{session_id}/toggle/{symbol} - Toggle a symbol
pub async fn toggle_symbol(
    State(state): State<Arc<AppState>>,
    Path((session_id, symbol)): Path<(String, String)>,
) -> Result<Json<SelectionUpdateResponse>, ApiError> {
    let symbol = Symbol::new(symbol)?;
    update_session(&state, &session_id, |entry| {
        Ok(entry.session.on_toggle_symbol(&symbol)?)
    })
    .await
}

/// Request body for a date range change
#[derive(Debug, Deserialize)]
pub struct DateRangeRequest {
    pub start: String,
    pub end: String,
}

/// PUT /sessions/{session_id}/range - Replace the date range
pub async fn set_date_range(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<DateRangeRequest>,
) -> Result<Json<SelectionUpdateResponse>, ApiError> {
    let start = parse_date(&request.start)?;
    let end = parse_date(&request.end)?;
    update_session(&state, &session_id, |entry| {
        Ok(entry.session.on_set_date_range(start, end)?)
    })
    .await
}

/// POST /sessions/{session_id}/select-all - Activate every symbol
pub async fn select_all(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SelectionUpdateResponse>, ApiError> {
    update_session(&state, &session_id, |entry| Ok(entry.session.on_select_all())).await
}

/// POST /sessions/{session_id}/clear - Deactivate every symbol
pub async fn clear_selection(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SelectionUpdateResponse>, ApiError> {
    update_session(&state, &session_id, |entry| Ok(entry.session.on_clear())).await
}

async fn render_for(
    state: &AppState,
    session_id: &str,
    kind: RendererKind,
) -> Result<Json<OutputEnvelope>, ApiError> {
    let session_id = parse_session_id(session_id)?;

    let sessions = state.sessions.read().await;
    let entry = sessions
        .get(&session_id)
        .ok_or(ApiError::SessionNotFound(session_id))?;

    Ok(Json(OutputEnvelope {
        version: entry.session.version(),
        output: entry.session.render(kind),
    }))
}

/// GET /sessions/{session_id}/summary - Summary statistics
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<OutputEnvelope>, ApiError> {
    render_for(&state, &session_id, RendererKind::Summary).await
}

/// GET /sessions/{session_id}/price - Price evolution chart data
pub async fn get_price_evolution(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<OutputEnvelope>, ApiError> {
    render_for(&state, &session_id, RendererKind::PriceEvolution).await
}

/// GET /sessions/{session_id}/volatility - Volatility per symbol
pub async fn get_volatility(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<OutputEnvelope>, ApiError> {
    render_for(&state, &session_id, RendererKind::VolatilityBars).await
}

/// GET /sessions/{session_id}/scatter - Return versus volatility
pub async fn get_scatter(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<OutputEnvelope>, ApiError> {
    render_for(&state, &session_id, RendererKind::ReturnVolatility).await
}

/// Query parameters for the detail table
#[derive(Debug, Default, Deserialize)]
pub struct TableQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
}

fn parse_direction(raw: Option<&str>) -> Result<SortDirection, ApiError> {
    match raw.map(|value| value.trim().to_lowercase()) {
        None => Ok(SortDirection::Ascending),
        Some(value) => match value.as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            _ => Err(ApiError::InvalidParameter(format!(
                "Invalid sort direction: {}",
                value
            ))),
        },
    }
}

/// GET /sessions/{session_id}/table - Detail table with optional search and sort
pub async fn get_table(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<TableQuery>,
) -> Result<Json<OutputEnvelope>, ApiError> {
    let sort = query
        .sort
        .as_deref()
        .map(|raw| {
            TableColumn::from_str(raw)
                .ok_or_else(|| ApiError::InvalidParameter(format!("Unknown sort column: {}", raw)))
        })
        .transpose()?;
    let direction = parse_direction(query.direction.as_deref())?;

    let session_id = parse_session_id(&session_id)?;
    let sessions = state.sessions.read().await;
    let entry = sessions
        .get(&session_id)
        .ok_or(ApiError::SessionNotFound(session_id))?;

    let mut table = DetailTable::from_view(&entry.session.current_view());
    if let Some(search) = query.search.as_deref() {
        table = table.search(search);
    }
    if let Some(column) = sort {
        table = table.sorted_by(column, direction);
    }

    Ok(Json(OutputEnvelope {
        version: entry.session.version(),
        output: RenderOutput::DetailTable(table),
    }))
}

/// GET /sessions/{session_id}/stream - SSE stream of rendered outputs
///
/// Sends a `connected` event with the current version, then one event per
/// output kind for every accepted selection change. The stream ends when the
/// session is closed.
pub async fn handle_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let mut updates = state.subscribe(session_id).await?;

    let version = {
        let sessions = state.sessions.read().await;
        sessions
            .get(&session_id)
            .map(|entry| entry.session.version())
            .ok_or(ApiError::SessionNotFound(session_id))?
    };

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("connected")
            .data(json!({ "session_id": session_id.to_string(), "version": version }).to_string()));

        loop {
            match updates.recv().await {
                Ok(update) => {
                    let kind = update.output.kind();
                    match Event::default().event(kind.as_str()).json_data(&update) {
                        Ok(event) => yield Ok(event),
                        Err(err) => tracing::warn!(%session_id, %kind, error = %err, "Failed to encode stream event"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%session_id, skipped, "Stream subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
