use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::StoreError;
use crate::options::build_option_tree;
use crate::store::db::DbHandle;
use crate::store::models::{NewPrintConfig, PrintConfig, Ticket, TicketDetail};
use crate::wiki::OptionsCatalog;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub catalog: OptionsCatalog,
    pub config: Config,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateProductionMethodRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateMaterialTypeRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateMaterialColorRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateMaterialRequest {
    pub name: String,
    pub color_id: i64,
    #[serde(default)]
    pub url: String,
    pub optimal_temp: f64,
    pub min_temp: f64,
    pub max_temp: f64,
}

#[derive(Deserialize)]
pub struct AddStockRequest {
    pub material_id: i64,
    pub label: i64,
}

#[derive(Deserialize)]
pub struct StockQuery {
    #[serde(default)]
    pub include_consumed: bool,
}

#[derive(Deserialize)]
pub struct CreateTicketRequest {
    pub message: String,
    #[serde(default)]
    pub print_configs: Vec<NewPrintConfig>,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

// ── Response view types ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct PrintConfigView {
    #[serde(flatten)]
    pub config: PrintConfig,
    pub file_name: String,
    pub file_url: Option<String>,
}

/// Ticket response with the derived URL and row count the rendering
/// layer needs, print configs included in their derived form.
#[derive(Serialize)]
pub struct TicketView {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub url: String,
    pub message_row_count: usize,
    pub print_configs: Vec<PrintConfigView>,
}

fn ticket_view(detail: TicketDetail, hostname: &str) -> TicketView {
    let print_configs = detail
        .print_configs
        .into_iter()
        .map(|config| PrintConfigView {
            file_name: config.file_name(),
            file_url: config.file_url(hostname),
            config,
        })
        .collect();
    TicketView {
        url: detail.ticket.url(hostname),
        message_row_count: detail.ticket.message_row_count(),
        ticket: detail.ticket,
        print_configs,
    }
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

/// Map store failures onto HTTP status codes via the typed error.
fn store_error(e: anyhow::Error) -> ApiError {
    match e.downcast_ref::<StoreError>() {
        Some(StoreError::LabelTaken { .. }) | Some(StoreError::UsernameTaken { .. }) => {
            ApiError::Conflict(e.to_string())
        }
        Some(StoreError::StockNotFound { .. }) => ApiError::NotFound(e.to_string()),
        Some(StoreError::InvalidReference(_)) => ApiError::BadRequest(e.to_string()),
        _ => ApiError::Internal(e.to_string()),
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/options/tree", get(get_option_tree))
        .route(
            "/api/production-methods",
            get(list_production_methods).post(create_production_method),
        )
        .route("/api/production-methods/{id}", get(get_production_method))
        .route(
            "/api/production-methods/{id}/material-types",
            get(list_material_types).post(create_material_type),
        )
        .route(
            "/api/material-colors",
            get(list_material_colors).post(create_material_color),
        )
        .route(
            "/api/material-types/{id}/materials",
            get(list_materials).post(create_material),
        )
        .route("/api/stock", get(list_stock).post(add_stock))
        .route("/api/stock/{label}/consume", post(consume_stock))
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/{id}", get(get_ticket))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", get(get_user))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn get_option_tree(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let catalog = state.catalog.clone();
    let tree = state
        .db
        .call(move |db| build_option_tree(db, &catalog))
        .await
        .map_err(store_error)?;
    Ok(Json(tree))
}

async fn list_production_methods(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let methods = state
        .db
        .call(|db| db.list_production_methods())
        .await
        .map_err(store_error)?;
    Ok(Json(methods))
}

async fn create_production_method(
    State(state): State<SharedState>,
    Json(req): Json<CreateProductionMethodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let method = state
        .db
        .call(move |db| db.create_production_method(&req.name))
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(method)))
}

async fn get_production_method(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let method = state
        .db
        .call(move |db| db.get_production_method(id))
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Production method {} not found", id)))?;
    Ok(Json(method))
}

async fn list_material_types(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .call(move |db| db.get_production_method(id))
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Production method {} not found", id)))?;
    let types = state
        .db
        .call(move |db| db.list_material_types(id))
        .await
        .map_err(store_error)?;
    Ok(Json(types))
}

async fn create_material_type(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<CreateMaterialTypeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mat_type = state
        .db
        .call(move |db| db.create_material_type(id, &req.name))
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(mat_type)))
}

async fn list_material_colors(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let colors = state
        .db
        .call(|db| db.list_material_colors())
        .await
        .map_err(store_error)?;
    Ok(Json(colors))
}

async fn create_material_color(
    State(state): State<SharedState>,
    Json(req): Json<CreateMaterialColorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let color = state
        .db
        .call(move |db| db.create_material_color(&req.name))
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(color)))
}

async fn list_materials(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .call(move |db| db.get_material_type(id))
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Material type {} not found", id)))?;
    let materials = state
        .db
        .call(move |db| db.list_materials(id))
        .await
        .map_err(store_error)?;
    Ok(Json(materials))
}

async fn create_material(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<CreateMaterialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let material = state
        .db
        .call(move |db| {
            db.create_material(
                id,
                req.color_id,
                &req.name,
                &req.url,
                req.optimal_temp,
                req.min_temp,
                req.max_temp,
            )
        })
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(material)))
}

async fn list_stock(
    State(state): State<SharedState>,
    Query(query): Query<StockQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .db
        .call(move |db| db.list_stock(query.include_consumed))
        .await
        .map_err(store_error)?;
    Ok(Json(items))
}

async fn add_stock(
    State(state): State<SharedState>,
    Json(req): Json<AddStockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let stock = state
        .db
        .call(move |db| db.add_stock(req.material_id, req.label))
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(stock)))
}

async fn consume_stock(
    State(state): State<SharedState>,
    Path(label): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let stock = state
        .db
        .call(move |db| db.consume_stock(label))
        .await
        .map_err(store_error)?;
    Ok(Json(stock))
}

async fn list_tickets(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let tickets = state
        .db
        .call(|db| db.list_tickets())
        .await
        .map_err(store_error)?;
    Ok(Json(tickets))
}

async fn create_ticket(
    State(state): State<SharedState>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.message.trim().is_empty() && req.print_configs.is_empty() {
        return Err(ApiError::BadRequest(
            "A ticket needs a message or at least one print config".to_string(),
        ));
    }
    let detail = state
        .db
        .call(move |db| db.create_ticket(&req.message, &req.print_configs))
        .await
        .map_err(store_error)?;
    Ok((
        StatusCode::CREATED,
        Json(ticket_view(detail, &state.config.hostname)),
    ))
}

async fn get_ticket(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .db
        .call(move |db| db.get_ticket_detail(id))
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Ticket {} not found", id)))?;
    Ok(Json(ticket_view(detail, &state.config.hostname)))
}

async fn list_users(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .call(|db| db.list_users())
        .await
        .map_err(store_error)?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<SharedState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .call(move |db| db.create_user(&req.username))
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .call(move |db| db.get_user(id))
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))?;
    Ok(Json(user))
}
