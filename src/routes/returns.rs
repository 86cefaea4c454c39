use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{post, put},
};
use uuid::Uuid;

use crate::{
    dto::returns::{CreateReturnRequest, UpdateReturnStatusRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::ReturnRequest,
    response::ApiResponse,
    services::return_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_return))
        .route("/{id}", put(update_return))
}

#[utoipa::path(
    post,
    path = "/api/returns",
    request_body = CreateReturnRequest,
    responses(
        (status = 200, description = "Open a return for an order", body = ApiResponse<ReturnRequest>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Returns"
)]
pub async fn create_return(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateReturnRequest>,
) -> AppResult<Json<ApiResponse<ReturnRequest>>> {
    let resp = return_service::create_return(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/returns/{id}",
    params(
        ("id" = Uuid, Path, description = "Return ID")
    ),
    request_body = UpdateReturnStatusRequest,
    responses(
        (status = 200, description = "Update a return; confirming permanently deletes the order", body = ApiResponse<ReturnRequest>),
        (status = 400, description = "Return already confirmed"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Returns"
)]
pub async fn update_return(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReturnStatusRequest>,
) -> AppResult<Json<ApiResponse<ReturnRequest>>> {
    let resp = return_service::update_return_status(&state, &user, id, payload.status).await?;
    Ok(Json(resp))
}
