use axum::{
    Json, Router,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::{
    dto::notifications::{NotificationEvent, NotificationList},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::Notification,
    response::{ApiResponse, Meta},
    routes::params::NotificationQuery,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/ws", get(notifications_ws))
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(
        ("user_id" = Uuid, Query, description = "Owner to look up"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List a user's stored notifications (admin only)", body = ApiResponse<NotificationList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<ApiResponse<NotificationList>>> {
    ensure_admin(&user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let items: Vec<Notification> = sqlx::query_as(
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(query.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
        .bind(query.user_id)
        .fetch_one(&state.pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(Json(ApiResponse::success(
        "OK",
        NotificationList { items },
        Some(meta),
    )))
}

/// Upgrade to the live channel. Each connection joins the group keyed by
/// the caller's own id; every session in the group receives every
/// broadcast to that owner.
#[utoipa::path(
    get,
    path = "/api/notifications/ws",
    responses(
        (status = 101, description = "Switching protocols"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn notifications_ws(
    State(state): State<AppState>,
    user: AuthUser,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| notification_session(state, user.user_id, socket))
}

async fn notification_session(state: AppState, owner_id: Uuid, mut socket: WebSocket) {
    let mut events = state.bus.join(owner_id).await;
    tracing::debug!(user_id = %owner_id, "notification session joined");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(notification) => {
                        let frame = NotificationEvent {
                            event: "new_notification",
                            notification: &notification,
                        };
                        let body = match serde_json::to_string(&frame) {
                            Ok(body) => body,
                            Err(err) => {
                                tracing::warn!(error = %err, "notification frame failed to serialize");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(body.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(user_id = %owner_id, skipped, "notification stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            frame = socket.recv() => {
                match frame {
                    // The channel is push-only; inbound frames other than
                    // close are ignored.
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(events);
    state.bus.leave(owner_id).await;
    tracing::debug!(user_id = %owner_id, "notification session left");
}
