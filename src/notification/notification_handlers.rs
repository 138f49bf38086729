use crate::{
    error::{AppError, Result},
    feed::{FeedSnapshot, NotificationFeed, NotificationSource},
    middleware::AuthUser,
    state::AppState,
    websocket::SessionSignal,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    Json,
};
use chrono::Utc;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use validator::Validate;

use super::notification_dto::{CreateNotificationRequest, UpdateNotificationStatusRequest};
use super::notification_models::{Notification, AUDIENCE_ALL};

/// Get the authenticated user's notification feed: visible rows with read
/// flags, the unread count, and whether the list is in sync with the store
#[utoipa::path(
    get,
    path = "/api/notifications",
    responses(
        (status = 200, description = "Current feed snapshot", body = FeedSnapshot),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn get_notifications(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<FeedSnapshot>> {
    let mut feed = NotificationFeed::new(
        state.notifications.clone(),
        state.read_store.clone(),
        ctx.viewer(),
    );
    // A failed fetch degrades to an empty stale snapshot rather than an
    // error response; the snapshot reports it and the client shows a notice.
    let _ = feed.refresh().await;

    Ok(Json(feed.snapshot()))
}

/// Mark one notification as read. A purely local write; succeeds whether or
/// not the id is currently visible, and marking twice is a no-op.
#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    params(
        ("id" = i64, Path, description = "Notification ID")
    ),
    responses(
        (status = 204, description = "Notification marked as read"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(notification_id): Path<i64>,
) -> Result<StatusCode> {
    let mut ids = state.read_store.load(ctx.user_id);
    if ids.insert(notification_id) {
        state.read_store.save(ctx.user_id, &ids)?;
        state
            .sessions
            .notify(&ctx.user_id, SessionSignal::ReadStateChanged);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Mark every currently visible notification as read in one write
#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "Updated feed snapshot", body = FeedSnapshot),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Notification store unavailable")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<FeedSnapshot>> {
    let mut feed = NotificationFeed::new(
        state.notifications.clone(),
        state.read_store.clone(),
        ctx.viewer(),
    );
    // "All" means all currently visible, so this one cannot degrade.
    feed.refresh().await?;
    feed.mark_all_read()?;
    state
        .sessions
        .notify(&ctx.user_id, SessionSignal::ReadStateChanged);

    Ok(Json(feed.snapshot()))
}

/// Subscribe to raw row-change events via Server-Sent Events. Lightweight
/// alternative to the WebSocket feed for clients that refetch on change
#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    responses(
        (status = 200, description = "SSE stream of change events"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn notification_stream(
    State(state): State<AppState>,
    AuthUser(_ctx): AuthUser,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.notifications.subscribe();

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|event| async move {
        match event {
            Ok(event) => serde_json::to_string(&event)
                .ok()
                .map(|data| Ok(Event::default().data(data))),
            Err(_) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// List all notifications including inactive ones (admin)
#[utoipa::path(
    get,
    path = "/api/admin/notifications",
    responses(
        (status = 200, description = "All notifications", body = Vec<Notification>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn list_all_notifications(
    State(state): State<AppState>,
) -> Result<Json<Vec<Notification>>> {
    let notifications = state.notifications.find_all().await?;

    Ok(Json(notifications))
}

/// Create a notification (admin)
#[utoipa::path(
    post,
    path = "/api/admin/notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification created", body = Notification),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn create_notification(
    State(state): State<AppState>,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>)> {
    payload.validate()?;

    let start_date = payload.start_date.unwrap_or_else(Utc::now);
    if let Some(end_date) = payload.end_date {
        if end_date < start_date {
            return Err(AppError::BadRequest(
                "end_date must not precede start_date".to_string(),
            ));
        }
    }

    let audience = payload.audience.as_deref().unwrap_or(AUDIENCE_ALL);
    let notification = state
        .notifications
        .create(
            &payload.title,
            &payload.message,
            payload.category,
            audience,
            start_date,
            payload.end_date,
        )
        .await?;

    tracing::info!(
        "Notification {} created for audience {:?}",
        notification.id,
        notification.audience
    );

    Ok((StatusCode::CREATED, Json(notification)))
}

/// Toggle a notification between active and inactive (admin)
#[utoipa::path(
    patch,
    path = "/api/admin/notifications/{id}/status",
    params(
        ("id" = i64, Path, description = "Notification ID")
    ),
    request_body = UpdateNotificationStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Notification),
        (status = 404, description = "Notification not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn update_notification_status(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
    Json(payload): Json<UpdateNotificationStatusRequest>,
) -> Result<Json<Notification>> {
    let notification = state
        .notifications
        .set_status(notification_id, payload.status)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

    Ok(Json(notification))
}

/// Delete a notification (admin)
#[utoipa::path(
    delete,
    path = "/api/admin/notifications/{id}",
    params(
        ("id" = i64, Path, description = "Notification ID")
    ),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
) -> Result<StatusCode> {
    let rows_affected = state.notifications.delete(notification_id).await?;

    if rows_affected == 0 {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
