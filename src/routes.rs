use crate::{
    feed,
    middleware::{auth_middleware, require_admin},
    notification::{self, notification_dto::*, notification_models::*},
    state::AppState,
    websocket::ws_handler,
};
use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        notification::notification_handlers::get_notifications,
        notification::notification_handlers::mark_notification_read,
        notification::notification_handlers::mark_all_notifications_read,
        notification::notification_handlers::notification_stream,
        notification::notification_handlers::list_all_notifications,
        notification::notification_handlers::create_notification,
        notification::notification_handlers::update_notification_status,
        notification::notification_handlers::delete_notification,
    ),
    components(
        schemas(
            Notification,
            NotificationCategory,
            NotificationStatus,
            CreateNotificationRequest,
            UpdateNotificationStatusRequest,
            feed::FeedSnapshot,
            feed::FeedItem,
            feed::SyncState,
            feed::ChangeEvent,
            feed::ChangeOp,
        )
    ),
    tags(
        (name = "notifications", description = "Notification feed endpoints"),
        (name = "admin", description = "Notification management endpoints")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Per-user feed surface (auth required)
    let notification_routes = Router::new()
        .route("/", get(notification::get_notifications))
        .route("/stream", get(notification::notification_stream))
        .route("/ws", get(ws_handler))
        .route("/:id/read", patch(notification::mark_notification_read))
        .route("/read-all", post(notification::mark_all_notifications_read))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Management surface (auth + admin role required)
    let admin_routes = Router::new()
        .route(
            "/",
            get(notification::list_all_notifications).post(notification::create_notification),
        )
        .route("/:id/status", patch(notification::update_notification_status))
        .route("/:id", delete(notification::delete_notification))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .nest("/notifications", notification_routes)
        .nest("/admin/notifications", admin_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(state)
}
