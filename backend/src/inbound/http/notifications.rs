//! The caller's notification inbox.
//!
//! ```text
//! GET /api/v1/notifications?unreadOnly=true
//! GET /api/v1/notifications/unread-count
//! POST /api/v1/notifications/{id}/read
//! POST /api/v1/notifications/read-all
//! ```

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::Authenticated;
use crate::inbound::http::cache_control::private_no_cache_header;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::page_request;

/// Inbox filter.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    /// Only unread notifications.
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Unread badge count.
#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub count: u64,
}

/// Rows touched by a bulk update.
#[derive(Debug, Serialize, ToSchema)]
pub struct MarkedRead {
    pub updated: u64,
}

/// Newest notifications first.
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    params(NotificationQuery),
    responses(
        (status = 200, description = "Page of notifications", body = Object),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["notifications"],
    operation_id = "listNotifications"
)]
#[get("/notifications")]
pub async fn list_notifications(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
    query: web::Query<NotificationQuery>,
) -> ApiResult<HttpResponse> {
    let page = page_request(query.page, query.per_page)?;
    let inbox = state
        .notifications
        .list(&principal, query.unread_only, page)
        .await?;
    Ok(HttpResponse::Ok()
        .insert_header(private_no_cache_header())
        .json(inbox))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    responses(
        (status = 200, description = "Unread notifications", body = UnreadCount),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["notifications"],
    operation_id = "unreadNotificationCount"
)]
#[get("/notifications/unread-count")]
pub async fn unread_count(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
) -> ApiResult<HttpResponse> {
    let count = state.notifications.unread_count(&principal).await?;
    Ok(HttpResponse::Ok()
        .insert_header(private_no_cache_header())
        .json(UnreadCount { count }))
}

/// Mark one notification read.
#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 204, description = "Marked read"),
        (status = 404, description = "Unknown notification or not yours", body = ErrorSchema)
    ),
    tags = ["notifications"],
    operation_id = "markNotificationRead"
)]
#[post("/notifications/{id}/read")]
pub async fn mark_read(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
    id: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    state
        .notifications
        .mark_read(&principal, id.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    responses(
        (status = 200, description = "Everything marked read", body = MarkedRead),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["notifications"],
    operation_id = "markAllNotificationsRead"
)]
#[post("/notifications/read-all")]
pub async fn mark_all_read(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
) -> ApiResult<web::Json<MarkedRead>> {
    let updated = state.notifications.mark_all_read(&principal).await?;
    Ok(web::Json(MarkedRead { updated }))
}
