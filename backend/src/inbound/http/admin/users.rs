//! Account administration and the staff presence list.
//!
//! Role changes, locks and deletions are administrator-only and refuse to
//! target the caller's own account.

use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{UserId, UserProfile};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::{Admin, Staff};
use crate::inbound::http::schemas::{ErrorSchema, UserProfileSchema};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, page_request, parse_choice, parse_instant, parse_optional_choice,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// `customer`, `staff` or `admin`.
    pub role: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RoleForm {
    #[schema(example = "staff")]
    pub role: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LockForm {
    /// RFC 3339 instant the lock lapses.
    #[schema(example = "2026-03-09T06:00:00Z")]
    pub until: String,
}

/// Users with at least one live WebSocket.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsers {
    #[schema(value_type = Vec<String>)]
    pub user_ids: Vec<UserId>,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users/online",
    responses(
        (status = 200, description = "Connected users", body = OnlineUsers),
        (status = 403, description = "Staff only", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "onlineUsers"
)]
#[get("/admin/users/online")]
pub async fn online_users(
    state: web::Data<HttpState>,
    _staff: Staff,
) -> web::Json<OnlineUsers> {
    web::Json(OnlineUsers {
        user_ids: state.presence.online_users(),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    params(UserQuery),
    responses(
        (status = 200, description = "Page of accounts", body = Object),
        (status = 403, description = "Admin only", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "listUsers"
)]
#[get("/admin/users")]
pub async fn list_users(
    state: web::Data<HttpState>,
    _admin: Admin,
    query: web::Query<UserQuery>,
) -> ApiResult<HttpResponse> {
    let role = parse_optional_choice(query.role.as_deref(), FieldName::new("role"))?;
    let page = page_request(query.page, query.per_page)?;
    Ok(HttpResponse::Ok().json(state.users.list_users(role, page).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = RoleForm,
    responses(
        (status = 200, description = "Role changed", body = UserProfileSchema),
        (status = 404, description = "Unknown user", body = ErrorSchema),
        (status = 409, description = "Cannot change your own role", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "changeUserRole"
)]
#[put("/admin/users/{id}/role")]
pub async fn change_role(
    state: web::Data<HttpState>,
    Admin(admin): Admin,
    id: web::Path<Uuid>,
    payload: web::Json<RoleForm>,
) -> ApiResult<web::Json<UserProfile>> {
    let role = parse_choice(&payload.role, FieldName::new("role"))?;
    let target = UserId::from_uuid(id.into_inner());
    Ok(web::Json(
        state.users.change_role(&admin, &target, role).await?,
    ))
}

/// Lock an account and end its sessions.
#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/lock",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = LockForm,
    responses(
        (status = 200, description = "Account locked", body = UserProfileSchema),
        (status = 400, description = "Expiry missing or in the past", body = ErrorSchema),
        (status = 409, description = "Cannot lock yourself", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "lockUser"
)]
#[post("/admin/users/{id}/lock")]
pub async fn lock_user(
    state: web::Data<HttpState>,
    Admin(admin): Admin,
    id: web::Path<Uuid>,
    payload: web::Json<LockForm>,
) -> ApiResult<web::Json<UserProfile>> {
    let until = parse_instant(&payload.until, FieldName::new("until"))?;
    let target = UserId::from_uuid(id.into_inner());
    Ok(web::Json(state.users.lock(&admin, &target, until).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/unlock",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Account unlocked", body = UserProfileSchema),
        (status = 404, description = "Unknown user", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "unlockUser"
)]
#[post("/admin/users/{id}/unlock")]
pub async fn unlock_user(
    state: web::Data<HttpState>,
    _admin: Admin,
    id: web::Path<Uuid>,
) -> ApiResult<web::Json<UserProfile>> {
    let target = UserId::from_uuid(id.into_inner());
    Ok(web::Json(state.users.unlock(&target).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 404, description = "Unknown user", body = ErrorSchema),
        (status = 409, description = "Cannot delete yourself", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "deleteUser"
)]
#[delete("/admin/users/{id}")]
pub async fn delete_user(
    state: web::Data<HttpState>,
    Admin(admin): Admin,
    id: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let target = UserId::from_uuid(id.into_inner());
    state.users.delete(&admin, &target).await?;
    Ok(HttpResponse::NoContent().finish())
}
