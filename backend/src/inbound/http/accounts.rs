//! Account endpoints: registration, sign-in, token rotation and profile.
//!
//! ```text
//! POST /api/v1/auth/register {"email":"wanjiru@example.co.ke","fullName":"Wanjiru K","password":"…"}
//! POST /api/v1/auth/login {"email":"wanjiru@example.co.ke","password":"…"}
//! GET /api/v1/me
//! ```

use actix_web::{HttpRequest, HttpResponse, get, patch, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Error, ProfileUpdate, TokenPair, UserProfile};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::{Authenticated, bearer_token};
use crate::inbound::http::cache_control::no_store_header;
use crate::inbound::http::schemas::{ErrorSchema, TokenPairSchema, UserProfileSchema};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, double_option, missing_field_error};

/// Registration form.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[schema(example = "wanjiru@example.co.ke")]
    pub email: String,
    #[schema(example = "Wanjiru Kamau")]
    pub full_name: String,
    #[schema(example = "0712345678")]
    pub phone: Option<String>,
    pub password: String,
}

/// Registration outcome.
///
/// The verification token is only echoed by debug builds; release builds
/// deliver it out of band.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    #[schema(value_type = UserProfileSchema)]
    pub user: UserProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
}

/// Email verification form.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub token: String,
}

/// Credentials.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[schema(example = "wanjiru@example.co.ke")]
    pub email: String,
    pub password: String,
}

/// Sign-in outcome.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[schema(value_type = TokenPairSchema)]
    pub tokens: TokenPair,
    #[schema(value_type = UserProfileSchema)]
    pub user: UserProfile,
}

/// Refresh form.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Password change form.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Profile patch. `phone: null` clears the number.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
}

/// Create an unverified customer account.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 409, description = "Email already registered", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "register",
    security([])
)]
#[post("/auth/register")]
pub async fn register(
    state: web::Data<HttpState>,
    payload: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let RegisterRequest {
        email,
        full_name,
        phone,
        password,
    } = payload.into_inner();
    let registration = state
        .auth
        .register(&email, &full_name, phone.as_deref(), &password)
        .await?;
    let verification_token =
        cfg!(debug_assertions).then_some(registration.verification_token);
    Ok(HttpResponse::Created().json(RegisterResponse {
        user: registration.user,
        verification_token,
    }))
}

/// Confirm an email address.
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verified", body = UserProfileSchema),
        (status = 400, description = "Unknown or expired token", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "verifyEmail",
    security([])
)]
#[post("/auth/verify")]
pub async fn verify(
    state: web::Data<HttpState>,
    payload: web::Json<VerifyRequest>,
) -> ApiResult<web::Json<UserProfile>> {
    let token = payload.into_inner().token;
    if token.trim().is_empty() {
        return Err(missing_field_error(FieldName::new("token")));
    }
    Ok(web::Json(state.auth.verify_email(&token).await?))
}

/// Exchange credentials for a token pair.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorSchema),
        (status = 403, description = "Email not verified", body = ErrorSchema),
        (status = 423, description = "Account locked", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "login",
    security([])
)]
#[post("/auth/login")]
pub async fn login(
    state: web::Data<HttpState>,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let LoginRequest { email, password } = payload.into_inner();
    let outcome = state.auth.login(&email, &password).await?;
    Ok(HttpResponse::Ok()
        .insert_header(no_store_header())
        .json(LoginResponse {
            tokens: outcome.tokens,
            user: outcome.user,
        }))
}

/// Rotate a token pair.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated", body = TokenPairSchema),
        (status = 401, description = "Refresh token unknown, revoked or expired", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "refreshTokens",
    security([])
)]
#[post("/auth/refresh")]
pub async fn refresh(
    state: web::Data<HttpState>,
    payload: web::Json<RefreshRequest>,
) -> ApiResult<HttpResponse> {
    let tokens = state.auth.refresh(&payload.refresh_token).await?;
    Ok(HttpResponse::Ok().insert_header(no_store_header()).json(tokens))
}

/// Revoke the session behind the bearer token. Repeat calls are harmless.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Missing bearer token", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "logout"
)]
#[post("/auth/logout")]
pub async fn logout(state: web::Data<HttpState>, req: HttpRequest) -> ApiResult<HttpResponse> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| Error::unauthorized("missing bearer token"))?;
    state.auth.logout(&token).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Replace the caller's password; other sessions are signed out.
#[utoipa::path(
    post,
    path = "/api/v1/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or weak new password", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "changePassword"
)]
#[post("/auth/password")]
pub async fn change_password(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
    payload: web::Json<ChangePasswordRequest>,
) -> ApiResult<HttpResponse> {
    let ChangePasswordRequest {
        current_password,
        new_password,
    } = payload.into_inner();
    state
        .auth
        .change_password(&principal, &current_password, &new_password)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Current account.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Profile", body = UserProfileSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["users"],
    operation_id = "currentUser"
)]
#[get("/me")]
pub async fn me(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
) -> ApiResult<web::Json<UserProfile>> {
    Ok(web::Json(state.users.me(&principal).await?))
}

/// Update name or phone.
#[utoipa::path(
    patch,
    path = "/api/v1/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserProfileSchema),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["users"],
    operation_id = "updateProfile"
)]
#[patch("/me")]
pub async fn update_me(
    state: web::Data<HttpState>,
    Authenticated(principal): Authenticated,
    payload: web::Json<UpdateProfileRequest>,
) -> ApiResult<web::Json<UserProfile>> {
    let UpdateProfileRequest { full_name, phone } = payload.into_inner();
    let profile = state
        .users
        .update_profile(&principal, ProfileUpdate { full_name, phone })
        .await?;
    Ok(web::Json(profile))
}

#[cfg(test)]
#[path = "accounts_tests.rs"]
mod tests;
