use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::Json as RespJson,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};

use crate::error::{ApiError, ApiResult};
use crate::model::user::{
    parse_timestamp, CreateUserRequest, UpdateUserRequest, UserListResponse, UserQuery, UserRecord,
    UserStatus,
};
use crate::store::{NewUser, SharedStore, StoreError, UserPatch};

// Create users router
pub fn users_router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user)) // GET, POST /users
        .route("/:id", get(get_user).patch(update_user).delete(delete_user)) // /users/{id}
}

fn parse_date(field: &str, raw: &str) -> ApiResult<DateTime<Utc>> {
    parse_timestamp(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("{} must be a date (YYYY-MM-DD or RFC 3339)", field)))
}

fn check_name(field: &str, value: &str) -> ApiResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(value.to_string())
}

fn check_email(value: &str) -> ApiResult<String> {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(value.to_string()),
        _ => Err(ApiError::BadRequest("email must be a valid address".to_string())),
    }
}

// Optional free text: blank input is stored as absent
fn optional_text(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<CreateUserRequest> for NewUser {
    type Error = ApiError;

    fn try_from(req: CreateUserRequest) -> ApiResult<Self> {
        Ok(NewUser {
            first_name: check_name("firstName", &req.first_name)?,
            last_name: check_name("lastName", &req.last_name)?,
            patronymic: optional_text(req.patronymic),
            email: check_email(&req.email)?,
            phone: optional_text(req.phone),
            position: req.position.as_str().to_string(),
            department: req.department.as_str().to_string(),
            group_name: optional_text(req.group_name),
            hire_date: parse_date("hireDate", &req.hire_date)?,
            birth_date: optional_text(req.birth_date)
                .map(|raw| parse_date("birthDate", &raw))
                .transpose()?,
            status: req.status.unwrap_or_default().to_string(),
            notes: optional_text(req.notes),
        })
    }
}

impl TryFrom<UpdateUserRequest> for UserPatch {
    type Error = ApiError;

    fn try_from(req: UpdateUserRequest) -> ApiResult<Self> {
        Ok(UserPatch {
            first_name: req.first_name.as_deref().map(|v| check_name("firstName", v)).transpose()?,
            last_name: req.last_name.as_deref().map(|v| check_name("lastName", v)).transpose()?,
            patronymic: optional_text(req.patronymic),
            email: req.email.as_deref().map(check_email).transpose()?,
            phone: optional_text(req.phone),
            position: req.position.map(|p| p.as_str().to_string()),
            department: req.department.map(|d| d.as_str().to_string()),
            group_name: optional_text(req.group_name),
            hire_date: req.hire_date.as_deref().map(|v| parse_date("hireDate", v)).transpose()?,
            birth_date: optional_text(req.birth_date)
                .map(|raw| parse_date("birthDate", &raw))
                .transpose()?,
            status: req.status.map(|s: UserStatus| s.to_string()),
            notes: optional_text(req.notes),
        })
    }
}

// List users with pagination and search
async fn list_users(
    Extension(store): Extension<SharedStore>,
    Query(query): Query<UserQuery>,
) -> ApiResult<RespJson<UserListResponse>> {
    tracing::debug!(?query, "listing users");

    let page = store.list_page(&query).await?;
    Ok(RespJson(UserListResponse::new(
        page.users,
        page.total,
        query.page(),
        query.limit(),
    )))
}

// Get user by ID
async fn get_user(
    Extension(store): Extension<SharedStore>,
    Path(id): Path<i32>,
) -> ApiResult<RespJson<UserRecord>> {
    let user = store.get(id).await?.ok_or(StoreError::NotFound(id))?;
    Ok(RespJson(user))
}

// Create new user
async fn create_user(
    Extension(store): Extension<SharedStore>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, RespJson<UserRecord>)> {
    let new_user = NewUser::try_from(payload)?;
    let user = store.create(new_user).await?;

    tracing::info!(id = user.id, "user created");
    Ok((StatusCode::CREATED, RespJson(user)))
}

// Update user; only supplied fields change
async fn update_user(
    Extension(store): Extension<SharedStore>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<RespJson<UserRecord>> {
    let patch = UserPatch::try_from(payload)?;
    if patch.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    }

    let user = store.update(id, patch).await?.ok_or(StoreError::NotFound(id))?;
    tracing::info!(id, "user updated");
    Ok(RespJson(user))
}

// Delete user
async fn delete_user(
    Extension(store): Extension<SharedStore>,
    Path(id): Path<i32>,
) -> ApiResult<RespJson<serde_json::Value>> {
    if !store.delete(id).await? {
        return Err(StoreError::NotFound(id).into());
    }

    tracing::info!(id, "user deleted");
    Ok(RespJson(serde_json::json!({
        "message": "User deleted successfully"
    })))
}
