use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use teamtodo_auth::{check_password_policy, hash_password, verify_password};
use teamtodo_core::{error::is_unique_violation, validation, ProfileUpdate};
use teamtodo_db::entities::{user, user_profile};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{internal_error, service_error, ApiError};
use crate::middleware::AuthUser;
use crate::models::*;
use crate::{clear_session_cookie, issue_session_token, session_cookie, AppState};

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Identity
// ============================================================================

fn email_taken() -> ApiError {
    let mut body = ErrorResponse::new("An account with this email already exists", "EMAIL_TAKEN");
    body.kind = Some("CONFLICT".to_string());
    body.remedy = Some("Sign in instead".to_string());
    (StatusCode::CONFLICT, Json(body))
}

fn invalid_credentials() -> ApiError {
    let mut body = ErrorResponse::new("Invalid email or password", "INVALID_CREDENTIALS");
    body.kind = Some("AUTHORIZATION".to_string());
    (StatusCode::UNAUTHORIZED, Json(body))
}

/// Issue a session for `user` and set it as a cookie.
async fn session_response(
    state: &AppState,
    status: StatusCode,
    user: user::Model,
) -> Result<Response, ApiError> {
    let (token, claims) =
        issue_session_token(state.jwt_secret.as_bytes(), user.id, &user.email, state.session_ttl)
            .map_err(|e| internal_error("Failed to issue session token", e))?;

    let profile = user_profile::Entity::find_by_id(user.id)
        .one(&state.db)
        .await
        .map_err(|e| service_error(e.into()))?;

    let body = AuthResponse {
        user: User::from_models(user, profile),
        token: token.clone(),
        expires_at: claims.expires_at(),
    };

    let cookie = session_cookie(&token, state.session_ttl.num_seconds());
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Create an account and start a session
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid email or password", body = ErrorResponse),
        (status = 403, description = "Sign-up disabled", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    if !state.allow_signup {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("Sign-up is disabled", "SIGNUP_DISABLED")),
        ));
    }

    let email = validation::validate_email(&req.email).map_err(service_error)?;

    check_password_policy(&req.password).map_err(|e| {
        let mut body = ErrorResponse::new(e.to_string(), "INVALID_INPUT");
        body.kind = Some("VALIDATION".to_string());
        (StatusCode::BAD_REQUEST, Json(body))
    })?;

    let existing = teamtodo_db::functions::get_user_id_by_email(&state.db, &email)
        .await
        .map_err(|e| service_error(e.into()))?;
    if existing.is_some() {
        return Err(email_taken());
    }

    let password_hash =
        hash_password(&req.password).map_err(|e| internal_error("Failed to hash password", e))?;

    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(password_hash),
        created_at: Set(Utc::now()),
    }
    .insert(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            email_taken()
        } else {
            service_error(e.into())
        }
    })?;

    info!("Registered user {} ({})", user.id, user.email);
    session_response(&state, StatusCode::CREATED, user).await
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = req.email.trim().to_lowercase();

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(&state.db)
        .await
        .map_err(|e| service_error(e.into()))?
        .ok_or_else(|| {
            debug!("Login for unknown email {}", email);
            invalid_credentials()
        })?;

    let valid = verify_password(&req.password, &user.password_hash)
        .map_err(|e| internal_error("Failed to verify password", e))?;
    if !valid {
        debug!("Wrong password for {}", user.id);
        return Err(invalid_credentials());
    }

    info!("User {} signed in", user.id);
    session_response(&state, StatusCode::OK, user).await
}

/// End the browser session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Session cookie cleared")
    ),
    tag = "auth"
)]
pub async fn logout() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie())],
    )
}

/// Current user and profile
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<User>, ApiError> {
    let user = user::Entity::find_by_id(auth.user_id)
        .one(&state.db)
        .await
        .map_err(|e| service_error(e.into()))?
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Account no longer exists", "UNAUTHORIZED")),
            )
        })?;

    let profile = state
        .profiles
        .get_profile(auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(Json(User::from_models(user, profile)))
}

// ============================================================================
// Profile
// ============================================================================

/// Get own profile
#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Profile, if any", body = ProfileResponse)
    ),
    tag = "profile"
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state
        .profiles
        .get_profile(auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(Json(ProfileResponse {
        profile: profile.map(Profile::from),
    }))
}

/// Create or replace own profile
#[utoipa::path(
    put,
    path = "/api/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Saved profile", body = Profile),
        (status = 400, description = "Invalid field", body = ErrorResponse),
        (status = 409, description = "Username taken", body = ErrorResponse)
    ),
    tag = "profile"
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let update = ProfileUpdate {
        username: req.username,
        display_name: req.display_name,
        avatar_url: req.avatar_url,
        bio: req.bio,
    };

    let profile = state
        .profiles
        .update_profile(auth.user_id, update)
        .await
        .map_err(service_error)?;

    Ok(Json(profile.into()))
}

// ============================================================================
// Teams
// ============================================================================

/// Teams the caller belongs to, newest first
#[utoipa::path(
    get,
    path = "/api/teams",
    responses(
        (status = 200, description = "Teams", body = TeamList)
    ),
    tag = "teams"
)]
pub async fn list_teams(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<TeamList>, ApiError> {
    let teams: Vec<TeamMembership> = state
        .memberships
        .list_user_teams(auth.user_id)
        .await
        .map_err(service_error)?
        .into_iter()
        .map(|t| TeamMembership::for_caller(t, auth.user_id))
        .collect();

    let total = teams.len();
    Ok(Json(TeamList { teams, total }))
}

/// Create a team; the caller becomes its creator and first member
#[utoipa::path(
    post,
    path = "/api/teams",
    request_body = CreateTeamRequest,
    responses(
        (status = 201, description = "Team created", body = Team),
        (status = 400, description = "Invalid name", body = ErrorResponse),
        (status = 409, description = "Name taken", body = ErrorResponse)
    ),
    tag = "teams"
)]
pub async fn create_team(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<Team>), ApiError> {
    let team = state
        .memberships
        .create_team(&req.name, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok((
        StatusCode::CREATED,
        Json(Team::for_caller(team, auth.user_id)),
    ))
}

/// Team detail
#[utoipa::path(
    get,
    path = "/api/teams/{id}",
    params(("id" = Uuid, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Team", body = Team),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Team not found", body = ErrorResponse)
    ),
    tag = "teams"
)]
pub async fn get_team(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Team>, ApiError> {
    let team = state
        .memberships
        .get_team(team_id, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(Json(Team::for_caller(team, auth.user_id)))
}

/// Members visible to the caller
#[utoipa::path(
    get,
    path = "/api/teams/{id}/members",
    params(("id" = Uuid, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Members", body = TeamMemberList),
        (status = 403, description = "Not a member", body = ErrorResponse)
    ),
    tag = "teams"
)]
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<TeamMemberList>, ApiError> {
    let members: Vec<TeamMember> = state
        .memberships
        .list_members(team_id, auth.user_id)
        .await
        .map_err(service_error)?
        .into_iter()
        .map(TeamMember::from)
        .collect();

    let total = members.len();
    Ok(Json(TeamMemberList { members, total }))
}

/// Invite a user by email, username or display name
#[utoipa::path(
    post,
    path = "/api/teams/{id}/members",
    params(("id" = Uuid, Path, description = "Team ID")),
    request_body = InviteMemberRequest,
    responses(
        (status = 201, description = "Member added", body = Membership),
        (status = 400, description = "Invalid identifier", body = ErrorResponse),
        (status = 403, description = "Not the creator, or self-invite", body = ErrorResponse),
        (status = 404, description = "User or team not found", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse)
    ),
    tag = "teams"
)]
pub async fn invite_member(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    Json(req): Json<InviteMemberRequest>,
) -> Result<(StatusCode, Json<Membership>), ApiError> {
    let row = state
        .memberships
        .invite_member(team_id, &req.identifier, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok((StatusCode::CREATED, Json(row.into())))
}

/// Remove a member (creator only)
#[utoipa::path(
    delete,
    path = "/api/teams/{id}/members/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Team ID"),
        ("user_id" = Uuid, Path, description = "Member to remove")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Not the creator", body = ErrorResponse),
        (status = 404, description = "Not a member", body = ErrorResponse)
    ),
    tag = "teams"
)]
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((team_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .memberships
        .remove_member(team_id, member_id, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Leave a team (not available to the creator)
#[utoipa::path(
    post,
    path = "/api/teams/{id}/leave",
    params(("id" = Uuid, Path, description = "Team ID")),
    responses(
        (status = 204, description = "Left the team"),
        (status = 403, description = "Creator cannot leave", body = ErrorResponse),
        (status = 404, description = "Not a member", body = ErrorResponse)
    ),
    tag = "teams"
)]
pub async fn leave_team(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .memberships
        .leave_team(team_id, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Current invite code (creator only)
#[utoipa::path(
    get,
    path = "/api/teams/{id}/invite-code",
    params(("id" = Uuid, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Invite code", body = InviteCodeResponse),
        (status = 403, description = "Not the creator", body = ErrorResponse)
    ),
    tag = "teams"
)]
pub async fn get_invite_code(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<InviteCodeResponse>, ApiError> {
    let invite_code = state
        .memberships
        .get_invite_code(team_id, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(Json(InviteCodeResponse { invite_code }))
}

/// Replace the invite code (creator only)
#[utoipa::path(
    post,
    path = "/api/teams/{id}/invite-code/regenerate",
    params(("id" = Uuid, Path, description = "Team ID")),
    responses(
        (status = 200, description = "New invite code", body = InviteCodeResponse),
        (status = 403, description = "Not the creator", body = ErrorResponse)
    ),
    tag = "teams"
)]
pub async fn regenerate_invite_code(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<InviteCodeResponse>, ApiError> {
    let invite_code = state
        .memberships
        .regenerate_invite_code(team_id, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(Json(InviteCodeResponse { invite_code }))
}

/// Join a team with an invite code
#[utoipa::path(
    post,
    path = "/api/teams/join",
    request_body = JoinTeamRequest,
    responses(
        (status = 200, description = "Joined, or already a member", body = JoinTeamResponse),
        (status = 404, description = "Invalid invite code", body = ErrorResponse)
    ),
    tag = "teams"
)]
pub async fn join_team(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<JoinTeamRequest>,
) -> Result<Json<JoinTeamResponse>, ApiError> {
    let result = state
        .memberships
        .join_by_invite_code(&req.invite_code, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(Json(result.into()))
}

// ============================================================================
// Team todos
// ============================================================================

/// Team todos, newest first
#[utoipa::path(
    get,
    path = "/api/teams/{id}/todos",
    params(("id" = Uuid, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Todos", body = TodoList),
        (status = 403, description = "Not a member", body = ErrorResponse)
    ),
    tag = "todos"
)]
pub async fn list_team_todos(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<TodoList>, ApiError> {
    let list = state
        .todos
        .list_team_todos(team_id, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(Json(list.into()))
}

/// Add a team todo
#[utoipa::path(
    post,
    path = "/api/teams/{id}/todos",
    params(("id" = Uuid, Path, description = "Team ID")),
    request_body = CreateTodoRequest,
    responses(
        (status = 201, description = "Todo created", body = Todo),
        (status = 400, description = "Empty task", body = ErrorResponse),
        (status = 403, description = "Not a member", body = ErrorResponse)
    ),
    tag = "todos"
)]
pub async fn create_team_todo(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    Json(req): Json<CreateTodoRequest>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let todo = state
        .todos
        .add_team_todo(team_id, &req.task, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok((StatusCode::CREATED, Json(todo.into())))
}

/// Flip completion of a team todo
#[utoipa::path(
    post,
    path = "/api/teams/{id}/todos/{todo_id}/toggle",
    params(
        ("id" = Uuid, Path, description = "Team ID"),
        ("todo_id" = i32, Path, description = "Todo ID")
    ),
    responses(
        (status = 200, description = "Updated todo", body = Todo),
        (status = 404, description = "No such todo in this team", body = ErrorResponse)
    ),
    tag = "todos"
)]
pub async fn toggle_team_todo(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((team_id, todo_id)): Path<(Uuid, i32)>,
) -> Result<Json<Todo>, ApiError> {
    let todo = state
        .todos
        .toggle_team_todo(team_id, todo_id, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(Json(todo.into()))
}

/// Delete a team todo
#[utoipa::path(
    delete,
    path = "/api/teams/{id}/todos/{todo_id}",
    params(
        ("id" = Uuid, Path, description = "Team ID"),
        ("todo_id" = i32, Path, description = "Todo ID")
    ),
    responses(
        (status = 204, description = "Todo deleted"),
        (status = 404, description = "No such todo in this team", body = ErrorResponse)
    ),
    tag = "todos"
)]
pub async fn delete_team_todo(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((team_id, todo_id)): Path<(Uuid, i32)>,
) -> Result<StatusCode, ApiError> {
    state
        .todos
        .delete_team_todo(team_id, todo_id, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Private todos
// ============================================================================

/// Private todos, newest first
#[utoipa::path(
    get,
    path = "/api/todos",
    responses(
        (status = 200, description = "Todos", body = TodoList)
    ),
    tag = "todos"
)]
pub async fn list_private_todos(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<TodoList>, ApiError> {
    let list = state
        .todos
        .list_private_todos(auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(Json(list.into()))
}

/// Add a private todo
#[utoipa::path(
    post,
    path = "/api/todos",
    request_body = CreateTodoRequest,
    responses(
        (status = 201, description = "Todo created", body = Todo),
        (status = 400, description = "Empty task", body = ErrorResponse)
    ),
    tag = "todos"
)]
pub async fn create_private_todo(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateTodoRequest>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let todo = state
        .todos
        .add_private_todo(&req.task, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok((StatusCode::CREATED, Json(todo.into())))
}

/// Flip completion of a private todo
#[utoipa::path(
    post,
    path = "/api/todos/{todo_id}/toggle",
    params(("todo_id" = i32, Path, description = "Todo ID")),
    responses(
        (status = 200, description = "Updated todo", body = Todo),
        (status = 404, description = "Todo not found", body = ErrorResponse)
    ),
    tag = "todos"
)]
pub async fn toggle_private_todo(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(todo_id): Path<i32>,
) -> Result<Json<Todo>, ApiError> {
    let todo = state
        .todos
        .toggle_private_todo(todo_id, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(Json(todo.into()))
}

/// Delete a private todo
#[utoipa::path(
    delete,
    path = "/api/todos/{todo_id}",
    params(("todo_id" = i32, Path, description = "Todo ID")),
    responses(
        (status = 204, description = "Todo deleted"),
        (status = 404, description = "Todo not found", body = ErrorResponse)
    ),
    tag = "todos"
)]
pub async fn delete_private_todo(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(todo_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state
        .todos
        .delete_private_todo(todo_id, auth.user_id)
        .await
        .map_err(service_error)?;

    Ok(StatusCode::NO_CONTENT)
}
