pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use chrono::Duration;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use sea_orm::DatabaseConnection;
use teamtodo_auth::{JwtError, JwtValidator, SessionClaims};
use teamtodo_core::{MembershipService, ProfileService, TodoService};

/// Cookie carrying the session JWT
pub const SESSION_COOKIE: &str = "session_token";

/// `iss` claim of issued session tokens
pub const TOKEN_ISSUER: &str = "teamtodo";

/// Application state shared across handlers
pub struct AppState {
    pub db: DatabaseConnection,
    pub memberships: MembershipService,
    pub todos: TodoService,
    pub profiles: ProfileService,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub allow_signup: bool,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "TeamTodo API",
        version = "0.1.0",
        description = "Teams, memberships and shared todo lists"
    ),
    paths(
        handlers::health_check,
        handlers::register,
        handlers::login,
        handlers::logout,
        handlers::get_current_user,
        handlers::get_profile,
        handlers::update_profile,
        handlers::list_teams,
        handlers::create_team,
        handlers::get_team,
        handlers::list_members,
        handlers::invite_member,
        handlers::remove_member,
        handlers::leave_team,
        handlers::get_invite_code,
        handlers::regenerate_invite_code,
        handlers::join_team,
        handlers::list_team_todos,
        handlers::create_team_todo,
        handlers::toggle_team_todo,
        handlers::delete_team_todo,
        handlers::list_private_todos,
        handlers::create_private_todo,
        handlers::toggle_private_todo,
        handlers::delete_private_todo,
    ),
    components(
        schemas(
            models::HealthResponse,
            models::ErrorResponse,
            models::RegisterRequest,
            models::LoginRequest,
            models::AuthResponse,
            models::User,
            models::Profile,
            models::ProfileResponse,
            models::UpdateProfileRequest,
            models::TeamRole,
            models::Team,
            models::TeamMembership,
            models::TeamList,
            models::CreateTeamRequest,
            models::TeamMember,
            models::TeamMemberList,
            models::Membership,
            models::InviteMemberRequest,
            models::InviteCodeResponse,
            models::JoinTeamRequest,
            models::JoinTeamResponse,
            models::Todo,
            models::TodoStats,
            models::TodoList,
            models::CreateTodoRequest,
        )
    ),
    tags(
        (name = "auth", description = "Sign-up, sign-in and sessions"),
        (name = "profile", description = "User profile"),
        (name = "teams", description = "Teams, members and invite codes"),
        (name = "todos", description = "Team and private todos"),
        (name = "system", description = "System health")
    )
)]
pub struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Enable CORS for local development origins
    pub enable_cors: bool,
    /// Secret for signing session tokens
    pub jwt_secret: String,
    /// Session lifetime
    pub session_ttl: Duration,
    /// Whether `/api/auth/register` is open
    pub allow_signup: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3080)),
            enable_cors: true,
            jwt_secret: String::new(),
            session_ttl: Duration::hours(168),
            allow_signup: true,
        }
    }
}

/// Sign a session token for a user.
pub fn issue_session_token(
    secret: &[u8],
    user_id: Uuid,
    email: &str,
    ttl: Duration,
) -> Result<(String, SessionClaims), JwtError> {
    let claims = SessionClaims::new(user_id, email.to_string(), TOKEN_ISSUER.to_string(), ttl);
    let token = JwtValidator::encode(secret, &claims)?;
    Ok((token, claims))
}

pub(crate) fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

pub(crate) fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, db: DatabaseConnection) -> Self {
        let state = Arc::new(AppState {
            memberships: MembershipService::new(db.clone()),
            todos: TodoService::new(db.clone()),
            profiles: ProfileService::new(db.clone()),
            db,
            jwt_secret: config.jwt_secret.clone(),
            session_ttl: config.session_ttl,
            allow_signup: config.allow_signup,
        });

        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let api_doc = ApiDoc::openapi();

        let jwt_state = Arc::new(middleware::JwtState::new(self.config.jwt_secret.as_bytes()));

        let public_router = Router::new()
            .route("/api/health", get(handlers::health_check))
            .route("/api/auth/register", post(handlers::register))
            .route("/api/auth/login", post(handlers::login))
            .route("/api/auth/logout", post(handlers::logout))
            .with_state(self.state.clone());

        let protected_router = Router::new()
            .route("/api/auth/me", get(handlers::get_current_user))
            .route(
                "/api/profile",
                get(handlers::get_profile).put(handlers::update_profile),
            )
            .route(
                "/api/teams",
                get(handlers::list_teams).post(handlers::create_team),
            )
            .route("/api/teams/join", post(handlers::join_team))
            .route("/api/teams/{id}", get(handlers::get_team))
            .route(
                "/api/teams/{id}/members",
                get(handlers::list_members).post(handlers::invite_member),
            )
            .route(
                "/api/teams/{id}/members/{user_id}",
                delete(handlers::remove_member),
            )
            .route("/api/teams/{id}/leave", post(handlers::leave_team))
            .route("/api/teams/{id}/invite-code", get(handlers::get_invite_code))
            .route(
                "/api/teams/{id}/invite-code/regenerate",
                post(handlers::regenerate_invite_code),
            )
            .route(
                "/api/teams/{id}/todos",
                get(handlers::list_team_todos).post(handlers::create_team_todo),
            )
            .route(
                "/api/teams/{id}/todos/{todo_id}",
                delete(handlers::delete_team_todo),
            )
            .route(
                "/api/teams/{id}/todos/{todo_id}/toggle",
                post(handlers::toggle_team_todo),
            )
            .route(
                "/api/todos",
                get(handlers::list_private_todos).post(handlers::create_private_todo),
            )
            .route("/api/todos/{todo_id}", delete(handlers::delete_private_todo))
            .route(
                "/api/todos/{todo_id}/toggle",
                post(handlers::toggle_private_todo),
            )
            .with_state(self.state.clone())
            .layer(axum_middleware::from_fn_with_state(
                jwt_state,
                middleware::require_auth,
            ));

        let router = Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", api_doc))
            .merge(public_router)
            .merge(protected_router);

        let mut router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            // Credentials (cookies) rule out a wildcard origin
            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
                .allow_credentials(true)
                .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
                    let origin = origin.to_str().unwrap_or("");
                    origin.starts_with("http://localhost:")
                        || origin.starts_with("http://127.0.0.1:")
                        || origin.starts_with("https://localhost:")
                        || origin.starts_with("https://127.0.0.1:")
                }));
            router = router.layer(cors);
        }

        router
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI spec: http://{}/api/openapi.json",
            self.config.bind_addr
        );
        info!("Swagger UI: http://{}/swagger-ui", self.config.bind_addr);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}
