use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use teamtodo_core::{JoinResult, JoinStatus, MemberInfo, UserTeam};
use teamtodo_db::entities::{team, team_member, todo, user, user_profile};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Message safe to show to the user
    pub error: String,
    /// Stable error code (e.g. "ALREADY_MEMBER")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error category (VALIDATION, AUTHORIZATION, NOT_FOUND, CONFLICT, BACKEND_FAILURE, UNEXPECTED)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Suggested next step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remedy: Option<String>,
    /// Store diagnostic code, only for DATABASE_ERROR
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: Some(code.to_string()),
            kind: None,
            remedy: None,
            detail: None,
        }
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Sign-up request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    /// At least 6 characters
    pub password: String,
}

/// Sign-in request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Issued session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: User,
    /// Session JWT, also set as the `session_token` cookie
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Account with its optional profile
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub profile: Option<Profile>,
}

impl User {
    pub fn from_models(user: user::Model, profile: Option<user_profile::Model>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
            profile: profile.map(Profile::from),
        }
    }
}

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<user_profile::Model> for Profile {
    fn from(p: user_profile::Model) -> Self {
        Self {
            username: p.username,
            display_name: p.display_name,
            avatar_url: p.avatar_url,
            bio: p.bio,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    /// `None` until the user saves a profile
    pub profile: Option<Profile>,
}

/// Profile update. Blank or missing fields are cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    /// 3-20 characters: letters, digits, underscore
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

// ============================================================================
// Teams
// ============================================================================

/// Membership role (informational, privilege comes from the team creator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Member,
}

impl From<team_member::TeamRole> for TeamRole {
    fn from(role: team_member::TeamRole) -> Self {
        match role {
            team_member::TeamRole::Owner => TeamRole::Owner,
            team_member::TeamRole::Member => TeamRole::Member,
        }
    }
}

/// Team (the invite code is only exposed to the creator via its own endpoint)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    /// Whether the caller created this team
    pub is_creator: bool,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn for_caller(team: team::Model, caller: Uuid) -> Self {
        Self {
            is_creator: team.is_creator(caller),
            id: team.id,
            name: team.name,
            created_by: team.created_by,
            created_at: team.created_at,
        }
    }
}

/// A team the caller belongs to
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamMembership {
    pub team: Team,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

impl TeamMembership {
    pub fn for_caller(entry: UserTeam, caller: Uuid) -> Self {
        Self {
            team: Team::for_caller(entry.team, caller),
            role: entry.role.into(),
            joined_at: entry.joined_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamList {
    pub teams: Vec<TeamMembership>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateTeamRequest {
    /// 2-50 characters: letters, digits, Chinese characters, spaces, hyphens, underscores
    pub name: String,
}

/// Team member as visible to the caller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamMember {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: TeamRole,
    pub is_creator: bool,
    pub joined_at: DateTime<Utc>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<MemberInfo> for TeamMember {
    fn from(m: MemberInfo) -> Self {
        Self {
            user_id: m.user_id,
            email: m.email,
            role: m.role.into(),
            is_creator: m.is_creator,
            joined_at: m.joined_at,
            username: m.username,
            display_name: m.display_name,
            avatar_url: m.avatar_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamMemberList {
    pub members: Vec<TeamMember>,
    pub total: usize,
}

/// Newly created membership row
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Membership {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

impl From<team_member::Model> for Membership {
    fn from(m: team_member::Model) -> Self {
        Self {
            team_id: m.team_id,
            user_id: m.user_id,
            role: m.role.into(),
            joined_at: m.joined_at,
        }
    }
}

/// Invite by email, username or display name
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteMemberRequest {
    pub identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteCodeResponse {
    pub invite_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JoinTeamRequest {
    pub invite_code: String,
}

/// Outcome of an invite code redemption
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JoinTeamResponse {
    pub success: bool,
    /// "joined" or "already_member"
    pub status: String,
    pub message: String,
    pub team_id: Option<Uuid>,
    pub team_name: Option<String>,
}

impl From<JoinResult> for JoinTeamResponse {
    fn from(r: JoinResult) -> Self {
        let status = match r.status {
            JoinStatus::Joined => "joined",
            JoinStatus::AlreadyMember => "already_member",
            JoinStatus::InvalidCode => "invalid_code",
        };
        Self {
            success: r.success,
            status: status.to_string(),
            message: r.message,
            team_id: r.team_id,
            team_name: r.team_name,
        }
    }
}

// ============================================================================
// Todos
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Todo {
    pub id: i32,
    pub task: String,
    pub is_completed: bool,
    pub user_id: Uuid,
    /// `None` for private todos
    pub team_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<todo::Model> for Todo {
    fn from(t: todo::Model) -> Self {
        Self {
            id: t.id,
            task: t.task,
            is_completed: t.is_completed,
            user_id: t.user_id,
            team_id: t.team_id,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct TodoStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

/// Todos, newest first
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TodoList {
    pub todos: Vec<Todo>,
    pub stats: TodoStats,
}

impl From<teamtodo_core::TodoList> for TodoList {
    fn from(list: teamtodo_core::TodoList) -> Self {
        Self {
            todos: list.todos.into_iter().map(Todo::from).collect(),
            stats: TodoStats {
                total: list.stats.total,
                completed: list.stats.completed,
                pending: list.stats.pending,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateTodoRequest {
    pub task: String,
}
