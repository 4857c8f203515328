//! Store-side functions
//!
//! The membership layer delegates exactly these operations to the store:
//! invite code generation, invite code redemption and the two identifier
//! lookups (`email`, `username`). Everything else is plain CRUD.
//!
//! All functions are generic over [`ConnectionTrait`] so they can run on a
//! pooled connection or inside an open transaction.

use chrono::Utc;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::{team, team_member, user, user_profile};

/// Length of a team invite code
pub const INVITE_CODE_LEN: usize = 8;

const INVITE_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Attempts before giving up on finding an unused code
const MAX_CODE_ATTEMPTS: usize = 16;

/// Produce a random code without checking it against the store.
pub fn random_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_CODE_CHARSET[rng.gen_range(0..INVITE_CODE_CHARSET.len())] as char)
        .collect()
}

/// Canonical form of user-typed codes: surrounding whitespace removed, upper-cased.
pub fn normalize_invite_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Whether `code` has the shape produced by [`random_invite_code`].
pub fn is_well_formed_invite_code(code: &str) -> bool {
    code.len() == INVITE_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Generate an invite code not used by any team.
pub async fn generate_invite_code<C: ConnectionTrait>(db: &C) -> Result<String, DbErr> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = random_invite_code();

        let taken = team::Entity::find()
            .filter(team::Column::InviteCode.eq(code.as_str()))
            .one(db)
            .await?
            .is_some();

        if !taken {
            return Ok(code);
        }

        debug!("Invite code collision, retrying");
    }

    Err(DbErr::Custom(format!(
        "could not generate a unique invite code after {} attempts",
        MAX_CODE_ATTEMPTS
    )))
}

/// Outcome category of an invite code redemption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStatus {
    Joined,
    AlreadyMember,
    InvalidCode,
}

/// Result row of [`join_team_by_invite_code`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinResult {
    pub success: bool,
    pub status: JoinStatus,
    pub message: String,
    pub team_id: Option<Uuid>,
    pub team_name: Option<String>,
}

impl JoinResult {
    fn invalid_code() -> Self {
        Self {
            success: false,
            status: JoinStatus::InvalidCode,
            message: "Invalid invite code".to_string(),
            team_id: None,
            team_name: None,
        }
    }

    fn already_member(team: &team::Model) -> Self {
        Self {
            success: true,
            status: JoinStatus::AlreadyMember,
            message: format!("You are already a member of {}", team.name),
            team_id: Some(team.id),
            team_name: Some(team.name.clone()),
        }
    }

    fn joined(team: &team::Model) -> Self {
        Self {
            success: true,
            status: JoinStatus::Joined,
            message: format!("Successfully joined {}", team.name),
            team_id: Some(team.id),
            team_name: Some(team.name.clone()),
        }
    }
}

/// Redeem an invite code for `user_id`.
///
/// The code must equal the team's *current* `invite_code`; regenerated codes
/// are therefore rejected. Redeeming twice reports `AlreadyMember` with
/// `success = true` and never inserts a second row.
pub async fn join_team_by_invite_code<C: ConnectionTrait>(
    db: &C,
    code: &str,
    user_id: Uuid,
) -> Result<JoinResult, DbErr> {
    let code = normalize_invite_code(code);
    if !is_well_formed_invite_code(&code) {
        return Ok(JoinResult::invalid_code());
    }

    let Some(team) = team::Entity::find()
        .filter(team::Column::InviteCode.eq(code.as_str()))
        .one(db)
        .await?
    else {
        return Ok(JoinResult::invalid_code());
    };

    let existing = team_member::Entity::find_by_id((team.id, user_id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(JoinResult::already_member(&team));
    }

    let role = if team.is_creator(user_id) {
        team_member::TeamRole::Owner
    } else {
        team_member::TeamRole::Member
    };

    let membership = team_member::ActiveModel {
        team_id: Set(team.id),
        user_id: Set(user_id),
        role: Set(role),
        joined_at: Set(Utc::now()),
    };

    match membership.insert(db).await {
        Ok(_) => {
            info!("User {} joined team {} by invite code", user_id, team.id);
            Ok(JoinResult::joined(&team))
        }
        // A concurrent redemption won the race
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            Ok(JoinResult::already_member(&team))
        }
        Err(e) => Err(e),
    }
}

/// Exact (case-insensitive) email lookup
pub async fn get_user_id_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> Result<Option<Uuid>, DbErr> {
    let email = email.trim().to_lowercase();

    let found = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?;

    Ok(found.map(|u| u.id))
}

/// Exact username lookup
pub async fn get_user_id_by_username<C: ConnectionTrait>(
    db: &C,
    username: &str,
) -> Result<Option<Uuid>, DbErr> {
    let found = user_profile::Entity::find()
        .filter(user_profile::Column::Username.eq(username))
        .one(db)
        .await?;

    Ok(found.map(|p| p.user_id))
}
