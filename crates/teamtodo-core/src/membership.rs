//! Membership service: team lifecycle, invitations and invite codes

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use teamtodo_db::entities::{
    team,
    team_member::{self, TeamRole},
    user, user_profile,
};
use teamtodo_db::functions::{self, JoinResult, JoinStatus};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{is_unique_violation, ServiceError, ServiceResult};
use crate::policy;
use crate::validation::{self, Identifier};

/// A team as seen from one of its members
#[derive(Debug, Clone, Serialize)]
pub struct UserTeam {
    pub team: team::Model,
    pub role: TeamRole,
    pub is_creator: bool,
    pub joined_at: DateTime<Utc>,
}

/// Membership row joined with the account email and optional profile
#[derive(Debug, Clone, Serialize)]
pub struct MemberInfo {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: TeamRole,
    pub is_creator: bool,
    pub joined_at: DateTime<Utc>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone)]
pub struct MembershipService {
    db: DatabaseConnection,
}

impl MembershipService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a team with the caller as creator and first member.
    ///
    /// Both rows are written in one transaction.
    pub async fn create_team(&self, name: &str, caller: Uuid) -> ServiceResult<team::Model> {
        let name = validation::validate_team_name(name)?;

        let existing = team::Entity::find()
            .filter(team::Column::Name.eq(name.as_str()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            debug!("Team name '{}' already taken", name);
            return Err(ServiceError::TeamNameTaken(name));
        }

        let txn = self.db.begin().await?;

        let invite_code = functions::generate_invite_code(&txn).await?;
        let now = Utc::now();

        let team = team::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.clone()),
            created_by: Set(caller),
            invite_code: Set(invite_code),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::TeamNameTaken(name.clone())
            } else {
                e.into()
            }
        })?;

        team_member::ActiveModel {
            team_id: Set(team.id),
            user_id: Set(caller),
            role: Set(TeamRole::Owner),
            joined_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!("Team '{}' ({}) created by {}", team.name, team.id, caller);
        Ok(team)
    }

    /// Add the user named by `identifier` (email, username or display name) to a team.
    pub async fn invite_member(
        &self,
        team_id: Uuid,
        identifier: &str,
        caller: Uuid,
    ) -> ServiceResult<team_member::Model> {
        let identifier = validation::parse_identifier(identifier)?;

        // Outsiders learn nothing about which identifiers exist
        let team = Self::require_team_access(&self.db, team_id, caller).await?;

        let target = self
            .resolve_identifier(&identifier)
            .await?
            .ok_or_else(|| ServiceError::UserNotFound(identifier_text(&identifier)))?;

        if target == caller {
            return Err(ServiceError::SelfInvite);
        }

        if !policy::can_insert_membership(caller, &team, target) {
            warn!("User {} denied inviting to team {}", caller, team_id);
            return Err(ServiceError::Unauthorized(format!(
                "{} is not the creator of team {}",
                caller, team_id
            )));
        }

        if self.find_membership(team_id, target).await?.is_some() {
            return Err(ServiceError::AlreadyMember);
        }

        let member = team_member::ActiveModel {
            team_id: Set(team_id),
            user_id: Set(target),
            role: Set(TeamRole::Member),
            joined_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::AlreadyMember
            } else {
                e.into()
            }
        })?;

        info!("User {} invited to team {} by {}", target, team_id, caller);
        Ok(member)
    }

    /// Remove another member. Creator only; the creator cannot remove themself.
    pub async fn remove_member(
        &self,
        team_id: Uuid,
        member_id: Uuid,
        caller: Uuid,
    ) -> ServiceResult<()> {
        let team = self.find_team(team_id).await?;

        if !team.is_creator(caller) {
            warn!("User {} denied removing members of team {}", caller, team_id);
            return Err(ServiceError::Unauthorized(format!(
                "{} is not the creator of team {}",
                caller, team_id
            )));
        }

        if member_id == caller {
            return Err(ServiceError::CreatorCannotLeave);
        }

        let row = self
            .find_membership(team_id, member_id)
            .await?
            .ok_or(ServiceError::NotAMember)?;

        self.delete_membership(&team, &row, caller).await?;

        info!("User {} removed from team {} by {}", member_id, team_id, caller);
        Ok(())
    }

    /// Leave a team. Not available to the creator.
    pub async fn leave_team(&self, team_id: Uuid, caller: Uuid) -> ServiceResult<()> {
        let team = self.find_team(team_id).await?;

        if team.is_creator(caller) {
            return Err(ServiceError::CreatorCannotLeave);
        }

        let row = self
            .find_membership(team_id, caller)
            .await?
            .ok_or(ServiceError::NotAMember)?;

        self.delete_membership(&team, &row, caller).await?;

        info!("User {} left team {}", caller, team_id);
        Ok(())
    }

    /// Redeem an invite code.
    ///
    /// Redeeming again as an existing member is a success with status `AlreadyMember`.
    pub async fn join_by_invite_code(&self, code: &str, caller: Uuid) -> ServiceResult<JoinResult> {
        if code.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "Invite code cannot be empty".to_string(),
            ));
        }

        let result = functions::join_team_by_invite_code(&self.db, code, caller).await?;

        if result.status == JoinStatus::InvalidCode {
            debug!("User {} supplied an unknown invite code", caller);
            return Err(ServiceError::InvalidInviteCode);
        }

        Ok(result)
    }

    /// Replace the invite code; the old one stops working immediately.
    pub async fn regenerate_invite_code(&self, team_id: Uuid, caller: Uuid) -> ServiceResult<String> {
        let team = self.find_team(team_id).await?;
        self.require_manager(caller, &team)?;

        let code = functions::generate_invite_code(&self.db).await?;

        let mut active: team::ActiveModel = team.into();
        active.invite_code = Set(code.clone());
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;

        info!("Invite code of team {} regenerated by {}", team_id, caller);
        Ok(code)
    }

    /// Current invite code. Creator only.
    pub async fn get_invite_code(&self, team_id: Uuid, caller: Uuid) -> ServiceResult<String> {
        let team = self.find_team(team_id).await?;
        self.require_manager(caller, &team)?;
        Ok(team.invite_code)
    }

    /// Teams the caller belongs to, newest first.
    pub async fn list_user_teams(&self, caller: Uuid) -> ServiceResult<Vec<UserTeam>> {
        let rows = team_member::Entity::find()
            .filter(team_member::Column::UserId.eq(caller))
            .find_also_related(team::Entity)
            .all(&self.db)
            .await?;

        let mut teams: Vec<UserTeam> = rows
            .into_iter()
            .filter_map(|(member, team)| {
                team.map(|team| UserTeam {
                    is_creator: team.is_creator(caller),
                    team,
                    role: member.role,
                    joined_at: member.joined_at,
                })
            })
            .collect();

        teams.sort_by(|a, b| b.team.created_at.cmp(&a.team.created_at));
        Ok(teams)
    }

    /// Team detail, visible to its creator and members.
    pub async fn get_team(&self, team_id: Uuid, caller: Uuid) -> ServiceResult<team::Model> {
        Self::require_team_access(&self.db, team_id, caller).await
    }

    /// Membership rows of a team the caller may see.
    ///
    /// The creator sees everybody; other members see their own row only.
    pub async fn list_members(&self, team_id: Uuid, caller: Uuid) -> ServiceResult<Vec<MemberInfo>> {
        let team = Self::require_team_access(&self.db, team_id, caller).await?;

        let rows: Vec<team_member::Model> = team_member::Entity::find()
            .filter(team_member::Column::TeamId.eq(team_id))
            .order_by_asc(team_member::Column::JoinedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .filter(|row| policy::can_view_membership(caller, &team, row))
            .collect();

        let user_ids: Vec<Uuid> = rows.iter().map(|r| r.user_id).collect();

        let emails: HashMap<Uuid, String> = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids.clone()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.email))
            .collect();

        let mut profiles: HashMap<Uuid, user_profile::Model> = user_profile::Entity::find()
            .filter(user_profile::Column::UserId.is_in(user_ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|p| (p.user_id, p))
            .collect();

        let members = rows
            .into_iter()
            .map(|row| {
                let profile = profiles.remove(&row.user_id);
                MemberInfo {
                    user_id: row.user_id,
                    email: emails.get(&row.user_id).cloned(),
                    is_creator: team.is_creator(row.user_id),
                    role: row.role,
                    joined_at: row.joined_at,
                    username: profile.as_ref().and_then(|p| p.username.clone()),
                    display_name: profile.as_ref().and_then(|p| p.display_name.clone()),
                    avatar_url: profile.and_then(|p| p.avatar_url),
                }
            })
            .collect();

        Ok(members)
    }

    /// Load a team and require the caller to be its creator or a member.
    ///
    /// Shared with the todo service, whose team operations are gated the same way.
    pub(crate) async fn require_team_access<C: ConnectionTrait>(
        db: &C,
        team_id: Uuid,
        caller: Uuid,
    ) -> ServiceResult<team::Model> {
        let team = team::Entity::find_by_id(team_id)
            .one(db)
            .await?
            .ok_or(ServiceError::TeamNotFound)?;

        let is_member = team_member::Entity::find_by_id((team_id, caller))
            .one(db)
            .await?
            .is_some();

        if !policy::can_view_team(caller, &team, is_member) {
            warn!("User {} denied access to team {}", caller, team_id);
            return Err(ServiceError::Unauthorized(format!(
                "{} is not a member of team {}",
                caller, team_id
            )));
        }

        Ok(team)
    }

    fn require_manager(&self, caller: Uuid, team: &team::Model) -> ServiceResult<()> {
        if !policy::can_manage_team(caller, team) {
            warn!("User {} denied managing team {}", caller, team.id);
            return Err(ServiceError::Unauthorized(format!(
                "only the creator of team {} may manage invite codes",
                team.id
            )));
        }
        Ok(())
    }

    async fn find_team(&self, team_id: Uuid) -> ServiceResult<team::Model> {
        team::Entity::find_by_id(team_id)
            .one(&self.db)
            .await?
            .ok_or(ServiceError::TeamNotFound)
    }

    async fn find_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> ServiceResult<Option<team_member::Model>> {
        Ok(team_member::Entity::find_by_id((team_id, user_id))
            .one(&self.db)
            .await?)
    }

    async fn delete_membership(
        &self,
        team: &team::Model,
        row: &team_member::Model,
        caller: Uuid,
    ) -> ServiceResult<()> {
        if !policy::can_delete_membership(caller, team, row) {
            warn!(
                "User {} denied deleting membership of {} in team {}",
                caller, row.user_id, team.id
            );
            return Err(ServiceError::Unauthorized(format!(
                "{} may not delete membership of {}",
                caller, row.user_id
            )));
        }

        let result = team_member::Entity::delete_many()
            .filter(team_member::Column::TeamId.eq(row.team_id))
            .filter(team_member::Column::UserId.eq(row.user_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotAMember);
        }

        Ok(())
    }

    /// Email, then username, then display name. A display name shared by
    /// several profiles resolves to nobody.
    async fn resolve_identifier(&self, identifier: &Identifier) -> ServiceResult<Option<Uuid>> {
        match identifier {
            Identifier::Email(email) => {
                Ok(functions::get_user_id_by_email(&self.db, email).await?)
            }
            Identifier::Name(name) => {
                if let Some(id) = functions::get_user_id_by_username(&self.db, name).await? {
                    debug!("Resolved '{}' by username", name);
                    return Ok(Some(id));
                }

                let matches = user_profile::Entity::find()
                    .filter(user_profile::Column::DisplayName.eq(name.as_str()))
                    .limit(2)
                    .all(&self.db)
                    .await?;

                match matches.as_slice() {
                    [only] => {
                        debug!("Resolved '{}' by display name", name);
                        Ok(Some(only.user_id))
                    }
                    [] => Ok(None),
                    _ => {
                        debug!("Display name '{}' is ambiguous", name);
                        Ok(None)
                    }
                }
            }
        }
    }
}

fn identifier_text(identifier: &Identifier) -> String {
    match identifier {
        Identifier::Email(s) | Identifier::Name(s) => s.clone(),
    }
}
