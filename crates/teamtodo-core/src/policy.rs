//! Authorization policy set for teams and memberships
//!
//! Every rule is a pure function over the caller and rows the service has
//! already fetched. Visibility of a membership row is decided from the row
//! itself or from its parent team, never by looking up other membership rows.
//!
//! There is no INSERT rule for teams: `create_team` takes no creator argument
//! and always writes the caller into `created_by`.

use teamtodo_db::entities::{team, team_member};
use uuid::Uuid;

/// SELECT team: creator, or a caller holding a membership row.
///
/// `caller_is_member` comes from a point lookup on `team_members`, which is a
/// different table from the one being protected here.
pub fn can_view_team(caller: Uuid, team: &team::Model, caller_is_member: bool) -> bool {
    team.is_creator(caller) || caller_is_member
}

/// INSERT membership: self-join, or the creator adding somebody.
pub fn can_insert_membership(caller: Uuid, team: &team::Model, row_user_id: Uuid) -> bool {
    row_user_id == caller || team.is_creator(caller)
}

/// SELECT membership: own row, or any row of a team the caller created.
pub fn can_view_membership(caller: Uuid, team: &team::Model, row: &team_member::Model) -> bool {
    row.team_id == team.id && (row.user_id == caller || team.is_creator(caller))
}

/// DELETE membership.
///
/// A non-creator may delete their own row; the creator may delete anybody
/// else's. The creator's own row is never deletable here.
pub fn can_delete_membership(caller: Uuid, team: &team::Model, row: &team_member::Model) -> bool {
    if row.team_id != team.id || team.is_creator(row.user_id) {
        return false;
    }
    row.user_id == caller || team.is_creator(caller)
}

/// Creator-only operations: regenerate and view the invite code.
pub fn can_manage_team(caller: Uuid, team: &team::Model) -> bool {
    team.is_creator(caller)
}
