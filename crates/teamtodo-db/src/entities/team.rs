//! Team entity, the unit of multi-tenancy

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "teams")]
pub struct Model {
    /// Team UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Team name (unique, 2-50 chars)
    #[sea_orm(unique)]
    pub name: String,

    /// User who created the team. Never changes after creation.
    pub created_by: Uuid,

    /// Current invite code; regenerating it invalidates the old one
    #[sea_orm(unique)]
    pub invite_code: String,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    pub fn is_creator(&self, user_id: Uuid) -> bool {
        self.created_by == user_id
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Team belongs to its creator
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Creator,

    /// Team has members
    #[sea_orm(has_many = "super::team_member::Entity")]
    Members,

    /// Team owns shared todos
    #[sea_orm(has_many = "super::todo::Entity")]
    Todos,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl Related<super::team_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::todo::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Todos.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
