//! Todo service: shared team todos and private todos

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use teamtodo_db::entities::todo;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::membership::MembershipService;
use crate::validation;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TodoStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl TodoStats {
    pub fn from_todos(todos: &[todo::Model]) -> Self {
        let completed = todos.iter().filter(|t| t.is_completed).count();
        Self {
            total: todos.len(),
            completed,
            pending: todos.len() - completed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TodoList {
    pub todos: Vec<todo::Model>,
    pub stats: TodoStats,
}

impl TodoList {
    fn new(todos: Vec<todo::Model>) -> Self {
        let stats = TodoStats::from_todos(&todos);
        Self { todos, stats }
    }
}

/// Which rows a mutation may touch
#[derive(Debug, Clone, Copy)]
enum Scope {
    /// `team_id = ?`
    Team(Uuid),
    /// `user_id = ? AND team_id IS NULL`
    Private(Uuid),
}

impl Scope {
    /// Predicate matching exactly `todo_id` inside this scope
    fn condition(self, todo_id: i32) -> Condition {
        let base = Condition::all().add(todo::Column::Id.eq(todo_id));
        match self {
            Scope::Team(team_id) => base.add(todo::Column::TeamId.eq(team_id)),
            Scope::Private(user_id) => base
                .add(todo::Column::UserId.eq(user_id))
                .add(todo::Column::TeamId.is_null()),
        }
    }
}

#[derive(Clone)]
pub struct TodoService {
    db: DatabaseConnection,
}

impl TodoService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list_team_todos(&self, team_id: Uuid, caller: Uuid) -> ServiceResult<TodoList> {
        MembershipService::require_team_access(&self.db, team_id, caller).await?;

        let todos = todo::Entity::find()
            .filter(todo::Column::TeamId.eq(team_id))
            .order_by_desc(todo::Column::CreatedAt)
            .order_by_desc(todo::Column::Id)
            .all(&self.db)
            .await?;

        Ok(TodoList::new(todos))
    }

    pub async fn add_team_todo(
        &self,
        team_id: Uuid,
        task: &str,
        caller: Uuid,
    ) -> ServiceResult<todo::Model> {
        let task = validation::validate_task(task)?;
        MembershipService::require_team_access(&self.db, team_id, caller).await?;

        let todo = self.insert(task, caller, Some(team_id)).await?;
        info!("Todo {} added to team {} by {}", todo.id, team_id, caller);
        Ok(todo)
    }

    pub async fn toggle_team_todo(
        &self,
        team_id: Uuid,
        todo_id: i32,
        caller: Uuid,
    ) -> ServiceResult<todo::Model> {
        MembershipService::require_team_access(&self.db, team_id, caller).await?;
        self.toggle(Scope::Team(team_id), todo_id).await
    }

    pub async fn delete_team_todo(
        &self,
        team_id: Uuid,
        todo_id: i32,
        caller: Uuid,
    ) -> ServiceResult<()> {
        MembershipService::require_team_access(&self.db, team_id, caller).await?;
        self.delete(Scope::Team(team_id), todo_id).await?;

        info!("Todo {} deleted from team {} by {}", todo_id, team_id, caller);
        Ok(())
    }

    pub async fn list_private_todos(&self, caller: Uuid) -> ServiceResult<TodoList> {
        let todos = todo::Entity::find()
            .filter(todo::Column::UserId.eq(caller))
            .filter(todo::Column::TeamId.is_null())
            .order_by_desc(todo::Column::CreatedAt)
            .order_by_desc(todo::Column::Id)
            .all(&self.db)
            .await?;

        Ok(TodoList::new(todos))
    }

    pub async fn add_private_todo(&self, task: &str, caller: Uuid) -> ServiceResult<todo::Model> {
        let task = validation::validate_task(task)?;
        self.insert(task, caller, None).await
    }

    pub async fn toggle_private_todo(&self, todo_id: i32, caller: Uuid) -> ServiceResult<todo::Model> {
        self.toggle(Scope::Private(caller), todo_id).await
    }

    pub async fn delete_private_todo(&self, todo_id: i32, caller: Uuid) -> ServiceResult<()> {
        self.delete(Scope::Private(caller), todo_id).await
    }

    async fn insert(
        &self,
        task: String,
        user_id: Uuid,
        team_id: Option<Uuid>,
    ) -> ServiceResult<todo::Model> {
        let todo = todo::ActiveModel {
            task: Set(task),
            is_completed: Set(false),
            user_id: Set(user_id),
            team_id: Set(team_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(todo)
    }

    /// Completion is flipped by the UPDATE itself, then re-read.
    async fn toggle(&self, scope: Scope, todo_id: i32) -> ServiceResult<todo::Model> {
        let result = todo::Entity::update_many()
            .col_expr(
                todo::Column::IsCompleted,
                Expr::col(todo::Column::IsCompleted).not(),
            )
            .filter(scope.condition(todo_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            debug!("No todo {} in {:?}", todo_id, scope);
            return Err(ServiceError::TodoNotFound);
        }

        let todo = todo::Entity::find()
            .filter(scope.condition(todo_id))
            .one(&self.db)
            .await?
            .ok_or(ServiceError::TodoNotFound)?;

        debug!("Todo {} marked completed={}", todo_id, todo.is_completed);
        Ok(todo)
    }

    async fn delete(&self, scope: Scope, todo_id: i32) -> ServiceResult<()> {
        let result = todo::Entity::delete_many()
            .filter(scope.condition(todo_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            debug!("No todo {} in {:?}", todo_id, scope);
            return Err(ServiceError::TodoNotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo(id: i32, done: bool) -> todo::Model {
        todo::Model {
            id,
            task: format!("task {}", id),
            is_completed: done,
            user_id: Uuid::new_v4(),
            team_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_stats() {
        let todos = vec![todo(1, true), todo(2, false), todo(3, false)];
        assert_eq!(
            TodoStats::from_todos(&todos),
            TodoStats {
                total: 3,
                completed: 1,
                pending: 2
            }
        );
    }

    #[test]
    fn test_stats_empty() {
        assert_eq!(TodoStats::from_todos(&[]), TodoStats::default());
    }
}
