//! Profile service: each user reads and edits only their own profile

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use teamtodo_db::entities::user_profile;
use tracing::info;
use uuid::Uuid;

use crate::error::{is_unique_violation, ServiceError, ServiceResult};
use crate::validation;

/// Editable profile fields. Blank values clear the field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Clone)]
pub struct ProfileService {
    db: DatabaseConnection,
}

impl ProfileService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_profile(&self, caller: Uuid) -> ServiceResult<Option<user_profile::Model>> {
        Ok(user_profile::Entity::find_by_id(caller).one(&self.db).await?)
    }

    /// Create or replace the caller's profile.
    pub async fn update_profile(
        &self,
        caller: Uuid,
        update: ProfileUpdate,
    ) -> ServiceResult<user_profile::Model> {
        let username = validation::optional_text(
            update.username.as_deref(),
            "Username",
            validation::USERNAME_MAX,
        )?
        .map(|u| validation::validate_username(&u))
        .transpose()?;
        let display_name = validation::optional_text(
            update.display_name.as_deref(),
            "Display name",
            validation::DISPLAY_NAME_MAX,
        )?;
        let bio = validation::optional_text(update.bio.as_deref(), "Bio", validation::BIO_MAX)?;
        let avatar_url = validation::validate_avatar_url(update.avatar_url.as_deref())?;

        if let Some(name) = &username {
            let taken = user_profile::Entity::find()
                .filter(user_profile::Column::Username.eq(name.as_str()))
                .filter(user_profile::Column::UserId.ne(caller))
                .one(&self.db)
                .await?;
            if taken.is_some() {
                return Err(ServiceError::UsernameTaken(name.clone()));
            }
        }

        let now = Utc::now();
        let existing = user_profile::Entity::find_by_id(caller).one(&self.db).await?;

        let saved = match existing {
            Some(profile) => {
                let mut active: user_profile::ActiveModel = profile.into();
                active.username = Set(username.clone());
                active.display_name = Set(display_name);
                active.avatar_url = Set(avatar_url);
                active.bio = Set(bio);
                active.updated_at = Set(now);
                active.update(&self.db).await
            }
            None => {
                user_profile::ActiveModel {
                    user_id: Set(caller),
                    username: Set(username.clone()),
                    display_name: Set(display_name),
                    avatar_url: Set(avatar_url),
                    bio: Set(bio),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&self.db)
                .await
            }
        };

        let profile = saved.map_err(|e| match username {
            Some(name) if is_unique_violation(&e) => ServiceError::UsernameTaken(name),
            _ => e.into(),
        })?;

        info!("Profile of {} updated", caller);
        Ok(profile)
    }
}
