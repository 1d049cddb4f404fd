use chrono::Utc;
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};
use tracing::info;

use crate::{EngineError, ResultEngine, User, users, util::normalize_required_text};

use super::{Engine, with_tx};

impl Engine {
    /// Register a user. The username is the user id used everywhere else.
    pub async fn new_user(&self, username: &str, display_name: &str) -> ResultEngine<User> {
        let username = normalize_required_text(username, "username")?;
        let display_name = normalize_required_text(display_name, "display name")?;

        with_tx!(self, |db_tx| {
            if users::Entity::find_by_id(username.clone())
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(username));
            }

            let model = users::ActiveModel {
                username: ActiveValue::Set(username.clone()),
                display_name: ActiveValue::Set(display_name),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            info!(user_id = %username, "user created");
            Ok(User::from(model))
        })
    }

    /// Return a user by username.
    pub async fn user(&self, username: &str) -> ResultEngine<User> {
        users::Entity::find_by_id(username.to_string())
            .one(&self.database)
            .await?
            .map(User::from)
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))
    }
}
