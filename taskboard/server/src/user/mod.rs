use crate::auth::{AuthState, CurrentUser};
use crate::entities::*;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{SubsecRound, Utc};
use sea_orm::*;
use std::sync::Arc;
use uuid::Uuid;

pub mod api;

#[derive(Debug, PartialEq, Clone, Eq)]
pub struct User {
    id: Uuid,
    username: String,
}

impl User {
    pub fn new(id: Uuid, username: String) -> Self {
        Self { id, username }
    }

    /// Returns the ID of the user.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the username.
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        User::new(model.id, model.username)
    }
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        CurrentUser::new(user.id, user.username)
    }
}

/// Error type for UserService operations.
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Represents a registration request that failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// Represents a username that is already registered.
    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),
    /// Represents an unknown username or a wrong password.
    #[error("Invalid username or password")]
    InvalidCredentials,
    /// Represents a failure while hashing or parsing a password hash.
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

#[derive(Clone)]
pub struct UserState {
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub auth: Arc<AuthState>,
}

pub struct UserService<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl UserService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> UserService<'_> {
        UserService { db }
    }

    /// Registers a new user account.
    ///
    /// # Arguments
    ///
    /// * `username` - The unique name the user logs in with.
    /// * `password` - The plain-text password, stored only as an Argon2 hash.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `User`, or `UsernameTaken` if the name is registered.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: String,
        password: &str,
    ) -> Result<User, UserServiceError> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(UserServiceError::Validation("Username is required".to_string()));
        }
        if password.is_empty() {
            return Err(UserServiceError::Validation("Password is required".to_string()));
        }

        if self.find_by_username(&username).await?.is_some() {
            return Err(UserServiceError::UsernameTaken(username));
        }

        let active_model = user::ActiveModel {
            id: ActiveValue::Set(Uuid::now_v7()),
            username: ActiveValue::Set(username.clone()),
            password_hash: ActiveValue::Set(hash_password(password)?),
            created_at: ActiveValue::Set(Utc::now().trunc_subsecs(6).fixed_offset()),
        };
        let created_model = active_model.insert(self.db).await.map_err(|err| {
            // Two registrations can race past the existence check.
            match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    UserServiceError::UsernameTaken(username.clone())
                }
                _ => UserServiceError::Database(err),
            }
        })?;
        Ok(User::from(created_model))
    }

    /// Checks a username and password pair.
    ///
    /// Unknown usernames and wrong passwords both yield `InvalidCredentials`.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        let Some(model) = self.find_by_username(username.trim()).await? else {
            return Err(UserServiceError::InvalidCredentials);
        };

        let parsed_hash = PasswordHash::new(&model.password_hash)
            .map_err(|err| UserServiceError::PasswordHash(err.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| UserServiceError::InvalidCredentials)?;

        Ok(User::from(model))
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<user::Model>, UserServiceError> {
        let existing_user = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db)
            .await?;
        Ok(existing_user)
    }
}

fn hash_password(password: &str) -> Result<String, UserServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| UserServiceError::PasswordHash(err.to_string()))?;
    Ok(hash.to_string())
}
