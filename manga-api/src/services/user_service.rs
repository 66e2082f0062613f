//! User Service
//!
//! Registration, login, token refresh and profile management. Passwords are
//! stored as argon2 hashes; tokens come from [`TokenService`].

use manga_core::{
    validate_password, EntityId, EntityKind, MangaError, MangaResult, NewUser, PasswordChange,
    ProfileUpdate, Role, TokenPair, User, UserCredentials, UserRegistration,
};
use serde::Serialize;

use crate::auth::TokenService;
use crate::password::{hash_password_async, verify_password_async};

use super::{found, Repositories};

/// A user together with a freshly issued token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSession {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Clone)]
pub struct UserService {
    repos: Repositories,
    tokens: TokenService,
}

impl UserService {
    pub fn new(repos: Repositories, tokens: TokenService) -> Self {
        Self { repos, tokens }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create a regular user and sign them in.
    pub async fn register(&self, registration: UserRegistration) -> MangaResult<AuthSession> {
        registration.validate()?;
        self.ensure_available(&registration.username, &registration.email, None)
            .await?;

        let password_hash = hash_password_async(registration.password).await?;
        let user = self
            .repos
            .users
            .create(NewUser {
                username: registration.username,
                email: registration.email,
                password_hash,
                role: Role::User,
            })
            .await?;

        let tokens = self.tokens.issue_pair(&user)?;
        tracing::info!(user_id = user.id, username = %user.username, "Registered user");
        Ok(AuthSession { user, tokens })
    }

    /// Sign in by username, or by email when no username matches.
    ///
    /// Every failure, unknown account or wrong password, is reported as
    /// [`MangaError::InvalidCredentials`].
    pub async fn login(&self, credentials: UserCredentials) -> MangaResult<AuthSession> {
        credentials.validate()?;

        let user = match found(self.repos.users.get_by_username(&credentials.username).await)? {
            Some(user) => Some(user),
            None => found(self.repos.users.get_by_email(&credentials.username).await)?,
        };
        let Some(user) = user else {
            tracing::debug!(login = %credentials.username, "Login for unknown account");
            return Err(MangaError::InvalidCredentials);
        };

        let matches =
            verify_password_async(credentials.password, user.password_hash.clone()).await?;
        if !matches {
            tracing::warn!(user_id = user.id, "Login with wrong password");
            return Err(MangaError::InvalidCredentials);
        }

        let tokens = self.tokens.issue_pair(&user)?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok(AuthSession { user, tokens })
    }

    /// Exchange a refresh token for a new pair, re-reading the user so a
    /// deleted account or changed role takes effect.
    pub async fn refresh(&self, refresh_token: &str) -> MangaResult<TokenPair> {
        let claims = self.tokens.validate_refresh(refresh_token)?;
        let user = match self.repos.users.get(claims.user_id).await {
            Ok(user) => user,
            Err(MangaError::NotFound { .. }) => {
                tracing::warn!(user_id = claims.user_id, "Refresh token for deleted user");
                return Err(MangaError::token_invalid("user no longer exists"));
            }
            Err(e) => return Err(e),
        };
        Ok(self.tokens.refresh(refresh_token, &user)?)
    }

    pub async fn profile(&self, user_id: EntityId) -> MangaResult<User> {
        self.repos.users.get(user_id).await
    }

    pub async fn update_profile(&self, user_id: EntityId, update: ProfileUpdate) -> MangaResult<User> {
        update.validate()?;
        let mut user = self.repos.users.get(user_id).await?;
        self.ensure_available(&update.username, &update.email, Some(user_id))
            .await?;

        user.username = update.username;
        user.email = update.email;
        let user = self.repos.users.update(&user).await?;
        tracing::info!(user_id, "Updated profile");
        Ok(user)
    }

    /// Replace the password after checking the current one.
    pub async fn change_password(&self, user_id: EntityId, change: PasswordChange) -> MangaResult<()> {
        let mut user = self.repos.users.get(user_id).await?;
        let matches =
            verify_password_async(change.old_password, user.password_hash.clone()).await?;
        if !matches {
            tracing::warn!(user_id, "Password change with wrong current password");
            return Err(MangaError::InvalidCredentials);
        }
        validate_password("new_password", &change.new_password)?;

        user.password_hash = hash_password_async(change.new_password).await?;
        self.repos.users.update(&user).await?;
        tracing::info!(user_id, "Changed password");
        Ok(())
    }

    /// Conflict when another account already holds `username` or `email`.
    async fn ensure_available(
        &self,
        username: &str,
        email: &str,
        owner: Option<EntityId>,
    ) -> MangaResult<()> {
        let taken = |user: &User| owner != Some(user.id);

        if let Some(user) = found(self.repos.users.get_by_username(username).await)? {
            if taken(&user) {
                return Err(MangaError::Conflict {
                    entity: EntityKind::User,
                    field: "username".to_string(),
                    value: username.to_string(),
                });
            }
        }
        if let Some(user) = found(self.repos.users.get_by_email(email).await)? {
            if taken(&user) {
                return Err(MangaError::Conflict {
                    entity: EntityKind::User,
                    field: "email".to_string(),
                    value: email.to_string(),
                });
            }
        }
        Ok(())
    }
}
