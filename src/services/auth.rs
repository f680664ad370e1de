//! Accounts, sessions and bearer-token authentication.

use chrono::{Duration, Utc};
use failure::Error as FailureError;
use rand::distributions::Alphanumeric;
use rand::Rng;

use super::notification::{Notification, Notifier};
use super::types::{validate, ServiceContext, ServiceFuture};
use crate::acl;
use crate::db::Ordering;
use crate::errors::Error;
use crate::models::*;
use crate::repos;
use crate::types::SessionId;

const TOKEN_LENGTH: usize = 48;

pub fn random_token(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

async fn hash_password(password: String, cost: u32) -> Result<String, FailureError> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

async fn verify_password(password: String, hash: String) -> Result<bool, FailureError> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??)
}

pub trait AuthService: Send + Sync {
    /// Creates a customer account and mails the verification link
    fn register(&self, payload: RegisterPayload) -> ServiceFuture<User>;
    /// Checks credentials and opens a session
    fn login(&self, payload: LoginPayload, user_agent: Option<String>) -> ServiceFuture<LoginResponse>;
    /// Closes the current session
    fn logout(&self) -> ServiceFuture<()>;
    fn me(&self) -> ServiceFuture<User>;
    /// Open sessions of the current user
    fn sessions(&self) -> ServiceFuture<Vec<Session>>;
    fn revoke_session(&self, id: SessionId) -> ServiceFuture<()>;
    fn verify_email(&self, payload: VerifyEmailPayload) -> ServiceFuture<User>;
    /// Resolves a bearer token into the caller identity
    fn authenticate(&self, token: String) -> ServiceFuture<UserLogin>;
}

pub struct AuthServiceImpl {
    pub ctx: ServiceContext,
    pub login: UserLogin,
}

impl AuthServiceImpl {
    pub fn new(ctx: ServiceContext, login: UserLogin) -> Self {
        Self { ctx, login }
    }
}

impl AuthService for AuthServiceImpl {
    fn register(&self, payload: RegisterPayload) -> ServiceFuture<User> {
        let ctx = self.ctx.clone();

        Box::pin(async move {
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let repo = repos::user::make_repo();

            let email = payload.email.trim().to_lowercase();
            let existing = repo
                .select_one(
                    &*conn,
                    UserFilter {
                        email: Some(email.clone()),
                        ..Default::default()
                    },
                )
                .await?;
            if existing.is_some() {
                return Err(format_err!("Email {} is already registered", email).context(Error::Conflict).into());
            }

            let password_hash = hash_password(payload.password, ctx.config.auth.bcrypt_cost).await?;
            let token = random_token(TOKEN_LENGTH);
            let user = repo
                .insert_exactly_one(
                    &*conn,
                    NewUser {
                        email,
                        password_hash,
                        first_name: payload.first_name,
                        last_name: payload.last_name,
                        phone: payload.phone,
                        company_name: payload.company_name,
                        role: UserRole::Customer,
                        verification_token: Some(token.clone()),
                    },
                )
                .await?;
            info!("Registered user {}", user.id);

            Notifier::new(&ctx)
                .notify(
                    user.email.clone(),
                    Some(user.full_name()),
                    Notification::EmailVerification {
                        first_name: user.first_name.clone(),
                        token,
                    },
                )
                .await;

            Ok(user)
        })
    }

    fn login(&self, payload: LoginPayload, user_agent: Option<String>) -> ServiceFuture<LoginResponse> {
        let ctx = self.ctx.clone();

        Box::pin(async move {
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let user_repo = repos::user::make_repo();
            let now = Utc::now();

            let user = user_repo
                .select_one(
                    &*conn,
                    UserFilter {
                        email: Some(payload.email.trim().to_lowercase()),
                        ..Default::default()
                    },
                )
                .await?
                .ok_or(Error::InvalidCredentials)?;

            user.ensure_unlocked(now)?;

            if !verify_password(payload.password, user.password_hash.clone()).await? {
                let auth = &ctx.config.auth;
                let counted = repos::user::record_failed_login(
                    &*conn,
                    user.id,
                    now,
                    auth.max_login_attempts,
                    now + Duration::minutes(auth.lock_minutes),
                )
                .await?;
                if counted.is_locked(now) {
                    warn!("Locking user {} after {} failed logins", user.id, auth.max_login_attempts);
                }
                return Err(Error::InvalidCredentials.into());
            }

            let user = user_repo
                .update_exactly_one(
                    &*conn,
                    UserUpdater {
                        filter: user.id.into(),
                        data: UserUpdateData {
                            login_attempts: Some(0),
                            lock_until: Some(None),
                            last_login_at: Some(now),
                            ..Default::default()
                        },
                    },
                )
                .await?;

            let session = repos::session::make_repo()
                .insert_exactly_one(
                    &*conn,
                    NewSession {
                        user_id: user.id,
                        token: random_token(TOKEN_LENGTH),
                        user_agent,
                        expires_at: now + Duration::hours(ctx.config.auth.session_ttl_hours),
                    },
                )
                .await?;
            debug!("Opened session {} for user {}", session.id, user.id);

            Ok(LoginResponse {
                token: session.token,
                expires_at: session.expires_at,
                user,
            })
        })
    }

    fn logout(&self) -> ServiceFuture<()> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let session_id = login.session_id().ok_or(Error::Unauthorized)?;
            let conn = ctx.connection().await?;
            repos::session::make_repo()
                .delete(
                    &*conn,
                    SessionFilter {
                        id: Some(session_id),
                        ..Default::default()
                    },
                )
                .await?;
            Ok(())
        })
    }

    fn me(&self) -> ServiceFuture<User> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let user_id = acl::require_user(&login)?;
            let conn = ctx.connection().await?;
            Ok(repos::user::make_repo().select_exactly_one(&*conn, user_id.into()).await?)
        })
    }

    fn sessions(&self) -> ServiceFuture<Vec<Session>> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let user_id = acl::require_user(&login)?;
            let conn = ctx.connection().await?;
            let now = Utc::now();
            let sessions = repos::session::make_repo()
                .select_full(
                    &*conn,
                    SessionFilter {
                        user_id: Some(user_id),
                        ..Default::default()
                    },
                    |b| b.with_ordering("created_at", Ordering::Descending),
                )
                .await?;
            Ok(sessions.into_iter().filter(|s| !s.is_expired(now)).collect())
        })
    }

    fn revoke_session(&self, id: SessionId) -> ServiceFuture<()> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let user_id = acl::require_user(&login)?;
            let conn = ctx.connection().await?;
            let deleted = repos::session::make_repo()
                .delete(
                    &*conn,
                    SessionFilter {
                        id: Some(id),
                        user_id: Some(user_id),
                        ..Default::default()
                    },
                )
                .await?;
            if deleted.is_empty() {
                return Err(format_err!("Session {}", id).context(Error::NotFound).into());
            }
            Ok(())
        })
    }

    fn verify_email(&self, payload: VerifyEmailPayload) -> ServiceFuture<User> {
        let ctx = self.ctx.clone();

        Box::pin(async move {
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let user = repos::user::make_repo()
                .update(
                    &*conn,
                    UserUpdater {
                        filter: UserFilter {
                            verification_token: Some(payload.token),
                            ..Default::default()
                        },
                        data: UserUpdateData {
                            email_verified: Some(true),
                            verification_token: Some(None),
                            ..Default::default()
                        },
                    },
                )
                .await?
                .pop()
                .ok_or_else(|| format_err!("Unknown verification token").context(Error::NotFound))?;
            info!("Verified email of user {}", user.id);
            Ok(user)
        })
    }

    fn authenticate(&self, token: String) -> ServiceFuture<UserLogin> {
        let ctx = self.ctx.clone();

        Box::pin(async move {
            let conn = ctx.connection().await?;
            let session_repo = repos::session::make_repo();
            let session = session_repo
                .select_one(
                    &*conn,
                    SessionFilter {
                        token: Some(token),
                        ..Default::default()
                    },
                )
                .await?
                .ok_or_else(|| format_err!("Unknown session token").context(Error::Unauthorized))?;

            if session.is_expired(Utc::now()) {
                session_repo
                    .delete(
                        &*conn,
                        SessionFilter {
                            id: Some(session.id),
                            ..Default::default()
                        },
                    )
                    .await?;
                return Err(format_err!("Session {} expired", session.id).context(Error::Unauthorized).into());
            }

            let user = repos::user::make_repo().select_exactly_one(&*conn, session.user_id.into()).await?;
            Ok(UserLogin::User {
                user_id: user.id,
                role: user.role,
                session_id: session.id,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_alphanumeric_and_unique() {
        let a = random_token(TOKEN_LENGTH);
        let b = random_token(TOKEN_LENGTH);
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hash = hash_password("s3cret-pass".to_string(), 4).await.unwrap();
        assert!(verify_password("s3cret-pass".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".to_string(), hash).await.unwrap());
    }
}
