use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use validator::Validate;

use crate::db::*;
use crate::errors::{Error, RepoError};
use crate::types::UserId;

pub const ID_COLUMN: &str = "id";
const EMAIL_COLUMN: &str = "email";
const PASSWORD_HASH_COLUMN: &str = "password_hash";
const FIRST_NAME_COLUMN: &str = "first_name";
const LAST_NAME_COLUMN: &str = "last_name";
const PHONE_COLUMN: &str = "phone";
const COMPANY_NAME_COLUMN: &str = "company_name";
const ROLE_COLUMN: &str = "role";
const EMAIL_VERIFIED_COLUMN: &str = "email_verified";
const VERIFICATION_TOKEN_COLUMN: &str = "verification_token";
pub const LOGIN_ATTEMPTS_COLUMN: &str = "login_attempts";
pub const LOCK_UNTIL_COLUMN: &str = "lock_until";
const LAST_LOGIN_AT_COLUMN: &str = "last_login_at";
const CREATED_AT_COLUMN: &str = "created_at";
const UPDATED_AT_COLUMN: &str = "updated_at";

db_enum! {
    pub enum UserRole {
        Customer => "customer",
        Admin => "admin",
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub role: UserRole,
    pub email_verified: bool,
    #[serde(skip_serializing, default)]
    pub verification_token: Option<String>,
    pub login_attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.map(|until| until > now).unwrap_or(false)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Locked accounts are refused before the password is even checked.
    pub fn ensure_unlocked(&self, now: DateTime<Utc>) -> Result<(), Error> {
        match self.lock_until {
            Some(until) if until > now => Err(Error::AccountLocked(until)),
            _ => Ok(()),
        }
    }
}

impl TryFrom<Row> for User {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        let role: String = row.try_get(ROLE_COLUMN)?;
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            email: row.try_get(EMAIL_COLUMN)?,
            password_hash: row.try_get(PASSWORD_HASH_COLUMN)?,
            first_name: row.try_get(FIRST_NAME_COLUMN)?,
            last_name: row.try_get(LAST_NAME_COLUMN)?,
            phone: row.try_get(PHONE_COLUMN)?,
            company_name: row.try_get(COMPANY_NAME_COLUMN)?,
            role: role.parse()?,
            email_verified: row.try_get(EMAIL_VERIFIED_COLUMN)?,
            verification_token: row.try_get(VERIFICATION_TOKEN_COLUMN)?,
            login_attempts: row.try_get(LOGIN_ATTEMPTS_COLUMN)?,
            lock_until: row.try_get(LOCK_UNTIL_COLUMN)?,
            last_login_at: row.try_get(LAST_LOGIN_AT_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
            updated_at: row.try_get(UPDATED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct RegisterPayload {
    #[validate(email(message = "Adresse e-mail invalide"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Le mot de passe doit contenir au moins 8 caractères"))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub company_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct LoginPayload {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct VerifyEmailPayload {
    #[validate(length(min = 1))]
    pub token: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SetRolePayload {
    pub role: UserRole,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserSearchTerms {
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub offset: Option<i64>,
    pub count: Option<i64>,
}

pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub role: UserRole,
    pub verification_token: Option<String>,
}

impl Inserter for NewUser {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        let now = Utc::now();
        InsertBuilder::new(table)
            .with_arg(ID_COLUMN, UserId::new())
            .with_arg(EMAIL_COLUMN, self.email.to_lowercase())
            .with_arg(PASSWORD_HASH_COLUMN, self.password_hash)
            .with_arg(FIRST_NAME_COLUMN, self.first_name)
            .with_arg(LAST_NAME_COLUMN, self.last_name)
            .with_arg(PHONE_COLUMN, self.phone)
            .with_arg(COMPANY_NAME_COLUMN, self.company_name)
            .with_arg(ROLE_COLUMN, self.role.to_string())
            .with_arg(EMAIL_VERIFIED_COLUMN, false)
            .with_arg(VERIFICATION_TOKEN_COLUMN, self.verification_token)
            .with_arg(LOGIN_ATTEMPTS_COLUMN, 0i32)
            .with_arg(CREATED_AT_COLUMN, now)
            .with_arg(UPDATED_AT_COLUMN, now)
    }
}

#[derive(Clone, Debug, Default)]
pub struct UserFilter {
    pub id: Option<UserId>,
    pub email: Option<String>,
    pub email_like: Option<String>,
    pub role: Option<UserRole>,
    pub verification_token: Option<String>,
    pub last_login_before: Option<DateTime<Utc>>,
}

impl From<UserId> for UserFilter {
    fn from(id: UserId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}

impl Filter for UserFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.id {
            b = b.with_filter(ID_COLUMN, v);
        }
        if let Some(v) = self.email {
            b = b.with_filter(EMAIL_COLUMN, v.to_lowercase());
        }
        if let Some(v) = self.email_like {
            b = b.with_comparison(EMAIL_COLUMN, Comparison::ILike, contains_pattern(&v));
        }
        if let Some(v) = self.role {
            b = b.with_filter(ROLE_COLUMN, v.to_string());
        }
        if let Some(v) = self.verification_token {
            b = b.with_filter(VERIFICATION_TOKEN_COLUMN, v);
        }
        if let Some(v) = self.last_login_before {
            b = b.with_comparison(LAST_LOGIN_AT_COLUMN, Comparison::Lt, v);
        }

        b
    }
}

#[derive(Clone, Debug, Default)]
pub struct UserUpdateData {
    pub role: Option<UserRole>,
    pub email_verified: Option<bool>,
    pub verification_token: Option<Option<String>>,
    pub login_attempts: Option<i32>,
    pub lock_until: Option<Option<DateTime<Utc>>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

pub struct UserUpdater {
    pub filter: UserFilter,
    pub data: UserUpdateData,
}

impl Updater for UserUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let UserUpdater { filter, data } = self;

        let mut b = UpdateBuilder::from(filter.into_filtered_operation_builder(table)).with_value(UPDATED_AT_COLUMN, Utc::now());

        if let Some(v) = data.role {
            b = b.with_value(ROLE_COLUMN, v.to_string());
        }
        if let Some(v) = data.email_verified {
            b = b.with_value(EMAIL_VERIFIED_COLUMN, v);
        }
        if let Some(v) = data.verification_token {
            b = b.with_value(VERIFICATION_TOKEN_COLUMN, v);
        }
        if let Some(v) = data.login_attempts {
            b = b.with_value(LOGIN_ATTEMPTS_COLUMN, v);
        }
        if let Some(v) = data.lock_until {
            b = b.with_value(LOCK_UNTIL_COLUMN, v);
        }
        if let Some(v) = data.last_login_at {
            b = b.with_value(LAST_LOGIN_AT_COLUMN, v);
        }

        b
    }
}

#[cfg(test)]
pub mod tests {
    use chrono::Duration;

    use super::*;

    pub fn make_user() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            email: "marie.durand@exemple.fr".to_string(),
            password_hash: String::new(),
            first_name: "Marie".to_string(),
            last_name: "Durand".to_string(),
            phone: None,
            company_name: None,
            role: UserRole::Customer,
            email_verified: true,
            verification_token: None,
            login_attempts: 0,
            lock_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn lock_is_only_active_in_the_future() {
        let now = Utc::now();
        let mut user = make_user();
        assert!(!user.is_locked(now));

        user.lock_until = Some(now + Duration::minutes(5));
        assert!(user.is_locked(now));

        user.lock_until = Some(now - Duration::minutes(5));
        assert!(!user.is_locked(now));
    }

    #[test]
    fn locked_account_is_refused() {
        let now = Utc::now();
        let mut user = make_user();
        user.login_attempts = 4;
        assert_eq!(user.ensure_unlocked(now), Ok(()));

        let until = now + Duration::minutes(30);
        user.lock_until = Some(until);
        assert_eq!(user.ensure_unlocked(now), Err(Error::AccountLocked(until)));

        user.lock_until = Some(now - Duration::seconds(1));
        assert_eq!(user.ensure_unlocked(now), Ok(()));
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut user = make_user();
        user.password_hash = "$2b$10$abc".to_string();
        user.verification_token = Some("tok".to_string());
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("verification_token").is_none());
        assert_eq!(json["role"], "customer");
    }
}
