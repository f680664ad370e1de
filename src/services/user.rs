use failure::Error as FailureError;
use futures::future;
use serde_json::json;

use super::types::{ServiceContext, ServiceFuture};
use crate::acl;
use crate::db::{FilteredOperationBuilder, Ordering};
use crate::errors::Error;
use crate::export::{into_csv, CsvUser};
use crate::models::*;
use crate::repos;
use crate::types::UserId;

/// Back-office user management
pub trait UserService: Send + Sync {
    fn list(&self, terms: UserSearchTerms) -> ServiceFuture<Vec<User>>;
    fn set_role(&self, id: UserId, payload: SetRolePayload) -> ServiceFuture<User>;
    /// Clears the login lock and the failed attempts counter
    fn unlock(&self, id: UserId) -> ServiceFuture<User>;
    fn export_csv(&self, terms: UserSearchTerms) -> ServiceFuture<Vec<u8>>;
}

pub struct UserServiceImpl {
    pub ctx: ServiceContext,
    pub login: UserLogin,
}

impl UserServiceImpl {
    pub fn new(ctx: ServiceContext, login: UserLogin) -> Self {
        Self { ctx, login }
    }

    /// `paged = false` returns every matching user.
    fn search(&self, terms: UserSearchTerms, paged: bool) -> ServiceFuture<Vec<User>> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            let paging = if paged {
                Some(Paging {
                    offset: terms.offset,
                    count: terms.count,
                })
            } else {
                None
            };
            let filter = UserFilter {
                email_like: terms.email.filter(|e| !e.trim().is_empty()),
                role: terms.role,
                ..Default::default()
            };
            let conn = ctx.connection().await?;
            Ok(repos::user::make_repo().select_full(&*conn, filter, users_query(paging)).await?)
        })
    }

    fn update_user(&self, id: UserId, data: UserUpdateData, action: &'static str, details: serde_json::Value) -> ServiceFuture<User> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            let conn = ctx.connection().await?;
            let user = repos::user::make_repo()
                .update(&*conn, UserUpdater { filter: id.into(), data })
                .await?
                .pop()
                .ok_or_else(|| format_err!("User {}", id).context(Error::NotFound))?;
            repos::audit_log::make_repo()
                .insert_exactly_one(&*conn, NewAuditLog::new(AuditEntity::User, id, action, login.user_id(), details))
                .await?;
            Ok(user)
        })
    }
}

fn users_query(paging: Option<Paging>) -> impl FnOnce(FilteredOperationBuilder) -> FilteredOperationBuilder + Send {
    move |b| paginate(paging, b.with_ordering("created_at", Ordering::Descending))
}

impl UserService for UserServiceImpl {
    fn list(&self, terms: UserSearchTerms) -> ServiceFuture<Vec<User>> {
        self.search(terms, true)
    }

    fn set_role(&self, id: UserId, payload: SetRolePayload) -> ServiceFuture<User> {
        if self.login.user_id() == Some(id) && payload.role != UserRole::Admin {
            let e: FailureError = format_err!("Admins cannot remove their own role").context(Error::Forbidden).into();
            return Box::pin(future::err(e));
        }
        self.update_user(
            id,
            UserUpdateData {
                role: Some(payload.role),
                ..Default::default()
            },
            "role_changed",
            json!({ "role": payload.role }),
        )
    }

    fn unlock(&self, id: UserId) -> ServiceFuture<User> {
        self.update_user(
            id,
            UserUpdateData {
                login_attempts: Some(0),
                lock_until: Some(None),
                ..Default::default()
            },
            "unlocked",
            json!({}),
        )
    }

    fn export_csv(&self, terms: UserSearchTerms) -> ServiceFuture<Vec<u8>> {
        let users = self.search(terms, false);

        Box::pin(async move {
            let users = users.await?;
            into_csv(users.into_iter().map(CsvUser::from))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_is_paged_but_export_is_not() {
        let (listing, _) = users_query(Some(Paging::default()))(FilteredOperationBuilder::new("users")).build_select();
        assert_eq!(listing, "SELECT * FROM users ORDER BY created_at DESC LIMIT 50 OFFSET 0;");

        let (export, _) = users_query(None)(FilteredOperationBuilder::new("users")).build_select();
        assert_eq!(export, "SELECT * FROM users ORDER BY created_at DESC;");
    }
}
