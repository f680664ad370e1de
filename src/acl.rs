//! Access rules. Admins and loaders may touch everything, customers only
//! what they own and never delete it.

use failure::Error as FailureError;

use crate::errors::Error;
use crate::models::{CartCustomer, UserLogin};
use crate::types::UserId;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    Read,
    Update,
    Delete,
}

pub fn check_acl(login: &UserLogin, owner: UserId, action: Action) -> bool {
    match *login {
        UserLogin::System => true,
        UserLogin::User { .. } if login.is_admin() => true,
        UserLogin::User { user_id, .. } => user_id == owner && action != Action::Delete,
        UserLogin::Anonymous { .. } => false,
    }
}

fn denied(login: &UserLogin) -> FailureError {
    match *login {
        UserLogin::Anonymous { .. } => Error::Unauthorized.into(),
        _ => Error::Forbidden.into(),
    }
}

pub fn ensure_access(login: &UserLogin, owner: UserId, action: Action) -> Result<(), FailureError> {
    if check_acl(login, owner, action) {
        Ok(())
    } else {
        Err(denied(login))
    }
}

/// Logged-in user, or `Unauthorized`.
pub fn require_user(login: &UserLogin) -> Result<UserId, FailureError> {
    login.user_id().ok_or_else(|| Error::Unauthorized.into())
}

pub fn require_admin(login: &UserLogin) -> Result<(), FailureError> {
    if login.is_admin() {
        Ok(())
    } else {
        Err(denied(login))
    }
}

/// Cart owner; anonymous visitors need a `Cart-Session` header.
pub fn require_cart_customer(login: &UserLogin) -> Result<CartCustomer, FailureError> {
    login.cart_customer().ok_or_else(|| Error::Unauthorized.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::error_kind;
    use crate::models::UserRole;
    use crate::types::SessionId;

    fn user(role: UserRole) -> (UserId, UserLogin) {
        let user_id = UserId::new();
        (
            user_id,
            UserLogin::User {
                user_id,
                role,
                session_id: SessionId::new(),
            },
        )
    }

    #[test]
    fn owner_reads_but_does_not_delete() {
        let (id, login) = user(UserRole::Customer);
        assert!(check_acl(&login, id, Action::Read));
        assert!(check_acl(&login, id, Action::Update));
        assert!(!check_acl(&login, id, Action::Delete));
        assert!(!check_acl(&login, UserId::new(), Action::Read));
    }

    #[test]
    fn admin_does_everything() {
        let (_, login) = user(UserRole::Admin);
        assert!(check_acl(&login, UserId::new(), Action::Delete));
        assert!(require_admin(&login).is_ok());
    }

    #[test]
    fn anonymous_is_unauthorized_customer_is_forbidden() {
        let anonymous = UserLogin::Anonymous { cart_session: None };
        let e = require_admin(&anonymous).unwrap_err();
        assert_eq!(error_kind(&e), Some(Error::Unauthorized));

        let (_, customer) = user(UserRole::Customer);
        let e = require_admin(&customer).unwrap_err();
        assert_eq!(error_kind(&e), Some(Error::Forbidden));
    }
}
