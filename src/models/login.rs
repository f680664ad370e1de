use crate::models::{CartCustomer, UserRole};
use crate::types::{CartSessionId, SessionId, UserId};

/// Who is making the request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UserLogin {
    /// No bearer token; may still carry an anonymous cart session.
    Anonymous { cart_session: Option<CartSessionId> },
    User {
        user_id: UserId,
        role: UserRole,
        session_id: SessionId,
    },
    /// Background loaders.
    System,
}

impl UserLogin {
    pub fn user_id(&self) -> Option<UserId> {
        match *self {
            UserLogin::User { user_id, .. } => Some(user_id),
            _ => None,
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match *self {
            UserLogin::User { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        match *self {
            UserLogin::User { role, .. } => role == UserRole::Admin,
            UserLogin::System => true,
            UserLogin::Anonymous { .. } => false,
        }
    }

    /// Owner of the cart this request works on.
    pub fn cart_customer(&self) -> Option<CartCustomer> {
        match *self {
            UserLogin::User { user_id, .. } => Some(CartCustomer::User(user_id)),
            UserLogin::Anonymous { cart_session } => cart_session.map(CartCustomer::Anonymous),
            UserLogin::System => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logged_in_user_owns_user_cart() {
        let user_id = UserId::new();
        let login = UserLogin::User {
            user_id,
            role: UserRole::Customer,
            session_id: SessionId::new(),
        };
        assert_eq!(login.cart_customer(), Some(CartCustomer::User(user_id)));
        assert!(!login.is_admin());
    }

    #[test]
    fn anonymous_cart_needs_session_header() {
        assert_eq!(UserLogin::Anonymous { cart_session: None }.cart_customer(), None);

        let session = CartSessionId::new();
        assert_eq!(
            UserLogin::Anonymous {
                cart_session: Some(session)
            }
            .cart_customer(),
            Some(CartCustomer::Anonymous(session))
        );
    }
}
