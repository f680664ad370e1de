use crate::db::*;
use crate::models::*;

pub const ABANDONED_CHECKOUTS_TABLE: &str = "abandoned_checkouts";
pub const INACTIVITY_NOTIFICATIONS_TABLE: &str = "inactivity_notifications";

pub type AbandonedCheckoutRepoImpl = DbRepoImpl<AbandonedCheckout, NewAbandonedCheckout, AbandonedCheckoutFilter, AbandonedCheckoutUpdater>;
pub type InactivityNotificationRepoImpl = DbRepoImpl<InactivityNotification, NewInactivityNotification, InactivityNotificationFilter, NoUpdater>;

pub fn make_abandoned_checkout_repo() -> AbandonedCheckoutRepoImpl {
    AbandonedCheckoutRepoImpl::new(ABANDONED_CHECKOUTS_TABLE)
}

pub fn make_inactivity_notification_repo() -> InactivityNotificationRepoImpl {
    InactivityNotificationRepoImpl::new(INACTIVITY_NOTIFICATIONS_TABLE)
}
