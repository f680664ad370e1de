use crate::db::*;
use crate::models::*;

pub const TABLE: &str = "email_logs";

pub type EmailLogRepoImpl = DbRepoImpl<EmailLog, NewEmailLog, EmailLogFilter, NoUpdater>;

pub fn make_repo() -> EmailLogRepoImpl {
    EmailLogRepoImpl::new(TABLE)
}
