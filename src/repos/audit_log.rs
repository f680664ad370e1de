use crate::db::*;
use crate::models::*;

pub const TABLE: &str = "audit_logs";

pub type AuditLogRepoImpl = DbRepoImpl<AuditLog, NewAuditLog, AuditLogFilter, NoUpdater>;

pub fn make_repo() -> AuditLogRepoImpl {
    AuditLogRepoImpl::new(TABLE)
}
