use super::types::{ServiceContext, ServiceFuture};
use crate::acl;
use crate::models::*;
use crate::repos;

/// Read access to the audit trail and the email journal
pub trait LogService: Send + Sync {
    fn audit_logs(&self, terms: AuditLogSearchTerms) -> ServiceFuture<Vec<AuditLog>>;
    fn email_logs(&self, terms: EmailLogSearchTerms) -> ServiceFuture<Vec<EmailLog>>;
}

pub struct LogServiceImpl {
    pub ctx: ServiceContext,
    pub login: UserLogin,
}

impl LogServiceImpl {
    pub fn new(ctx: ServiceContext, login: UserLogin) -> Self {
        Self { ctx, login }
    }
}

impl LogService for LogServiceImpl {
    fn audit_logs(&self, terms: AuditLogSearchTerms) -> ServiceFuture<Vec<AuditLog>> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            let paging = Paging {
                offset: terms.offset,
                count: terms.count,
            };
            let conn = ctx.connection().await?;
            Ok(repos::audit_log::make_repo()
                .select_full(
                    &*conn,
                    AuditLogFilter {
                        entity_type: terms.entity_type,
                        entity_id: terms.entity_id,
                    },
                    |b| audit_log_by_newest(b).with_limit(Some(paging.limit())).with_offset(Some(paging.offset())),
                )
                .await?)
        })
    }

    fn email_logs(&self, terms: EmailLogSearchTerms) -> ServiceFuture<Vec<EmailLog>> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            let paging = Paging {
                offset: terms.offset,
                count: terms.count,
            };
            let conn = ctx.connection().await?;
            Ok(repos::email_log::make_repo()
                .select_full(
                    &*conn,
                    EmailLogFilter {
                        recipient: terms.recipient,
                        status: terms.status,
                        order_id: terms.order_id,
                    },
                    |b| email_log_by_newest(b).with_limit(Some(paging.limit())).with_offset(Some(paging.offset())),
                )
                .await?)
        })
    }
}
