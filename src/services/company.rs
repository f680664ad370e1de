use serde_json::json;

use super::types::{validate, ServiceContext, ServiceFuture};
use crate::acl;
use crate::models::*;
use crate::repos;

/// Contact data and activities shown on the public site
pub trait CompanyService: Send + Sync {
    fn get(&self) -> ServiceFuture<CompanyActivities>;
    fn update(&self, payload: CompanyActivitiesUpdate) -> ServiceFuture<CompanyActivities>;
}

pub struct CompanyServiceImpl {
    pub ctx: ServiceContext,
    pub login: UserLogin,
}

impl CompanyServiceImpl {
    pub fn new(ctx: ServiceContext, login: UserLogin) -> Self {
        Self { ctx, login }
    }
}

impl CompanyService for CompanyServiceImpl {
    fn get(&self) -> ServiceFuture<CompanyActivities> {
        let ctx = self.ctx.clone();

        Box::pin(async move {
            let conn = ctx.connection().await?;
            Ok(repos::company::make_repo().select_exactly_one(&*conn, CompanyActivitiesFilter).await?)
        })
    }

    fn update(&self, payload: CompanyActivitiesUpdate) -> ServiceFuture<CompanyActivities> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let details = serde_json::to_value(&payload)?;
            let activities = repos::company::make_repo()
                .update_exactly_one(&*conn, CompanyActivitiesUpdater(payload))
                .await?;
            repos::audit_log::make_repo()
                .insert_exactly_one(
                    &*conn,
                    NewAuditLog::new(AuditEntity::CompanyActivities, COMPANY_ACTIVITIES_ROW_ID, "updated", login.user_id(), json!({ "changes": details })),
                )
                .await?;
            Ok(activities)
        })
    }
}
