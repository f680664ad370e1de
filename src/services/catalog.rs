use serde_json::json;

use super::types::{validate, ServiceContext, ServiceFuture};
use crate::acl;
use crate::db::Ordering;
use crate::errors::Error;
use crate::models::*;
use crate::repos;
use crate::types::{ServiceId, WasteTypeId};

/// Containers and accepted waste types
pub trait CatalogService: Send + Sync {
    /// Active containers; admins also see deactivated ones
    fn list_services(&self) -> ServiceFuture<Vec<Service>>;
    fn get_service(&self, id: ServiceId) -> ServiceFuture<Service>;
    fn create_service(&self, payload: NewService) -> ServiceFuture<Service>;
    fn update_service(&self, id: ServiceId, payload: ServiceUpdate) -> ServiceFuture<Service>;
    fn deactivate_service(&self, id: ServiceId) -> ServiceFuture<Service>;
    fn list_waste_types(&self) -> ServiceFuture<Vec<WasteType>>;
    fn create_waste_type(&self, payload: NewWasteType) -> ServiceFuture<WasteType>;
    fn update_waste_type(&self, id: WasteTypeId, payload: WasteTypeUpdate) -> ServiceFuture<WasteType>;
    fn deactivate_waste_type(&self, id: WasteTypeId) -> ServiceFuture<WasteType>;
}

pub struct CatalogServiceImpl {
    pub ctx: ServiceContext,
    pub login: UserLogin,
}

impl CatalogServiceImpl {
    pub fn new(ctx: ServiceContext, login: UserLogin) -> Self {
        Self { ctx, login }
    }

    /// Public callers only see active entries.
    fn visible_only(&self) -> Option<bool> {
        if self.login.is_admin() {
            None
        } else {
            Some(true)
        }
    }
}

impl CatalogService for CatalogServiceImpl {
    fn list_services(&self) -> ServiceFuture<Vec<Service>> {
        let ctx = self.ctx.clone();
        let active = self.visible_only();

        Box::pin(async move {
            let conn = ctx.connection().await?;
            Ok(repos::service::make_repo()
                .select_full(&*conn, ServiceFilter { id: None, active }, |b| {
                    b.with_ordering("volume_m3", Ordering::Ascending)
                })
                .await?)
        })
    }

    fn get_service(&self, id: ServiceId) -> ServiceFuture<Service> {
        let ctx = self.ctx.clone();
        let active = self.visible_only();

        Box::pin(async move {
            let conn = ctx.connection().await?;
            repos::service::make_repo()
                .select_one(&*conn, ServiceFilter { id: Some(id), active })
                .await?
                .ok_or_else(|| format_err!("Service {}", id).context(Error::NotFound).into())
        })
    }

    fn create_service(&self, payload: NewService) -> ServiceFuture<Service> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let service = repos::service::make_repo().insert_exactly_one(&*conn, payload).await?;
            repos::audit_log::make_repo()
                .insert_exactly_one(
                    &*conn,
                    NewAuditLog::new(AuditEntity::Service, service.id, "created", login.user_id(), json!({ "name": service.name })),
                )
                .await?;
            Ok(service)
        })
    }

    fn update_service(&self, id: ServiceId, payload: ServiceUpdate) -> ServiceFuture<Service> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let details = serde_json::to_value(&payload)?;
            let service = repos::service::make_repo()
                .update_exactly_one(
                    &*conn,
                    ServiceUpdater {
                        filter: id.into(),
                        data: payload,
                    },
                )
                .await?;
            repos::audit_log::make_repo()
                .insert_exactly_one(&*conn, NewAuditLog::new(AuditEntity::Service, id, "updated", login.user_id(), details))
                .await?;
            Ok(service)
        })
    }

    fn deactivate_service(&self, id: ServiceId) -> ServiceFuture<Service> {
        self.update_service(
            id,
            ServiceUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
    }

    fn list_waste_types(&self) -> ServiceFuture<Vec<WasteType>> {
        let ctx = self.ctx.clone();
        let active = self.visible_only();

        Box::pin(async move {
            let conn = ctx.connection().await?;
            Ok(repos::waste_type::make_repo()
                .select_full(&*conn, WasteTypeFilter { id: None, active }, |b| {
                    b.with_ordering("name", Ordering::Ascending)
                })
                .await?)
        })
    }

    fn create_waste_type(&self, payload: NewWasteType) -> ServiceFuture<WasteType> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            Ok(repos::waste_type::make_repo().insert_exactly_one(&*conn, payload).await?)
        })
    }

    fn update_waste_type(&self, id: WasteTypeId, payload: WasteTypeUpdate) -> ServiceFuture<WasteType> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            Ok(repos::waste_type::make_repo()
                .update_exactly_one(
                    &*conn,
                    WasteTypeUpdater {
                        filter: id.into(),
                        data: payload,
                    },
                )
                .await?)
        })
    }

    fn deactivate_waste_type(&self, id: WasteTypeId) -> ServiceFuture<WasteType> {
        self.update_waste_type(
            id,
            WasteTypeUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
    }
}
