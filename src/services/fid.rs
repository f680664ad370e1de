//! Waste identification documents (FID). Producers fill them in, admins
//! validate or reject them.

use chrono::Utc;
use failure::Error as FailureError;
use serde_json::json;
use tokio_postgres::GenericClient;

use super::types::{validate, ServiceContext, ServiceFuture};
use crate::acl::{self, Action};
use crate::db::FilteredOperationBuilder;
use crate::errors::Error;
use crate::export::{into_csv, CsvFid};
use crate::models::*;
use crate::repos;
use crate::types::FidDocumentId;

pub trait FidService: Send + Sync {
    fn create(&self, payload: FidPayload) -> ServiceFuture<FidDocument>;
    /// Only drafts and rejected documents can be edited
    fn update(&self, id: FidDocumentId, payload: FidPayload) -> ServiceFuture<FidDocument>;
    fn get(&self, id: FidDocumentId) -> ServiceFuture<FidDocument>;
    fn list_mine(&self) -> ServiceFuture<Vec<FidDocument>>;
    fn submit(&self, id: FidDocumentId) -> ServiceFuture<FidDocument>;
    fn list(&self, terms: FidSearchTerms) -> ServiceFuture<Vec<FidDocument>>;
    fn review(&self, id: FidDocumentId, payload: FidReviewPayload) -> ServiceFuture<FidDocument>;
    fn export_csv(&self, terms: FidSearchTerms) -> ServiceFuture<Vec<u8>>;
}

pub struct FidServiceImpl {
    pub ctx: ServiceContext,
    pub login: UserLogin,
}

impl FidServiceImpl {
    pub fn new(ctx: ServiceContext, login: UserLogin) -> Self {
        Self { ctx, login }
    }
}

async fn audit_fid<C>(conn: &C, login: UserLogin, id: FidDocumentId, action: &str, details: serde_json::Value) -> Result<(), FailureError>
where
    C: GenericClient + Sync,
{
    repos::audit_log::make_repo()
        .insert_exactly_one(conn, NewAuditLog::new(AuditEntity::FidDocument, id, action, login.user_id(), details))
        .await?;
    Ok(())
}

/// Moves a document from `current` to `data.status`; the update only
/// applies while the stored status is still `current`.
async fn transition<C>(conn: &C, document: &FidDocument, data: FidUpdateData) -> Result<FidDocument, FailureError>
where
    C: GenericClient + Sync,
{
    repos::fid::make_repo()
        .update(
            conn,
            FidUpdater {
                filter: FidFilter {
                    id: Some(document.id),
                    status: Some(document.status),
                    ..Default::default()
                },
                data,
            },
        )
        .await?
        .pop()
        .ok_or_else(|| format_err!("FID {} changed concurrently", document.id).context(Error::Conflict).into())
}

fn fid_query(paging: Option<Paging>) -> impl FnOnce(FilteredOperationBuilder) -> FilteredOperationBuilder + Send {
    move |b| paginate(paging, fid_by_newest(b))
}

async fn search(ctx: &ServiceContext, terms: FidSearchTerms, paged: bool) -> Result<Vec<FidDocument>, FailureError> {
    let paging = if paged {
        Some(Paging {
            offset: terms.offset,
            count: terms.count,
        })
    } else {
        None
    };
    let conn = ctx.connection().await?;
    Ok(repos::fid::make_repo()
        .select_full(
            &*conn,
            FidFilter {
                status: terms.status,
                ..Default::default()
            },
            fid_query(paging),
        )
        .await?)
}

impl FidService for FidServiceImpl {
    fn create(&self, payload: FidPayload) -> ServiceFuture<FidDocument> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let user_id = acl::require_user(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            if let Some(order_id) = payload.order_id {
                let order = repos::order::make_repo().select_exactly_one(&*conn, order_id.into()).await?;
                acl::ensure_access(&login, order.user_id, Action::Read)?;
            }

            let document = repos::fid::make_repo()
                .insert_exactly_one(&*conn, NewFidDocument { user_id, data: payload })
                .await?;
            audit_fid(&*conn, login, document.id, "created", json!({ "waste_code": document.data.waste_code })).await?;
            Ok(document)
        })
    }

    fn update(&self, id: FidDocumentId, payload: FidPayload) -> ServiceFuture<FidDocument> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_user(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let document = repos::fid::make_repo().select_exactly_one(&*conn, id.into()).await?;
            acl::ensure_access(&login, document.user_id, Action::Update)?;
            if !document.status.is_editable() {
                return Err(format_err!("FID {} is {}", id, document.status).context(Error::InvalidTransition).into());
            }

            let updated = transition(
                &*conn,
                &document,
                FidUpdateData {
                    data: Some(payload),
                    ..Default::default()
                },
            )
            .await?;
            audit_fid(&*conn, login, id, "updated", json!({})).await?;
            Ok(updated)
        })
    }

    fn get(&self, id: FidDocumentId) -> ServiceFuture<FidDocument> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let conn = ctx.connection().await?;
            let document = repos::fid::make_repo().select_exactly_one(&*conn, id.into()).await?;
            acl::ensure_access(&login, document.user_id, Action::Read)?;
            Ok(document)
        })
    }

    fn list_mine(&self) -> ServiceFuture<Vec<FidDocument>> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let user_id = acl::require_user(&login)?;
            let conn = ctx.connection().await?;
            Ok(repos::fid::make_repo()
                .select_full(
                    &*conn,
                    FidFilter {
                        user_id: Some(user_id),
                        ..Default::default()
                    },
                    fid_by_newest,
                )
                .await?)
        })
    }

    fn submit(&self, id: FidDocumentId) -> ServiceFuture<FidDocument> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_user(&login)?;
            let conn = ctx.connection().await?;
            let document = repos::fid::make_repo().select_exactly_one(&*conn, id.into()).await?;
            acl::ensure_access(&login, document.user_id, Action::Update)?;
            if !document.status.can_submit() {
                return Err(format_err!("FID {} is {}", id, document.status).context(Error::InvalidTransition).into());
            }

            let submitted = transition(
                &*conn,
                &document,
                FidUpdateData {
                    status: Some(FidStatus::Submitted),
                    submitted_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;
            audit_fid(&*conn, login, id, "submitted", json!({ "from": document.status })).await?;
            info!("FID {} submitted", id);
            Ok(submitted)
        })
    }

    fn list(&self, terms: FidSearchTerms) -> ServiceFuture<Vec<FidDocument>> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            search(&ctx, terms, true).await
        })
    }

    fn review(&self, id: FidDocumentId, payload: FidReviewPayload) -> ServiceFuture<FidDocument> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let document = repos::fid::make_repo().select_exactly_one(&*conn, id.into()).await?;
            if !document.status.can_review_to(payload.status) {
                return Err(format_err!("FID {} cannot go from {} to {}", id, document.status, payload.status)
                    .context(Error::InvalidTransition)
                    .into());
            }

            let reviewed = transition(
                &*conn,
                &document,
                FidUpdateData {
                    status: Some(payload.status),
                    admin_comment: Some(payload.comment.clone()),
                    reviewed_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;
            audit_fid(&*conn, login, id, "reviewed", json!({ "status": payload.status, "comment": payload.comment })).await?;
            Ok(reviewed)
        })
    }

    fn export_csv(&self, terms: FidSearchTerms) -> ServiceFuture<Vec<u8>> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            let documents = search(&ctx, terms, false).await?;
            into_csv(documents.into_iter().map(CsvFid::from))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_selects_every_document() {
        let listing = Some(Paging {
            offset: Some(100),
            count: Some(20),
        });
        let (query, _) = fid_query(listing)(FilteredOperationBuilder::new("fid_documents")).build_select();
        assert_eq!(query, "SELECT * FROM fid_documents ORDER BY updated_at DESC LIMIT 20 OFFSET 100;");

        let (query, _) = fid_query(None)(FilteredOperationBuilder::new("fid_documents")).build_select();
        assert_eq!(query, "SELECT * FROM fid_documents ORDER BY updated_at DESC;");
    }
}
