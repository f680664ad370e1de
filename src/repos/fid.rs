use crate::db::*;
use crate::models::*;

pub const TABLE: &str = "fid_documents";

pub type FidDocumentRepoImpl = DbRepoImpl<FidDocument, NewFidDocument, FidFilter, FidUpdater>;

pub fn make_repo() -> FidDocumentRepoImpl {
    FidDocumentRepoImpl::new(TABLE)
}
