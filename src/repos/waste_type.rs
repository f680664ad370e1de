use crate::db::*;
use crate::models::*;

pub const TABLE: &str = "waste_types";

pub type WasteTypeRepoImpl = DbRepoImpl<WasteType, NewWasteType, WasteTypeFilter, WasteTypeUpdater>;

pub fn make_repo() -> WasteTypeRepoImpl {
    WasteTypeRepoImpl::new(TABLE)
}
