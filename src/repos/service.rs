use crate::db::*;
use crate::models::*;

pub const TABLE: &str = "services";

pub type ServiceRepoImpl = DbRepoImpl<Service, NewService, ServiceFilter, ServiceUpdater>;

pub fn make_repo() -> ServiceRepoImpl {
    ServiceRepoImpl::new(TABLE)
}
