use crate::db::*;
use crate::models::*;

pub const TABLE: &str = "company_activities";

pub type CompanyActivitiesRepoImpl = DbRepoImpl<CompanyActivities, NewCompanyActivities, CompanyActivitiesFilter, CompanyActivitiesUpdater>;

pub fn make_repo() -> CompanyActivitiesRepoImpl {
    CompanyActivitiesRepoImpl::new(TABLE)
}
