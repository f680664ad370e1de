use crate::db::*;
use crate::models::*;

pub const TABLE: &str = "sessions";

pub type SessionRepoImpl = DbRepoImpl<Session, NewSession, SessionFilter, NoUpdater>;

pub fn make_repo() -> SessionRepoImpl {
    SessionRepoImpl::new(TABLE)
}
