use crate::db::*;
use crate::models::*;

pub const TABLE: &str = "orders";

pub type OrderRepoImpl = DbRepoImpl<Order, NewOrder, OrderFilter, OrderUpdater>;

pub fn make_repo() -> OrderRepoImpl {
    OrderRepoImpl::new(TABLE)
}
