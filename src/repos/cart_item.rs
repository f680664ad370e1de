use crate::db::*;
use crate::models::*;

pub const TABLE: &str = "cart_items";

pub type CartItemRepoImpl = DbRepoImpl<CartItem, NewCartItem, CartItemFilter, CartItemUpdater>;

pub fn make_repo() -> CartItemRepoImpl {
    CartItemRepoImpl::new(TABLE)
}
