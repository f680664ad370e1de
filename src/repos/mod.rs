//! One module per table. Repositories are stateless; every call takes the
//! connection or transaction it runs on.

pub mod audit_log;
pub mod cart_item;
pub mod company;
pub mod email_log;
pub mod fid;
pub mod marketing;
pub mod order;
pub mod pricing;
pub mod service;
pub mod session;
pub mod time_slot;
pub mod user;
pub mod waste_type;
