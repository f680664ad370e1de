pub mod types;
pub use self::types::*;

pub mod notification;
pub use self::notification::*;

pub mod auth;
pub use self::auth::*;

pub mod catalog;
pub use self::catalog::*;

pub mod pricing;
pub use self::pricing::*;

pub mod time_slot;
pub use self::time_slot::*;

pub mod cart;
pub use self::cart::*;

pub mod order;
pub use self::order::*;

pub mod payment;
pub use self::payment::*;

pub mod fid;
pub use self::fid::*;

pub mod user;
pub use self::user::*;

pub mod places;
pub use self::places::*;

pub mod company;
pub use self::company::*;

pub mod logs;
pub use self::logs::*;

pub mod marketing;
pub use self::marketing::*;
