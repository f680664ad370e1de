//! Third-party providers: card payments, transactional email and address
//! lookup. Each sits behind a trait so services can be tested without the
//! network.

pub mod email;
pub mod payment;
pub mod places;

pub use self::email::*;
pub use self::payment::*;
pub use self::places::*;
