//! Background jobs running outside of the request cycle.

mod marketing;

pub use self::marketing::*;
