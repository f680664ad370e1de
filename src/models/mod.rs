/// Text-backed enum stored as its snake_case name.
macro_rules! db_enum {
    ($(#[$meta:meta])* pub enum $name:ident { $($variant:ident => $value:literal),+ $(,)* }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $value)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = crate::errors::RepoError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    other => Err(crate::errors::RepoError::Parse {
                        reason: format!("Unknown {} {}", stringify!($name), other),
                    }),
                }
            }
        }
    };
}

pub mod audit_log;
pub mod booking;
pub mod cart_item;
pub mod common;
pub mod company;
pub mod email_log;
pub mod fid;
pub mod login;
pub mod marketing;
pub mod order;
pub mod pricing;
pub mod service;
pub mod session;
pub mod time_slot;
pub mod user;
pub mod waste_type;

pub use self::audit_log::*;
pub use self::booking::*;
pub use self::cart_item::*;
pub use self::common::*;
pub use self::company::*;
pub use self::email_log::*;
pub use self::fid::*;
pub use self::login::*;
pub use self::marketing::*;
pub use self::order::*;
pub use self::pricing::*;
pub use self::service::*;
pub use self::session::*;
pub use self::time_slot::*;
pub use self::user::*;
pub use self::waste_type::*;
