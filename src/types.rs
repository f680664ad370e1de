use bb8_postgres::PostgresConnectionManager;
use tokio_postgres::types::{FromSql, ToSql};
use tokio_postgres::NoTls;
use uuid::Uuid;

pub type DbPool = bb8::Pool<PostgresConnectionManager<NoTls>>;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, Display, Eq, FromStr, PartialEq, Hash, Serialize, Deserialize, FromSql, ToSql)]
        #[postgres(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

macro_rules! serial_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, Display, Eq, FromStr, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize, FromSql, ToSql)]
        #[postgres(transparent)]
        pub struct $name(pub i32);
    };
}

uuid_id!(UserId);
uuid_id!(SessionId);
uuid_id!(OrderId);
uuid_id!(CartItemId);
uuid_id!(CartSessionId);
uuid_id!(FidDocumentId);
uuid_id!(AuditLogId);
uuid_id!(EmailLogId);
uuid_id!(InactivityNotificationId);

serial_id!(OrderSlug);
serial_id!(ServiceId);
serial_id!(WasteTypeId);
serial_id!(TimeSlotId);
serial_id!(RentalPricingId);
serial_id!(TransportPricingId);
serial_id!(TreatmentPricingId);
