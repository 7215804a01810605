pub mod hold;
pub mod order;
pub mod product;
pub mod webhook;

pub use hold::*;
pub use order::*;
pub use product::*;
pub use webhook::*;

// Helper module to serialize DateTime as milliseconds timestamp
pub(crate) mod datetime_as_millis {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(dt.timestamp_millis())
    }
}
