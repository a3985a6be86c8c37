use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::QueryError;

/// Backend ids arrive either as text (uuid columns) or as integers
/// (bigint identity columns). Both are normalised to their text form.
fn id_from_text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    })
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(#[serde(deserialize_with = "id_from_text_or_number")] pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Auth user id (the `id` of the auth user and of its `profiles` row).
    UserId
);

string_id!(
    /// Primary key of a `products` row.
    ProductId
);

string_id!(
    /// Primary key of a `messages` row, or a client-side temporary id for
    /// a message that has not been acknowledged yet.
    MessageId
);

impl MessageId {
    const TEMP_PREFIX: &'static str = "local-";

    /// Fresh temporary id for an optimistic send.
    pub fn temporary() -> Self {
        Self(format!("{}{}", Self::TEMP_PREFIX, Uuid::new_v4()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(Self::TEMP_PREFIX)
    }
}

/// Remote tables used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Products,
    Messages,
    Profiles,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Messages => "messages",
            Self::Profiles => "profiles",
        }
    }
}

impl std::str::FromStr for Table {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "products" => Ok(Self::Products),
            "messages" => Ok(Self::Messages),
            "profiles" => Ok(Self::Profiles),
            other => Err(QueryError::UnknownTable(other.to_string())),
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_numbers_and_text() {
        let a: ProductId = serde_json::from_str("42").unwrap();
        let b: ProductId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"42\"");
    }

    #[test]
    fn temporary_message_ids() {
        let tmp = MessageId::temporary();
        assert!(tmp.is_temporary());
        assert!(!MessageId::new("3f2c").is_temporary());
    }

    #[test]
    fn table_names() {
        assert_eq!("messages".parse::<Table>().unwrap(), Table::Messages);
        assert!("users".parse::<Table>().is_err());
    }
}
