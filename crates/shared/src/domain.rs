use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(UserId);

/// Where a cached record came from. Never sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordOrigin {
    /// Listed by, or confirmed through, the remote collection.
    #[default]
    Remote,
    /// Created through this client under a provisional id the remote never persisted.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    #[serde(skip)]
    pub origin: RecordOrigin,
}

impl UserRecord {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            origin: RecordOrigin::Remote,
        }
    }

    pub fn local(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            origin: RecordOrigin::Local,
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin == RecordOrigin::Local
    }
}

/// Request body for create and update calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDraft {
    pub id: UserId,
    pub name: String,
}

impl UserDraft {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Response body of a create call. The remote may echo a colliding id or none at all.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedUser {
    #[serde(default)]
    pub id: Option<UserId>,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_record_ignoring_extra_fields() {
        let raw = r#"{"id":1,"name":"Leanne Graham","username":"Bret","email":"x@y.z"}"#;
        let record: UserRecord = serde_json::from_str(raw).expect("decode");
        assert_eq!(record, UserRecord::new(UserId(1), "Leanne Graham"));
        assert_eq!(record.origin, RecordOrigin::Remote);
    }

    #[test]
    fn origin_is_not_serialized() {
        let json = serde_json::to_value(UserRecord::local(UserId(5), "Cid")).expect("encode");
        assert_eq!(json, serde_json::json!({ "id": 5, "name": "Cid" }));
    }

    #[test]
    fn created_user_tolerates_missing_id() {
        let created: CreatedUser = serde_json::from_str(r#"{"name":"Cid"}"#).expect("decode");
        assert_eq!(created.id, None);
        assert_eq!(created.name, "Cid");
    }
}
