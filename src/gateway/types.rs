//! Shared data types crossing the Gateway boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Which side of the replication topology a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Primary,
    Standby,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Primary => Side::Standby,
            Side::Standby => Side::Primary,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Primary => "primary",
            Side::Standby => "standby",
        }
    }
}

/// A single document as seen at the Gateway boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub data: Value,
    /// Preferred timestamp field; `None` means "no updatedAt".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Fallback timestamp field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl DocumentRecord {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        let updated_at = data
            .get("updatedAt")
            .and_then(Value::as_str)
            .map(str::to_string);
        let created_at = data
            .get("createdAt")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            id: id.into(),
            data,
            updated_at,
            created_at,
        }
    }

    /// `updatedAt` if present, else `createdAt`, else `None` ("infinitely old").
    pub fn effective_timestamp(&self) -> Option<&str> {
        self.updated_at
            .as_deref()
            .or(self.created_at.as_deref())
    }
}

/// Opaque password-hash parameters, passed through unmodified between sides.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HashParams {
    pub algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_cost: Option<u32>,
    /// Base64-encoded opaque signer key; never interpreted by the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_key_b64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt_separator_b64: Option<String>,
}

/// Authentication-directory user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserRecord {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sign_in_time: Option<String>,
    #[serde(default)]
    pub custom_claims: serde_json::Map<String, Value>,
    #[serde(default)]
    pub provider_data: Vec<Value>,
    /// Opaque password hash/salt bytes; never inspected, only passed through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash_b64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_salt_b64: Option<String>,
}

impl UserRecord {
    /// Whichever of creationTime/lastSignInTime is newer, for incremental filtering.
    pub fn activity_watermark(&self) -> Option<&str> {
        match (self.creation_time.as_deref(), self.last_sign_in_time.as_deref()) {
            (Some(c), Some(l)) => Some(if l >= c { l } else { c }),
            (Some(c), None) => Some(c),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        }
    }
}

/// Outcome of a bulk user import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<ImportError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportError {
    pub index: usize,
    pub reason: String,
}

/// One page of `ListUsers`.
#[derive(Debug, Clone, Default)]
pub struct UserPage {
    pub users: Vec<UserRecord>,
    pub next_page_token: Option<String>,
}

/// Which endpoint a health probe targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Db,
    Auth,
}

/// Result of a `MultiGet`: present documents keyed by ID, absent entries omitted.
pub type MultiGetResult = HashMap<String, DocumentRecord>;
