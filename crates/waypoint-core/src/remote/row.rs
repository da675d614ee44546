//! Row shapes exchanged with the remote table.
//!
//! Column names are snake_case as stored; see [`crate::mapper`] for the
//! translation to and from [`crate::model::Initiative`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{InitiativeId, Priority, Status, Team};

/// A persisted row as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRow {
    pub id: InitiativeId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub team: Team,
    pub priority: Priority,
    pub status: Status,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub progress: u8,
    #[serde(default)]
    pub assignee: Option<String>,
    pub start_month: u8,
    pub end_month: u8,
    pub quarter: u8,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A nullable progress column reads as 0.
fn null_as_zero<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u8>::deserialize(deserializer)?.unwrap_or(0))
}

/// The column set sent on insert and update: every mutable column plus the
/// last-modified stamp. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowWrite {
    pub title: String,
    pub description: Option<String>,
    pub team: Team,
    pub priority: Priority,
    pub status: Status,
    pub progress: u8,
    pub assignee: Option<String>,
    pub start_month: u8,
    pub end_month: u8,
    pub quarter: u8,
    pub year: i32,
    pub updated_at: DateTime<Utc>,
}
