//! Pure translation between [`Initiative`] and the remote row shapes.
//!
//! Renames fields only; nothing here validates or performs I/O. The
//! timestamp is passed in so the functions stay deterministic.

use chrono::{DateTime, Utc};

use crate::model::{Initiative, InitiativeFields};
use crate::remote::row::{RemoteRow, RowWrite};

/// Translate a local record into a persisted row, stamping `updated_at`.
#[must_use]
pub fn to_remote(initiative: &Initiative, now: DateTime<Utc>) -> RemoteRow {
    let f = &initiative.fields;
    RemoteRow {
        id: initiative.id.clone(),
        title: f.title.clone(),
        description: f.description.clone(),
        team: f.team,
        priority: f.priority,
        status: f.status,
        progress: f.progress,
        assignee: f.assignee.clone(),
        start_month: f.start_month,
        end_month: f.end_month,
        quarter: f.quarter,
        year: f.year,
        created_at: None,
        updated_at: Some(now),
    }
}

/// Translate a persisted row into a local record. Timestamps are dropped.
#[must_use]
pub fn from_remote(row: RemoteRow) -> Initiative {
    Initiative {
        id: row.id,
        fields: InitiativeFields {
            title: row.title,
            description: row.description,
            team: row.team,
            priority: row.priority,
            status: row.status,
            progress: row.progress,
            assignee: row.assignee,
            start_month: row.start_month,
            end_month: row.end_month,
            quarter: row.quarter,
            year: row.year,
        },
    }
}

/// Column set for an insert or a full-field update.
#[must_use]
pub fn to_write(fields: &InitiativeFields, now: DateTime<Utc>) -> RowWrite {
    RowWrite {
        title: fields.title.clone(),
        description: fields.description.clone(),
        team: fields.team,
        priority: fields.priority,
        status: fields.status,
        progress: fields.progress,
        assignee: fields.assignee.clone(),
        start_month: fields.start_month,
        end_month: fields.end_month,
        quarter: fields.quarter,
        year: fields.year,
        updated_at: now,
    }
}
