use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::filter::Filterable;
use crate::validation::{Field, FieldRule, Mode, Validator};

pub const LAST_NAME: FieldRule = FieldRule::required().max_length(64);
pub const FIRST_NAME: FieldRule = FieldRule::required().max_length(32);
pub const MIDDLE_NAME: FieldRule = FieldRule::optional().max_length(6);
pub const UNION_NUMBER: FieldRule = FieldRule::optional().range(0, i64::MAX);
pub const INFO: FieldRule = FieldRule::optional();
pub const AUTHOR: FieldRule = FieldRule::optional().not_null();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Archer {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub union_number: Option<i64>,
    pub info: Option<String>,
    pub author: i64,
}

impl Archer {
    pub fn new(draft: ArcherDraft) -> Self {
        let now = super::timestamp_now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            modified_at: now,
            last_name: draft.last_name,
            first_name: draft.first_name,
            middle_name: draft.middle_name,
            union_number: draft.union_number,
            info: draft.info,
            author: draft.author,
        }
    }

    pub fn display_name(&self) -> String {
        display_name(&self.last_name, &self.first_name, self.middle_name.as_deref())
    }

    /// Applies `patch` and advances `modified_at`.
    pub fn apply(&mut self, patch: ArcherPatch) {
        if let Some(v) = patch.last_name {
            self.last_name = v;
        }
        if let Some(v) = patch.first_name {
            self.first_name = v;
        }
        if let Some(v) = patch.middle_name {
            self.middle_name = v;
        }
        if let Some(v) = patch.union_number {
            self.union_number = v;
        }
        if let Some(v) = patch.info {
            self.info = v;
        }
        if let Some(v) = patch.author {
            self.author = v;
        }
        self.modified_at = super::next_modified(self.modified_at);
    }
}

impl Filterable for Archer {
    fn text(&self, column: &str) -> Option<&str> {
        match column {
            "last_name" => Some(&self.last_name),
            "first_name" => Some(&self.first_name),
            "middle_name" => self.middle_name.as_deref(),
            "info" => self.info.as_deref(),
            _ => None,
        }
    }

    fn timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        match column {
            "created_at" => Some(self.created_at),
            "modified_at" => Some(self.modified_at),
            _ => None,
        }
    }
}

/// "last first", plus the middle name when there is one.
pub fn display_name(last_name: &str, first_name: &str, middle_name: Option<&str>) -> String {
    match middle_name.map(str::trim) {
        Some(middle) if !middle.is_empty() => format!("{} {} {}", last_name, first_name, middle),
        _ => format!("{} {}", last_name, first_name),
    }
}

/// Values for a new archer.
#[derive(Debug, Clone)]
pub struct ArcherDraft {
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub union_number: Option<i64>,
    pub info: Option<String>,
    pub author: i64,
}

/// Column changes. `None` keeps the stored value; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct ArcherPatch {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<Option<String>>,
    pub union_number: Option<Option<i64>>,
    pub info: Option<Option<String>>,
    pub author: Option<i64>,
}

/// Validated archer write payload.
#[derive(Debug, Clone)]
pub struct ArcherInput {
    mode: Mode,
    pub last_name: Field<String>,
    pub first_name: Field<String>,
    pub middle_name: Field<String>,
    pub union_number: Field<i64>,
    pub info: Field<String>,
    pub author: Field<i64>,
}

impl ArcherInput {
    /// Runs every archer field check, leaving failures in `v`.
    pub fn validate(v: &mut Validator<'_>) -> Self {
        Self {
            mode: v.mode(),
            last_name: v.string("last_name", &LAST_NAME),
            first_name: v.string("first_name", &FIRST_NAME),
            middle_name: v.string("middle_name", &MIDDLE_NAME),
            union_number: v.integer("union_number", &UNION_NUMBER),
            info: v.string("info", &INFO),
            author: v.pk("author", &AUTHOR),
        }
    }

    /// Draft for a create. An omitted author defaults to `requested_by`.
    pub fn into_draft(self, requested_by: i64) -> Option<ArcherDraft> {
        Some(ArcherDraft {
            last_name: self.last_name.value()?,
            first_name: self.first_name.value()?,
            middle_name: self.middle_name.value(),
            union_number: self.union_number.value(),
            info: self.info.value(),
            author: self.author.value().unwrap_or(requested_by),
        })
    }

    pub fn into_patch(self) -> ArcherPatch {
        let mode = self.mode;
        ArcherPatch {
            last_name: self.last_name.value(),
            first_name: self.first_name.value(),
            middle_name: self.middle_name.into_change(mode),
            union_number: self.union_number.into_change(mode),
            info: self.info.into_change(mode),
            author: self.author.value(),
        }
    }
}
