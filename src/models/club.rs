use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::filter::Filterable;
use crate::validation::{check_uuid, Field, FieldRule, Mode, Pattern, Validator, REQUIRED};

pub const NAME: FieldRule = FieldRule::required().max_length(64);
pub const SLUG: FieldRule = FieldRule::optional().not_null().max_length(SLUG_MAX_LENGTH).pattern(Pattern::Slug);
pub const TOWN: FieldRule = FieldRule::optional().max_length(64);
pub const INFO: FieldRule = FieldRule::optional();
pub const AUTHOR: FieldRule = FieldRule::optional().not_null();
const MEMBER_ARCHER: FieldRule = FieldRule::required();

pub const SLUG_MAX_LENGTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Club {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub name: String,
    pub slug: String,
    pub town: Option<String>,
    pub info: Option<String>,
    pub author: i64,
}

impl Club {
    pub fn new(draft: &ClubDraft, slug: String) -> Self {
        let now = super::timestamp_now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            modified_at: now,
            name: draft.name.clone(),
            slug,
            town: draft.town.clone(),
            info: draft.info.clone(),
            author: draft.author,
        }
    }

    /// Applies the column changes in `patch` and advances `modified_at`.
    /// Memberships are handled by the store.
    pub fn apply(&mut self, patch: &ClubPatch) {
        if let Some(v) = &patch.name {
            self.name = v.clone();
        }
        if let Some(v) = &patch.slug {
            self.slug = v.clone();
        }
        if let Some(v) = &patch.town {
            self.town = v.clone();
        }
        if let Some(v) = &patch.info {
            self.info = v.clone();
        }
        if let Some(v) = patch.author {
            self.author = v;
        }
        self.modified_at = super::next_modified(self.modified_at);
    }
}

impl Filterable for Club {
    fn text(&self, column: &str) -> Option<&str> {
        match column {
            "name" => Some(&self.name),
            "slug" => Some(&self.slug),
            "town" => self.town.as_deref(),
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub club_id: Uuid,
    pub archer_id: Uuid,
}

impl Membership {
    pub fn new(club_id: Uuid, archer_id: Uuid) -> Self {
        let now = super::timestamp_now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            modified_at: now,
            club_id,
            archer_id,
        }
    }
}

/// Membership as rendered inside a club: the archer is its display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MembershipView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub archer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubView {
    #[serde(flatten)]
    pub club: Club,
    pub memberships: Vec<MembershipView>,
}

#[derive(Debug, Clone)]
pub struct ClubDraft {
    pub name: String,
    /// Explicit slug; derived from `name` when `None`.
    pub slug: Option<String>,
    pub town: Option<String>,
    pub info: Option<String>,
    pub author: i64,
    pub memberships: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ClubPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub town: Option<Option<String>>,
    pub info: Option<Option<String>>,
    pub author: Option<i64>,
    /// Replacement membership set. `None` leaves memberships untouched.
    pub memberships: Option<Vec<Uuid>>,
}

/// Validated club write payload.
#[derive(Debug, Clone)]
pub struct ClubInput {
    mode: Mode,
    pub name: Field<String>,
    pub slug: Field<String>,
    pub town: Field<String>,
    pub info: Field<String>,
    pub author: Field<i64>,
    pub memberships: Option<Vec<Uuid>>,
}

impl ClubInput {
    pub fn validate(v: &mut Validator<'_>) -> Self {
        Self {
            mode: v.mode(),
            name: v.string("name", &NAME),
            slug: v.string("slug", &SLUG),
            town: v.string("town", &TOWN),
            info: v.string("info", &INFO),
            author: v.pk("author", &AUTHOR),
            memberships: validate_memberships(v),
        }
    }

    pub fn into_draft(self, requested_by: i64) -> Option<ClubDraft> {
        Some(ClubDraft {
            name: self.name.value()?,
            slug: self.slug.value().filter(|s| !s.is_empty()),
            town: self.town.value(),
            info: self.info.value(),
            author: self.author.value().unwrap_or(requested_by),
            memberships: self.memberships.unwrap_or_default(),
        })
    }

    pub fn into_patch(self) -> ClubPatch {
        let mode = self.mode;
        ClubPatch {
            name: self.name.value(),
            slug: self.slug.value().filter(|s| !s.is_empty()),
            town: self.town.into_change(mode),
            info: self.info.into_change(mode),
            author: self.author.value(),
            memberships: self.memberships,
        }
    }
}

/// Error key for the archer of the membership at `index`.
pub fn membership_field(index: usize) -> String {
    format!("memberships[{}].archer", index)
}

/// `[{"archer": "<uuid>"}, ...]` into archer ids. Absent or null means
/// "no change"; item errors are keyed by position.
fn validate_memberships(v: &mut Validator<'_>) -> Option<Vec<Uuid>> {
    let items = match v.raw("memberships") {
        None | Some(Value::Null) => return None,
        Some(Value::Array(items)) => items,
        Some(_) => {
            v.error("memberships", "Expected a list of items.");
            return None;
        }
    };

    let mut archers = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(member) = item.as_object() else {
            v.error(
                &format!("memberships[{}]", index),
                "Invalid data. Expected a dictionary.",
            );
            continue;
        };
        match check_uuid(member.get("archer"), &MEMBER_ARCHER, Mode::Full) {
            Ok(Field::Value(id)) => archers.push(id),
            Ok(_) => v.error(&membership_field(index), REQUIRED),
            Err(reason) => v.error(&membership_field(index), reason),
        }
    }
    Some(archers)
}

/// Lowercase ASCII slug: alphanumerics kept, runs of whitespace and
/// hyphens collapsed to one hyphen, everything else dropped.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_hyphen = true;
        }
    }
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "club".to_string()
    } else {
        slug
    }
}

/// First free slug among `base`, `base-2`, `base-3`, ... within the length limit.
pub fn unique_slug(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    let base = truncate(base, SLUG_MAX_LENGTH);
    if !is_taken(&base) {
        return base;
    }
    let mut n: u64 = 2;
    loop {
        let suffix = format!("-{}", n);
        let stem = truncate(&base, SLUG_MAX_LENGTH - suffix.len());
        let candidate = format!("{}{}", stem.trim_end_matches('-'), suffix);
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("De Boogschutters Eindhoven"), "de-boogschutters-eindhoven");
        assert_eq!(slugify("  De  Pijl -- Tilburg! "), "de-pijl-tilburg");
        assert_eq!(slugify("!!!"), "club");
    }

    #[test]
    fn unique_slug_appends_counter() {
        let taken: HashSet<&str> = ["de-pijl", "de-pijl-2"].into_iter().collect();
        assert_eq!(unique_slug("de-pijl", |s| taken.contains(s)), "de-pijl-3");
        assert_eq!(unique_slug("de-boog", |s| taken.contains(s)), "de-boog");
    }

    #[test]
    fn unique_slug_respects_max_length() {
        let long = "a".repeat(80);
        let first = unique_slug(&long, |_| false);
        assert_eq!(first.len(), SLUG_MAX_LENGTH);

        let second = unique_slug(&long, |s| s == first);
        assert_eq!(second.len(), SLUG_MAX_LENGTH);
        assert!(second.ends_with("-2"));
    }

    #[test]
    fn view_flattens_club_fields() {
        let draft = ClubDraft {
            name: "De Pijl Tilburg".into(),
            slug: None,
            town: Some("Tilburg".into()),
            info: None,
            author: 1,
            memberships: vec![],
        };
        let view = ClubView {
            club: Club::new(&draft, "de-pijl-tilburg".into()),
            memberships: vec![],
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["slug"], "de-pijl-tilburg");
        assert_eq!(json["memberships"], json!([]));
        assert!(json.get("club").is_none());
    }

    #[test]
    fn membership_items_are_validated_by_position() {
        let archer = Uuid::new_v4();
        let body = json!({
            "name": "De Schutters Breda",
            "memberships": [{ "archer": archer }, { "archer": "nope" }, {}, 5]
        });
        let mut v = Validator::new(&body, Mode::Full).unwrap();
        let input = ClubInput::validate(&mut v);
        assert_eq!(input.memberships, Some(vec![archer]));

        let crate::error::ApiError::Validation(fields) = v.finish().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(fields["memberships[1].archer"], vec!["Must be a valid UUID."]);
        assert_eq!(fields["memberships[2].archer"], vec![REQUIRED]);
        assert!(fields.contains_key("memberships[3]"));
    }

    #[test]
    fn omitted_memberships_mean_no_change() {
        let body = json!({ "town": "Breda" });
        let mut v = Validator::new(&body, Mode::Partial).unwrap();
        let patch = ClubInput::validate(&mut v).into_patch();
        v.finish().unwrap();
        assert!(patch.memberships.is_none());
        assert_eq!(patch.town, Some(Some("Breda".into())));
        assert!(patch.name.is_none());
    }

    #[test]
    fn blank_slug_is_derived() {
        let body = json!({ "name": "De Boog Den Bosch", "slug": "" });
        let mut v = Validator::new(&body, Mode::Full).unwrap();
        let draft = ClubInput::validate(&mut v).into_draft(1).unwrap();
        v.finish().unwrap();
        assert!(draft.slug.is_none());
    }
}
