//! Memory record type definitions.
//!
//! Defines [`MemoryKind`] (the category tag a model may attach to a write),
//! [`MemoryMetadata`] (the optional `{type, category, date}` blob), and
//! [`MemoryRecord`] (a full row).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Category tag a memory write may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// A plain durable fact about the user.
    Fact,
    /// A stable preference (coffee order, preferred tools).
    Preference,
    /// A dated commitment; usually paired with `category` and `date`.
    Anchor,
    Todo,
    /// Biographical details explicitly shared.
    Profile,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 5] = [
        Self::Fact,
        Self::Preference,
        Self::Anchor,
        Self::Todo,
        Self::Profile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Preference => "preference",
            Self::Anchor => "anchor",
            Self::Todo => "todo",
            Self::Profile => "profile",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fact" => Ok(Self::Fact),
            "preference" => Ok(Self::Preference),
            "anchor" => Ok(Self::Anchor),
            "todo" => Ok(Self::Todo),
            "profile" => Ok(Self::Profile),
            _ => Err(format!("unknown memory type: {s}")),
        }
    }
}

/// Optional metadata persisted alongside a memory as a JSON blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MemoryKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// ISO calendar date (`YYYY-MM-DD`) for dated memories like anchors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl MemoryMetadata {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.category.is_none() && self.date.is_none()
    }
}

/// A memory record, matching the `memories` table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub metadata: Option<MemoryMetadata>,
    /// RFC 3339 UTC creation timestamp.
    pub created_at: String,
}

/// Result of [`crate::memory::MemoryStore::add`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddOutcome {
    pub id: String,
    /// `true` when an identical `(user_id, text)` row already existed.
    pub deduped: bool,
}
