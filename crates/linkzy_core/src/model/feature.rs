//! Per-feature record schemas.
//!
//! # Responsibility
//! - Give every shared sub-collection an explicit, validated field set.
//!
//! # Invariants
//! - Free-text fields are stored trimmed and non-empty.
//! - Expense amounts are finite.
//! - Playlist URLs are derived from platform and title, never free-form.

use crate::model::identity::UserId;
use crate::model::record::{FeatureSchema, SchemaError, SortDirection};
use serde::{Deserialize, Serialize};

/// Fixed record key of the shared editor document.
pub const EDITOR_DOC_KEY: &str = "editor";

fn require_text(
    collection: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), SchemaError> {
    if value.trim().is_empty() {
        return Err(SchemaError::Invalid {
            collection,
            field,
            message: "must not be blank".to_string(),
        });
    }
    Ok(())
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    #[serde(rename = "senderId")]
    pub sender_id: UserId,
}

impl FeatureSchema for ChatMessage {
    const COLLECTION: &'static str = "messages";
    const DIRECTION: SortDirection = SortDirection::Ascending;

    fn author(&self) -> Option<&UserId> {
        Some(&self.sender_id)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        require_text(Self::COLLECTION, "text", &self.text)
    }
}

/// Who a shared task is meant for, relative to its creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assignee {
    #[default]
    Me,
    Partner,
    Both,
}

/// One shared to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub assignee: Assignee,
    #[serde(rename = "createdBy")]
    pub created_by: UserId,
}

impl FeatureSchema for Task {
    const COLLECTION: &'static str = "tasks";
    const DIRECTION: SortDirection = SortDirection::Descending;

    fn author(&self) -> Option<&UserId> {
        Some(&self.created_by)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        require_text(Self::COLLECTION, "text", &self.text)
    }
}

/// Mood palette offered to both partners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mood {
    #[serde(rename = "😍")]
    InLove,
    #[default]
    #[serde(rename = "😊")]
    Happy,
    #[serde(rename = "😐")]
    Neutral,
    #[serde(rename = "😴")]
    Sleepy,
    #[serde(rename = "😢")]
    Sad,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::InLove,
        Mood::Happy,
        Mood::Neutral,
        Mood::Sleepy,
        Mood::Sad,
    ];

    pub fn as_emoji(self) -> &'static str {
        match self {
            Self::InLove => "😍",
            Self::Happy => "😊",
            Self::Neutral => "😐",
            Self::Sleepy => "😴",
            Self::Sad => "😢",
        }
    }
}

/// Current mood of one partner, keyed by that partner's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodStatus {
    pub mood: Mood,
    pub user: UserId,
}

impl FeatureSchema for MoodStatus {
    const COLLECTION: &'static str = "status";
    const DIRECTION: SortDirection = SortDirection::Ascending;

    fn author(&self) -> Option<&UserId> {
        Some(&self.user)
    }
}

/// Expense category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExpenseCategory {
    #[default]
    General,
    Food,
    Travel,
    Fun,
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub title: String,
    pub amount: f64,
    #[serde(default)]
    pub category: ExpenseCategory,
    pub user: UserId,
}

impl FeatureSchema for Expense {
    const COLLECTION: &'static str = "expenses";
    const DIRECTION: SortDirection = SortDirection::Descending;

    fn author(&self) -> Option<&UserId> {
        Some(&self.user)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        require_text(Self::COLLECTION, "title", &self.title)?;
        if !self.amount.is_finite() {
            return Err(SchemaError::Invalid {
                collection: Self::COLLECTION,
                field: "amount",
                message: "must be a finite number".to_string(),
            });
        }
        Ok(())
    }
}

/// Streaming platform a playlist entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Spotify,
    Youtube,
}

impl Platform {
    /// Search URL for a free-text query on this platform.
    pub fn search_url(self, query: &str) -> String {
        let encoded = urlencoding::encode(query);
        match self {
            Self::Spotify => format!("https://open.spotify.com/search/{encoded}"),
            Self::Youtube => format!("https://www.youtube.com/results?search_query={encoded}"),
        }
    }
}

/// One shared playlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub platform: Platform,
    pub title: String,
    pub url: String,
    #[serde(rename = "addedBy")]
    pub added_by: UserId,
}

impl PlaylistEntry {
    /// Builds an entry whose URL searches `query` on `platform`.
    pub fn search(platform: Platform, query: &str, added_by: UserId) -> Self {
        let title = query.trim().to_string();
        Self {
            platform,
            url: platform.search_url(&title),
            title,
            added_by,
        }
    }
}

impl FeatureSchema for PlaylistEntry {
    const COLLECTION: &'static str = "playlist";
    const DIRECTION: SortDirection = SortDirection::Ascending;

    fn author(&self) -> Option<&UserId> {
        Some(&self.added_by)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        require_text(Self::COLLECTION, "title", &self.title)?;
        require_text(Self::COLLECTION, "url", &self.url)
    }
}

/// One uploaded photo in the shared gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    pub url: String,
    pub uploader: UserId,
    #[serde(default)]
    pub description: String,
}

impl FeatureSchema for Memory {
    const COLLECTION: &'static str = "memories";
    const DIRECTION: SortDirection = SortDirection::Descending;

    fn author(&self) -> Option<&UserId> {
        Some(&self.uploader)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        require_text(Self::COLLECTION, "url", &self.url)
    }
}

/// Shared editor document; exactly one per pair scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorDocument {
    pub content: String,
    #[serde(rename = "editedBy", default, skip_serializing_if = "Option::is_none")]
    pub edited_by: Option<UserId>,
}

impl FeatureSchema for EditorDocument {
    const COLLECTION: &'static str = "docs";
    const DIRECTION: SortDirection = SortDirection::Ascending;

    fn author(&self) -> Option<&UserId> {
        self.edited_by.as_ref()
    }
}
