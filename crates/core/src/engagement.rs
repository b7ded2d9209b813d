//! Engagement edge kinds and toggle outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a toggleable engagement edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    /// (follower, following) edge between two users.
    Follow,
    /// (user, post) edge contributing to the post's like counter.
    Like,
    /// (user, post) edge with no counter projection.
    Bookmark,
}

impl EngagementKind {
    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "follow" => Ok(Self::Follow),
            "like" => Ok(Self::Like),
            "bookmark" => Ok(Self::Bookmark),
            _ => Err(crate::Error::InvalidEngagementKind(s.to_string())),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Like => "like",
            Self::Bookmark => "bookmark",
        }
    }
}

impl fmt::Display for EngagementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of a notification record.
///
/// Stored as a string column; the store constrains it to these values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
}

impl NotificationKind {
    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "like" => Ok(Self::Like),
            "comment" => Ok(Self::Comment),
            "follow" => Ok(Self::Follow),
            _ => Err(crate::Error::InvalidNotificationKind(s.to_string())),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The observable result of a toggle operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// Whether the edge exists after the operation committed.
    pub engaged: bool,
    /// Whether this call performed the creation transition.
    ///
    /// False when the edge was removed, and also when a concurrent
    /// request created the edge first and this call became a no-op.
    /// Notification fan-out keys off this flag, never off `engaged`.
    pub created: bool,
}
