//! Stored positions with their annotations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::Analysis;
use crate::position::Position;
use crate::tag::normalize_tag;

/// Database identity of a stored position
pub type PositionId = i64;

/// Where a position occurred in a recorded match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchRef {
    pub match_id: i64,
    pub game: u32,
    pub move_number: u32,
}

/// A position as the corpus sees it: the board plus everything attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub id: PositionId,
    pub position: Position,
    #[serde(default)]
    pub analysis: Option<Analysis>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub match_ref: Option<MatchRef>,
}

impl PositionRecord {
    pub fn new(id: PositionId, position: Position) -> Self {
        Self {
            id,
            position,
            analysis: None,
            comment: None,
            tags: Vec::new(),
            created_at: Utc::now(),
            match_ref: None,
        }
    }

    pub fn with_analysis(mut self, analysis: Analysis) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Adds tags, normalizing paths and dropping empty or repeated ones.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            if let Some(path) = normalize_tag(tag.as_ref()) {
                if !self.tags.contains(&path) {
                    self.tags.push(path);
                }
            }
        }
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_match_ref(mut self, match_ref: MatchRef) -> Self {
        self.match_ref = Some(match_ref);
        self
    }
}
