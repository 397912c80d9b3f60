//! Retrieved passages and ranked result sets.

use serde::{Deserialize, Serialize};

/// A unit of retrieved text.
///
/// Fusion identifies passages by `content` alone; metadata rides along
/// for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,

    /// Title of the source document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Section path inside the source document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Vector distance to the query (lower is closer)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl Passage {
    /// A passage with content only.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            title: None,
            section: None,
            uri: None,
            distance: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = Some(distance);
        self
    }

    /// "Title > section" label for display, when known.
    pub fn label(&self) -> Option<String> {
        match (&self.title, &self.section) {
            (Some(title), Some(section)) if !section.is_empty() => {
                Some(format!("{} > {}", title, section))
            }
            (Some(title), _) => Some(title.clone()),
            (None, Some(section)) => Some(section.clone()),
            (None, None) => None,
        }
    }
}

/// Passages returned for one query, rank implied by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedResultSet {
    /// The query that produced this set
    pub query: String,

    pub passages: Vec<Passage>,
}

impl RankedResultSet {
    pub fn new(query: impl Into<String>, passages: Vec<Passage>) -> Self {
        Self {
            query: query.into(),
            passages,
        }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Put the closest match last.
    ///
    /// Context strings are built closest-last so the most relevant passage
    /// sits nearest the question in the prompt. Every set that feeds one
    /// fusion call goes through this step exactly once.
    pub fn reverse_for_context(mut self) -> Self {
        self.passages.reverse();
        self
    }

    /// Passage contents in rank order.
    pub fn contents(&self) -> Vec<String> {
        self.passages.iter().map(|p| p.content.clone()).collect()
    }

    /// Contents joined by single spaces.
    pub fn joined(&self) -> String {
        self.passages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
