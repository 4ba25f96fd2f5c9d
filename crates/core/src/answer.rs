//! Question and Answer Values
//!
//! Immutable value types flowing through the validation pipeline: the
//! question being answered, the produced answer with its validation status,
//! and the documentation links cited by an answer.

use serde::{Deserialize, Serialize};

/// One question to be answered.
///
/// Questions are immutable once loaded; per-question fields override the
/// run-level settings of the same name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Question text as read from the source cell
    pub text: String,
    /// Optional question-specific context, overriding the run context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Optional answer length limit in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_limit: Option<u32>,
    /// Optional retry budget override for this question
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl Question {
    /// Create a question with no overrides.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
            char_limit: None,
            max_retries: None,
        }
    }
}

/// Validation status of an answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// The check stage approved the draft (and links passed, if declared)
    Approved,
    /// The check or link-check stage rejected the draft
    Rejected,
    /// No verdict was ever reached (collaborator errors on every attempt)
    Unvalidated,
}

/// An answer produced by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    /// Answer text
    pub content: String,
    /// Outcome of the validation stages
    pub status: ValidationStatus,
    /// Documentation links declared by the answer (empty when none)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<DocumentationLink>,
}

impl Answer {
    /// Create an unvalidated draft with no links.
    pub fn draft(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: ValidationStatus::Unvalidated,
            links: Vec::new(),
        }
    }

    /// Whether the answer passed every validation stage it was subject to.
    pub fn is_approved(&self) -> bool {
        self.status == ValidationStatus::Approved
    }
}

/// A documentation link cited by an answer.
///
/// The reachability and relevance flags are populated only after the
/// link-check stage runs; a freshly declared link carries `None` for both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationLink {
    /// Link URL as it appears in the answer text
    pub url: String,
    /// Whether the link resolved, once checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
    /// Whether the linked content is relevant to the answer, once checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevant: Option<bool>,
}

impl DocumentationLink {
    /// A link declared by an answer but not yet checked.
    pub fn declared(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reachable: None,
            relevant: None,
        }
    }

    /// A link with both flags populated by the link-check stage.
    pub fn checked(url: impl Into<String>, reachable: bool, relevant: bool) -> Self {
        Self {
            url: url.into(),
            reachable: Some(reachable),
            relevant: Some(relevant),
        }
    }

    /// True once the link has been checked and passed on both counts.
    pub fn is_valid(&self) -> bool {
        self.reachable == Some(true) && self.relevant == Some(true)
    }
}
