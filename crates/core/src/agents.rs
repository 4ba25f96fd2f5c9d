//! Collaborator Interfaces
//!
//! Trait boundaries for the three external services the pipeline delegates
//! to: answering, checking, and link validation. The concrete backends
//! (remote LLM services, HTTP link checkers, etc.) live outside this
//! workspace; the engine only ever sees these traits behind `Arc`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Failure reported by a collaborator service.
///
/// All variants are treated the same way by the pipeline: the current
/// attempt is consumed and the question is retried while budget remains.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The collaborator did not respond in time
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// The backing service throttled the request
    #[error("Rate limited by backing service")]
    RateLimited,

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with an error status
    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// The service answered but the payload was unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AgentError {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}

/// Result type alias for collaborator calls
pub type AgentResult<T> = Result<T, AgentError>;

// ============================================================================
// Request / verdict types
// ============================================================================

/// Everything the answering service needs to draft one answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    /// Question text
    pub question: String,
    /// Effective context (question-level override or run-level default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Effective answer length limit in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_limit: Option<u32>,
    /// Rejection reason from the previous attempt, for providers that can
    /// incorporate feedback when regenerating
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl AnswerRequest {
    /// Request for a first attempt with no feedback.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: None,
            char_limit: None,
            feedback: None,
        }
    }
}

/// Binary verdict from the checking service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckVerdict {
    /// Whether the draft was approved
    pub approved: bool,
    /// Reason for the verdict; fed back into the next attempt on rejection
    pub reason: String,
}

impl CheckVerdict {
    /// An approving verdict.
    pub fn approved(reason: impl Into<String>) -> Self {
        Self {
            approved: true,
            reason: reason.into(),
        }
    }

    /// A rejecting verdict.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
        }
    }
}

/// Per-link verdict from the link-validation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkVerdict {
    /// Link URL as found in the draft
    pub url: String,
    /// Whether the link resolved
    pub reachable: bool,
    /// Whether the linked content supports the answer
    pub relevant: bool,
}

impl LinkVerdict {
    /// Whether the link passed on both counts.
    pub fn passed(&self) -> bool {
        self.reachable && self.relevant
    }
}

// ============================================================================
// Service traits
// ============================================================================

/// Drafts answer text for a question.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Short identifier for logs and audit output.
    fn name(&self) -> &str;

    /// Produce draft answer text for the request.
    async fn answer(&self, request: &AnswerRequest) -> AgentResult<String>;
}

/// Judges whether a draft actually answers the question.
#[async_trait]
pub trait AnswerChecker: Send + Sync {
    /// Short identifier for logs and audit output.
    fn name(&self) -> &str;

    /// Produce an approved/rejected verdict for the draft.
    async fn check(&self, question: &str, draft: &str) -> AgentResult<CheckVerdict>;
}

/// Checks the documentation links declared inside a draft.
#[async_trait]
pub trait LinkValidator: Send + Sync {
    /// Short identifier for logs and audit output.
    fn name(&self) -> &str;

    /// Validate every link found in the draft, one verdict per link.
    async fn validate_links(&self, draft: &str) -> AgentResult<Vec<LinkVerdict>>;
}

// ============================================================================
// Agent set
// ============================================================================

/// The bundle of collaborator handles one worker processes its backlog
/// slice with. Cloning shares the underlying services.
#[derive(Clone)]
pub struct AgentSet {
    /// Answer drafting service
    pub answerer: Arc<dyn AnswerProvider>,
    /// Draft checking service
    pub checker: Arc<dyn AnswerChecker>,
    /// Documentation link validation service
    pub link_validator: Arc<dyn LinkValidator>,
}

impl AgentSet {
    /// Bundle three collaborator handles into one agent set.
    pub fn new(
        answerer: Arc<dyn AnswerProvider>,
        checker: Arc<dyn AnswerChecker>,
        link_validator: Arc<dyn LinkValidator>,
    ) -> Self {
        Self {
            answerer,
            checker,
            link_validator,
        }
    }
}
