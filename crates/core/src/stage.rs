//! Pipeline Stage Identity
//!
//! Closed set of validation pipeline stages plus the display metadata the
//! presentation layer resolves at its boundary. The engine itself only uses
//! the stable identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One stage of the validation pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Draft an answer from the question
    Answer,
    /// Verdict on the draft: approved or rejected with a reason
    Check,
    /// Per-link reachability and relevance of declared documentation links
    LinkCheck,
}

impl PipelineStage {
    /// Stable identifier used in logs and serialized events.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Answer => "answer",
            PipelineStage::Check => "check",
            PipelineStage::LinkCheck => "link_check",
        }
    }

    /// Human-readable stage name for audit display.
    pub fn display_name(&self) -> &'static str {
        match self {
            PipelineStage::Answer => "Answer Draft",
            PipelineStage::Check => "Answer Check",
            PipelineStage::LinkCheck => "Link Check",
        }
    }

    /// All stages in pipeline order.
    pub fn all() -> [PipelineStage; 3] {
        [
            PipelineStage::Answer,
            PipelineStage::Check,
            PipelineStage::LinkCheck,
        ]
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one recorded pipeline step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The stage ran and its outcome lets the attempt proceed
    Success,
    /// The stage errored or produced a blocking verdict
    Failure,
}

impl StepStatus {
    /// Whether the step allowed the attempt to proceed.
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Success)
    }
}
