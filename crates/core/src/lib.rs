//! Veritab Core
//!
//! Foundational data model, collaborator traits, and error types for the
//! Veritab workspace. This crate has zero dependencies on engine-level code
//! (tokio runtime, channels, schedulers).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `workbook` - Workbook/sheet model and the cell lifecycle state machine
//! - `answer` - Question and answer value types
//! - `stage` - Pipeline stage identity and display metadata
//! - `agents` - Collaborator service traits and the agent set bundle
//! - `events` - Cell update events emitted over the update channel
//!
//! ## Design Principles
//!
//! 1. **Only serde/async-trait/thiserror as dependencies** - keeps the model
//!    crate light and buildable everywhere
//! 2. **Trait-based collaborator boundaries** - enables mocking and testing
//!    without any concrete backend
//! 3. **Unidirectional dependency** - this crate depends on nothing else in
//!    the workspace

pub mod agents;
pub mod answer;
pub mod error;
pub mod events;
pub mod stage;
pub mod workbook;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Workbook Model ─────────────────────────────────────────────────────
pub use workbook::{CellRef, CellState, ColumnLayout, Sheet, Workbook};

// ── Question / Answer Values ───────────────────────────────────────────
pub use answer::{Answer, DocumentationLink, Question, ValidationStatus};

// ── Pipeline Stages ────────────────────────────────────────────────────
pub use stage::{PipelineStage, StepStatus};

// ── Collaborator Traits ────────────────────────────────────────────────
pub use agents::{
    AgentError, AgentResult, AgentSet, AnswerChecker, AnswerProvider, AnswerRequest, CheckVerdict,
    LinkValidator, LinkVerdict,
};

// ── Update Events ──────────────────────────────────────────────────────
pub use events::CellUpdate;
