//! Veritab - Parallel Question Validation Engine
//!
//! Takes a workbook of questions and drives every pending cell to a terminal
//! state through an answer → check → link-check pipeline, run by a fixed
//! pool of concurrent agent sets. It includes:
//! - The parallel processor with cooperative cancellation and cleanup
//! - The per-question validation pipeline with a bounded retry budget
//! - A bounded update channel publishing cell and stage events
//! - JSON workbook persistence behind the spreadsheet I/O boundary

pub mod services;
pub mod utils;

// Re-export the model and collaborator surface of the core crate so
// consumers depend on this crate alone.
pub use veritab_core::{
    // Workbook model
    CellRef, CellState, ColumnLayout, Sheet, Workbook,
    // Question / answer values
    Answer, DocumentationLink, Question, ValidationStatus,
    // Pipeline stages
    PipelineStage, StepStatus,
    // Channel events
    CellUpdate,
    // Collaborator interfaces
    AgentError, AgentResult, AgentSet, AnswerChecker, AnswerProvider, AnswerRequest, CheckVerdict,
    LinkValidator, LinkVerdict,
    // Core errors
    CoreError, CoreResult,
};

pub use services::{
    declared_links, default_update_channel, update_channel, AgentStep, CellOutcome,
    JsonWorkbookStore, ParallelProcessor, PipelineSettings, ProcessingResult, ProcessorConfig,
    QuestionOutcome, QuestionPipeline, StageProgress, UpdateReceiver, UpdateSender, WorkbookStore,
    DEFAULT_UPDATE_CAPACITY,
};
pub use utils::error::{AppError, AppResult};
