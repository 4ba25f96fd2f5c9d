//! Services
//!
//! The scheduling and validation machinery: the per-question pipeline, the
//! parallel processor, the update channel, and workbook persistence.

pub mod pipeline;
pub mod processor;
pub mod updates;
pub mod workbook_io;

pub use pipeline::{
    declared_links, AgentStep, PipelineSettings, QuestionOutcome, QuestionPipeline, StageProgress,
};
pub use processor::{CellOutcome, ParallelProcessor, ProcessingResult, ProcessorConfig};
pub use updates::{
    default_update_channel, update_channel, UpdateReceiver, UpdateSender, DEFAULT_UPDATE_CAPACITY,
};
pub use workbook_io::{JsonWorkbookStore, WorkbookStore};
