//! Cell Update Events
//!
//! Progress events emitted by workers over the update channel while a run
//! is in flight. The channel is a notification side-channel only: the
//! workbook's cell states remain the authority for current state, and every
//! consumer (UI, log, test harness) subscribes through the same event
//! contract.

use serde::{Deserialize, Serialize};

use crate::answer::Answer;
use crate::stage::{PipelineStage, StepStatus};
use crate::workbook::CellRef;

/// One progress event for one cell.
///
/// The four cell lifecycle kinds mirror the cell state machine; the two
/// stage kinds add per-stage audit granularity for observers that want it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellUpdate {
    /// A worker claimed the cell and began processing it
    CellWorking { cell: CellRef },

    /// The pipeline produced an approved answer for the cell
    CellCompleted { cell: CellRef, answer: Answer },

    /// Retries were exhausted; the cell is terminally failed for this run
    CellFailed { cell: CellRef, reason: String },

    /// Cancellation cleanup returned the cell to the pending state
    CellReset { cell: CellRef },

    /// One pipeline stage began on the given attempt
    StageStarted {
        cell: CellRef,
        stage: PipelineStage,
        attempt: u32,
    },

    /// One pipeline stage finished on the given attempt
    StageFinished {
        cell: CellRef,
        stage: PipelineStage,
        attempt: u32,
        status: StepStatus,
    },
}

impl CellUpdate {
    /// The cell this event refers to.
    pub fn cell(&self) -> CellRef {
        match self {
            CellUpdate::CellWorking { cell }
            | CellUpdate::CellCompleted { cell, .. }
            | CellUpdate::CellFailed { cell, .. }
            | CellUpdate::CellReset { cell }
            | CellUpdate::StageStarted { cell, .. }
            | CellUpdate::StageFinished { cell, .. } => *cell,
        }
    }

    /// Whether this is one of the four cell lifecycle kinds (as opposed to
    /// the finer-grained stage events).
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            CellUpdate::CellWorking { .. }
                | CellUpdate::CellCompleted { .. }
                | CellUpdate::CellFailed { .. }
                | CellUpdate::CellReset { .. }
        )
    }
}
