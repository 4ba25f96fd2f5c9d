//! Workbook Model and Cell Lifecycle
//!
//! The workbook is the unit of work for one processing run: an ordered list
//! of sheets, each holding parallel vectors of questions, answers, cell
//! states, and original source-row indices. Cells move through a small state
//! machine (`pending → working → completed | failed`, with `working →
//! pending` on cancellation reset) driven exclusively by the four operations
//! on [`Workbook`].
//!
//! The model holds no concurrency control. The scheduler guarantees that at
//! most one worker mutates a given cell at a time and wraps the workbook in
//! a lock for the duration of each mutation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::answer::{Answer, Question};
use crate::error::{CoreError, CoreResult};

// ============================================================================
// Cell addressing and state
// ============================================================================

/// Address of one question/answer slot: sheet position and row position
/// within the workbook's in-memory vectors (not source-file row numbers).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct CellRef {
    /// Sheet position within the workbook
    pub sheet: usize,
    /// Row position within the sheet
    pub row: usize,
}

impl CellRef {
    /// Create a cell reference.
    pub fn new(sheet: usize, row: usize) -> Self {
        Self { sheet, row }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sheet {} row {}", self.sheet, self.row)
    }
}

/// Lifecycle state of a single cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    /// Waiting to be claimed by a worker; also the cancellation-reset target
    Pending,
    /// Claimed by exactly one worker for its entire processing window
    Working,
    /// The pipeline produced an approved answer
    Completed,
    /// The pipeline exhausted its retries
    Failed,
}

impl CellState {
    /// Stable identifier used in log lines and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            CellState::Pending => "pending",
            CellState::Working => "working",
            CellState::Completed => "completed",
            CellState::Failed => "failed",
        }
    }

    /// Whether the state admits no further transitions within a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CellState::Completed | CellState::Failed)
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Column positions of the question/response/documentation columns in the
/// underlying source. Opaque to the engine; consumed only by the I/O
/// collaborator when writing answers back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLayout {
    /// Column holding the question text
    pub question: usize,
    /// Column the answer is written back to
    pub response: usize,
    /// Column holding documentation links, when the source has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<usize>,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            question: 0,
            response: 1,
            documentation: None,
        }
    }
}

// ============================================================================
// Sheet
// ============================================================================

/// One sheet of the workbook.
///
/// The four row vectors are parallel and always equal in length; rows are
/// appended only through [`Sheet::push_question`], which maintains that
/// invariant by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    /// Sheet name from the source
    pub name: String,
    /// Position of this sheet within the workbook (assigned on insertion)
    pub index: usize,
    /// Source column positions for write-back
    pub columns: ColumnLayout,
    questions: Vec<Question>,
    answers: Vec<Option<Answer>>,
    cell_states: Vec<CellState>,
    row_indices: Vec<usize>,
}

impl Sheet {
    /// Create an empty sheet. The workbook assigns `index` on insertion.
    pub fn new(name: impl Into<String>, columns: ColumnLayout) -> Self {
        Self {
            name: name.into(),
            index: 0,
            columns,
            questions: Vec::new(),
            answers: Vec::new(),
            cell_states: Vec::new(),
            row_indices: Vec::new(),
        }
    }

    /// Append a pending question, recording the row it occupied in the
    /// source file (sources may contain blank rows that are skipped).
    pub fn push_question(&mut self, question: Question, source_row: usize) {
        self.questions.push(question);
        self.answers.push(None);
        self.cell_states.push(CellState::Pending);
        self.row_indices.push(source_row);
    }

    /// Number of rows in this sheet.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the sheet holds no rows.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Question at `row`, if in bounds.
    pub fn question(&self, row: usize) -> Option<&Question> {
        self.questions.get(row)
    }

    /// Answer at `row`; `None` when out of bounds or unanswered.
    pub fn answer(&self, row: usize) -> Option<&Answer> {
        self.answers.get(row).and_then(|slot| slot.as_ref())
    }

    /// Cell state at `row`, if in bounds.
    pub fn state(&self, row: usize) -> Option<CellState> {
        self.cell_states.get(row).copied()
    }

    /// Original source-row index at `row`, if in bounds.
    pub fn row_index(&self, row: usize) -> Option<usize> {
        self.row_indices.get(row).copied()
    }

    /// Rows currently in `state`, in row order.
    pub fn rows_in_state(&self, state: CellState) -> Vec<usize> {
        self.cell_states
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == state)
            .map(|(row, _)| row)
            .collect()
    }

    /// Check the parallel-vector invariant.
    pub fn validate(&self) -> CoreResult<()> {
        let n = self.questions.len();
        if self.answers.len() != n || self.cell_states.len() != n || self.row_indices.len() != n {
            return Err(CoreError::validation(format!(
                "sheet '{}' has mismatched row vectors: {} questions, {} answers, {} states, {} row indices",
                self.name,
                n,
                self.answers.len(),
                self.cell_states.len(),
                self.row_indices.len()
            )));
        }
        Ok(())
    }

    fn claim(&mut self, row: usize) -> CoreResult<Question> {
        let state = self.state_checked(row)?;
        if state != CellState::Pending {
            return Err(CoreError::invalid_transition(format!(
                "cannot claim row {} of sheet '{}': state is {}, expected pending",
                row, self.name, state
            )));
        }
        self.cell_states[row] = CellState::Working;
        Ok(self.questions[row].clone())
    }

    fn complete(&mut self, row: usize, answer: Answer) -> CoreResult<()> {
        let state = self.state_checked(row)?;
        if state != CellState::Working {
            return Err(CoreError::invalid_transition(format!(
                "cannot complete row {} of sheet '{}': state is {}, expected working",
                row, self.name, state
            )));
        }
        self.cell_states[row] = CellState::Completed;
        self.answers[row] = Some(answer);
        Ok(())
    }

    fn fail(&mut self, row: usize) -> CoreResult<()> {
        let state = self.state_checked(row)?;
        if state != CellState::Working {
            return Err(CoreError::invalid_transition(format!(
                "cannot fail row {} of sheet '{}': state is {}, expected working",
                row, self.name, state
            )));
        }
        self.cell_states[row] = CellState::Failed;
        Ok(())
    }

    fn reset(&mut self, row: usize) -> CoreResult<()> {
        let state = self.state_checked(row)?;
        if state == CellState::Working {
            self.cell_states[row] = CellState::Pending;
        }
        // Any answer still present at reset time is an abandoned partial.
        self.answers[row] = None;
        Ok(())
    }

    fn state_checked(&self, row: usize) -> CoreResult<CellState> {
        self.cell_states
            .get(row)
            .copied()
            .ok_or_else(|| CoreError::not_found(format!("row {} in sheet '{}'", row, self.name)))
    }
}

// ============================================================================
// Workbook
// ============================================================================

/// An ordered collection of sheets plus the source identifier it was loaded
/// from. Constructed once at load time and mutated in place by the
/// scheduler; answers and states are written back through the four cell
/// operations only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workbook {
    /// Source path or handle the workbook was loaded from
    pub source: String,
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Create an empty workbook for `source`.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            sheets: Vec::new(),
        }
    }

    /// Append a sheet, assigning its position index.
    pub fn push_sheet(&mut self, mut sheet: Sheet) {
        sheet.index = self.sheets.len();
        self.sheets.push(sheet);
    }

    /// Sheets in workbook order.
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// Sheet at `index`, if in bounds.
    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    /// Total number of questions across all sheets.
    pub fn question_count(&self) -> usize {
        self.sheets.iter().map(Sheet::len).sum()
    }

    /// Question at `cell`.
    pub fn question(&self, cell: CellRef) -> CoreResult<&Question> {
        let sheet = self.sheet_at(cell)?;
        sheet
            .question(cell.row)
            .ok_or_else(|| CoreError::not_found(format!("{cell}")))
    }

    /// Cell state at `cell`.
    pub fn state(&self, cell: CellRef) -> CoreResult<CellState> {
        let sheet = self.sheet_at(cell)?;
        sheet
            .state(cell.row)
            .ok_or_else(|| CoreError::not_found(format!("{cell}")))
    }

    /// Answer at `cell`; `Ok(None)` when the cell is unanswered.
    pub fn answer(&self, cell: CellRef) -> CoreResult<Option<&Answer>> {
        let sheet = self.sheet_at(cell)?;
        sheet
            .state(cell.row)
            .ok_or_else(|| CoreError::not_found(format!("{cell}")))?;
        Ok(sheet.answer(cell.row))
    }

    /// All cells currently in `state`, flattened in sheet order then row
    /// order. With `CellState::Pending` this is the scheduler's backlog.
    pub fn cells_in_state(&self, state: CellState) -> Vec<CellRef> {
        self.sheets
            .iter()
            .enumerate()
            .flat_map(|(sheet_index, sheet)| {
                sheet
                    .rows_in_state(state)
                    .into_iter()
                    .map(move |row| CellRef::new(sheet_index, row))
            })
            .collect()
    }

    /// Check the parallel-vector invariant on every sheet.
    pub fn validate(&self) -> CoreResult<()> {
        for sheet in &self.sheets {
            sheet.validate()?;
        }
        Ok(())
    }

    /// Claim a pending cell for processing (`pending → working`), returning
    /// a clone of its question. The caller must be the cell's only claimer.
    pub fn claim(&mut self, cell: CellRef) -> CoreResult<Question> {
        self.sheet_at_mut(cell)?.claim(cell.row)
    }

    /// Record a successful outcome (`working → completed`) and store the
    /// final answer.
    pub fn complete(&mut self, cell: CellRef, answer: Answer) -> CoreResult<()> {
        self.sheet_at_mut(cell)?.complete(cell.row, answer)
    }

    /// Record an exhausted-retries outcome (`working → failed`).
    pub fn fail(&mut self, cell: CellRef) -> CoreResult<()> {
        self.sheet_at_mut(cell)?.fail(cell.row)
    }

    /// Return a cell to `pending` if it is `working`, and clear any stored
    /// answer. Idempotent; on non-working cells the state is untouched.
    pub fn reset(&mut self, cell: CellRef) -> CoreResult<()> {
        self.sheet_at_mut(cell)?.reset(cell.row)
    }

    fn sheet_at(&self, cell: CellRef) -> CoreResult<&Sheet> {
        self.sheets
            .get(cell.sheet)
            .ok_or_else(|| CoreError::not_found(format!("sheet {}", cell.sheet)))
    }

    fn sheet_at_mut(&mut self, cell: CellRef) -> CoreResult<&mut Sheet> {
        self.sheets
            .get_mut(cell.sheet)
            .ok_or_else(|| CoreError::not_found(format!("sheet {}", cell.sheet)))
    }
}
