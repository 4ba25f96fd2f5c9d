//! Workbook Persistence
//!
//! The scheduler never touches spreadsheet file formats directly; it loads
//! and saves workbooks through the [`WorkbookStore`] boundary. A JSON-backed
//! implementation ships for fixtures and for persisting a run interrupted by
//! cancellation (reset cells round-trip as `Pending` and can be resumed).

use std::fs;

use veritab_core::Workbook;

use crate::utils::AppResult;

/// Spreadsheet I/O boundary.
///
/// `load` must return a workbook that passes invariant validation; `save`
/// persists the workbook back to the source recorded inside it.
pub trait WorkbookStore: Send + Sync {
    /// Load a workbook from `source`.
    fn load(&self, source: &str) -> AppResult<Workbook>;

    /// Persist the workbook to its recorded source.
    fn save(&self, workbook: &Workbook) -> AppResult<()>;
}

/// Stores workbooks as pretty-printed JSON files.
#[derive(Debug, Default)]
pub struct JsonWorkbookStore;

impl JsonWorkbookStore {
    /// Create a JSON store.
    pub fn new() -> Self {
        Self
    }
}

impl WorkbookStore for JsonWorkbookStore {
    fn load(&self, source: &str) -> AppResult<Workbook> {
        let content = fs::read_to_string(source)?;
        let mut workbook: Workbook = serde_json::from_str(&content)?;
        workbook.validate()?;
        // The file may have moved since it was written; the path we actually
        // read from wins over the recorded one.
        workbook.source = source.to_string();
        tracing::debug!(
            source,
            sheets = workbook.sheets().len(),
            questions = workbook.question_count(),
            "loaded workbook"
        );
        Ok(workbook)
    }

    fn save(&self, workbook: &Workbook) -> AppResult<()> {
        workbook.validate()?;
        let content = serde_json::to_string_pretty(workbook)?;
        fs::write(&workbook.source, content)?;
        tracing::debug!(source = %workbook.source, "saved workbook");
        Ok(())
    }
}
