//! Workbook Store Integration Tests
//!
//! Persistence round-trips through the JSON store, including the
//! interrupted-run flow: a cancelled run's reset cells reload as `Pending`
//! and a finished run's terminal states survive the disk round-trip.

use std::sync::Arc;

use tokio::sync::RwLock;

use veritab::{
    default_update_channel, AgentResult, AgentSet, AnswerChecker, AnswerProvider, AnswerRequest,
    CellState, CheckVerdict, ColumnLayout, JsonWorkbookStore, LinkValidator, LinkVerdict,
    ParallelProcessor, PipelineSettings, ProcessorConfig, Question, Sheet, Workbook, WorkbookStore,
};

// ============================================================================
// Helpers
// ============================================================================

fn fixture_workbook(source: &str) -> Workbook {
    let mut workbook = Workbook::new(source);
    let mut sheet = Sheet::new("Onboarding", ColumnLayout::default());
    sheet.push_question(Question::new("What does the borrow checker verify?"), 1);
    sheet.push_question(Question::new("When does a value get dropped?"), 2);
    sheet.push_question(Question::new("What is interior mutability?"), 4);
    workbook.push_sheet(sheet);
    workbook
}

struct EchoAnswerer;

#[async_trait::async_trait]
impl AnswerProvider for EchoAnswerer {
    fn name(&self) -> &str {
        "echo-answerer"
    }

    async fn answer(&self, request: &AnswerRequest) -> AgentResult<String> {
        Ok(format!("Answer: {}", request.question))
    }
}

struct YesChecker;

#[async_trait::async_trait]
impl AnswerChecker for YesChecker {
    fn name(&self) -> &str {
        "yes-checker"
    }

    async fn check(&self, _question: &str, _draft: &str) -> AgentResult<CheckVerdict> {
        Ok(CheckVerdict::approved("fine"))
    }
}

struct NoLinks;

#[async_trait::async_trait]
impl LinkValidator for NoLinks {
    fn name(&self) -> &str {
        "no-links"
    }

    async fn validate_links(&self, _draft: &str) -> AgentResult<Vec<LinkVerdict>> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Round-trips
// ============================================================================

#[test]
fn test_fresh_workbook_round_trips_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.json");
    let workbook = fixture_workbook(path.to_str().unwrap());

    let store = JsonWorkbookStore::new();
    store.save(&workbook).unwrap();
    let loaded = store.load(path.to_str().unwrap()).unwrap();

    assert_eq!(loaded, workbook);
}

#[test]
fn test_reset_cells_reload_as_resumable_backlog() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("interrupted.json");
    let mut workbook = fixture_workbook(path.to_str().unwrap());

    // A cancelled run leaves claimed cells swept back to pending.
    let cell = workbook.cells_in_state(CellState::Pending)[0];
    workbook.claim(cell).unwrap();
    workbook.reset(cell).unwrap();

    let store = JsonWorkbookStore::new();
    store.save(&workbook).unwrap();
    let loaded = store.load(path.to_str().unwrap()).unwrap();

    assert_eq!(loaded.cells_in_state(CellState::Pending).len(), 3);
    assert_eq!(loaded.cells_in_state(CellState::Working).len(), 0);
}

#[tokio::test]
async fn test_processed_workbook_persists_terminal_states() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed.json");
    let workbook = Arc::new(RwLock::new(fixture_workbook(path.to_str().unwrap())));

    let (tx, _rx) = default_update_channel();
    let processor = ParallelProcessor::new(
        vec![AgentSet::new(
            Arc::new(EchoAnswerer),
            Arc::new(YesChecker),
            Arc::new(NoLinks),
        )],
        tx,
        ProcessorConfig::default(),
    );
    let result = processor
        .process_workbook(Arc::clone(&workbook), PipelineSettings::default())
        .await
        .unwrap();
    assert!(result.success);

    let store = JsonWorkbookStore::new();
    store.save(&*workbook.read().await).unwrap();
    let loaded = store.load(path.to_str().unwrap()).unwrap();

    assert!(loaded.cells_in_state(CellState::Pending).is_empty());
    let completed = loaded.cells_in_state(CellState::Completed);
    assert_eq!(completed.len(), 3);
    for cell in completed {
        let answer = loaded.answer(cell).unwrap().unwrap();
        assert!(answer.is_approved());
        assert!(answer.content.starts_with("Answer: "));
    }
}
