//! Parallel Workbook Processor
//!
//! Drives every `Pending` cell of a workbook to a terminal state using a
//! fixed-size pool of agent sets. The backlog is flattened across sheets,
//! partitioned index-modulo across workers, and each worker walks its slice
//! in order, claiming one cell at a time. Cancellation is cooperative:
//! workers observe the token at item boundaries, and a cleanup sweep resets
//! any cell still `Working` once all workers have stopped.
//!
//! One processor drives one run. Independent concurrent sessions each
//! construct their own processor, channel, and token.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use veritab_core::{AgentSet, CellRef, CellState, CellUpdate, ValidationStatus, Workbook};

use crate::services::pipeline::{PipelineSettings, QuestionOutcome, QuestionPipeline, StageProgress};
use crate::services::updates::UpdateSender;
use crate::utils::{AppError, AppResult};

// ============================================================================
// Configuration
// ============================================================================

/// Processor behaviour toggles. Worker count is the number of agent sets
/// supplied at construction, not a config field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorConfig {
    /// Use blocking channel enqueue instead of drop-on-full
    #[serde(default)]
    pub blocking_updates: bool,
}

// ============================================================================
// Result types
// ============================================================================

/// Terminal outcome of one cell, as folded into the run result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CellOutcome {
    /// The cell the question came from
    pub cell: CellRef,
    /// What the pipeline produced for it
    pub outcome: QuestionOutcome,
}

/// Aggregate outcome of one workbook run. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    /// Unique id for this run
    pub run_id: String,
    /// True iff at least one cell completed and the run was not cancelled
    pub success: bool,
    /// Cells that reached `Completed`
    pub questions_processed: usize,
    /// Cells that reached `Failed`
    pub questions_failed: usize,
    /// Questions in the workbook, including cells outside this run's backlog
    pub total_questions: usize,
    /// Whether cancellation was requested during the run
    pub cancelled: bool,
    /// Wall-clock duration of the run in milliseconds
    pub elapsed_ms: u64,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Per-cell outcomes in cell order
    pub outcomes: Vec<CellOutcome>,
}

/// What one worker hands back after draining its backlog slice.
struct WorkerReport {
    completed: usize,
    failed: usize,
    outcomes: Vec<CellOutcome>,
}

// ============================================================================
// Backlog partitioning
// ============================================================================

/// Split the backlog across `workers` slices by index modulo. Every item
/// lands in exactly one slice; each slice preserves backlog order.
fn partition_backlog(backlog: &[CellRef], workers: usize) -> Vec<Vec<CellRef>> {
    let mut slices: Vec<Vec<CellRef>> = vec![Vec::new(); workers];
    for (index, cell) in backlog.iter().enumerate() {
        slices[index % workers].push(*cell);
    }
    slices
}

// ============================================================================
// Processor
// ============================================================================

/// Scheduler for one parallel workbook run.
pub struct ParallelProcessor {
    /// One agent set per worker; pool width is the vector length
    agent_sets: Vec<AgentSet>,
    /// Channel the run publishes cell and stage events on
    updates: UpdateSender,
    /// Behaviour toggles
    config: ProcessorConfig,
    /// Cancellation token observed by every worker
    token: CancellationToken,
}

impl ParallelProcessor {
    /// Create a processor over a pool of agent sets.
    ///
    /// The token is created here and lives as long as the processor, so
    /// `cancel_processing` called before `process_workbook` makes the run
    /// report `cancelled` without claiming a single cell.
    pub fn new(agent_sets: Vec<AgentSet>, updates: UpdateSender, config: ProcessorConfig) -> Self {
        Self {
            agent_sets,
            updates,
            config,
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation of the run. Fire-and-forget, idempotent, safe
    /// to call from any task at any time. Workers stop at their next
    /// backlog-item boundary; the current pipeline invocation is never
    /// interrupted mid-stage.
    pub fn cancel_processing(&self) {
        tracing::info!("cancellation requested");
        self.token.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive every `Pending` cell of the workbook to a terminal state.
    ///
    /// Validates the workbook, flattens and partitions the backlog, runs
    /// the worker pool to completion, then sweeps any cell left `Working`
    /// back to `Pending`. Individual question failures never abort the run;
    /// only structural workbook errors do.
    pub async fn process_workbook(
        &self,
        workbook: Arc<RwLock<Workbook>>,
        settings: PipelineSettings,
    ) -> AppResult<ProcessingResult> {
        if self.agent_sets.is_empty() {
            return Err(AppError::validation(
                "at least one agent set is required to process a workbook",
            ));
        }

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let started = Instant::now();

        let (total_questions, backlog) = {
            let wb = workbook.read().await;
            wb.validate()?;
            (wb.question_count(), wb.cells_in_state(CellState::Pending))
        };
        tracing::info!(
            run_id = %run_id,
            workers = self.agent_sets.len(),
            backlog = backlog.len(),
            total = total_questions,
            "starting workbook run"
        );

        let slices = partition_backlog(&backlog, self.agent_sets.len());
        let mut handles = Vec::with_capacity(slices.len());
        for (worker, cells) in slices.into_iter().enumerate() {
            let pipeline = QuestionPipeline::new(self.agent_sets[worker].clone(), settings.clone());
            let wb = Arc::clone(&workbook);
            let updates = self.updates.clone();
            let blocking = self.config.blocking_updates;
            let token = self.token.clone();
            handles.push(tokio::spawn(run_worker(
                worker, cells, wb, pipeline, updates, blocking, token,
            )));
        }
        let joined = join_all(handles).await;

        // Sweep before inspecting worker results so an early stop never
        // leaves a cell stuck in `Working`.
        let reset_cells = {
            let mut wb = workbook.write().await;
            let cells = wb.cells_in_state(CellState::Working);
            for cell in &cells {
                wb.reset(*cell)?;
            }
            cells
        };
        for &cell in &reset_cells {
            send_update(&self.updates, self.config.blocking_updates, CellUpdate::CellReset { cell })
                .await;
        }
        if !reset_cells.is_empty() {
            tracing::info!(count = reset_cells.len(), "reset in-flight cells back to pending");
        }

        let mut completed = 0;
        let mut failed = 0;
        let mut outcomes: Vec<CellOutcome> = Vec::new();
        for result in joined {
            let report =
                result.map_err(|err| AppError::task(format!("worker task failed: {err}")))?;
            completed += report.completed;
            failed += report.failed;
            outcomes.extend(report.outcomes);
        }
        outcomes.sort_by_key(|o| (o.cell.sheet, o.cell.row));

        let cancelled = self.token.is_cancelled();
        let result = ProcessingResult {
            run_id,
            success: completed >= 1 && !cancelled,
            questions_processed: completed,
            questions_failed: failed,
            total_questions,
            cancelled,
            elapsed_ms: started.elapsed().as_millis() as u64,
            started_at,
            outcomes,
        };
        tracing::info!(
            run_id = %result.run_id,
            completed,
            failed,
            cancelled,
            elapsed_ms = result.elapsed_ms,
            "workbook run finished"
        );
        Ok(result)
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Process one backlog slice sequentially until it is drained or
/// cancellation is observed.
async fn run_worker(
    worker: usize,
    cells: Vec<CellRef>,
    workbook: Arc<RwLock<Workbook>>,
    pipeline: QuestionPipeline,
    updates: UpdateSender,
    blocking: bool,
    token: CancellationToken,
) -> WorkerReport {
    tracing::debug!(worker, assigned = cells.len(), "worker starting");
    let mut report = WorkerReport {
        completed: 0,
        failed: 0,
        outcomes: Vec::new(),
    };

    for cell in cells {
        if token.is_cancelled() {
            tracing::debug!(worker, "worker stopping before next claim");
            break;
        }

        let question = {
            let mut wb = workbook.write().await;
            match wb.claim(cell) {
                Ok(question) => question,
                Err(err) => {
                    tracing::warn!(worker, %cell, error = %err, "skipping unclaimable cell");
                    continue;
                }
            }
        };
        send_update(&updates, blocking, CellUpdate::CellWorking { cell }).await;

        let progress = StageProgress::new(cell, updates.clone()).with_blocking(blocking);
        let outcome = pipeline.run(&question, Some(&progress)).await;

        // Cancellation arrived while the pipeline ran: discard the outcome
        // and leave the cell `Working` for the cleanup sweep.
        if token.is_cancelled() {
            tracing::debug!(worker, %cell, "discarding outcome produced after cancellation");
            break;
        }

        if outcome.success {
            let applied = {
                let mut wb = workbook.write().await;
                wb.complete(cell, outcome.answer.clone())
            };
            match applied {
                Ok(()) => {
                    report.completed += 1;
                    send_update(
                        &updates,
                        blocking,
                        CellUpdate::CellCompleted {
                            cell,
                            answer: outcome.answer.clone(),
                        },
                    )
                    .await;
                }
                Err(err) => {
                    tracing::warn!(worker, %cell, error = %err, "could not record completion");
                    continue;
                }
            }
        } else {
            let reason = failure_reason(&outcome);
            let applied = {
                let mut wb = workbook.write().await;
                wb.fail(cell)
            };
            match applied {
                Ok(()) => {
                    report.failed += 1;
                    send_update(&updates, blocking, CellUpdate::CellFailed { cell, reason }).await;
                }
                Err(err) => {
                    tracing::warn!(worker, %cell, error = %err, "could not record failure");
                    continue;
                }
            }
        }
        report.outcomes.push(CellOutcome { cell, outcome });
    }

    tracing::debug!(
        worker,
        completed = report.completed,
        failed = report.failed,
        "worker finished"
    );
    report
}

async fn send_update(updates: &UpdateSender, blocking: bool, update: CellUpdate) {
    if blocking {
        updates.emit_blocking(update).await;
    } else {
        updates.emit(update);
    }
}

fn failure_reason(outcome: &QuestionOutcome) -> String {
    let status = match outcome.answer.status {
        ValidationStatus::Approved => "approved",
        ValidationStatus::Rejected => "rejected",
        ValidationStatus::Unvalidated => "unvalidated",
    };
    format!(
        "no approved answer after {} attempts (best draft: {status})",
        outcome.attempts
    )
}
