//! Question Validation Pipeline
//!
//! Runs one question through the answer → check → link-check stages with a
//! single bounded retry budget spanning every restart cause: draft
//! rejection, link-check failure, and transient collaborator errors. The
//! pipeline is stateless across invocations and never touches scheduler
//! state; it communicates through its returned [`QuestionOutcome`] and an
//! optional invocation-local [`StageProgress`] handle.

use std::sync::OnceLock;
use std::time::Instant;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use veritab_core::{
    AgentResult, AgentSet, Answer, AnswerRequest, CellRef, CellUpdate, CheckVerdict,
    DocumentationLink, LinkVerdict, PipelineStage, Question, StepStatus, ValidationStatus,
};

use crate::services::updates::UpdateSender;

// ============================================================================
// Settings
// ============================================================================

/// Run-level pipeline settings. Per-question fields on [`Question`] override
/// the matching setting here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSettings {
    /// Context sent with every question that has no context of its own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Default answer length limit for questions without their own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_limit: Option<u32>,
    /// Attempt budget per question, clamped to at least one attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Reject answers that declare no documentation links
    #[serde(default = "default_require_links")]
    pub require_links: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_require_links() -> bool {
    false
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            context: None,
            char_limit: None,
            max_retries: default_max_retries(),
            require_links: default_require_links(),
        }
    }
}

// ============================================================================
// Outcome types
// ============================================================================

/// Log record of one pipeline stage execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentStep {
    /// Stage that ran
    pub stage: PipelineStage,
    /// Attempt this stage belonged to (1-based)
    pub attempt: u32,
    /// What went into the stage
    pub input: String,
    /// What came out: draft text, verdict, link summary, or error message
    pub output: String,
    /// Whether the stage outcome let the attempt proceed
    pub status: StepStatus,
    /// Stage duration in milliseconds
    pub duration_ms: u64,
    /// When the stage started
    pub started_at: DateTime<Utc>,
}

/// Terminal outcome of one question's processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutcome {
    /// Whether the question reached an approved, link-validated answer
    pub success: bool,
    /// The final answer on success, or the best-available draft on failure
    pub answer: Answer,
    /// Attempts consumed (1-based; equals the budget on exhaustion)
    pub attempts: u32,
    /// Wall-clock time spent on the question in milliseconds
    pub elapsed_ms: u64,
    /// Ordered audit trail, one record per executed stage
    pub steps: Vec<AgentStep>,
}

/// Invocation-local handle used to publish stage events for one cell while
/// its pipeline runs. Dropped when the invocation ends; nothing is retained.
#[derive(Clone)]
pub struct StageProgress {
    cell: CellRef,
    updates: UpdateSender,
    blocking: bool,
}

impl StageProgress {
    /// Bind a channel sender to the cell being processed. Stage events go
    /// out through the non-blocking emit unless `Self::with_blocking`
    /// switches the handle over.
    pub fn new(cell: CellRef, updates: UpdateSender) -> Self {
        Self {
            cell,
            updates,
            blocking: false,
        }
    }

    /// Select blocking enqueue: stage events wait for channel capacity
    /// instead of being dropped.
    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    async fn stage_started(&self, stage: PipelineStage, attempt: u32) {
        self.send(CellUpdate::StageStarted {
            cell: self.cell,
            stage,
            attempt,
        })
        .await;
    }

    async fn stage_finished(&self, stage: PipelineStage, attempt: u32, status: StepStatus) {
        self.send(CellUpdate::StageFinished {
            cell: self.cell,
            stage,
            attempt,
            status,
        })
        .await;
    }

    async fn send(&self, update: CellUpdate) {
        if self.blocking {
            self.updates.emit_blocking(update).await;
        } else {
            self.updates.emit(update);
        }
    }
}

// ============================================================================
// Link extraction
// ============================================================================

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"https?://[^\s<>"'\)\]]+"#).unwrap())
}

/// Extract the documentation links declared in a draft, in order of
/// appearance, with trailing sentence punctuation trimmed.
pub fn declared_links(draft: &str) -> Vec<String> {
    link_pattern()
        .find_iter(draft)
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ';', ':', '!', '?'])
                .to_string()
        })
        .filter(|url| !url.is_empty())
        .collect()
}

// ============================================================================
// Pipeline
// ============================================================================

/// Drives one question at a time through the three validation stages.
pub struct QuestionPipeline {
    agents: AgentSet,
    settings: PipelineSettings,
}

impl QuestionPipeline {
    /// Create a pipeline over one agent set.
    pub fn new(agents: AgentSet, settings: PipelineSettings) -> Self {
        Self { agents, settings }
    }

    /// Transform one question into a terminal outcome.
    ///
    /// The attempt budget is the question's `max_retries` override or the
    /// run setting. On exhaustion the outcome carries the last draft tagged
    /// `Rejected` (a verdict said no) or `Unvalidated` (no verdict was ever
    /// reached); the question is never silently discarded.
    pub async fn run(
        &self,
        question: &Question,
        progress: Option<&StageProgress>,
    ) -> QuestionOutcome {
        let run_started = Instant::now();
        let max_retries = question
            .max_retries
            .unwrap_or(self.settings.max_retries)
            .max(1);
        let char_limit = question.char_limit.or(self.settings.char_limit);
        let context = question
            .context
            .clone()
            .or_else(|| self.settings.context.clone());

        let mut steps: Vec<AgentStep> = Vec::new();
        let mut feedback: Option<String> = None;
        let mut last_draft: Option<String> = None;
        let mut last_status = ValidationStatus::Unvalidated;
        let mut last_links: Vec<DocumentationLink> = Vec::new();
        let mut attempts = 0;
        let mut succeeded = false;

        for attempt in 1..=max_retries {
            attempts = attempt;
            tracing::debug!(attempt, max_retries, "starting pipeline attempt");

            let request = AnswerRequest {
                question: question.text.clone(),
                context: context.clone(),
                char_limit,
                feedback: feedback.clone(),
            };
            let draft = match self.answer_stage(&request, attempt, &mut steps, progress).await {
                Ok(draft) => draft,
                Err(_) => continue,
            };

            let declared = declared_links(&draft);
            last_draft = Some(draft.clone());
            last_status = ValidationStatus::Unvalidated;
            last_links = declared
                .iter()
                .map(|url| DocumentationLink::declared(url.clone()))
                .collect();

            let verdict = match self
                .check_stage(&question.text, &draft, attempt, &mut steps, progress)
                .await
            {
                Ok(verdict) => verdict,
                Err(_) => continue,
            };
            if !verdict.approved {
                tracing::debug!(attempt, reason = %verdict.reason, "draft rejected by checker");
                last_status = ValidationStatus::Rejected;
                feedback = Some(verdict.reason);
                continue;
            }

            if declared.is_empty() {
                if self.settings.require_links {
                    self.record_missing_links(attempt, &draft, &mut steps, progress)
                        .await;
                    last_status = ValidationStatus::Rejected;
                    feedback = Some("the answer must cite at least one documentation link".into());
                    continue;
                }
                succeeded = true;
                break;
            }

            match self.link_stage(&draft, attempt, &mut steps, progress).await {
                Ok(verdicts) => {
                    // An empty verdict list verifies nothing; the declared
                    // links stay unchecked.
                    if !verdicts.is_empty() {
                        last_links = verdicts
                            .iter()
                            .map(|v| {
                                DocumentationLink::checked(v.url.clone(), v.reachable, v.relevant)
                            })
                            .collect();
                        if verdicts.iter().all(LinkVerdict::passed) {
                            succeeded = true;
                            break;
                        }
                    }
                    last_status = ValidationStatus::Rejected;
                    feedback = Some(link_failure_feedback(&verdicts));
                    continue;
                }
                // No link verdict was reached; the draft stays unvalidated.
                Err(_) => continue,
            }
        }

        let answer = Answer {
            content: last_draft.unwrap_or_default(),
            status: if succeeded {
                ValidationStatus::Approved
            } else {
                last_status
            },
            links: last_links,
        };
        if !succeeded {
            tracing::warn!(attempts, "question failed after exhausting its retry budget");
        }

        QuestionOutcome {
            success: succeeded,
            answer,
            attempts,
            elapsed_ms: run_started.elapsed().as_millis() as u64,
            steps,
        }
    }

    async fn answer_stage(
        &self,
        request: &AnswerRequest,
        attempt: u32,
        steps: &mut Vec<AgentStep>,
        progress: Option<&StageProgress>,
    ) -> AgentResult<String> {
        if let Some(p) = progress {
            p.stage_started(PipelineStage::Answer, attempt).await;
        }
        let started_at = Utc::now();
        let started = Instant::now();
        let result = self.agents.answerer.answer(request).await;
        let (status, output) = match &result {
            Ok(draft) => (StepStatus::Success, draft.clone()),
            Err(err) => {
                tracing::debug!(attempt, error = %err, "answer stage failed");
                (StepStatus::Failure, err.to_string())
            }
        };
        steps.push(AgentStep {
            stage: PipelineStage::Answer,
            attempt,
            input: request.question.clone(),
            output,
            status,
            duration_ms: started.elapsed().as_millis() as u64,
            started_at,
        });
        if let Some(p) = progress {
            p.stage_finished(PipelineStage::Answer, attempt, status).await;
        }
        result
    }

    async fn check_stage(
        &self,
        question: &str,
        draft: &str,
        attempt: u32,
        steps: &mut Vec<AgentStep>,
        progress: Option<&StageProgress>,
    ) -> AgentResult<CheckVerdict> {
        if let Some(p) = progress {
            p.stage_started(PipelineStage::Check, attempt).await;
        }
        let started_at = Utc::now();
        let started = Instant::now();
        let result = self.agents.checker.check(question, draft).await;
        let (status, output) = match &result {
            Ok(verdict) if verdict.approved => {
                (StepStatus::Success, format!("approved: {}", verdict.reason))
            }
            Ok(verdict) => (StepStatus::Failure, format!("rejected: {}", verdict.reason)),
            Err(err) => {
                tracing::debug!(attempt, error = %err, "check stage failed");
                (StepStatus::Failure, err.to_string())
            }
        };
        steps.push(AgentStep {
            stage: PipelineStage::Check,
            attempt,
            input: draft.to_string(),
            output,
            status,
            duration_ms: started.elapsed().as_millis() as u64,
            started_at,
        });
        if let Some(p) = progress {
            p.stage_finished(PipelineStage::Check, attempt, status).await;
        }
        result
    }

    async fn link_stage(
        &self,
        draft: &str,
        attempt: u32,
        steps: &mut Vec<AgentStep>,
        progress: Option<&StageProgress>,
    ) -> AgentResult<Vec<LinkVerdict>> {
        if let Some(p) = progress {
            p.stage_started(PipelineStage::LinkCheck, attempt).await;
        }
        let started_at = Utc::now();
        let started = Instant::now();
        let result = self.agents.link_validator.validate_links(draft).await;
        let (status, output) = match &result {
            Ok(verdicts) if !verdicts.is_empty() && verdicts.iter().all(LinkVerdict::passed) => {
                (StepStatus::Success, link_summary(verdicts))
            }
            Ok(verdicts) => (StepStatus::Failure, link_summary(verdicts)),
            Err(err) => {
                tracing::debug!(attempt, error = %err, "link-check stage failed");
                (StepStatus::Failure, err.to_string())
            }
        };
        steps.push(AgentStep {
            stage: PipelineStage::LinkCheck,
            attempt,
            input: draft.to_string(),
            output,
            status,
            duration_ms: started.elapsed().as_millis() as u64,
            started_at,
        });
        if let Some(p) = progress {
            p.stage_finished(PipelineStage::LinkCheck, attempt, status).await;
        }
        result
    }

    /// The link-required policy rejected a linkless draft; no service call
    /// was made, but the decision still lands in the audit trail.
    async fn record_missing_links(
        &self,
        attempt: u32,
        draft: &str,
        steps: &mut Vec<AgentStep>,
        progress: Option<&StageProgress>,
    ) {
        tracing::debug!(attempt, "approved draft declares no links but links are required");
        if let Some(p) = progress {
            p.stage_started(PipelineStage::LinkCheck, attempt).await;
        }
        steps.push(AgentStep {
            stage: PipelineStage::LinkCheck,
            attempt,
            input: draft.to_string(),
            output: "no documentation links declared".to_string(),
            status: StepStatus::Failure,
            duration_ms: 0,
            started_at: Utc::now(),
        });
        if let Some(p) = progress {
            p.stage_finished(PipelineStage::LinkCheck, attempt, StepStatus::Failure)
                .await;
        }
    }
}

fn link_summary(verdicts: &[LinkVerdict]) -> String {
    if verdicts.is_empty() {
        return "no verdicts returned for declared links".to_string();
    }
    let passed = verdicts.iter().filter(|v| v.passed()).count();
    let mut summary = format!("{passed}/{} links passed", verdicts.len());
    let failing: Vec<&str> = verdicts
        .iter()
        .filter(|v| !v.passed())
        .map(|v| v.url.as_str())
        .collect();
    if !failing.is_empty() {
        summary.push_str(&format!("; failing: {}", failing.join(", ")));
    }
    summary
}

fn link_failure_feedback(verdicts: &[LinkVerdict]) -> String {
    if verdicts.is_empty() {
        return "link validation returned no verdicts for the declared links".to_string();
    }
    let failing: Vec<&str> = verdicts
        .iter()
        .filter(|v| !v.passed())
        .map(|v| v.url.as_str())
        .collect();
    format!("documentation links failed validation: {}", failing.join(", "))
}
