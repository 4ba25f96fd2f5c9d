//! Pipeline Integration Tests
//!
//! Runs the validation pipeline against scripted collaborators to verify
//! the retry budget, feedback propagation, and the stage events published
//! on the update channel.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use veritab::{
    declared_links, update_channel, AgentError, AgentResult, AgentSet, AnswerChecker,
    AnswerProvider, AnswerRequest, CellRef, CellUpdate, CheckVerdict, LinkValidator, LinkVerdict,
    PipelineSettings, PipelineStage, Question, QuestionPipeline, StageProgress, StepStatus,
    ValidationStatus,
};

// ============================================================================
// Scripted collaborators
// ============================================================================

/// Answerer that plays back a script: `Some(draft)` answers, `None` errors.
/// Calls beyond the script repeat its last entry.
struct ScriptedAnswerer {
    script: Vec<Option<&'static str>>,
    calls: AtomicU32,
    requests: Mutex<Vec<AnswerRequest>>,
}

impl ScriptedAnswerer {
    fn new(script: Vec<Option<&'static str>>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn always(draft: &'static str) -> Arc<Self> {
        Self::new(vec![Some(draft)])
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn recorded_requests(&self) -> Vec<AnswerRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AnswerProvider for ScriptedAnswerer {
    fn name(&self) -> &str {
        "scripted-answerer"
    }

    async fn answer(&self, request: &AnswerRequest) -> AgentResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        self.requests.lock().unwrap().push(request.clone());
        let slot = self
            .script
            .get(call)
            .or_else(|| self.script.last())
            .copied()
            .flatten();
        match slot {
            Some(draft) => Ok(draft.to_string()),
            None => Err(AgentError::network("scripted outage")),
        }
    }
}

/// Checker that rejects its first `reject_first` calls, then approves.
struct ScriptedChecker {
    reject_first: u32,
    reason: &'static str,
    calls: AtomicU32,
}

impl ScriptedChecker {
    fn approving() -> Arc<Self> {
        Arc::new(Self {
            reject_first: 0,
            reason: "accurate",
            calls: AtomicU32::new(0),
        })
    }

    fn rejecting_first(count: u32, reason: &'static str) -> Arc<Self> {
        Arc::new(Self {
            reject_first: count,
            reason,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait::async_trait]
impl AnswerChecker for ScriptedChecker {
    fn name(&self) -> &str {
        "scripted-checker"
    }

    async fn check(&self, _question: &str, _draft: &str) -> AgentResult<CheckVerdict> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.reject_first {
            Ok(CheckVerdict::rejected(self.reason))
        } else {
            Ok(CheckVerdict::approved(self.reason))
        }
    }
}

/// Link validator returning a fixed pair of flags for every declared link.
struct FlagLinks {
    reachable: bool,
    relevant: bool,
}

impl FlagLinks {
    fn passing() -> Arc<Self> {
        Arc::new(Self {
            reachable: true,
            relevant: true,
        })
    }

    fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            reachable: false,
            relevant: true,
        })
    }
}

#[async_trait::async_trait]
impl LinkValidator for FlagLinks {
    fn name(&self) -> &str {
        "flag-links"
    }

    async fn validate_links(&self, draft: &str) -> AgentResult<Vec<LinkVerdict>> {
        Ok(declared_links(draft)
            .into_iter()
            .map(|url| LinkVerdict {
                url,
                reachable: self.reachable,
                relevant: self.relevant,
            })
            .collect())
    }
}

// ============================================================================
// Stage event stream
// ============================================================================

#[tokio::test]
async fn test_stage_events_stream_in_order() {
    let (tx, mut rx) = update_channel(64);
    let agents = AgentSet::new(
        ScriptedAnswerer::always("See https://doc.rust-lang.org/book/ for the full treatment."),
        ScriptedChecker::approving(),
        FlagLinks::passing(),
    );
    let pipeline = QuestionPipeline::new(agents, PipelineSettings::default());

    let cell = CellRef::new(0, 0);
    let progress = StageProgress::new(cell, tx);
    let outcome = pipeline
        .run(&Question::new("Where is the borrowing chapter?"), Some(&progress))
        .await;
    assert!(outcome.success);

    let events = rx.collect_ready();
    let expected = vec![
        CellUpdate::StageStarted {
            cell,
            stage: PipelineStage::Answer,
            attempt: 1,
        },
        CellUpdate::StageFinished {
            cell,
            stage: PipelineStage::Answer,
            attempt: 1,
            status: StepStatus::Success,
        },
        CellUpdate::StageStarted {
            cell,
            stage: PipelineStage::Check,
            attempt: 1,
        },
        CellUpdate::StageFinished {
            cell,
            stage: PipelineStage::Check,
            attempt: 1,
            status: StepStatus::Success,
        },
        CellUpdate::StageStarted {
            cell,
            stage: PipelineStage::LinkCheck,
            attempt: 1,
        },
        CellUpdate::StageFinished {
            cell,
            stage: PipelineStage::LinkCheck,
            attempt: 1,
            status: StepStatus::Success,
        },
    ];
    assert_eq!(events, expected);
}

#[tokio::test]
async fn test_blocking_progress_delivers_every_stage_event() {
    // Capacity 1 forces the blocking handle to wait for the consumer
    // between events instead of dropping them.
    let (tx, mut rx) = update_channel(1);
    let monitor = tx.clone();
    let agents = AgentSet::new(
        ScriptedAnswerer::always("See https://doc.rust-lang.org/book/ for the full treatment."),
        ScriptedChecker::approving(),
        FlagLinks::passing(),
    );
    let pipeline = QuestionPipeline::new(agents, PipelineSettings::default());

    let consumer = tokio::spawn(async move {
        let mut events = Vec::new();
        while events.len() < 6 {
            match rx.recv().await {
                Some(event) => events.push(event),
                None => break,
            }
        }
        events
    });

    let cell = CellRef::new(0, 3);
    let progress = StageProgress::new(cell, tx).with_blocking(true);
    let outcome = pipeline
        .run(&Question::new("Where is the async chapter?"), Some(&progress))
        .await;
    assert!(outcome.success);

    let events = consumer.await.unwrap();
    assert_eq!(monitor.dropped_count(), 0);
    assert_eq!(events.len(), 6);
    assert!(events.iter().all(|e| !e.is_lifecycle()));
    assert!(events.iter().all(|e| e.cell() == cell));
}

// ============================================================================
// Feedback loop
// ============================================================================

#[tokio::test]
async fn test_feedback_drives_eventual_approval() {
    let answerer = ScriptedAnswerer::always("Lifetimes bound borrow validity.");
    let agents = AgentSet::new(
        answerer.clone(),
        ScriptedChecker::rejecting_first(2, "needs a concrete example"),
        FlagLinks::passing(),
    );
    let pipeline = QuestionPipeline::new(
        agents,
        PipelineSettings {
            max_retries: 5,
            ..Default::default()
        },
    );

    let outcome = pipeline
        .run(&Question::new("What do lifetimes do?"), None)
        .await;
    assert!(outcome.success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.answer.status, ValidationStatus::Approved);

    let requests = answerer.recorded_requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].feedback, None);
    assert_eq!(requests[1].feedback.as_deref(), Some("needs a concrete example"));
    assert_eq!(requests[2].feedback.as_deref(), Some("needs a concrete example"));
}

#[tokio::test]
async fn test_run_level_settings_flow_into_requests() {
    let answerer = ScriptedAnswerer::always("Send is about thread transfer.");
    let agents =
        AgentSet::new(answerer.clone(), ScriptedChecker::approving(), FlagLinks::passing());
    let pipeline = QuestionPipeline::new(
        agents,
        PipelineSettings {
            context: Some("Answers are for a Rust onboarding booklet.".to_string()),
            char_limit: Some(280),
            ..Default::default()
        },
    );

    let outcome = pipeline.run(&Question::new("What is Send?"), None).await;
    assert!(outcome.success);

    let request = &answerer.recorded_requests()[0];
    assert_eq!(
        request.context.as_deref(),
        Some("Answers are for a Rust onboarding booklet.")
    );
    assert_eq!(request.char_limit, Some(280));
}

// ============================================================================
// One budget across every restart cause
// ============================================================================

#[tokio::test]
async fn test_budget_spans_all_restart_causes() {
    // Attempt 1 dies in the answer stage, attempt 2 is rejected by the
    // checker, attempt 3 fails link validation. Three causes, one budget.
    let answerer = ScriptedAnswerer::new(vec![
        None,
        Some("Details at https://a.example/guide."),
        Some("Details at https://a.example/guide."),
    ]);
    let agents = AgentSet::new(
        answerer.clone(),
        ScriptedChecker::rejecting_first(1, "missing citation"),
        FlagLinks::unreachable(),
    );
    let pipeline = QuestionPipeline::new(
        agents,
        PipelineSettings {
            max_retries: 3,
            ..Default::default()
        },
    );

    let outcome = pipeline.run(&Question::new("Where are the docs?"), None).await;
    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(answerer.call_count(), 3);
    assert_eq!(outcome.answer.status, ValidationStatus::Rejected);
    assert_eq!(outcome.answer.links.len(), 1);
    assert_eq!(outcome.answer.links[0].reachable, Some(false));

    // Audit trail: 1 step for the failed answer, 2 for the rejected check
    // attempt, 3 for the attempt that reached link validation.
    let stages: Vec<(PipelineStage, u32)> =
        outcome.steps.iter().map(|s| (s.stage, s.attempt)).collect();
    assert_eq!(
        stages,
        vec![
            (PipelineStage::Answer, 1),
            (PipelineStage::Answer, 2),
            (PipelineStage::Check, 2),
            (PipelineStage::Answer, 3),
            (PipelineStage::Check, 3),
            (PipelineStage::LinkCheck, 3),
        ]
    );
    assert_eq!(outcome.steps[0].status, StepStatus::Failure);
    assert_eq!(outcome.steps[2].status, StepStatus::Failure);
    assert_eq!(outcome.steps[5].status, StepStatus::Failure);
}
