use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::clock::SessionClock;
use super::countdown::{Countdown, CountdownTick};
use super::remote_stop::RemoteStopPoller;
use crate::core::config::SessionSettings;
use crate::db::models::{AnswerSet, Attempt, Candidate, ExamDefinition};
use crate::db::types::{SessionPhase, SubmitReason};
use crate::services::exam_store::{ExamStore, StoreError};
use crate::services::scoring::{score_answers, ScoreSummary};
use crate::services::violation_monitor::{FocusEvent, ViolationMonitor};

const COMMAND_BUFFER: usize = 32;
const PERSIST_FAILED_MESSAGE: &str = "Failed to save your exam attempt. Please try again.";
/// Automatic saves attempted after a failed save once time has run out.
const EXPIRED_SAVE_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionTimings {
    pub(crate) tick: Duration,
    pub(crate) poll_interval: Duration,
}

impl From<&SessionSettings> for SessionTimings {
    fn from(settings: &SessionSettings) -> Self {
        Self { tick: settings.tick(), poll_interval: settings.poll_interval() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum SessionError {
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(String),
    #[error("option {option_index} is out of range for question {question_id}")]
    InvalidOption { question_id: String, option_index: usize },
    #[error("time expired")]
    TimeExpired,
    #[error("submission in progress")]
    Submitting,
    #[error("session already finished")]
    Finished,
    #[error("session is closed")]
    Closed,
}

/// Outcome of a call to the single submit entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitDisposition {
    /// This call won the race; persistence is under way.
    Won,
    AlreadySubmitting,
    AlreadyFinished,
    /// The session was torn down without submitting.
    Closed,
}

impl SubmitDisposition {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Won => "accepted",
            Self::AlreadySubmitting => "already-submitting",
            Self::AlreadyFinished => "already-finished",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SessionResult {
    pub(crate) attempt_id: String,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: u32,
    pub(crate) reason: SubmitReason,
    pub(crate) ended_at: OffsetDateTime,
}

/// Read-only snapshot published after every state change.
#[derive(Debug, Clone)]
pub(crate) struct SessionView {
    pub(crate) session_id: String,
    pub(crate) exam_id: String,
    pub(crate) phase: SessionPhase,
    pub(crate) started_at: OffsetDateTime,
    pub(crate) remaining_seconds: u64,
    pub(crate) violations: u32,
    pub(crate) answers: AnswerSet,
    pub(crate) total_questions: usize,
    pub(crate) expired: bool,
    pub(crate) torn_down: bool,
    pub(crate) last_error: Option<String>,
    pub(crate) result: Option<SessionResult>,
    pub(crate) closed_at: Option<Instant>,
}

impl SessionView {
    pub(crate) fn answered(&self) -> usize {
        self.answers.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SubmitPreview {
    pub(crate) unanswered: usize,
    pub(crate) message: String,
}

pub(super) enum SessionCommand {
    SelectAnswer {
        question_id: String,
        option_index: usize,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Focus(FocusEvent),
    Submit {
        reply: oneshot::Sender<SubmitDisposition>,
    },
}

/// Client side of a running session. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub(crate) struct SessionHandle {
    id: String,
    exam_id: String,
    candidate_id: String,
    pub(super) commands: mpsc::Sender<SessionCommand>,
    teardown: watch::Sender<bool>,
    view: watch::Receiver<SessionView>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    /// Starts the countdown, the remote-stop poller and the violation monitor.
    pub(crate) fn spawn(
        id: String,
        exam: ExamDefinition,
        candidate: Candidate,
        store: Arc<dyn ExamStore>,
        timings: SessionTimings,
    ) -> Self {
        let (handle, actor) = Self::build(id, exam, candidate, store, timings);
        let task = tokio::spawn(actor);
        handle.attach(task);
        handle
    }

    /// Builds the handle and the actor future without spawning the actor.
    pub(super) fn build(
        id: String,
        exam: ExamDefinition,
        candidate: Candidate,
        store: Arc<dyn ExamStore>,
        timings: SessionTimings,
    ) -> (Self, impl Future<Output = ()> + Send + 'static) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (teardown_tx, teardown_rx) = watch::channel(false);
        let (remote_tx, remote_rx) = mpsc::channel(1);

        let poller = RemoteStopPoller::spawn(
            store.clone(),
            id.clone(),
            exam.id.clone(),
            timings.poll_interval,
            remote_tx,
        );

        let clock = SessionClock::start();
        let countdown = Countdown::start(exam.duration_minutes, timings.tick);
        let exam_id = exam.id.clone();
        let candidate_id = candidate.id.clone();

        let mut actor = SessionActor {
            id: id.clone(),
            exam,
            candidate,
            store,
            clock,
            answers: AnswerSet::new(),
            monitor: ViolationMonitor::attach(),
            phase: SessionPhase::Running,
            countdown,
            retry_base: timings.poll_interval,
            expired_retries: 0,
            retry_at: None,
            abandoned: false,
            poller: Some(poller),
            pending: None,
            result: None,
            last_error: None,
            torn_down: false,
            closed_at: None,
            view: None,
        };
        let (view_tx, view_rx) = watch::channel(actor.snapshot());
        actor.view = Some(view_tx);

        metrics::counter!("exam_sessions_started_total").increment(1);

        let handle = Self {
            id,
            exam_id,
            candidate_id,
            commands: commands_tx,
            teardown: teardown_tx,
            view: view_rx,
            task: Mutex::new(None),
        };

        (handle, actor.run(commands_rx, teardown_rx, remote_rx))
    }

    pub(super) fn attach(&self, task: JoinHandle<()>) {
        match self.task.lock() {
            Ok(mut slot) => *slot = Some(task),
            Err(poisoned) => *poisoned.into_inner() = Some(task),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn exam_id(&self) -> &str {
        &self.exam_id
    }

    pub(crate) fn candidate_id(&self) -> &str {
        &self.candidate_id
    }

    pub(crate) fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// True once the actor has exited and released every trigger source.
    pub(crate) fn is_closed(&self) -> bool {
        self.view.borrow().closed_at.is_some()
    }

    pub(crate) async fn select_answer(
        &self,
        question_id: String,
        option_index: usize,
    ) -> Result<SessionView, SessionError> {
        let (reply, response) = oneshot::channel();
        let command = SessionCommand::SelectAnswer { question_id, option_index, reply };
        if self.commands.send(command).await.is_err() {
            tracing::debug!(session_id = %self.id, "Answer ignored; session closed");
            return Err(self.closed_error());
        }

        match response.await {
            Ok(Ok(())) => Ok(self.view()),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(self.closed_error()),
        }
    }

    pub(crate) async fn record_focus(&self, event: FocusEvent) {
        if self.commands.send(SessionCommand::Focus(event)).await.is_err() {
            tracing::debug!(session_id = %self.id, ?event, "Focus event ignored; session closed");
        }
    }

    /// Manual submission. Resolves as soon as the race is decided; use [`Self::settled`]
    /// to wait for the persistence outcome.
    pub(crate) async fn submit(&self) -> SubmitDisposition {
        let (reply, response) = oneshot::channel();
        if self.commands.send(SessionCommand::Submit { reply }).await.is_err() {
            tracing::debug!(session_id = %self.id, "Submit ignored; session closed");
            return self.closed_disposition();
        }

        response.await.unwrap_or_else(|_| self.closed_disposition())
    }

    /// Waits until no submission is in flight and returns the resulting view.
    pub(crate) async fn settled(&self) -> SessionView {
        let mut view = self.view.clone();
        let outcome = view
            .wait_for(|current| current.phase != SessionPhase::Submitting)
            .await
            .map(|current| current.clone());
        outcome.unwrap_or_else(|_| view.borrow().clone())
    }

    pub(crate) fn submit_preview(&self) -> SubmitPreview {
        let view = self.view.borrow();
        let unanswered = view.total_questions.saturating_sub(view.answered());
        let message = if unanswered > 0 {
            format!(
                "WARNING: You have {unanswered} unanswered question(s).\n\nAre you sure you want \
                 to submit and end the exam? You will not be able to return to this screen."
            )
        } else {
            "You have answered all questions. Submit and finish the exam now?".to_string()
        };

        SubmitPreview { unanswered, message }
    }

    /// Cancels every trigger source and waits for the actor to exit. Does not submit;
    /// an in-flight submission is allowed to finish first.
    pub(crate) async fn teardown(&self) {
        self.teardown.send_replace(true);

        let task = match self.task.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            if let Err(err) = task.await {
                tracing::error!(session_id = %self.id, error = %err, "Session task join failed");
            }
        }
    }

    fn closed_error(&self) -> SessionError {
        if self.view.borrow().phase == SessionPhase::Finished {
            SessionError::Finished
        } else {
            SessionError::Closed
        }
    }

    fn closed_disposition(&self) -> SubmitDisposition {
        if self.view.borrow().phase == SessionPhase::Finished {
            SubmitDisposition::AlreadyFinished
        } else {
            SubmitDisposition::Closed
        }
    }
}

struct PendingSubmit {
    reason: SubmitReason,
    attempt_id: String,
    ended_at: OffsetDateTime,
    summary: ScoreSummary,
    outcome: oneshot::Receiver<Result<(), StoreError>>,
}

/// Sole owner and writer of one session's state.
struct SessionActor {
    id: String,
    exam: ExamDefinition,
    candidate: Candidate,
    store: Arc<dyn ExamStore>,
    clock: SessionClock,
    answers: AnswerSet,
    monitor: ViolationMonitor,
    phase: SessionPhase,
    countdown: Countdown,
    retry_base: Duration,
    expired_retries: u32,
    retry_at: Option<Instant>,
    abandoned: bool,
    poller: Option<RemoteStopPoller>,
    pending: Option<PendingSubmit>,
    result: Option<SessionResult>,
    last_error: Option<String>,
    torn_down: bool,
    closed_at: Option<Instant>,
    view: Option<watch::Sender<SessionView>>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut teardown: watch::Receiver<bool>,
        mut remote: mpsc::Receiver<()>,
    ) {
        tracing::info!(
            session_id = %self.id,
            exam_id = %self.exam.id,
            candidate_id = %self.candidate.id,
            duration_minutes = self.exam.duration_minutes,
            "Exam session started"
        );

        let mut commands_open = true;
        loop {
            // Branch order is the tie-break when several triggers are ready at once.
            tokio::select! {
                biased;
                outcome = persist_outcome(&mut self.pending) => self.on_persisted(outcome).await,
                _ = teardown_requested(&mut teardown), if !self.torn_down => self.on_teardown(),
                tick = self.countdown.tick(), if self.countdown.is_active() => self.on_tick(tick),
                _ = retry_due(self.retry_at), if self.retry_at.is_some() => {
                    self.retry_at = None;
                    tracing::info!(
                        session_id = %self.id,
                        retry = self.expired_retries,
                        "Retrying expired exam save"
                    );
                    self.submit(SubmitReason::TimeExpired);
                }
                Some(()) = remote.recv() => {
                    self.submit(SubmitReason::RemoteStop);
                }
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle(command),
                    None => {
                        commands_open = false;
                        self.on_teardown();
                    }
                },
            }

            if self.should_exit() {
                break;
            }
        }

        self.release_sources().await;
        self.closed_at = Some(Instant::now());
        self.publish();
        tracing::debug!(session_id = %self.id, phase = ?self.phase, "Exam session closed");
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SelectAnswer { question_id, option_index, reply } => {
                let outcome = self.select_answer(question_id, option_index);
                if outcome.is_ok() {
                    self.publish();
                }
                let _ = reply.send(outcome);
            }
            SessionCommand::Focus(event) => {
                // The attempt snapshot is taken when submitting starts.
                if self.monitor.observe(event, self.phase != SessionPhase::Running) {
                    metrics::counter!("exam_violations_total").increment(1);
                    tracing::debug!(
                        session_id = %self.id,
                        ?event,
                        violations = self.monitor.count(),
                        "Focus violation recorded"
                    );
                    self.publish();
                }
            }
            SessionCommand::Submit { reply } => {
                let disposition = self.submit(SubmitReason::Manual);
                let _ = reply.send(disposition);
            }
        }
    }

    fn select_answer(&mut self, question_id: String, option_index: usize) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Running => {}
            SessionPhase::Submitting => return Err(SessionError::Submitting),
            SessionPhase::Finished => return Err(SessionError::Finished),
        }
        if self.countdown.is_expired() {
            return Err(SessionError::TimeExpired);
        }

        let question = self
            .exam
            .question(&question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.clone()))?;
        if option_index >= question.options.len() {
            return Err(SessionError::InvalidOption { question_id, option_index });
        }

        self.answers.insert(question_id, option_index);
        Ok(())
    }

    fn on_tick(&mut self, tick: CountdownTick) {
        match tick {
            CountdownTick::Remaining(_) => self.publish(),
            CountdownTick::Expired => {
                tracing::info!(session_id = %self.id, exam_id = %self.exam.id, "Exam time expired");
                self.submit(SubmitReason::TimeExpired);
                self.publish();
            }
        }
    }

    /// Single submit entry point. The phase guard is set before persistence starts, so any
    /// trigger handled while the save is in flight observes `Submitting`.
    fn submit(&mut self, reason: SubmitReason) -> SubmitDisposition {
        match self.phase {
            SessionPhase::Running => {}
            SessionPhase::Submitting => {
                return self.ignore_submit(reason, SubmitDisposition::AlreadySubmitting);
            }
            SessionPhase::Finished => {
                return self.ignore_submit(reason, SubmitDisposition::AlreadyFinished);
            }
        }
        self.phase = SessionPhase::Submitting;
        self.retry_at = None;

        let ended_at = self.clock.now();
        let summary = score_answers(&self.exam.questions, &self.answers);
        let attempt = Attempt {
            id: self.id.clone(),
            exam_id: self.exam.id.clone(),
            student_id: self.candidate.id.clone(),
            student_name: self.candidate.name.clone(),
            roll_no: self.candidate.roll_no.clone(),
            started_at: self.clock.started_at(),
            ended_at,
            answers: self.answers.clone(),
            score: summary.score,
            max_score: summary.max_score,
            tab_switch_count: self.monitor.count(),
            submit_reason: reason,
        };

        tracing::info!(
            session_id = %self.id,
            exam_id = %self.exam.id,
            reason = reason.as_str(),
            "Submitting exam attempt"
        );

        let store = self.store.clone();
        let (tx, outcome) = oneshot::channel();
        tokio::spawn(async move {
            let _ = tx.send(store.save_attempt(&attempt).await);
        });

        self.pending =
            Some(PendingSubmit { reason, attempt_id: self.id.clone(), ended_at, summary, outcome });
        self.last_error = None;
        self.publish();

        SubmitDisposition::Won
    }

    fn ignore_submit(
        &self,
        reason: SubmitReason,
        disposition: SubmitDisposition,
    ) -> SubmitDisposition {
        metrics::counter!("exam_submit_ignored_total", "reason" => reason.as_str()).increment(1);
        tracing::debug!(
            session_id = %self.id,
            reason = reason.as_str(),
            phase = ?self.phase,
            "Submit trigger ignored"
        );
        disposition
    }

    async fn on_persisted(&mut self, outcome: Result<(), String>) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        match outcome {
            Ok(()) => {
                self.phase = SessionPhase::Finished;
                self.result = Some(SessionResult {
                    attempt_id: pending.attempt_id,
                    score: pending.summary.score,
                    max_score: pending.summary.max_score,
                    percentage: pending.summary.display_percentage(),
                    reason: pending.reason,
                    ended_at: pending.ended_at,
                });
                metrics::counter!("exam_submissions_total", "reason" => pending.reason.as_str())
                    .increment(1);
                tracing::info!(
                    session_id = %self.id,
                    exam_id = %self.exam.id,
                    reason = pending.reason.as_str(),
                    score = pending.summary.score,
                    max_score = pending.summary.max_score,
                    violations = self.monitor.count(),
                    "Exam attempt submitted"
                );
                self.release_sources().await;
            }
            Err(error) => {
                self.phase = SessionPhase::Running;
                self.last_error = Some(PERSIST_FAILED_MESSAGE.to_string());
                metrics::counter!("exam_submission_failures_total").increment(1);
                tracing::warn!(
                    session_id = %self.id,
                    exam_id = %self.exam.id,
                    reason = pending.reason.as_str(),
                    error = %error,
                    "Failed to persist exam attempt"
                );
                if self.countdown.is_expired() {
                    self.schedule_expired_retry();
                }
            }
        }

        self.publish();
    }

    /// Delays double from the poll interval. After the last retry fails the session
    /// closes without an attempt.
    fn schedule_expired_retry(&mut self) {
        if self.expired_retries >= EXPIRED_SAVE_RETRIES {
            self.abandoned = true;
            tracing::error!(
                session_id = %self.id,
                exam_id = %self.exam.id,
                candidate_id = %self.candidate.id,
                retries = self.expired_retries,
                "Giving up on saving expired exam attempt; closing session unsaved"
            );
            return;
        }

        let delay = self.retry_base.saturating_mul(1 << self.expired_retries);
        self.expired_retries += 1;
        self.retry_at = Some(Instant::now() + delay);
    }

    fn on_teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        tracing::info!(session_id = %self.id, phase = ?self.phase, "Exam session torn down");
    }

    fn should_exit(&self) -> bool {
        match self.phase {
            SessionPhase::Finished => true,
            SessionPhase::Running => self.torn_down || self.abandoned,
            SessionPhase::Submitting => false,
        }
    }

    async fn release_sources(&mut self) {
        self.countdown.cancel();
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }
        self.monitor.detach();
    }

    fn snapshot(&self) -> SessionView {
        SessionView {
            session_id: self.id.clone(),
            exam_id: self.exam.id.clone(),
            phase: self.phase,
            started_at: self.clock.started_at(),
            remaining_seconds: self.countdown.remaining_seconds(),
            violations: self.monitor.count(),
            answers: self.answers.clone(),
            total_questions: self.exam.questions.len(),
            expired: self.countdown.is_expired(),
            torn_down: self.torn_down,
            last_error: self.last_error.clone(),
            result: self.result.clone(),
            closed_at: self.closed_at,
        }
    }

    fn publish(&self) {
        if let Some(view) = &self.view {
            view.send_replace(self.snapshot());
        }
    }
}

async fn teardown_requested(teardown: &mut watch::Receiver<bool>) {
    // A dropped handle counts as a teardown request.
    let _ = teardown.wait_for(|requested| *requested).await;
}

async fn retry_due(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn persist_outcome(pending: &mut Option<PendingSubmit>) -> Result<(), String> {
    let Some(pending) = pending.as_mut() else {
        return std::future::pending().await;
    };

    match (&mut pending.outcome).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => Err("attempt persistence task ended without a result".to_string()),
    }
}
