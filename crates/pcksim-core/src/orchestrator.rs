use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use pcksim_memory::SessionStore;
use pcksim_provider::GenerationOptions;
use pcksim_schema::{ConversationSession, Initiator, Message, PckVerdict, PersonaProfile, Scenario};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{OrchestratorError, PromptError};
use crate::grader::PckGrader;
use crate::history::History;
use crate::interpreter::{parse_student_response, ParsedResult};
use crate::logger::ConversationLogger;
use crate::prompt::{
    compile_student_prompt, first_turn_addendum, student_response_schema, GraderPromptContext,
    StudentPromptContext,
};
use crate::registry::Registry;
use crate::router::LlmRouter;

const JSON_MIME_TYPE: &str = "application/json";

/// Where the current turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingGraderResponse,
    AwaitingStudentResponse,
    Summarizing,
}

/// Result of one teacher submission.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed {
        verdict: Option<PckVerdict>,
        messages: Vec<Message>,
    },
    /// Cancelled mid-turn; history and turn log are as before the submission.
    Cancelled,
}

/// What `start()` did.
#[derive(Debug, Clone, PartialEq)]
pub enum Opening {
    /// Student-initiated scenario: the students spoke first.
    StudentsSpoke(Vec<Message>),
    /// Teacher-initiated scenario: the suggested opening, if the scenario has one.
    TeacherPrompt(Option<String>),
    AlreadyStarted,
    Cancelled,
}

struct Conversation {
    history: History,
    logger: ConversationLogger,
}

/// Resets the turn state to idle however the turn ends.
struct TurnGuard<'a> {
    state: &'a Mutex<TurnState>,
}

impl<'a> TurnGuard<'a> {
    /// Leave `Idle` and hand out the token for the new turn.
    ///
    /// The token is refreshed under the state lock, so a cancel either lands
    /// while idle (and is ignored) or hits this turn's token.
    fn begin(
        state: &'a Mutex<TurnState>,
        cancel: &Mutex<CancellationToken>,
        next: TurnState,
    ) -> Result<(Self, CancellationToken), OrchestratorError> {
        let mut current = lock(state);
        if *current != TurnState::Idle {
            return Err(OrchestratorError::Busy);
        }
        let token = {
            let mut token = lock(cancel);
            if token.is_cancelled() {
                *token = CancellationToken::new();
            }
            token.clone()
        };
        *current = next;
        Ok((Self { state }, token))
    }

    fn advance(&self, next: TurnState) {
        *lock(self.state) = next;
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        *lock(self.state) = TurnState::Idle;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `None` when the token fires first; the future is dropped.
async fn cancellable<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Runs one roleplay session: grader call, then student call, per teacher turn.
pub struct Orchestrator {
    config: Arc<SessionConfig>,
    registry: Arc<Registry>,
    router: Arc<LlmRouter>,
    grader: PckGrader,
    store: Option<Arc<dyn SessionStore>>,
    scenario: Scenario,
    personas: Vec<PersonaProfile>,
    state: Mutex<TurnState>,
    cancel: Mutex<CancellationToken>,
    conversation: tokio::sync::Mutex<Conversation>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<SessionConfig>,
        registry: Arc<Registry>,
        router: Arc<LlmRouter>,
        scenario: Scenario,
        personas: Vec<PersonaProfile>,
    ) -> Result<Self, PromptError> {
        if personas.is_empty() {
            return Err(PromptError::NoPersonas);
        }
        let grader = PckGrader::new(
            router.clone(),
            config.grader_model.clone(),
            config.summary_model.clone(),
        );
        let logger = ConversationLogger::new(&scenario, &personas);
        Ok(Self {
            config,
            registry,
            router,
            grader,
            store: None,
            scenario,
            personas,
            state: Mutex::new(TurnState::Idle),
            cancel: Mutex::new(CancellationToken::new()),
            conversation: tokio::sync::Mutex::new(Conversation {
                history: History::new(),
                logger,
            }),
        })
    }

    /// Persist the session after every turn and at the end.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn personas(&self) -> &[PersonaProfile] {
        &self.personas
    }

    pub fn state(&self) -> TurnState {
        *lock(&self.state)
    }

    /// Token for the in-flight (or next) turn. Cancelling it while idle has no effect.
    pub fn cancellation_token(&self) -> CancellationToken {
        lock(&self.cancel).clone()
    }

    /// Cancel the in-flight turn. No-op while idle.
    pub fn cancel_turn(&self) {
        let state = lock(&self.state);
        if *state == TurnState::Idle {
            tracing::debug!("no turn in flight, cancel ignored");
            return;
        }
        lock(&self.cancel).cancel();
    }

    pub async fn session_id(&self) -> String {
        self.conversation.lock().await.logger.session_id().to_string()
    }

    pub async fn history(&self) -> Vec<Message> {
        self.conversation.lock().await.history.messages().to_vec()
    }

    pub async fn snapshot(&self) -> ConversationSession {
        self.conversation.lock().await.logger.snapshot()
    }

    pub async fn last_verdict(&self) -> Option<PckVerdict> {
        self.conversation
            .lock()
            .await
            .logger
            .turns()
            .iter()
            .rev()
            .find_map(|t| t.pck_feedback.clone())
    }

    /// Open the session.
    pub async fn start(&self) -> Result<Opening, OrchestratorError> {
        if !self.conversation.lock().await.history.is_empty() {
            return Ok(Opening::AlreadyStarted);
        }
        if self.scenario.initiated_by == Initiator::Teacher {
            return Ok(Opening::TeacherPrompt(self.scenario.initial_prompt.clone()));
        }

        let (guard, token) =
            TurnGuard::begin(&self.state, &self.cancel, TurnState::AwaitingStudentResponse)?;
        let session_id = self.session_id().await;
        let span = tracing::info_span!("opening", %session_id, trace_id = %Uuid::new_v4());
        let opening = self.run_opening(&token).instrument(span).await;
        drop(guard);
        opening
    }

    async fn run_opening(&self, token: &CancellationToken) -> Result<Opening, OrchestratorError> {
        tracing::info!(scenario = %self.scenario.id, "students open the lesson");
        let addendum = first_turn_addendum(&self.scenario, 0).unwrap_or_default();
        let empty = History::new();
        let student = self.student_call(&empty, &addendum, None, &[], false);
        let Some(parsed) = cancellable(token, student).await else {
            tracing::info!("opening turn cancelled");
            return Ok(Opening::Cancelled);
        };
        let parsed = parsed?;

        let snapshot = {
            let mut conv = self.conversation.lock().await;
            conv.history
                .append_batch(parsed.messages.clone(), self.config.pacing_delay())
                .await;
            conv.logger.snapshot()
        };
        self.persist(&snapshot).await;
        Ok(Opening::StudentsSpoke(parsed.messages))
    }

    /// One teacher turn: grade, then let the students answer.
    pub async fn submit_teacher_message(
        &self,
        text: &str,
        image: Option<Vec<u8>>,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OrchestratorError::EmptyTeacherMessage);
        }
        let (guard, token) =
            TurnGuard::begin(&self.state, &self.cancel, TurnState::AwaitingGraderResponse)?;

        let (rollback_len, history, turn, session_id) = {
            let mut conv = self.conversation.lock().await;
            if conv.logger.is_ended() {
                return Err(OrchestratorError::SessionEnded);
            }
            let rollback_len = conv.history.len();
            let mut message = Message::teacher(text);
            if let Some(png) = image {
                message = message.with_image(png);
            }
            conv.history.append(message);
            (
                rollback_len,
                conv.history.clone(),
                conv.logger.turns().len() + 1,
                conv.logger.session_id().to_string(),
            )
        };

        let span = tracing::info_span!(
            "turn",
            %session_id,
            turn,
            trace_id = %Uuid::new_v4()
        );

        self.run_turn(&guard, &token, text, history, rollback_len)
            .instrument(span)
            .await
    }

    async fn run_turn(
        &self,
        guard: &TurnGuard<'_>,
        token: &CancellationToken,
        text: &str,
        history: History,
        rollback_len: usize,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let (window, addressed_before) = {
            let conv = self.conversation.lock().await;
            (
                conv.logger.recent_verdicts(self.config.feedback_window),
                conv.logger.misconception_addressed(),
            )
        };

        let skills = self.registry.resolve_skills(&self.scenario.target_pck_skills);
        let grader_ctx = GraderPromptContext::new(text, &history.messages()[..rollback_len])
            .with_scenario(&self.scenario, skills)
            .with_verdict_window(&window);

        let Some(graded) = cancellable(token, self.grader.analyze(&grader_ctx)).await else {
            return Ok(self.rollback(rollback_len).await);
        };
        let verdict = match graded {
            Ok(verdict) => verdict,
            Err(e) => {
                self.conversation.lock().await.history.truncate(rollback_len);
                return Err(e.into());
            }
        };

        guard.advance(TurnState::AwaitingStudentResponse);
        let addendum = first_turn_addendum(&self.scenario, history.len()).unwrap_or_default();
        let student = self.student_call(&history, &addendum, verdict.as_ref(), &window, addressed_before);
        let Some(parsed) = cancellable(token, student).await else {
            return Ok(self.rollback(rollback_len).await);
        };
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                self.conversation.lock().await.history.truncate(rollback_len);
                return Err(e.into());
            }
        };
        let verdict = verdict.or(parsed.verdict);

        let snapshot = {
            let mut conv = self.conversation.lock().await;
            conv.history
                .append_batch(parsed.messages.clone(), self.config.pacing_delay())
                .await;
            conv.logger.add_turn(text, &parsed.messages, verdict.clone());
            conv.logger.snapshot()
        };
        self.persist(&snapshot).await;
        tracing::info!(
            students = parsed.messages.len(),
            graded = verdict.is_some(),
            "turn completed"
        );

        Ok(TurnOutcome::Completed {
            verdict,
            messages: parsed.messages,
        })
    }

    async fn rollback(&self, len: usize) -> TurnOutcome {
        self.conversation.lock().await.history.truncate(len);
        tracing::info!("turn cancelled, teacher message withdrawn");
        TurnOutcome::Cancelled
    }

    /// Student-response call. Transport failures become an empty batch.
    async fn student_call(
        &self,
        history: &History,
        addendum: &str,
        verdict: Option<&PckVerdict>,
        prior_verdicts: &[PckVerdict],
        misconception_addressed: bool,
    ) -> Result<ParsedResult, PromptError> {
        let ctx = StudentPromptContext::new(&self.personas, &self.scenario, addendum, verdict)
            .with_target_skills(self.registry.resolve_skills(&self.scenario.target_pck_skills))
            .with_prior_verdicts(prior_verdicts)
            .with_misconception_addressed(misconception_addressed);
        let prompt = compile_student_prompt(&ctx)?;
        let call = &self.config.student_model;
        let options = GenerationOptions {
            response_mime_type: Some(JSON_MIME_TYPE.to_string()),
            response_schema: Some(student_response_schema()),
            ..call.generation_options()
        };

        let messages = history.to_model_format(Some(&prompt));
        match self.router.complete(call, None, messages, options).await {
            Ok(response) => {
                tracing::debug!(
                    "raw student output: {}",
                    response.text.chars().take(200).collect::<String>()
                );
                Ok(parse_student_response(&response.text, &self.personas))
            }
            Err(e) => {
                tracing::warn!("student call failed, no responses this turn: {e:#}");
                Ok(ParsedResult::default())
            }
        }
    }

    /// Remove the most recent history entry. The turn log is not rewritten.
    pub async fn undo_last(&self) -> Result<Option<Message>, OrchestratorError> {
        if self.state() != TurnState::Idle {
            return Err(OrchestratorError::Busy);
        }
        let removed = self.conversation.lock().await.history.undo_last();
        if let Some(message) = &removed {
            tracing::info!(speaker = message.speaker_id(), "last message undone");
        }
        Ok(removed)
    }

    /// Stamp the end time and persist. Calling it again returns the stored session.
    pub async fn end_session(&self) -> Result<ConversationSession> {
        if self.state() != TurnState::Idle {
            return Err(OrchestratorError::Busy.into());
        }
        let snapshot = {
            let mut conv = self.conversation.lock().await;
            conv.logger.end_session();
            conv.logger.snapshot()
        };
        if let Some(store) = &self.store {
            store.save_session(&snapshot).await?;
        }
        Ok(snapshot)
    }

    /// End the session if needed and attach a one-time summary.
    ///
    /// The session stays open when the summary call fails.
    pub async fn request_session_summary(&self) -> Result<String> {
        let (guard, _token) =
            TurnGuard::begin(&self.state, &self.cancel, TurnState::Summarizing)?;
        let mut ended = {
            let mut conv = self.conversation.lock().await;
            if conv.logger.turns().is_empty() {
                return Err(OrchestratorError::NothingToSummarize.into());
            }
            if conv.logger.session().summary_feedback.is_some() {
                return Err(OrchestratorError::SummaryAlreadyAttached(
                    conv.logger.session_id().to_string(),
                )
                .into());
            }
            let mut ended = conv.logger.clone();
            ended.end_session();
            ended
        };

        let summary = self
            .grader
            .summarize(ended.session(), &self.registry)
            .await?;

        ended.attach_summary(summary.clone())?;
        let snapshot = ended.snapshot();
        self.conversation.lock().await.logger = ended;
        if let Some(store) = &self.store {
            store.save_session(&snapshot).await?;
        }
        drop(guard);
        Ok(summary)
    }

    async fn persist(&self, session: &ConversationSession) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save_session(session).await {
            tracing::warn!(session_id = %session.session_id, "failed to persist session: {e:#}");
        }
    }
}
