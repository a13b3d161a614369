//! The interview workflow: each UI action drives one generation request and hands
//! the result (or a plain-language failure message) to the reveal registry.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::session::{FailureTag, InterviewSession, Pane, SessionStore, SessionView};
use crate::llm_client::{prompts, ApiError, ApiErrorKind, TextGenerator};
use crate::reveal::{OnComplete, RevealRegistry};

pub const QUESTION_PLACEHOLDER: &str = "Generating new question...";
pub const EMPTY_ANSWER: &str = "Please provide an answer before submitting.";
pub const NO_QUESTION: &str = "There is no question to answer yet.";

pub const QUESTION_BUSY: &str = "The AI model is currently busy. Please try again in a moment.";
pub const QUESTION_FAILED: &str = "Sorry, an error occurred. Please try again.";
pub const FEEDBACK_BUSY: &str = "The AI model is busy. Please try again in a moment.";
pub const FEEDBACK_FAILED: &str = "Sorry, there was an issue getting feedback. Please try again.";
pub const DETAILED_FEEDBACK_FAILED: &str = "Sorry, there was an issue getting detailed feedback.";

/// Strips the markdown emphasis characters the model sometimes adds despite the prompt.
pub fn sanitize_question(raw: &str) -> String {
    raw.trim().chars().filter(|c| !matches!(c, '*' | '_')).collect()
}

fn failure_message(tag: FailureTag, busy: &'static str, failed: &'static str) -> &'static str {
    match tag {
        FailureTag::Capacity => busy,
        FailureTag::Failed => failed,
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Interview {id} not found"))
}

#[derive(Clone)]
pub struct InterviewWorkflow {
    generator: Arc<dyn TextGenerator>,
    reveals: RevealRegistry,
    sessions: SessionStore,
}

impl InterviewWorkflow {
    pub fn new(generator: Arc<dyn TextGenerator>, reveals: RevealRegistry) -> Self {
        Self {
            generator,
            reveals,
            sessions: SessionStore::default(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn view(&self, id: Uuid) -> Result<SessionView, AppError> {
        self.sessions.view(id).ok_or_else(|| not_found(id))
    }

    async fn reveal(
        &self,
        session: &InterviewSession,
        pane: Pane,
        text: &str,
        on_complete: Option<OnComplete>,
    ) {
        self.reveals
            .reveal(
                session.surface_id(pane),
                session.surface(pane),
                text,
                on_complete,
            )
            .await;
    }

    fn record_failure(&self, id: Uuid, err: &ApiError) -> FailureTag {
        let tag = FailureTag::from(err);
        self.sessions.update(id, |s| s.last_failure = Some(tag));
        tag
    }

    /// Start: a new session that immediately asks its first question.
    pub async fn start(&self) -> Result<SessionView, AppError> {
        let id = self.sessions.create();
        info!("Interview {id} started");
        self.next_question(id).await
    }

    /// Next and skip: discard the current exchange and ask a new question.
    pub async fn next_question(&self, id: Uuid) -> Result<SessionView, AppError> {
        let session = self
            .sessions
            .update(id, |s| {
                s.answer.clear();
                s.last_failure = None;
                s.controls.loading = true;
                s.controls.next_enabled = false;
                s.controls.skip_enabled = false;
                s.controls.submit_enabled = false;
                s.controls.detailed_feedback_visible = false;
                s.clone()
            })
            .ok_or_else(|| not_found(id))?;

        self.reveals
            .clear(
                session.surface_id(Pane::Feedback),
                session.surface(Pane::Feedback),
            )
            .await;
        self.reveal(&session, Pane::Question, QUESTION_PLACEHOLDER, None)
            .await;

        let outcome = self
            .generator
            .send(&prompts::question_prompt())
            .await
            .and_then(|raw| match sanitize_question(&raw) {
                question if question.is_empty() => Err(ApiError::new(
                    ApiErrorKind::InvalidResponse,
                    "Question was empty once markup was removed",
                )),
                question => Ok(question),
            });

        match outcome {
            Ok(question) => {
                self.sessions.update(id, |s| {
                    s.current_question = Some(question.clone());
                    s.controls.submit_enabled = true;
                });
                self.reveal(&session, Pane::Question, &question, None).await;
            }
            Err(err) => {
                warn!("Interview {id}: question generation failed: {err}");
                let tag = self.record_failure(id, &err);
                let message = failure_message(tag, QUESTION_BUSY, QUESTION_FAILED);
                self.reveal(&session, Pane::Question, message, None).await;
            }
        }

        self.sessions.update(id, |s| {
            s.controls.loading = false;
            s.controls.next_enabled = true;
            s.controls.skip_enabled = true;
        });
        self.view(id)
    }

    /// Input event on the answer box.
    pub fn update_answer(&self, id: Uuid, answer: String) -> Result<SessionView, AppError> {
        self.sessions
            .update(id, |s| {
                s.controls.submit_enabled =
                    !answer.trim().is_empty() && s.current_question.is_some();
                s.answer = answer;
                s.view()
            })
            .ok_or_else(|| not_found(id))
    }

    /// Brief feedback. The detailed-feedback control appears only once the feedback
    /// has been fully revealed.
    pub async fn submit_answer(&self, id: Uuid, answer: String) -> Result<SessionView, AppError> {
        if answer.trim().is_empty() {
            return Err(AppError::Validation(EMPTY_ANSWER.to_string()));
        }

        let (session, question) = self
            .sessions
            .update(id, |s| -> Result<(InterviewSession, String), AppError> {
                let question = s
                    .current_question
                    .clone()
                    .ok_or_else(|| AppError::Validation(NO_QUESTION.to_string()))?;
                s.answer = answer.clone();
                s.last_failure = None;
                s.controls.loading = true;
                s.controls.submit_enabled = false;
                s.controls.skip_enabled = false;
                s.controls.next_enabled = false;
                s.controls.detailed_feedback_visible = false;
                Ok((s.clone(), question))
            })
            .ok_or_else(|| not_found(id))??;

        let prompt = prompts::brief_feedback_prompt(&question, &answer)
            .map_err(|e| AppError::Internal(e.into()))?;

        match self.generator.send(&prompt).await {
            Ok(feedback) => {
                let sessions = self.sessions.clone();
                let on_complete: OnComplete = Box::new(move || {
                    sessions.update(id, |s| {
                        s.controls.detailed_feedback_visible = true;
                        s.controls.detailed_feedback_enabled = true;
                        s.controls.loading = false;
                        s.controls.next_enabled = true;
                        s.controls.skip_enabled = true;
                        s.controls.submit_enabled = true;
                    });
                });
                self.reveal(&session, Pane::Feedback, &feedback, Some(on_complete))
                    .await;
            }
            Err(err) => {
                warn!("Interview {id}: feedback generation failed: {err}");
                let tag = self.record_failure(id, &err);
                let message = failure_message(tag, FEEDBACK_BUSY, FEEDBACK_FAILED);
                self.reveal(&session, Pane::Feedback, message, None).await;
                self.sessions.update(id, |s| {
                    s.controls.loading = false;
                    s.controls.next_enabled = true;
                    s.controls.skip_enabled = true;
                    s.controls.submit_enabled = true;
                });
            }
        }

        self.view(id)
    }

    /// STAR-method breakdown of the stored answer.
    pub async fn detailed_feedback(&self, id: Uuid) -> Result<SessionView, AppError> {
        let (session, question, answer) = self
            .sessions
            .update(id, |s| -> Result<(InterviewSession, String, String), AppError> {
                if s.answer.trim().is_empty() {
                    return Err(AppError::Validation(EMPTY_ANSWER.to_string()));
                }
                let question = s
                    .current_question
                    .clone()
                    .ok_or_else(|| AppError::Validation(NO_QUESTION.to_string()))?;
                s.last_failure = None;
                s.controls.loading = true;
                s.controls.detailed_feedback_enabled = false;
                s.controls.detailed_feedback_visible = false;
                Ok((s.clone(), question, s.answer.clone()))
            })
            .ok_or_else(|| not_found(id))??;

        let prompt = prompts::detailed_feedback_prompt(&question, &answer)
            .map_err(|e| AppError::Internal(e.into()))?;

        match self.generator.send(&prompt).await {
            Ok(feedback) => {
                self.reveal(&session, Pane::Feedback, &feedback, None).await;
            }
            Err(err) => {
                warn!("Interview {id}: detailed feedback generation failed: {err}");
                let tag = self.record_failure(id, &err);
                let message = failure_message(tag, FEEDBACK_BUSY, DETAILED_FEEDBACK_FAILED);
                self.reveal(&session, Pane::Feedback, message, None).await;
            }
        }

        self.sessions.update(id, |s| {
            s.controls.loading = false;
            s.controls.detailed_feedback_enabled = true;
        });
        self.view(id)
    }

    async fn forget_surfaces(&self, session: &InterviewSession) {
        for pane in [Pane::Question, Pane::Feedback] {
            self.reveals.forget(&session.surface_id(pane)).await;
        }
    }

    /// End: drops the session and cancels any reveal still running on its surfaces.
    pub async fn end(&self, id: Uuid) -> Result<(), AppError> {
        let session = self.sessions.remove(id).ok_or_else(|| not_found(id))?;
        self.forget_surfaces(&session).await;
        info!("Interview {id} ended");
        Ok(())
    }

    /// Drops every session idle for longer than `ttl`. Returns how many were evicted.
    pub async fn evict_idle(&self, ttl: chrono::Duration) -> usize {
        let evicted = self.sessions.remove_idle(Utc::now() - ttl);
        for session in &evicted {
            self.forget_surfaces(session).await;
        }
        if !evicted.is_empty() {
            info!(
                "Evicted {} idle interviews ({} remain, {} reveal slots)",
                evicted.len(),
                self.sessions.count(),
                self.reveals.slot_count().await
            );
        }
        evicted.len()
    }
}

/// Periodically evicts idle interviews until the runtime shuts down.
pub fn spawn_idle_sweep(
    workflow: InterviewWorkflow,
    ttl: chrono::Duration,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            workflow.evict_idle(ttl).await;
        }
    })
}
