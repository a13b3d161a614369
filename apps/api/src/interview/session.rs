use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm_client::ApiError;
use crate::reveal::{ChannelSurface, RevealFrame, SurfaceId};

/// The two output surfaces of an interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pane {
    Question,
    Feedback,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Question => "question",
            Pane::Feedback => "feedback",
        }
    }
}

/// UI control flags, mirrored to the browser on every response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub loading: bool,
    pub next_enabled: bool,
    pub skip_enabled: bool,
    pub submit_enabled: bool,
    pub detailed_feedback_visible: bool,
    pub detailed_feedback_enabled: bool,
}

/// Presentation tag for a failed generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureTag {
    /// The model is overloaded or rate limiting.
    Capacity,
    Failed,
}

impl From<&ApiError> for FailureTag {
    fn from(err: &ApiError) -> Self {
        if err.is_capacity() {
            FailureTag::Capacity
        } else {
            FailureTag::Failed
        }
    }
}

#[derive(Debug, Clone)]
pub struct InterviewSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub current_question: Option<String>,
    pub answer: String,
    pub controls: Controls,
    pub last_failure: Option<FailureTag>,
    question: Arc<ChannelSurface>,
    feedback: Arc<ChannelSurface>,
}

impl InterviewSession {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_active: now,
            current_question: None,
            answer: String::new(),
            controls: Controls::default(),
            last_failure: None,
            question: Arc::new(ChannelSurface::new()),
            feedback: Arc::new(ChannelSurface::new()),
        }
    }

    pub fn surface(&self, pane: Pane) -> Arc<ChannelSurface> {
        match pane {
            Pane::Question => self.question.clone(),
            Pane::Feedback => self.feedback.clone(),
        }
    }

    pub fn surface_id(&self, pane: Pane) -> SurfaceId {
        SurfaceId::new(format!("{}/{}", self.id, pane.as_str()))
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            created_at: self.created_at,
            current_question: self.current_question.clone(),
            answer: self.answer.clone(),
            controls: self.controls.clone(),
            last_failure: self.last_failure,
            question: self.question.snapshot(),
            feedback: self.feedback.snapshot(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub current_question: Option<String>,
    pub answer: String,
    pub controls: Controls,
    pub last_failure: Option<FailureTag>,
    pub question: RevealFrame,
    pub feedback: RevealFrame,
}

/// In-memory interview sessions. Guards are never held across an await.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, InterviewSession>>>,
}

impl SessionStore {
    pub fn create(&self) -> Uuid {
        let session = InterviewSession::new();
        let id = session.id;
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, session);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<InterviewSession> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Applies `f` to the session and marks it active.
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut InterviewSession) -> R) -> Option<R> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&id)
            .map(|session| {
                session.last_active = Utc::now();
                f(session)
            })
    }

    pub fn remove(&self, id: Uuid) -> Option<InterviewSession> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    /// Removes and returns every session with no activity since `cutoff`.
    pub fn remove_idle(&self, cutoff: DateTime<Utc>) -> Vec<InterviewSession> {
        let mut sessions = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let idle: Vec<Uuid> = sessions
            .values()
            .filter(|s| s.last_active < cutoff)
            .map(|s| s.id)
            .collect();
        idle.iter().filter_map(|id| sessions.remove(id)).collect()
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, id: Uuid, last_active: DateTime<Utc>) {
        if let Some(session) = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&id)
        {
            session.last_active = last_active;
        }
    }

    pub fn count(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn view(&self, id: Uuid) -> Option<SessionView> {
        self.get(id).map(|s| s.view())
    }

    pub fn surface(&self, id: Uuid, pane: Pane) -> Option<Arc<ChannelSurface>> {
        self.get(id).map(|s| s.surface(pane))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::ApiErrorKind;

    #[test]
    fn test_failure_tag_from_error_kind() {
        let busy = ApiError::new(ApiErrorKind::Transient { status: Some(429) }, "busy");
        let offline = ApiError::new(ApiErrorKind::Transient { status: None }, "offline");
        let invalid = ApiError::new(ApiErrorKind::InvalidResponse, "bad");
        assert_eq!(FailureTag::from(&busy), FailureTag::Capacity);
        assert_eq!(FailureTag::from(&offline), FailureTag::Failed);
        assert_eq!(FailureTag::from(&invalid), FailureTag::Failed);
    }

    #[test]
    fn test_store_update_and_view() {
        let store = SessionStore::default();
        let id = store.create();

        let updated = store.update(id, |s| {
            s.answer = "draft".to_string();
            s.controls.next_enabled = true;
        });
        assert!(updated.is_some());

        let view = store.view(id).unwrap();
        assert_eq!(view.answer, "draft");
        assert!(view.controls.next_enabled);
        assert_eq!(view.question, RevealFrame::default());
    }

    #[test]
    fn test_unknown_session_is_none() {
        let store = SessionStore::default();
        assert!(store.get(Uuid::new_v4()).is_none());
        assert!(store.update(Uuid::new_v4(), |_| ()).is_none());
    }

    #[test]
    fn test_surface_ids_are_distinct_per_pane() {
        let store = SessionStore::default();
        let session = store.get(store.create()).unwrap();
        assert_ne!(
            session.surface_id(Pane::Question),
            session.surface_id(Pane::Feedback)
        );
        assert!(session
            .surface_id(Pane::Feedback)
            .to_string()
            .ends_with("/feedback"));
    }

    #[test]
    fn test_remove_drops_session() {
        let store = SessionStore::default();
        let id = store.create();
        let other = store.create();

        assert_eq!(store.remove(id).map(|s| s.id), Some(id));
        assert!(store.remove(id).is_none());
        assert!(store.get(id).is_none());
        assert_eq!(store.count(), 1);
        assert!(store.get(other).is_some());
    }

    #[test]
    fn test_remove_idle_keeps_recently_active_sessions() {
        let store = SessionStore::default();
        let stale = store.create();
        let fresh = store.create();
        let hour_ago = Utc::now() - chrono::Duration::hours(1);
        store.backdate(stale, hour_ago);
        store.update(fresh, |_| ());

        let cutoff = Utc::now() - chrono::Duration::minutes(30);
        let evicted: Vec<Uuid> = store.remove_idle(cutoff).iter().map(|s| s.id).collect();

        assert_eq!(evicted, vec![stale]);
        assert!(store.get(stale).is_none());
        assert!(store.get(fresh).is_some());
    }

    #[test]
    fn test_pane_deserializes_lowercase() {
        let pane: Pane = serde_json::from_str("\"feedback\"").unwrap();
        assert_eq!(pane, Pane::Feedback);
    }
}
