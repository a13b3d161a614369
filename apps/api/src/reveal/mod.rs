//! Incremental reveal: shows a finished text word by word on an output surface.
//!
//! Sessions are keyed by `SurfaceId`. Starting a reveal on a surface supersedes the
//! session already running there: the old task is cancelled and its generation is
//! retired under the surface's gate, so a superseded session can neither write another
//! frame nor fire its completion callback. Reveals on different surfaces never touch
//! each other.

pub mod format;
pub mod surface;
pub mod task;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use self::format::format_markup;
use self::task::ScheduledTask;

pub use self::surface::ChannelSurface;

/// Default cadence: one word per tick.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Placeholder cursor rendered after the revealed prefix.
pub const PROGRESS_MARKER: &str = r#"<span class="blinking-cursor"></span>"#;

pub type OnComplete = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceId(String);

impl SurfaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One render of a surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealFrame {
    pub markup: String,
    pub words_shown: usize,
    pub total_words: usize,
    pub done: bool,
}

/// Output target for reveal frames.
pub trait Surface: Send + Sync {
    fn render(&self, frame: RevealFrame);
}

/// Reveal progress over one text. `shown` never decreases and never exceeds
/// the word count.
#[derive(Debug)]
struct RevealSession {
    generation: u64,
    text: String,
    words: Vec<String>,
    shown: usize,
}

impl RevealSession {
    fn new(generation: u64, text: String) -> Self {
        let words = text.split(' ').map(str::to_string).collect();
        Self {
            generation,
            text,
            words,
            shown: 0,
        }
    }

    fn total(&self) -> usize {
        self.words.len()
    }

    fn marker_frame(&self) -> RevealFrame {
        RevealFrame {
            markup: PROGRESS_MARKER.to_string(),
            words_shown: 0,
            total_words: self.total(),
            done: false,
        }
    }

    /// Reveals one more word. The frame that reaches the last word carries the
    /// fully formatted text and no marker.
    fn advance(&mut self) -> RevealFrame {
        self.shown = (self.shown + 1).min(self.total());
        let done = self.shown == self.total();
        let markup = if done {
            format_markup(&self.text)
        } else {
            format!(
                "{} {}",
                format_markup(&self.words[..self.shown].join(" ")),
                PROGRESS_MARKER
            )
        };
        RevealFrame {
            markup,
            words_shown: self.shown,
            total_words: self.total(),
            done,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    active: bool,
    task: Option<ScheduledTask>,
}

/// Owns every reveal session, one slot per surface.
#[derive(Clone)]
pub struct RevealRegistry {
    tick: Duration,
    slots: Arc<Mutex<HashMap<SurfaceId, Arc<Mutex<Slot>>>>>,
}

impl RevealRegistry {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn slot(&self, id: &SurfaceId) -> Arc<Mutex<Slot>> {
        let mut slots = self.slots.lock().await;
        slots.entry(id.clone()).or_default().clone()
    }

    /// Starts revealing `text` on `surface`, superseding any session on the same id.
    /// Returns once the progress marker is rendered; the words follow on the tick.
    pub async fn reveal(
        &self,
        id: SurfaceId,
        surface: Arc<dyn Surface>,
        text: impl Into<String>,
        on_complete: Option<OnComplete>,
    ) {
        let gate = self.slot(&id).await;
        let mut slot = gate.lock().await;

        if let Some(previous) = slot.task.take() {
            if slot.active && !previous.is_finished() {
                debug!("Superseding reveal {} on surface {}", slot.generation, id);
            }
            previous.cancel();
        }

        slot.generation += 1;
        slot.active = true;
        let session = RevealSession::new(slot.generation, text.into());
        surface.render(session.marker_frame());

        slot.task = Some(ScheduledTask::spawn(run_session(
            gate.clone(),
            surface,
            session,
            self.tick,
            on_complete,
        )));
    }

    /// Cancels whatever runs on `id` and blanks the surface.
    pub async fn clear(&self, id: SurfaceId, surface: Arc<dyn Surface>) {
        let gate = self.slot(&id).await;
        let mut slot = gate.lock().await;
        if let Some(previous) = slot.task.take() {
            previous.cancel();
        }
        slot.generation += 1;
        slot.active = false;
        surface.render(RevealFrame::default());
    }

    /// Cancels whatever runs on `id` and drops its slot. The surface is left as is.
    pub async fn forget(&self, id: &SurfaceId) {
        let Some(gate) = self.slots.lock().await.remove(id) else {
            return;
        };
        let mut slot = gate.lock().await;
        if let Some(previous) = slot.task.take() {
            previous.cancel();
        }
        slot.generation += 1;
        slot.active = false;
    }

    pub async fn slot_count(&self) -> usize {
        self.slots.lock().await.len()
    }
}

impl Default for RevealRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

async fn run_session(
    gate: Arc<Mutex<Slot>>,
    surface: Arc<dyn Surface>,
    mut session: RevealSession,
    tick: Duration,
    on_complete: Option<OnComplete>,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let mut slot = gate.lock().await;
        if slot.generation != session.generation {
            return;
        }

        let frame = session.advance();
        let done = frame.done;
        surface.render(frame);

        if done {
            slot.active = false;
            drop(slot);
            debug!(
                "Reveal {} finished after {} words",
                session.generation,
                session.total()
            );
            if let Some(callback) = on_complete {
                callback();
            }
            return;
        }
    }
}
