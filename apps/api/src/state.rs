use std::sync::Arc;

use crate::config::Config;
use crate::interview::workflow::InterviewWorkflow;
use crate::preferences::ThemeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Interview sessions plus the generation client and reveal registry they drive.
    pub interview: InterviewWorkflow,
    pub themes: Arc<ThemeStore>,
    pub config: Config,
}
