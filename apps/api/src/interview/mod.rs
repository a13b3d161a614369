// Mock interview: session state, UI control flags and the workflow that composes
// the generation client with the reveal registry.

pub mod handlers;
pub mod session;
pub mod workflow;
