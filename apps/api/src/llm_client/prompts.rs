// Interview prompt texts and builders.
// Question generation uses a user-role prompt only; both feedback flavours carry a
// system instruction describing the coach persona.

use super::{EmptyPrompt, Prompt};

/// User prompt for a fresh behavioral question.
pub const QUESTION_PROMPT: &str = "You are an expert technical interviewer for a top tech company. \
    Provide one common behavioral interview question. \
    The question should be concise, a maximum of 5-6 lines long. \
    IMPORTANT: Do not use any Markdown formatting like asterisks or bolding. \
    Output only the plain text of the question.";

/// System instruction for the short feedback pass.
pub const BRIEF_FEEDBACK_SYSTEM: &str = "You are an AI Interview Coach. \
    Your goal is to provide **brief** and **concise** feedback on a user's answer. \
    Provide a 2-3 bullet point summary of the most important feedback points. \
    Do not use Markdown formatting.";

/// System instruction for the STAR-method breakdown.
pub const DETAILED_FEEDBACK_SYSTEM: &str = "You are an AI Interview Coach. \
    Your goal is to provide constructive, structured feedback. \
    Analyze the user's answer based on the STAR method. \
    For each component (Situation, Task, Action, Result), provide 1-2 concise bullet points of feedback. \
    Use Markdown for bolding key terms and use ### for subheadings for each STAR component.";

pub fn question_prompt() -> Prompt {
    Prompt {
        user: QUESTION_PROMPT.to_string(),
        system: None,
    }
}

pub fn brief_feedback_prompt(question: &str, answer: &str) -> Result<Prompt, EmptyPrompt> {
    Ok(Prompt::new(format!(
        "Question: \"{question}\". My Answer: \"{answer}\". Provide a short summary of feedback."
    ))?
    .with_system(BRIEF_FEEDBACK_SYSTEM))
}

pub fn detailed_feedback_prompt(question: &str, answer: &str) -> Result<Prompt, EmptyPrompt> {
    Ok(Prompt::new(format!(
        "Question: \"{question}\". My Answer: \"{answer}\". Provide detailed feedback."
    ))?
    .with_system(DETAILED_FEEDBACK_SYSTEM))
}
