//! crates/reading_club_core/src/interview.rs
//!
//! The interview policy. There is no server-side session: every decision is
//! made fresh from the message list the caller submits.

use crate::domain::{Message, Role, SubjectMetadata};
use crate::ports::{GenerationRequest, PortResult, TextGenerationService};
use crate::prompts::{system_prompt, PromptTemplate};

/// User turns needed before a summary is offered.
pub const SUMMARY_TURN_THRESHOLD: usize = 3;

/// What the caller may do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterviewActions {
    pub can_continue: bool,
    pub can_summarize: bool,
}

pub fn user_turns(messages: &[Message]) -> usize {
    messages.iter().filter(|m| m.role == Role::User).count()
}

pub fn next_actions(messages: &[Message]) -> InterviewActions {
    InterviewActions {
        can_continue: true,
        can_summarize: user_turns(messages) >= SUMMARY_TURN_THRESHOLD,
    }
}

pub struct SummarizeInput<'a> {
    pub messages: &'a [Message],
    pub existing_summary: Option<&'a str>,
    pub subject: Option<&'a SubjectMetadata>,
    pub model: &'a str,
    pub max_tokens: Option<u32>,
}

/// Produces the reflection for an interview.
///
/// A caller-supplied summary is authoritative and returned verbatim without a
/// backend call; otherwise the full transcript is summarised in one blocking
/// generation.
pub async fn summarize(
    generator: &dyn TextGenerationService,
    input: SummarizeInput<'_>,
) -> PortResult<String> {
    if let Some(existing) = input.existing_summary.filter(|s| !s.trim().is_empty()) {
        return Ok(existing.to_string());
    }

    generator
        .generate(GenerationRequest {
            system_prompt: system_prompt(PromptTemplate::Summarize, input.subject),
            messages: input.messages.to_vec(),
            model: input.model.to_string(),
            max_tokens: input.max_tokens,
        })
        .await
}
