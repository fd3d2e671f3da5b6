//! crates/reading_club_core/src/prompts.rs
//!
//! System prompt templates for every generation the assistant performs.
//! Each template is a pure function of the (optional) subject metadata.

use crate::domain::SubjectMetadata;

const TONE_GUIDE: &str = r#"You are the reading assistant of a book club's record keeper.
Tone: a warm but tidy helper. Avoid forced excitement and emoji.
- "The core themes of this book fall into three groups." (clean information)
- "It might be worth talking about it from this angle." (gentle suggestion)
- "That's an interesting thought. Shall we go a little further?" (warm encouragement)"#;

const INTERVIEW_ROLE: &str = r#"Role: reading interviewer. Draw out the reader's impressions of a book they have read through 3-5 questions.

How to proceed:
1. First question: "What made you pick up this book?" or "Was there a scene that stayed with you?"
2. Follow the reader's answer naturally with the next question (empathy, then a question).
3. After 3-5 turns: "I think we have enough for a good record. Shall I put it together for you?"
4. When asked to wrap up: turn the conversation into a short reflection.

Keep in mind:
- Ask only one question at a time.
- Listen and acknowledge before asking the next question.
- Use open questions without a right answer.
- Keep the reader's own expressions when summarising."#;

const SUMMARIZE_ROLE: &str = r#"Role: turn the conversation into a natural reading reflection.

Rules:
- Preserve the reader's own expressions and feelings as much as possible.
- 3-5 paragraphs, around 500 characters.
- Set quotations apart when there are any.
- Use a tone between written and spoken language."#;

const TOPICS_ROLE: &str = r#"Role: suggest discussion topics for a book club meeting.

Rules:
- Propose 3-5 discussion topics.
- Explain each topic in 1-2 lines.
- Include questions that invite different perspectives.
- Tie every topic back to the book's core themes."#;

const DRAFT_ROLE: &str = r#"Role: write a first draft of the presenter's notes for a book club meeting.

Structure:
1. Introduction to the book (2-3 sentences)
2. Key points (3-5 bullets)
3. Discussion questions (3)
4. Presenter's thoughts (free form)

Rules:
- Use markdown.
- Leave the presenter's thoughts as "[Write the presenter's thoughts here]".
- Objective summary plus open questions."#;

const ANALYSIS_ROLE: &str = r#"Role: provide an in-depth analysis of the book.

Analysis structure:
1. Core messages (up to 3)
2. Main subjects and themes
3. The author's intent and perspective
4. Connections to other works

Rules:
- Beware of spoilers (avoid the key twists).
- Mention that several interpretations are possible.
- Aim to widen the reader's thinking."#;

const CHAT_ROLE: &str = r#"Role: a reading conversation partner.

What you can do:
- Book recommendations based on the reader's taste
- Advice on reading slumps and reading habits
- Free conversation about books the reader has read

Rules:
- Keep answers within 3-5 sentences.
- Ask a follow-up question when it helps the conversation."#;

/// The fixed set of system prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    Interview,
    Summarize,
    Topics,
    Draft,
    Analysis,
    Chat,
}

impl PromptTemplate {
    fn role(&self) -> &'static str {
        match self {
            PromptTemplate::Interview => INTERVIEW_ROLE,
            PromptTemplate::Summarize => SUMMARIZE_ROLE,
            PromptTemplate::Topics => TOPICS_ROLE,
            PromptTemplate::Draft => DRAFT_ROLE,
            PromptTemplate::Analysis => ANALYSIS_ROLE,
            PromptTemplate::Chat => CHAT_ROLE,
        }
    }

    /// Chat is a free conversation and never carries a book.
    fn accepts_subject(&self) -> bool {
        !matches!(self, PromptTemplate::Chat)
    }
}

/// Builds the system prompt for `template`, appending the subject when one is known.
pub fn system_prompt(template: PromptTemplate, subject: Option<&SubjectMetadata>) -> String {
    let mut prompt = format!("{}\n\n{}", TONE_GUIDE, template.role());
    if template.accepts_subject() {
        if let Some(subject) = subject {
            prompt.push_str(&subject_block(subject));
        }
    }
    prompt
}

fn subject_block(subject: &SubjectMetadata) -> String {
    let mut block = format!(
        "\n\nBook under discussion:\nTitle: {}\nAuthor: {}",
        subject.title, subject.author
    );
    if let Some(description) = subject.description.as_deref().filter(|d| !d.trim().is_empty()) {
        block.push_str(&format!("\nAbout: {}", description));
    }
    block
}

/// The opening user turn for single-shot content about a subject.
pub fn content_request(template: PromptTemplate, subject: &SubjectMetadata) -> String {
    match template {
        PromptTemplate::Topics => format!(
            "Suggest discussion topics for \"{}\" ({}).",
            subject.title, subject.author
        ),
        PromptTemplate::Draft => format!(
            "Write a presenter's draft for \"{}\" ({}).",
            subject.title, subject.author
        ),
        _ => format!(
            "Please analyse \"{}\" ({}).",
            subject.title, subject.author
        ),
    }
}
