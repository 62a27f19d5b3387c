//! Pure conversation state machine.
//!
//! Given the current state, the episode collected so far and a user message,
//! produce the next state, the next episode and a [`Directive`] telling the
//! orchestrator what to do. No model calls and no I/O happen here.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{FlowError, Result},
    locale::Translations,
    schema::{Language, SymptomReport},
};

const NO_FOLLOW_UP_ANSWERS: &str = "No follow-up answers.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingFollowUp,
    AwaitingAnythingElse,
}

/// Everything collected between the first symptom report and the refined result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub report: SymptomReport,
    questions: Vec<String>,
    answers: Vec<String>,
    pub additional_info: Option<String>,
}

impl Episode {
    pub fn new(report: SymptomReport, questions: Vec<String>) -> Self {
        Self {
            report,
            questions,
            answers: Vec::new(),
            additional_info: None,
        }
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// The next unanswered question and its index
    pub fn next_question(&self) -> Option<(usize, &str)> {
        let index = self.answers.len();
        self.questions.get(index).map(|q| (index, q.as_str()))
    }

    pub fn is_complete(&self) -> bool {
        self.answers.len() >= self.questions.len()
    }

    // append-only; the log never grows past the question count
    fn record_answer(&mut self, answer: String) {
        if !self.is_complete() {
            self.answers.push(answer);
        }
    }

    /// Follow-up Q/A transcript sent to the refinement prompt
    pub fn transcript(&self) -> String {
        let answers = if self.questions.is_empty() {
            NO_FOLLOW_UP_ANSWERS.to_string()
        } else {
            self.questions
                .iter()
                .zip(self.answers.iter())
                .map(|(q, a)| format!("{q}\nAnswer: {a}"))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        match &self.additional_info {
            Some(info) => format!("{answers}\n\nAdditional Information: {info}"),
            None => answers,
        }
    }
}

/// One inbound user message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserTurn {
    pub text: String,
    pub photo_data_uri: Option<String>,
}

impl UserTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            photo_data_uri: None,
        }
    }

    pub fn with_photo(mut self, photo_data_uri: impl Into<String>) -> Self {
        self.photo_data_uri = Some(photo_data_uri.into());
        self
    }
}

/// What the orchestrator must do after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Check for a greeting, then analyze the report
    Analyze(SymptomReport),
    Ask {
        index: usize,
        total: usize,
        question: String,
    },
    /// Show a fixed localized prompt
    Prompt(String),
    /// Run refinement on the finished episode
    Refine(Episode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ConversationState,
    pub episode: Option<Episode>,
    pub directive: Directive,
}

/// Transition on a user message.
///
/// Returns a precondition error, before anything else happens, when an idle
/// conversation receives neither text nor photo, or an awaiting conversation
/// receives blank text.
pub fn on_user_message(
    state: ConversationState,
    episode: Option<&Episode>,
    turn: &UserTurn,
    language: Language,
    tokens: &Translations,
) -> Result<Transition> {
    let (step, episode): (Step, &Episode) = match (state, episode) {
        (ConversationState::AwaitingFollowUp, Some(episode)) => (follow_up as Step, episode),
        (ConversationState::AwaitingAnythingElse, Some(episode)) => (anything_else as Step, episode),
        _ => return start(turn, language),
    };

    let text = turn.text.trim();
    if text.is_empty() {
        return Err(FlowError::EmptyMessage);
    }
    if turn.photo_data_uri.is_some() {
        warn!(state = ?state, "Ignoring photo sent in the middle of an episode");
    }

    Ok(step(episode.clone(), text, tokens))
}

/// Handles one message inside an episode
type Step = fn(Episode, &str, &Translations) -> Transition;

/// Transition once analysis has produced the follow-up questions
pub fn after_analysis(report: SymptomReport, questions: Vec<String>) -> Transition {
    let episode = Episode::new(report, questions);
    match episode.next_question() {
        Some((index, question)) => Transition {
            state: ConversationState::AwaitingFollowUp,
            directive: Directive::Ask {
                index,
                total: episode.questions.len(),
                question: question.to_string(),
            },
            episode: Some(episode),
        },
        None => Transition {
            state: ConversationState::Idle,
            episode: None,
            directive: Directive::Refine(episode),
        },
    }
}

fn start(turn: &UserTurn, language: Language) -> Result<Transition> {
    let report = SymptomReport::new(Some(turn.text.clone()), turn.photo_data_uri.clone(), language);
    if report.is_empty() {
        return Err(FlowError::MissingSymptoms);
    }
    Ok(Transition {
        state: ConversationState::Idle,
        episode: None,
        directive: Directive::Analyze(report),
    })
}

fn follow_up(mut episode: Episode, answer: &str, tokens: &Translations) -> Transition {
    episode.record_answer(answer.to_string());

    if let Some((index, question)) = episode.next_question() {
        let directive = Directive::Ask {
            index,
            total: episode.questions.len(),
            question: question.to_string(),
        };
        return Transition {
            state: ConversationState::AwaitingFollowUp,
            episode: Some(episode),
            directive,
        };
    }

    Transition {
        state: ConversationState::AwaitingAnythingElse,
        episode: Some(episode),
        directive: Directive::Prompt(tokens.anything_else_prompt.clone()),
    }
}

// "yes" is tested before "no"; text matching neither is taken as the
// additional information itself.
fn anything_else(mut episode: Episode, text: &str, tokens: &Translations) -> Transition {
    if tokens.is_affirmative(text) {
        return Transition {
            state: ConversationState::AwaitingAnythingElse,
            episode: Some(episode),
            directive: Directive::Prompt(tokens.anything_else_placeholder.clone()),
        };
    }

    if !tokens.is_negative(text) {
        episode.additional_info = Some(text.to_string());
    }

    Transition {
        state: ConversationState::Idle,
        episode: None,
        directive: Directive::Refine(episode),
    }
}
