//! Orchestrator: runs the adapters the conversation state machine asks for.
//!
//! One call to [`Orchestrator::handle_turn`] handles one user message. The
//! only concurrent model calls are the per-candidate precaution lookups and
//! the hospital lookup that runs alongside them.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::{ops::ControlFlow, sync::Arc};
use tracing::{error, info, warn};

use crate::{
    adapters::{
        self, AnalysisInput, ConditionRefiner, GreetingClassifier, GreetingInput, HospitalLookup,
        HospitalLookupInput, PrecautionAdvisor, PrecautionInput, RefinementInput, SymptomAnalyzer,
    },
    conversation::{self, ConversationState, Directive, Episode, UserTurn},
    error::Result,
    locale::{LocaleRegistry, Translations},
    model::ModelClient,
    schema::{Condition, ConditionCandidate, GeoLocation, Hospital, Language, Precautions, SymptomReport},
    storage::Session,
};

/// Something for the presentation layer to show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BotReply {
    Text { text: String },
    Question { index: usize, total: usize, text: String },
    Conditions { conditions: Vec<Condition> },
    Error { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub replies: Vec<BotReply>,
    pub state: ConversationState,
}

pub struct Orchestrator {
    model: Arc<dyn ModelClient>,
    locales: Arc<LocaleRegistry>,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ModelClient>, locales: Arc<LocaleRegistry>) -> Self {
        Self { model, locales }
    }

    pub fn locales(&self) -> &LocaleRegistry {
        &self.locales
    }

    /// Handle one user message for `session`, mutating its state and episode.
    ///
    /// Precondition errors are returned before any model call and leave the
    /// session untouched. Model failures never surface as `Err`; they become
    /// a localized [`BotReply::Error`].
    pub async fn handle_turn(&self, session: &mut Session, turn: UserTurn) -> Result<TurnResult> {
        let tokens = self.locales.get(session.language);
        let transition = conversation::on_user_message(
            session.state,
            session.episode.as_ref(),
            &turn,
            session.language,
            &tokens,
        )?;

        // Analysis hands back the next directive unless the turn ends early
        let mut directive = session.apply(transition);
        let reply = loop {
            match directive {
                Directive::Analyze(report) => match self.start_episode(session, report, &tokens).await {
                    ControlFlow::Continue(next) => directive = next,
                    ControlFlow::Break(reply) => break reply,
                },
                Directive::Ask { index, total, question } => {
                    session.status_message =
                        Some(format!("Asking follow-up question {} of {}", index + 1, total));
                    break BotReply::Question {
                        index,
                        total,
                        text: question,
                    };
                }
                Directive::Prompt(text) => break BotReply::Text { text },
                Directive::Refine(episode) => break self.refine(session, episode, &tokens).await,
            }
        };

        info!(session_id = %session.id, state = ?session.state, "Turn handled");
        Ok(TurnResult {
            replies: vec![reply],
            state: session.state,
        })
    }

    /// Greeting check, then symptom analysis
    async fn start_episode(
        &self,
        session: &mut Session,
        report: SymptomReport,
        tokens: &Translations,
    ) -> ControlFlow<BotReply, Directive> {
        if !report.has_photo() {
            if let Some(text) = report.symptoms.as_deref() {
                if let Some(reply) = self.classify_greeting(text, report.language).await {
                    session.status_message = Some("Greeting answered".to_string());
                    return ControlFlow::Break(BotReply::Text { text: reply });
                }
            }
        }

        let input = AnalysisInput {
            report,
            visual_symptoms: tokens.visual_symptoms.clone(),
        };
        let questions = match adapters::invoke(self.model.as_ref(), &SymptomAnalyzer, &input).await {
            Ok(questions) => questions,
            Err(e) => {
                error!(session_id = %session.id, error = %e, "Error analyzing symptoms");
                session.status_message = Some("Symptom analysis failed".to_string());
                return ControlFlow::Break(BotReply::Error {
                    text: tokens.error_message.clone(),
                });
            }
        };

        info!(session_id = %session.id, questions = questions.len(), "Symptom analysis complete");
        ControlFlow::Continue(session.apply(conversation::after_analysis(input.report, questions)))
    }

    /// Returns the friendly reply when the text is a greeting; fails open.
    async fn classify_greeting(&self, text: &str, language: Language) -> Option<String> {
        let input = GreetingInput {
            user_input: text.to_string(),
            language,
        };
        match adapters::invoke(self.model.as_ref(), &GreetingClassifier, &input).await {
            Ok(reply) if reply.is_greeting => Some(reply.response),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Error generating greeting, falling back to symptom analysis");
                None
            }
        }
    }

    /// Refine the finished episode into enriched conditions.
    ///
    /// The session is already idle with its episode cleared when this runs,
    /// whatever the outcome.
    async fn refine(&self, session: &mut Session, episode: Episode, tokens: &Translations) -> BotReply {
        let input = RefinementInput {
            symptoms: episode
                .report
                .symptoms
                .clone()
                .unwrap_or_else(|| tokens.visual_symptoms.clone()),
            photo_data_uri: episode.report.photo_data_uri.clone(),
            follow_up_answers: episode.transcript(),
            language: session.language,
            location: session.location(),
        };

        let candidates = match adapters::invoke(self.model.as_ref(), &ConditionRefiner, &input).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(session_id = %session.id, error = %e, "Error refining conditions");
                session.status_message = Some("Condition refinement failed".to_string());
                return BotReply::Error {
                    text: tokens.error_message.clone(),
                };
            }
        };

        let conditions = self
            .enrich(candidates, &input.symptoms, input.language, input.location)
            .await;

        session.status_message = Some(format!("Refined into {} conditions", conditions.len()));
        BotReply::Conditions { conditions }
    }

    /// Second phase: precautions for every candidate, hospitals for emergencies.
    ///
    /// Output order follows `candidates`; a failed precaution lookup leaves
    /// only that candidate without precautions.
    pub async fn enrich(
        &self,
        candidates: Vec<ConditionCandidate>,
        symptoms: &str,
        language: Language,
        location: Option<GeoLocation>,
    ) -> Vec<Condition> {
        let any_emergency = candidates.iter().any(|c| c.is_emergency);

        let hospitals = async {
            match location {
                Some(location) if any_emergency => Some(self.lookup_hospitals(location, language).await),
                _ => None,
            }
        };
        let precautions = join_all(
            candidates
                .iter()
                .map(|candidate| self.precautions_for(&candidate.name, symptoms, language)),
        );

        let (hospitals, precautions) = tokio::join!(hospitals, precautions);

        candidates
            .into_iter()
            .zip(precautions)
            .map(|(candidate, precautions)| {
                let mut condition = Condition::from(candidate);
                condition.precautions = precautions;
                if condition.is_emergency {
                    condition.nearby_hospitals = hospitals.clone();
                }
                condition
            })
            .collect()
    }

    async fn precautions_for(&self, condition: &str, symptoms: &str, language: Language) -> Option<Precautions> {
        let input = PrecautionInput {
            condition: condition.to_string(),
            symptoms: symptoms.to_string(),
            language,
        };
        match adapters::invoke(self.model.as_ref(), &PrecautionAdvisor, &input).await {
            Ok(precautions) => Some(precautions),
            Err(e) => {
                error!(condition = %condition, error = %e, "Error getting precautions");
                None
            }
        }
    }

    /// Best effort; any failure is an empty list
    async fn lookup_hospitals(&self, location: GeoLocation, language: Language) -> Vec<Hospital> {
        let input = HospitalLookupInput {
            latitude: location.latitude,
            longitude: location.longitude,
            language,
        };
        match adapters::invoke(self.model.as_ref(), &HospitalLookup, &input).await {
            Ok(hospitals) => hospitals,
            Err(e) => {
                error!(error = %e, "Error finding nearby hospitals");
                Vec::new()
            }
        }
    }
}
