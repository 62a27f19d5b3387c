use super::{Adapter, json_instruction, parse_json};
use crate::{
    error::{FlowError, Result},
    model::ModelRequest,
    schema::{FollowUpQuestions, SymptomReport},
};

/// Upper bound on the follow-up queue
pub const MAX_FOLLOW_UP_QUESTIONS: usize = 4;

const ANALYSIS_PREAMBLE: &str = "You are a caring and empathetic AI medical assistant. A user is feeling unwell and will describe their symptoms. Your primary goal is to show you understand and to help them figure things out.";

const ANALYSIS_PROMPT: &str = r#"Your response must be in the following language: {language}.

Start by acknowledging their symptoms with a caring tone (e.g., "I'm sorry to hear you're feeling this way."). Then, your task is to generate a list of 3-4 simple, gentle, and logical follow-up questions to ask the user. These questions should help differentiate between potential causes for the given symptoms. For example, if the user says "shortness of breath", you might ask if it occurred after exercise or at rest.

Do NOT suggest any medical conditions or provide any diagnosis at this stage. Only ask caring questions.

Symptoms: {symptoms}
{photo}"#;

const ANALYSIS_SHAPE: &str = r#"{ "followUpQuestions": ["...", "..."] }"#;

#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub report: SymptomReport,
    /// Localized stand-in for the symptom text of a photo-only report
    pub visual_symptoms: String,
}

/// Turns a symptom report into follow-up questions
pub struct SymptomAnalyzer;

impl Adapter for SymptomAnalyzer {
    type Input = AnalysisInput;
    type Output = Vec<String>;

    fn request(&self, input: &AnalysisInput) -> Result<ModelRequest> {
        let report = &input.report;
        if report.is_empty() {
            return Err(FlowError::MissingSymptoms);
        }

        let symptoms = report.symptoms.as_deref().unwrap_or(&input.visual_symptoms);
        let photo = if report.has_photo() {
            "Photo: (attached)"
        } else {
            ""
        };

        let prompt = ANALYSIS_PROMPT
            .replace("{language}", report.language.code())
            .replace("{symptoms}", symptoms)
            .replace("{photo}", photo);

        Ok(ModelRequest::new(
            self.id(),
            ANALYSIS_PREAMBLE,
            prompt + &json_instruction(ANALYSIS_SHAPE),
        )
        .with_media(report.photo_data_uri.clone()))
    }

    fn parse(&self, raw: &str) -> Result<Vec<String>> {
        let output: FollowUpQuestions = parse_json(self.id(), raw)?;
        Ok(output
            .follow_up_questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(MAX_FOLLOW_UP_QUESTIONS)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Language;

    fn input(report: SymptomReport) -> AnalysisInput {
        AnalysisInput {
            report,
            visual_symptoms: "ଫଟୋରେ ଥିବା ଲକ୍ଷଣ".into(),
        }
    }

    #[test]
    fn empty_report_is_rejected_before_rendering() {
        let report = SymptomReport::new(None, None, Language::En);
        let err = SymptomAnalyzer.request(&input(report)).unwrap_err();
        assert!(matches!(err, FlowError::MissingSymptoms));
    }

    #[test]
    fn photo_is_forwarded_as_media() {
        let report = SymptomReport::new(
            None,
            Some("data:image/jpeg;base64,AAAA".into()),
            Language::Or,
        );
        let request = SymptomAnalyzer.request(&input(report)).unwrap();
        assert_eq!(request.media.as_deref(), Some("data:image/jpeg;base64,AAAA"));
        assert!(request.prompt.contains("Photo: (attached)"));
        assert!(request.prompt.contains("Symptoms: ଫଟୋରେ ଥିବା ଲକ୍ଷଣ"));
        assert!(request.prompt.contains("following language: or."));
    }

    #[test]
    fn questions_are_trimmed_and_capped() {
        let questions = SymptomAnalyzer
            .parse(r#"{"followUpQuestions": [" a ", "", "b", "c", "d", "e"]}"#)
            .unwrap();
        assert_eq!(questions, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn caring_opening_before_the_json_is_tolerated() {
        let questions = SymptomAnalyzer
            .parse("I'm sorry to hear you're feeling this way.\n{\"followUpQuestions\": [\"Since when?\"]}")
            .unwrap();
        assert_eq!(questions, vec!["Since when?"]);
    }

    #[test]
    fn missing_list_means_no_questions() {
        let questions = SymptomAnalyzer.parse("{}").unwrap();
        assert!(questions.is_empty());
    }
}
