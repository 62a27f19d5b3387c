use super::{Adapter, json_instruction, parse_json};
use crate::{
    error::Result,
    model::ModelRequest,
    schema::{GreetingReply, Language},
};

const GREETING_PREAMBLE: &str =
    "You are a friendly, caring, and empathetic AI medical assistant. Your goal is to make the user feel comfortable.";

const GREETING_PROMPT: &str = r#"Your response must be in the following language: {language}.

Determine if the user's input is a simple greeting (like "hello", "hi", etc.).

If it is a greeting, set isGreeting to true and provide a warm, friendly, one-sentence response that feels human. Also, gently ask how you can help them today.

If it is not a greeting, set isGreeting to false and response to an empty string.

User Input: {user_input}"#;

const GREETING_SHAPE: &str = r#"{ "isGreeting": true/false, "response": "..." }"#;

pub struct GreetingInput {
    pub user_input: String,
    pub language: Language,
}

/// Decides whether an opening message is small talk rather than symptoms
pub struct GreetingClassifier;

impl Adapter for GreetingClassifier {
    type Input = GreetingInput;
    type Output = GreetingReply;

    fn request(&self, input: &GreetingInput) -> Result<ModelRequest> {
        let prompt = GREETING_PROMPT
            .replace("{language}", input.language.code())
            .replace("{user_input}", &input.user_input);
        Ok(ModelRequest::new(
            self.id(),
            GREETING_PREAMBLE,
            prompt + &json_instruction(GREETING_SHAPE),
        ))
    }

    fn parse(&self, raw: &str) -> Result<GreetingReply> {
        let mut reply: GreetingReply = parse_json(self.id(), raw)?;
        // a non-greeting never carries a reply
        if !reply.is_greeting {
            reply.response.clear();
        } else if reply.response.trim().is_empty() {
            reply.is_greeting = false;
        }
        Ok(reply)
    }
}
