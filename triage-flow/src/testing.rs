//! Scripted model client for tests.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::{
    error::{FlowError, Result},
    model::{ModelClient, ModelRequest},
};

struct Rule {
    task_suffix: String,
    needle: Option<String>,
    reply: std::result::Result<String, String>,
}

/// Answers by adapter name (suffix of the request's task id), optionally
/// narrowed by a substring of the prompt. The first matching rule wins.
#[derive(Default)]
pub struct ScriptedModel {
    rules: Vec<Rule>,
    calls: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, task: &str, reply: impl Into<String>) -> Self {
        self.rules.push(Rule {
            task_suffix: task.to_string(),
            needle: None,
            reply: Ok(reply.into()),
        });
        self
    }

    pub fn reply_when(mut self, task: &str, needle: &str, reply: impl Into<String>) -> Self {
        self.rules.push(Rule {
            task_suffix: task.to_string(),
            needle: Some(needle.to_string()),
            reply: Ok(reply.into()),
        });
        self
    }

    pub fn fail(mut self, task: &str) -> Self {
        self.rules.push(Rule {
            task_suffix: task.to_string(),
            needle: None,
            reply: Err("scripted failure".to_string()),
        });
        self
    }

    pub fn fail_when(mut self, task: &str, needle: &str) -> Self {
        self.rules.push(Rule {
            task_suffix: task.to_string(),
            needle: Some(needle.to_string()),
            reply: Err("scripted failure".to_string()),
        });
        self
    }

    pub fn calls(&self) -> Vec<ModelRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, task: &str) -> usize {
        self.calls()
            .iter()
            .filter(|request| request.task.ends_with(task))
            .count()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, request: ModelRequest) -> Result<String> {
        self.calls.lock().unwrap().push(request.clone());

        let rule = self.rules.iter().find(|rule| {
            request.task.ends_with(&rule.task_suffix)
                && rule
                    .needle
                    .as_ref()
                    .is_none_or(|needle| request.prompt.contains(needle.as_str()))
        });

        match rule {
            Some(Rule { reply: Ok(text), .. }) => Ok(text.clone()),
            Some(Rule { reply: Err(message), .. }) => Err(FlowError::model_call(&request.task, message)),
            None => Err(FlowError::model_call(&request.task, "no scripted reply")),
        }
    }
}
