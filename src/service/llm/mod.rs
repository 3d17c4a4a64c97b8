pub mod openai;

use std::sync::Arc;
use std::ops::Deref;

use anyhow::{anyhow, bail};
use async_trait::async_trait;

use crate::base::prompts;
use crate::base::types::{
    AmbiguityCheck, AnswerIdentification, ConditionCheck, FeasibilityCheck, ParsedRule, Res, clean_completion, parse_llm_json,
};

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// A single raw completion is the whole contract; every prompt kind is layered
/// on top of it in [`LlmClient`], so implementations (and test doubles) only
/// ever provide one method.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Run one chat completion and return the raw text of the reply.
    async fn complete(&self, prompt: &str) -> Res<String>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

// Typed prompt calls.
//
// Each method renders one prompt kind, runs the completion, and parses the
// reply into its typed shape.  Malformed output surfaces as an error here and
// nowhere else.

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }

    /// Is the request a feasible message-automation workflow at all?
    pub async fn check_feasibility(&self, user_input: &str) -> Res<FeasibilityCheck> {
        let raw = self.complete(&prompts::valid_command(user_input)).await?;

        parse_llm_json(&raw)
    }

    /// Does the request still have ambiguous or missing parts?
    pub async fn assess_ambiguity(&self, user_input: &str) -> Res<AmbiguityCheck> {
        let raw = self.complete(&prompts::reasoning(user_input)).await?;

        parse_llm_json(&raw)
    }

    /// Did the user's reply answer all pending clarification questions?
    pub async fn identify_answers(&self, questions: &[String], user_message: &str) -> Res<AnswerIdentification> {
        let raw = self.complete(&prompts::answer_identification(questions, user_message)).await?;

        parse_llm_json(&raw)
    }

    /// Merge the original request and collected answers into one unambiguous
    /// command sentence.
    pub async fn synthesize_command(&self, original_request: &str, questions: &[String], answers: &[String]) -> Res<String> {
        let raw = self.complete(&prompts::command_creation(original_request, questions, answers)).await?;
        let command = clean_completion(&raw);

        if command.is_empty() {
            bail!("command synthesis returned an empty string");
        }

        Ok(command)
    }

    /// Parse a finalized command sentence into the rule's trigger/response
    /// halves, normalized and validated.
    pub async fn parse_rule(&self, command: &str) -> Res<ParsedRule> {
        let raw = self.complete(&prompts::structured_parsing(command)).await?;

        parse_llm_json::<ParsedRule>(&raw)?.validated()
    }

    /// Does a live message satisfy a stored trigger condition?
    pub async fn check_condition(&self, message: &str, condition: &str) -> Res<ConditionCheck> {
        let raw = self.complete(&prompts::check_condition(message, condition)).await?;

        parse_llm_json(&raw)
    }

    /// Rewrite a live message to comply with the originating command.  May
    /// legitimately return the message unchanged, or an empty string when the
    /// model produces nothing useful; the caller decides what to do then.
    pub async fn rewrite_message(&self, workflow_command: &str, current_message: &str) -> Res<String> {
        let raw = self.complete(&prompts::edit_message(workflow_command, current_message)).await?;

        Ok(clean_completion(&raw))
    }

    /// Screen a request for prompt-injection attempts before it reaches the
    /// rest of the pipeline.  Anything other than a clear true/false verdict
    /// is an error, so a confused model fails closed.
    pub async fn screen_injection(&self, input_text: &str) -> Res<bool> {
        let raw = self.complete(&prompts::injection_screen(input_text)).await?;

        match clean_completion(&raw).trim_end_matches('.').to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(anyhow!("injection screen returned neither true nor false: {other}")),
        }
    }
}

// Tests.
