//! Core types: result aliases, the persisted rule model, and the typed
//! shapes the LLM prompt kinds are parsed into.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

// Rule model.

/// The four message operations a rule can perform, using the wire names the
/// structured-parsing prompt is instructed to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    SendMessageInDm,
    SendMessageInChannel,
    DeleteMessage,
    EditMessage,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SendMessageInDm => "send-message-in-dm",
            ActionKind::SendMessageInChannel => "send-message-in-channel",
            ActionKind::DeleteMessage => "delete-message",
            ActionKind::EditMessage => "edit-message",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Err;

    fn from_str(s: &str) -> Res<Self> {
        match s {
            "send-message-in-dm" => Ok(ActionKind::SendMessageInDm),
            "send-message-in-channel" => Ok(ActionKind::SendMessageInChannel),
            "delete-message" => Ok(ActionKind::DeleteMessage),
            "edit-message" => Ok(ActionKind::EditMessage),
            other => Err(anyhow!(
                "unknown action `{other}`; expected one of: send-message-in-dm, send-message-in-channel, delete-message, edit-message"
            )),
        }
    }
}

/// What a message must satisfy for a rule to fire.  `None` for `user` or
/// `channel` means "any"; values are stored as parsed (`@name` / `#name`)
/// and normalized at match time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub user: Option<String>,
    pub channel: Option<String>,
    pub condition: String,
}

/// The stored response half of a rule.  `message` is `None` exactly when
/// `action` is `delete-message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSpec {
    pub action: ActionKind,
    pub message: Option<String>,
}

/// A persisted trigger/response automation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationRule {
    /// Unique, time-derived identifier; immutable after creation.
    pub id: String,
    /// The canonical natural-language sentence describing the rule.
    pub command: String,
    /// User id of the rule's creator.
    pub created_by: String,
    /// True when the rule was authored conversationally; selects semantic
    /// condition matching instead of literal substring matching.
    pub used_llm: bool,
    /// Whether the creator gets a confirmation DM each time the rule fires.
    pub to_notify: bool,
    /// Inactive rules are never evaluated.
    pub is_active: bool,
    pub trigger: Trigger,
    pub response: ResponseSpec,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

static RULE_SEQ: AtomicU32 = AtomicU32::new(0);

/// Time-derived rule id, unique within the process.
fn next_rule_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let seq = RULE_SEQ.fetch_add(1, Ordering::Relaxed);

    format!("workflow_{millis}_{seq:04}")
}

impl AutomationRule {
    /// Create a new rule from a validated parse, with notifications on and
    /// the rule active (both creation paths start that way).
    pub fn new(command: impl Into<String>, created_by: impl Into<String>, used_llm: bool, parsed: ParsedRule) -> Self {
        let now = Utc::now();

        Self {
            id: next_rule_id(),
            command: command.into(),
            created_by: created_by.into(),
            used_llm,
            to_notify: true,
            is_active: true,
            trigger: parsed.trigger,
            response: parsed.response,
            created_at: now,
            updated_at: now,
        }
    }

    /// Convert the stored response into the dispatchable action variant,
    /// enforcing the message invariants and rejecting `edit-message` for
    /// form-authored rules (the rewrite prompt needs the originating
    /// command text, which only conversational authoring produces).
    pub fn action(&self) -> Res<Action> {
        match self.response.action {
            ActionKind::SendMessageInDm => {
                let message = self.require_message()?;
                Ok(Action::SendDm { message })
            }
            ActionKind::SendMessageInChannel => {
                let message = self.require_message()?;
                Ok(Action::SendChannel { message })
            }
            ActionKind::DeleteMessage => Ok(Action::Delete),
            ActionKind::EditMessage => {
                if !self.used_llm {
                    bail!("rule `{}`: edit-message is only valid for LLM-authored rules", self.id);
                }

                Ok(Action::Edit { command: self.command.clone() })
            }
        }
    }

    fn require_message(&self) -> Res<String> {
        self.response
            .message
            .clone()
            .ok_or_else(|| anyhow!("rule `{}` has no message for action `{}`", self.id, self.response.action))
    }
}

/// Partial update for a stored rule; unset fields are left untouched and
/// `updated_at` is refreshed by the store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RulePatch {
    pub is_active: Option<bool>,
    pub to_notify: Option<bool>,
}

/// Closed action variant the dispatcher executes, each case carrying exactly
/// what it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SendDm { message: String },
    SendChannel { message: String },
    Delete,
    Edit { command: String },
}

// Conversation state.

/// Pending clarification for one user; at most one exists at a time.
///
/// Presence of the record *is* the clarification step: clearing it is a
/// single delete, which keeps the fields atomic structurally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    /// The original raw request awaiting resolution.
    pub pending_command: String,
    /// Outstanding clarification questions, in the order they were asked.
    pub pending_questions: Vec<String>,
    /// Thread where the questions were posted; only replies there are
    /// treated as answers.
    pub thread_ts: String,
}

// Message views.

/// Platform-neutral view of an incoming message, as consumed by the
/// authoring and dispatch engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub channel: String,
    pub ts: String,
    pub user: String,
    pub text: String,
    pub thread_ts: Option<String>,
}

impl IncomingMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            channel: self.channel.clone(),
            ts: self.ts.clone(),
        }
    }
}

/// Handle to a posted message, sufficient to thread under, edit, or delete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub channel: String,
    pub ts: String,
}

// Typed LLM responses, one shape per prompt kind.

/// Response to the valid-command (feasibility) prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct FeasibilityCheck {
    #[serde(rename = "workflow_identification_valid")]
    pub valid: bool,
    pub response: String,
}

/// Response to the reasoning (ambiguity) prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct AmbiguityCheck {
    pub requires_clarification: bool,
    #[serde(default)]
    pub questions: Vec<String>,
}

/// Raw response to the answer-identification prompt; use [`Self::outcome`]
/// to normalize it.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerIdentification {
    #[serde(rename = "answer_identification_valid")]
    pub valid: bool,
    pub response: Option<AnswerSet>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerSet {
    pub questions: Vec<String>,
    pub answers: Vec<String>,
}

/// Normalized outcome of an answer-identification turn.
#[derive(Debug, Clone)]
pub enum AnswerOutcome {
    /// All questions answered; carries the resolved question/answer pairs.
    Resolved(AnswerSet),
    /// Something is missing; carries the guidance text to relay, if any.
    Retry(Option<String>),
}

impl AnswerIdentification {
    pub fn outcome(self) -> Res<AnswerOutcome> {
        if !self.valid {
            return Ok(AnswerOutcome::Retry(self.message));
        }

        let answers = self
            .response
            .ok_or_else(|| anyhow!("answer identification was valid but carried no question/answer mapping"))?;

        Ok(AnswerOutcome::Resolved(answers))
    }
}

/// Response to the structured-parsing prompt: the trigger/response halves of
/// a rule-to-be.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParsedRule {
    pub trigger: Trigger,
    pub response: ResponseSpec,
}

impl ParsedRule {
    /// Normalize and validate a fresh parse: blank scopes become wildcards,
    /// `delete-message` drops any message, and every other action must carry
    /// one.  A blank condition is rejected.
    pub fn validated(mut self) -> Res<Self> {
        self.trigger.user = self.trigger.user.filter(|u| !u.trim().is_empty());
        self.trigger.channel = self.trigger.channel.filter(|c| !c.trim().is_empty());

        if self.trigger.condition.trim().is_empty() {
            bail!("parsed rule has an empty trigger condition");
        }

        match self.response.action {
            ActionKind::DeleteMessage => self.response.message = None,
            _ => {
                if self.response.message.as_deref().is_none_or(|m| m.trim().is_empty()) {
                    bail!("parsed rule has no message for action `{}`", self.response.action);
                }
            }
        }

        Ok(self)
    }
}

/// Response to the condition-check prompt.  Confidence is an integer
/// percentage; the dispatcher compares it against its fixed threshold.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConditionCheck {
    pub condition_met: bool,
    pub confidence: u8,
}

// Parse boundary.

/// Parse an LLM response expected to be JSON, tolerating the markdown code
/// fences some models wrap their output in.
pub fn parse_llm_json<T: DeserializeOwned>(raw: &str) -> Res<T> {
    let cleaned = strip_code_fences(raw);

    serde_json::from_str(cleaned).with_context(|| format!("malformed LLM response: {raw}"))
}

/// Clean up a plain-text completion: unfence and trim.
pub fn clean_completion(raw: &str) -> String {
    strip_code_fences(raw).to_string()
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();

    let inner = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.strip_suffix("```").unwrap_or(rest)
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.strip_suffix("```").unwrap_or(rest)
    } else {
        trimmed
    };

    inner.trim()
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(action: ActionKind, message: Option<&str>) -> ParsedRule {
        ParsedRule {
            trigger: Trigger {
                user: Some("@sam".to_string()),
                channel: Some("#general".to_string()),
                condition: "posts welcome messages".to_string(),
            },
            response: ResponseSpec {
                action,
                message: message.map(str::to_string),
            },
        }
    }

    #[test]
    fn action_kind_uses_wire_names() {
        let json = serde_json::to_string(&ActionKind::SendMessageInDm).unwrap();
        assert_eq!(json, "\"send-message-in-dm\"");

        let kind: ActionKind = serde_json::from_str("\"delete-message\"").unwrap();
        assert_eq!(kind, ActionKind::DeleteMessage);

        assert_eq!("edit-message".parse::<ActionKind>().unwrap(), ActionKind::EditMessage);
        assert!("pin-message".parse::<ActionKind>().is_err());
    }

    #[test]
    fn validated_drops_message_for_delete() {
        let rule = parsed(ActionKind::DeleteMessage, Some("N/A")).validated().unwrap();
        assert_eq!(rule.response.message, None);
    }

    #[test]
    fn validated_requires_message_for_sends_and_edits() {
        assert!(parsed(ActionKind::SendMessageInDm, None).validated().is_err());
        assert!(parsed(ActionKind::SendMessageInChannel, Some("  ")).validated().is_err());
        assert!(parsed(ActionKind::EditMessage, None).validated().is_err());
        assert!(parsed(ActionKind::SendMessageInDm, Some("hi")).validated().is_ok());
    }

    #[test]
    fn validated_rejects_blank_condition() {
        let mut p = parsed(ActionKind::SendMessageInDm, Some("hi"));
        p.trigger.condition = "   ".to_string();
        assert!(p.validated().is_err());
    }

    #[test]
    fn validated_turns_blank_scopes_into_wildcards() {
        let mut p = parsed(ActionKind::SendMessageInDm, Some("hi"));
        p.trigger.user = Some("".to_string());
        p.trigger.channel = Some("  ".to_string());

        let p = p.validated().unwrap();
        assert_eq!(p.trigger.user, None);
        assert_eq!(p.trigger.channel, None);
    }

    #[test]
    fn rule_action_carries_exactly_what_it_needs() {
        let rule = AutomationRule::new("cmd", "u1", true, parsed(ActionKind::SendMessageInDm, Some("hi")));
        assert_eq!(rule.action().unwrap(), Action::SendDm { message: "hi".to_string() });

        let rule = AutomationRule::new("cmd", "u1", true, parsed(ActionKind::DeleteMessage, None));
        assert_eq!(rule.action().unwrap(), Action::Delete);

        let rule = AutomationRule::new("edit typos", "u1", true, parsed(ActionKind::EditMessage, Some("fixed")));
        assert_eq!(rule.action().unwrap(), Action::Edit { command: "edit typos".to_string() });
    }

    #[test]
    fn rule_action_rejects_edit_for_form_rules() {
        let rule = AutomationRule::new("cmd", "u1", false, parsed(ActionKind::EditMessage, Some("fixed")));
        assert!(rule.action().is_err());
    }

    #[test]
    fn rule_action_rejects_missing_send_message() {
        let mut rule = AutomationRule::new("cmd", "u1", true, parsed(ActionKind::SendMessageInDm, Some("hi")));
        rule.response.message = None;
        assert!(rule.action().is_err());
    }

    #[test]
    fn rule_ids_are_unique() {
        let a = AutomationRule::new("a", "u1", true, parsed(ActionKind::SendMessageInDm, Some("hi")));
        let b = AutomationRule::new("b", "u1", true, parsed(ActionKind::SendMessageInDm, Some("hi")));
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("workflow_"));
    }

    #[test]
    fn parse_llm_json_handles_fenced_output() {
        let bare = r#"{"condition_met": true, "confidence": 95}"#;
        let fenced = format!("```json\n{bare}\n```");
        let generic = format!("```\n{bare}\n```");

        for raw in [bare.to_string(), fenced, generic] {
            let check: ConditionCheck = parse_llm_json(&raw).unwrap();
            assert!(check.condition_met);
            assert_eq!(check.confidence, 95);
        }
    }

    #[test]
    fn parse_llm_json_rejects_prose() {
        let result: Res<ConditionCheck> = parse_llm_json("Sure! The condition is met.");
        assert!(result.is_err());
    }

    #[test]
    fn answer_outcome_normalizes_both_shapes() {
        let valid: AnswerIdentification = parse_llm_json(
            r#"{"answer_identification_valid": true, "response": {"questions": ["Who?"], "answers": ["@sam"]}}"#,
        )
        .unwrap();
        match valid.outcome().unwrap() {
            AnswerOutcome::Resolved(set) => {
                assert_eq!(set.questions, vec!["Who?"]);
                assert_eq!(set.answers, vec!["@sam"]);
            }
            other => panic!("expected resolved outcome, got {other:?}"),
        }

        let retry: AnswerIdentification =
            parse_llm_json(r#"{"answer_identification_valid": false, "message": "Almost there!"}"#).unwrap();
        match retry.outcome().unwrap() {
            AnswerOutcome::Retry(Some(guidance)) => assert_eq!(guidance, "Almost there!"),
            other => panic!("expected retry outcome, got {other:?}"),
        }

        let malformed: AnswerIdentification = parse_llm_json(r#"{"answer_identification_valid": true}"#).unwrap();
        assert!(malformed.outcome().is_err());
    }
}
