//! Rule matching and dispatch for channel messages.
//!
//! Every channel message is checked against the stored rules.  Form-authored
//! rules match on a literal substring of the message text; conversationally
//! authored rules ask the model whether the message satisfies the rule's
//! condition and only fire above a fixed confidence.

use tracing::{Instrument, debug, error, info, instrument};

use crate::{
    base::types::{Action, AutomationRule, IncomingMessage, Res, Void},
    service::{chat::ChatClient, db::DbClient, llm::LlmClient},
};

/// Minimum confidence before a model-evaluated condition is allowed to fire.
pub const CONFIDENCE_THRESHOLD: u8 = 75;

#[instrument(skip_all)]
pub fn handle_dispatch(message: IncomingMessage, db: DbClient, llm: LlmClient, chat: ChatClient) {
    tokio::spawn(async move {
        // Process the event.
        let result = handle_dispatch_internal(message, &db, &llm, &chat).in_current_span().await;

        // Log any errors.
        if let Err(err) = &result {
            error!("Error while handling: {}", err);
        }
    });
}

#[instrument(skip_all)]
pub async fn handle_dispatch_internal(message: IncomingMessage, db: &DbClient, llm: &LlmClient, chat: &ChatClient) -> Void {
    // The bot never reacts to itself.
    if message.user == chat.bot_user_id() {
        return Ok(());
    }

    let rules = db.get_all_rules().await?;
    let candidates = candidate_rules(rules, &message.user, &message.channel);

    info!("Evaluating {} candidate rules.", candidates.len());

    for rule in candidates {
        // A malformed condition verdict aborts the whole turn; an action
        // failure only skips this rule.
        if !rule_fires(&rule, &message, llm).await? {
            continue;
        }

        info!("Rule `{}` fired for message `{}`.", rule.id, message.ts);

        let deleted = match execute_rule(&rule, &message, llm, chat).await {
            Ok(deleted) => deleted,
            Err(err) => {
                error!("Action for rule `{}` failed: {}", rule.id, err);
                continue;
            }
        };

        if rule.to_notify {
            let notice = format!("Automation Workflow triggered for command: \n{}", rule.command);

            if let Err(err) = chat.send_direct(&rule.created_by, &notice).await {
                error!("Failed to notify `{}` for rule `{}`: {}", rule.created_by, rule.id, err);
            }
        }

        // The message is gone, so the remaining candidates have nothing to
        // act on.
        if deleted {
            debug!("Message `{}` was deleted, skipping the remaining candidates.", message.ts);
            break;
        }
    }

    Ok(())
}

/// Select the rules a message could fire, in retrieval order.
///
/// Inactive rules never qualify.  A rule with both scopes set must match the
/// sender and the channel; a rule with open scopes must match every scope it
/// does carry.  Scope comparison ignores `@`/`#` prefixes and case, since the
/// authoring paths store both bare and prefixed names.
pub fn candidate_rules(rules: Vec<AutomationRule>, user: &str, channel: &str) -> Vec<AutomationRule> {
    rules
        .into_iter()
        .filter(|rule| {
            if !rule.is_active {
                return false;
            }

            match (&rule.trigger.user, &rule.trigger.channel) {
                (Some(u), Some(c)) => scope_matches(u, user) && scope_matches(c, channel),
                (Some(u), None) => scope_matches(u, user),
                (None, Some(c)) => scope_matches(c, channel),
                (None, None) => true,
            }
        })
        .collect()
}

fn scope_matches(scope: &str, value: &str) -> bool {
    normalize_scope(scope) == normalize_scope(value)
}

fn normalize_scope(value: &str) -> String {
    value.trim().trim_start_matches(['@', '#']).to_lowercase()
}

/// Decide whether a rule's condition matches the message text.
async fn rule_fires(rule: &AutomationRule, message: &IncomingMessage, llm: &LlmClient) -> Res<bool> {
    // Form-authored rules match on a literal, case-sensitive substring.
    if !rule.used_llm {
        return Ok(message.text.contains(&rule.trigger.condition));
    }

    let check = llm.check_condition(&message.text, &rule.trigger.condition).await?;

    if check.condition_met && check.confidence < CONFIDENCE_THRESHOLD {
        info!("Condition met for rule `{}` but confidence {} is below the threshold.", rule.id, check.confidence);
    }

    Ok(check.condition_met && check.confidence >= CONFIDENCE_THRESHOLD)
}

/// Run the rule's action against the triggering message.
///
/// Returns whether the triggering message was actually deleted.
async fn execute_rule(rule: &AutomationRule, message: &IncomingMessage, llm: &LlmClient, chat: &ChatClient) -> Res<bool> {
    match rule.action()? {
        Action::SendDm { message: text } => {
            chat.send_direct(&message.user, &text).await?;
        }
        Action::SendChannel { message: text } => {
            chat.send_in_channel(&message.channel, &text).await?;
        }
        Action::Delete => {
            let deleted = chat.delete_message(&message.channel, &message.ts).await?;

            return Ok(deleted);
        }
        Action::Edit { command } => {
            let rewrite = llm.rewrite_message(&command, &message.text).await?;

            if rewrite.is_empty() {
                info!("Rewrite for rule `{}` came back empty, leaving the message alone.", rule.id);
            } else {
                chat.edit_message(&message.channel, &message.ts, &rewrite).await?;
            }
        }
    }

    Ok(false)
}

// Tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        base::types::{ActionKind, ParsedRule, ResponseSpec, Trigger},
        service::llm::{GenericLlmClient, LlmClient},
    };

    struct StubLlm {
        reply: &'static str,
    }

    #[async_trait]
    impl GenericLlmClient for StubLlm {
        async fn complete(&self, _prompt: &str) -> Res<String> {
            Ok(self.reply.to_string())
        }
    }

    fn llm(reply: &'static str) -> LlmClient {
        LlmClient::new(Arc::new(StubLlm { reply }))
    }

    fn rule(user: Option<&str>, channel: Option<&str>, condition: &str, used_llm: bool) -> AutomationRule {
        let parsed = ParsedRule {
            trigger: Trigger {
                user: user.map(str::to_string),
                channel: channel.map(str::to_string),
                condition: condition.to_string(),
            },
            response: ResponseSpec {
                action: ActionKind::SendMessageInChannel,
                message: Some("on it".to_string()),
            },
        };

        AutomationRule::new("When something happens, reply.", "creator_1", used_llm, parsed)
    }

    fn message(user: &str, channel: &str, text: &str) -> IncomingMessage {
        IncomingMessage {
            channel: channel.to_string(),
            ts: "1700000000.000100".to_string(),
            user: user.to_string(),
            text: text.to_string(),
            thread_ts: None,
        }
    }

    #[test]
    fn fully_scoped_rules_need_both_scopes_to_match() {
        let rules = vec![rule(Some("@sam"), Some("#general"), "hello", false)];

        assert_eq!(candidate_rules(rules.clone(), "sam", "general").len(), 1);
        assert_eq!(candidate_rules(rules.clone(), "sam", "random").len(), 0);
        assert_eq!(candidate_rules(rules, "alex", "general").len(), 0);
    }

    #[test]
    fn open_scopes_match_anything_on_that_dimension() {
        let user_only = vec![rule(Some("sam"), None, "hello", false)];
        let channel_only = vec![rule(None, Some("general"), "hello", false)];
        let unscoped = vec![rule(None, None, "hello", false)];

        assert_eq!(candidate_rules(user_only.clone(), "sam", "anywhere").len(), 1);
        assert_eq!(candidate_rules(user_only, "alex", "anywhere").len(), 0);
        assert_eq!(candidate_rules(channel_only.clone(), "anyone", "general").len(), 1);
        assert_eq!(candidate_rules(channel_only, "anyone", "random").len(), 0);
        assert_eq!(candidate_rules(unscoped, "anyone", "anywhere").len(), 1);
    }

    #[test]
    fn scope_comparison_ignores_sigils_and_case() {
        let rules = vec![rule(Some("@Sam"), Some("#General"), "hello", false)];

        assert_eq!(candidate_rules(rules, "sam", "general").len(), 1);
    }

    #[test]
    fn inactive_rules_are_never_candidates() {
        let mut inactive = rule(None, None, "hello", false);
        inactive.is_active = false;

        assert!(candidate_rules(vec![inactive], "sam", "general").is_empty());
    }

    #[test]
    fn each_matching_rule_appears_once() {
        let rules = vec![
            rule(Some("sam"), Some("general"), "a", false),
            rule(Some("sam"), None, "b", false),
            rule(None, None, "c", false),
        ];

        let candidates = candidate_rules(rules, "sam", "general");

        assert_eq!(candidates.len(), 3);
        let conditions: Vec<_> = candidates.iter().map(|r| r.trigger.condition.as_str()).collect();
        assert_eq!(conditions, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn literal_matching_is_case_sensitive_substring() {
        let llm = llm("unused");
        let form_rule = rule(None, None, "deadline", false);

        assert!(rule_fires(&form_rule, &message("u", "c", "the deadline is near"), &llm).await.unwrap());
        assert!(!rule_fires(&form_rule, &message("u", "c", "the Deadline is near"), &llm).await.unwrap());
    }

    #[tokio::test]
    async fn model_conditions_fire_only_at_or_above_the_confidence_threshold() {
        let chat_rule = rule(None, None, "someone asks about deadlines", true);

        let high = llm(r#"{"condition_met": true, "confidence": 80}"#);
        let exact = llm(r#"{"condition_met": true, "confidence": 75}"#);
        let low = llm(r#"{"condition_met": true, "confidence": 74}"#);
        let unmet = llm(r#"{"condition_met": false, "confidence": 99}"#);

        let msg = message("u", "c", "when is the deadline?");

        assert!(rule_fires(&chat_rule, &msg, &high).await.unwrap());
        assert!(rule_fires(&chat_rule, &msg, &exact).await.unwrap());
        assert!(!rule_fires(&chat_rule, &msg, &low).await.unwrap());
        assert!(!rule_fires(&chat_rule, &msg, &unmet).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_condition_verdicts_are_errors() {
        let chat_rule = rule(None, None, "anything", true);
        let llm = llm("not json at all");

        assert!(rule_fires(&chat_rule, &message("u", "c", "hi"), &llm).await.is_err());
    }
}
