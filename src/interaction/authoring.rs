//! The workflow authoring conversation.
//!
//! A direct message to the bot describes an automation in natural language.
//! The request is screened, validated, and checked for ambiguity; ambiguous
//! requests get clarifying questions in a thread, and the answers are folded
//! back into an unambiguous command before the rule is parsed and stored.
//!
//! Clarification state is a single slot per user.  Only replies in the thread
//! where the questions were posted count as answers; a new top-level request
//! abandons the pending clarification and starts over.

use tracing::{Instrument, error, info, instrument, warn};

use crate::{
    base::types::{ActionKind, AnswerOutcome, AutomationRule, ConversationState, IncomingMessage, Void},
    service::{chat::ChatClient, db::DbClient, llm::LlmClient},
};

// Fixed reply texts.

const CONTINUE_IN_THREAD_MESSAGE: &str = "For the current command, please continue the conversation in this thread. \nTo create a new command, start a new message - do not reply in this thread.";

const SUCCESS_MESSAGE: &str = "_Success! The Chat Automation workflow has been created._ \n_For more details, please open the thread._";

const RETRY_ANSWERS_MESSAGE: &str = "Please answer all the questions again";

const REQUEST_REJECTED_MESSAGE: &str = "_Sorry, this request cannot be processed. Please describe the automation you would like to create._";

#[instrument(skip_all)]
pub fn handle_authoring(message: IncomingMessage, db: DbClient, llm: LlmClient, chat: ChatClient) {
    tokio::spawn(async move {
        // Process the event.
        let result = handle_authoring_internal(message, &db, &llm, &chat).in_current_span().await;

        // Log any errors.
        if let Err(err) = &result {
            error!("Error while handling: {}", err);
        }
    });
}

#[instrument(skip_all)]
pub async fn handle_authoring_internal(message: IncomingMessage, db: &DbClient, llm: &LlmClient, chat: &ChatClient) -> Void {
    if message.text.trim().is_empty() {
        return Ok(());
    }

    let state = db.get_conversation_state(&message.user).await?;

    match state {
        // A reply in the clarification thread carries the answers.
        Some(state) if message.thread_ts.as_deref() == Some(state.thread_ts.as_str()) => process_answers(&message, state, db, llm, chat).await,

        // Replies anywhere else are not authoring turns.
        _ if message.thread_ts.is_some() => Ok(()),

        // A new top-level request abandons the pending clarification.
        Some(_) => {
            info!("Clearing a stale clarification for `{}`.", message.user);

            db.clear_conversation_state(&message.user).await?;

            process_new_request(&message, db, llm, chat).await
        }

        None => process_new_request(&message, db, llm, chat).await,
    }
}

/// Run a fresh request through screening, validation, and ambiguity checks,
/// ending in either a stored rule or a clarification thread.
async fn process_new_request(message: &IncomingMessage, db: &DbClient, llm: &LlmClient, chat: &ChatClient) -> Void {
    // Screen the raw text before spending any further completions on it.  An
    // unreadable verdict counts as a rejection.
    let flagged = match llm.screen_injection(&message.text).await {
        Ok(flagged) => flagged,
        Err(err) => {
            warn!("Injection screen failed, rejecting the request: {}", err);
            true
        }
    };

    if flagged {
        warn!("Rejected a request from `{}` that looks like prompt injection.", message.user);

        chat.send_direct(&message.user, REQUEST_REJECTED_MESSAGE).await?;

        return Ok(());
    }

    // Can this request become a workflow at all?
    let feasibility = llm.check_feasibility(&message.text).await?;

    if !feasibility.valid {
        chat.send_direct(&message.user, &feasibility.response).await?;

        return Ok(());
    }

    // Does it need clarification first?
    let ambiguity = llm.assess_ambiguity(&message.text).await?;

    if ambiguity.requires_clarification && !ambiguity.questions.is_empty() {
        let notice = chat.send_direct(&message.user, CONTINUE_IN_THREAD_MESSAGE).await?;

        chat.send_in_thread(&notice.channel, &notice.ts, &ambiguity.questions.join("\n")).await?;

        let state = ConversationState {
            pending_command: message.text.clone(),
            pending_questions: ambiguity.questions,
            thread_ts: notice.ts,
        };

        db.set_conversation_state(&message.user, &state).await?;

        info!("Waiting on clarification from `{}`.", message.user);

        return Ok(());
    }

    // Unambiguous requests parse directly.
    let parsed = llm.parse_rule(&message.text).await?;
    let rule = AutomationRule::new(message.text.clone(), message.user.clone(), true, parsed);

    db.create_rule(&rule).await?;

    info!("Created rule `{}` from a direct request.", rule.id);

    let notice = chat.send_direct(&message.user, SUCCESS_MESSAGE).await?;

    chat.send_in_thread(&notice.channel, &notice.ts, &format_rule_details(&rule)).await?;

    Ok(())
}

/// Fold a clarification reply back into the pending request.
async fn process_answers(message: &IncomingMessage, state: ConversationState, db: &DbClient, llm: &LlmClient, chat: &ChatClient) -> Void {
    let identification = llm.identify_answers(&state.pending_questions, &message.text).await?;

    match identification.outcome()? {
        AnswerOutcome::Retry(guidance) => {
            let text = guidance.unwrap_or_else(|| RETRY_ANSWERS_MESSAGE.to_string());

            // The pending state stays put so the user can try again.
            chat.send_in_thread(&message.channel, &state.thread_ts, &text).await?;

            Ok(())
        }
        AnswerOutcome::Resolved(answers) => {
            let command = llm.synthesize_command(&state.pending_command, &answers.questions, &answers.answers).await?;
            let parsed = llm.parse_rule(&command).await?;
            let rule = AutomationRule::new(command, message.user.clone(), true, parsed);

            db.create_rule(&rule).await?;
            db.clear_conversation_state(&message.user).await?;

            info!("Created rule `{}` after clarification.", rule.id);

            chat.send_in_thread(&message.channel, &state.thread_ts, SUCCESS_MESSAGE).await?;
            chat.send_in_thread(&message.channel, &state.thread_ts, &format_rule_details(&rule)).await?;

            Ok(())
        }
    }
}

/// Human-readable summary of a stored rule, threaded under the confirmation.
fn format_rule_details(rule: &AutomationRule) -> String {
    let user = rule.trigger.user.as_deref().unwrap_or("anyone");
    let channel = rule.trigger.channel.as_deref().unwrap_or("any channel");
    let condition = &rule.trigger.condition;
    let action = rule.response.action.as_str();
    let message = rule.response.message.as_deref().unwrap_or("");

    let mut description = String::from("Whenever ");

    if user == "anyone" {
        description.push_str("a message is posted");
    } else {
        description.push_str(&format!("{user} posts a message"));
    }

    description.push_str(&format!(" that matches the condition \"{condition}\""));

    if channel != "any channel" {
        description.push_str(&format!(" in {channel}"));
    }

    match rule.response.action {
        ActionKind::SendMessageInDm => description.push_str(&format!(", immediately send them a direct message saying: \"{message}\"")),
        ActionKind::SendMessageInChannel => description.push_str(&format!(", immediately post a message in {channel} saying: \"{message}\"")),
        ActionKind::DeleteMessage => description.push_str(", delete that message immediately."),
        ActionKind::EditMessage => description.push_str(&format!(", immediately edit the message with:\n\n\"{message}\"")),
    }

    let mut breakdown = format!("Here's how it works:\n👀 Who we're watching: {user}\n📍 Where: {channel}\n🎯 Condition: {condition}\n⚙️ Action: {action}");

    if !message.is_empty() {
        breakdown.push_str(&format!("\n📝 Message: \"{message}\""));
    }

    format!("🚀 Your Workflow is Ready!\n\n{description}\n\n{breakdown}")
}

// Tests.
