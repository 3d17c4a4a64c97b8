//! Slash command surface for managing stored rules.
//!
//! The Slack layer hands over the command text and echoes whatever reply
//! comes back.  `create` is the structured alternative to the conversational
//! authoring path: fully specified rules that match on a literal phrase.

use anyhow::bail;
use tracing::{info, instrument};

use crate::{
    base::types::{ActionKind, AutomationRule, ParsedRule, Res, ResponseSpec, RulePatch, Trigger},
    service::db::DbClient,
};

// Fixed reply texts.

const USAGE_MESSAGE: &str = "Please provide filter eg: ping, list, delete <id>";

const CREATE_USAGE_MESSAGE: &str =
    "Usage: create user=<name|*> channel=<name|*> condition=\"<phrase>\" action=<send-message-in-dm|send-message-in-channel|delete-message> [message=\"<text>\"]";

const WORKFLOW_NOT_FOUND_CHAT: &str = "_No automation workflows found that were created using Chat. Please create a workflow using Chat first._";

const WORKFLOW_NOT_FOUND_FORM: &str = "_No automation workflows found that were created using the create command. Please create a workflow with `create` first._";

/// Run one management command and return the reply text.
#[instrument(skip_all)]
pub async fn handle_admin_command(user_id: &str, text: &str, db: &DbClient) -> Res<String> {
    let trimmed = text.trim();

    let (subcommand, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, tail)) => (head.to_lowercase(), tail.trim()),
        None => (trimmed.to_lowercase(), ""),
    };

    match subcommand.as_str() {
        "list" => list_rules(user_id, db).await,
        "delete" => delete_rule(rest, db).await,
        "enable" => set_active(rest, true, db).await,
        "disable" => set_active(rest, false, db).await,
        "notification" => set_notification(rest, db).await,
        "create" => create_rule(user_id, rest, db).await,
        "ping" => Ok(ping_message(user_id)),
        _ => Ok(USAGE_MESSAGE.to_string()),
    }
}

/// The caller's rules, grouped by how they were authored.
async fn list_rules(user_id: &str, db: &DbClient) -> Res<String> {
    let rules = db.get_rules_created_by(user_id).await?;

    let (chat_authored, form_authored): (Vec<_>, Vec<_>) = rules.into_iter().partition(|rule| rule.used_llm);

    let chat_section = if chat_authored.is_empty() { WORKFLOW_NOT_FOUND_CHAT.to_string() } else { rule_lines(&chat_authored) };
    let form_section = if form_authored.is_empty() { WORKFLOW_NOT_FOUND_FORM.to_string() } else { rule_lines(&form_authored) };

    Ok(format!("Created using chat: \n{chat_section}\n\nCreated using the create command: \n{form_section}"))
}

fn rule_lines(rules: &[AutomationRule]) -> String {
    rules
        .iter()
        .enumerate()
        .map(|(index, rule)| {
            format!(
                "{}. *Id*: {}\n*Command*: {}\n*Notification*: {}\n*Active Status*: {}\n",
                index + 1,
                rule.id,
                rule.command,
                if rule.to_notify { "ON" } else { "OFF" },
                if rule.is_active { "Enabled" } else { "Disabled" },
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn delete_rule(id: &str, db: &DbClient) -> Res<String> {
    if id.is_empty() {
        return Ok(USAGE_MESSAGE.to_string());
    }

    match db.delete_rule(id).await? {
        Some(rule) => {
            info!("Deleted rule `{}`.", rule.id);

            Ok(format!("Deleted the workflow with id {}", rule.id))
        }
        None => Ok(format!("No workflow found with id {id}")),
    }
}

async fn set_active(id: &str, active: bool, db: &DbClient) -> Res<String> {
    if id.is_empty() {
        return Ok(USAGE_MESSAGE.to_string());
    }

    let patch = RulePatch {
        is_active: Some(active),
        ..Default::default()
    };

    match db.update_rule(id, patch).await? {
        Some(rule) => Ok(format!("Automation workflow with id: {} is now {}.", rule.id, if active { "enabled" } else { "disabled" })),
        None => Ok(format!("No workflow found with id {id}")),
    }
}

/// `notification on <id>` / `notification off <id>`.
async fn set_notification(arguments: &str, db: &DbClient) -> Res<String> {
    let Some((setting, id)) = arguments.split_once(char::is_whitespace) else {
        return Ok(USAGE_MESSAGE.to_string());
    };

    let enabled = match setting.to_lowercase().as_str() {
        "on" => true,
        "off" => false,
        _ => return Ok(USAGE_MESSAGE.to_string()),
    };

    let id = id.trim();

    if id.is_empty() {
        return Ok(USAGE_MESSAGE.to_string());
    }

    let patch = RulePatch {
        to_notify: Some(enabled),
        ..Default::default()
    };

    match db.update_rule(id, patch).await? {
        Some(rule) => Ok(format!("Notification config updated to '{}' for workflow with id: {}", if enabled { "ON" } else { "OFF" }, rule.id)),
        None => Ok(format!("No workflow found with id {id}")),
    }
}

/// The structured creation path: every part of the rule is spelled out and
/// the condition matches as a literal phrase.
async fn create_rule(user_id: &str, arguments: &str, db: &DbClient) -> Res<String> {
    let mut user = None;
    let mut channel = None;
    let mut condition = None;
    let mut action = None;
    let mut message = None;

    for (key, value) in parse_arguments(arguments)? {
        match key.as_str() {
            "user" => user = Some(value),
            "channel" => channel = Some(value),
            "condition" => condition = Some(value),
            "action" => action = Some(value),
            "message" => message = Some(value),
            other => bail!("unknown argument `{other}`"),
        }
    }

    let (Some(user), Some(channel), Some(condition), Some(action)) = (user, channel, condition, action) else {
        return Ok(CREATE_USAGE_MESSAGE.to_string());
    };

    let action: ActionKind = action.parse()?;

    if action == ActionKind::EditMessage {
        return Ok("The edit-message action is only available to workflows created through chat.".to_string());
    }

    // `*` leaves a scope open; sigils are stripped so the sentence can add
    // its own.
    let user = open_scope(&user);
    let channel = open_scope(&channel);

    let parsed = ParsedRule {
        trigger: Trigger {
            user: user.clone(),
            channel: channel.clone(),
            condition,
        },
        response: ResponseSpec { action, message },
    };

    let parsed = match parsed.validated() {
        Ok(parsed) => parsed,
        Err(err) => return Ok(err.to_string()),
    };

    let sentence = command_sentence(&parsed);
    let rule = AutomationRule::new(sentence, user_id, false, parsed);

    db.create_rule(&rule).await?;

    info!("Created rule `{}` from the create command.", rule.id);

    Ok(format!("_Success! The Chat Automation workflow has been created._\nAutomation command: \n{}", rule.command))
}

fn open_scope(value: &str) -> Option<String> {
    let bare = value.trim().trim_start_matches(['@', '#']);

    if bare.is_empty() || bare == "*" { None } else { Some(bare.to_string()) }
}

/// The canonical sentence stored as the rule's command.
fn command_sentence(parsed: &ParsedRule) -> String {
    let user_part = match &parsed.trigger.user {
        Some(user) => format!("the user @{user}"),
        None => "any user".to_string(),
    };

    let channel_part = match &parsed.trigger.channel {
        Some(channel) => format!("in the #{channel} channel"),
        None => "in any channel".to_string(),
    };

    let response_part = parsed.response.message.as_deref().unwrap_or("N/A");

    format!(
        "When {user_part} sends a message {channel_part} that includes the phrase \"{}\", then perform the action \"{}\" with response '{response_part}'.",
        parsed.trigger.condition,
        parsed.response.action.as_str(),
    )
}

fn ping_message(user_id: &str) -> String {
    format!(
        "_Hello <@{user_id}>, I can help you create Chat Automation workflows!_\nHere's how it works: \n_\"Whenever @<username> posts any welcome messages in #<channel name>, immediately DM them with a thank-you note.\"_\n_Just describe what you'd like to automate, and I'll take care of the rest!_"
    )
}

/// Parse `key=value` arguments where values may be double-quoted.
fn parse_arguments(input: &str) -> Res<Vec<(String, String)>> {
    let mut arguments = Vec::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else {
            bail!("expected `key=value` near `{rest}`");
        };

        let key = rest[..eq].trim().to_lowercase();

        if key.is_empty() || key.contains(char::is_whitespace) {
            bail!("expected `key=value` near `{rest}`");
        }

        rest = rest[eq + 1..].trim_start();

        let value = if let Some(quoted) = rest.strip_prefix('"') {
            let Some(end) = quoted.find('"') else {
                bail!("unterminated quote in the value of `{key}`");
            };

            let value = quoted[..end].to_string();
            rest = quoted[end + 1..].trim_start();

            value
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let value = rest[..end].to_string();
            rest = rest[end..].trim_start();

            value
        };

        arguments.push((key, value));
    }

    Ok(arguments)
}

// Tests.
