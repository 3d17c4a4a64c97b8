//! Chat service integration for automation-bot.
//!
//! This module routes Slack socket mode traffic into the interaction layer:
//! - Direct messages to the bot drive rule authoring.
//! - Channel messages are evaluated against the stored rules.
//! - Slash commands manage existing rules.
//!
//! It implements the `GenericChatClient` trait for Slack.

use crate::{
    base::{
        config::Config,
        types::{IncomingMessage, MessageRef, Res, Void},
    },
    interaction,
    service::{db::DbClient, llm::LlmClient},
};
use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use slack_morphism::prelude::*;
use tracing::{info, instrument, warn};

use std::{ops::Deref, sync::Arc};

use super::{ChatClient, GenericChatClient};

// Type aliases.

type FullClient = slack_morphism::SlackClient<SlackClientHyperConnector<HttpsConnector<HttpConnector>>>;

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config, db: DbClient, llm: LlmClient) -> Res<Self> {
        let client = SlackChatClient::new(config, db.clone(), llm.clone()).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<SlackChatClient> for ChatClient {
    fn from(client: SlackChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    db: DbClient,
    llm: LlmClient,
    chat: ChatClient,
    bot_user_id: String,
}

/// Slack client implementation.
#[derive(Clone)]
struct SlackChatClient {
    pub app_token: SlackApiToken,
    pub bot_token: SlackApiToken,
    pub bot_user_id: String,
    pub client: Arc<FullClient>,
    pub db: DbClient,
    pub llm: LlmClient,
}

impl Deref for SlackChatClient {
    type Target = slack_morphism::SlackClient<SlackClientHyperConnector<HttpsConnector<HttpConnector>>>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config, db: DbClient, llm: LlmClient) -> Res<Self> {
        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Get the bot's user ID.

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;
        let bot_user_id = bot_user.user_id.0;

        info!("Slack bot user ID: {}", bot_user_id);

        Ok(Self {
            app_token,
            bot_token,
            bot_user_id,
            client,
            db,
            llm,
        })
    }

    /// Post a message, optionally into a thread, and report where it landed.
    ///
    /// Slack accepts a user id as the destination, in which case the message
    /// lands in the app's DM with that user and the response carries the real
    /// DM channel id.
    async fn post(&self, destination: &str, thread_ts: Option<&str>, text: &str) -> Res<MessageRef> {
        let message = SlackMessageContent::new().with_text(text.to_string());

        let mut request = SlackApiChatPostMessageRequest::new(SlackChannelId(destination.to_string()), message)
            .with_as_user(true)
            .with_link_names(true);

        if let Some(thread_ts) = thread_ts {
            request = request.with_thread_ts(SlackTs(thread_ts.to_string()));
        }

        let session = self.client.open_session(&self.bot_token);

        let response = session.chat_post_message(&request).await.map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;

        Ok(MessageRef {
            channel: response.channel.0,
            ts: response.ts.0,
        })
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn start(&self) -> Void {
        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new()
            .with_command_events(handle_command_event)
            .with_interaction_events(handle_interaction_event)
            .with_push_events(handle_push_event);

        // Initialize the socket mode listener environment.

        let listener_environment = Arc::new(SlackClientEventsListenerEnvironment::new(self.client.clone()).with_user_state(SlackUserState {
            db: self.db.clone(),
            llm: self.llm.clone(),
            bot_user_id: self.bot_user_id.clone(),
            chat: ChatClient::from(self.clone()),
        }));

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment.clone(),
            socket_mode_callbacks,
        ));

        // Register an app token to listen for events,
        socket_mode_listener.listen_for(&self.app_token).await?;

        // Start WS connections calling Slack API to get WS url for the token,
        // and wait for Ctrl-C to shutdown.
        // There are also `.start()`/`.shutdown()` available to manage manually
        socket_mode_listener.serve().await;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn send_direct(&self, user_id: &str, text: &str) -> Res<MessageRef> {
        self.post(user_id, None, text).await
    }

    #[instrument(skip(self))]
    async fn send_in_channel(&self, channel_id: &str, text: &str) -> Res<MessageRef> {
        self.post(channel_id, None, text).await
    }

    #[instrument(skip(self))]
    async fn send_in_thread(&self, channel_id: &str, thread_ts: &str, text: &str) -> Res<MessageRef> {
        self.post(channel_id, Some(thread_ts), text).await
    }

    #[instrument(skip(self))]
    async fn delete_message(&self, channel_id: &str, ts: &str) -> Res<bool> {
        let request = SlackApiChatDeleteRequest::new(SlackChannelId(channel_id.to_string()), SlackTs(ts.to_string()));

        let session = self.client.open_session(&self.bot_token);

        match session.chat_delete(&request).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("Failed to delete message `{}` in `{}`: {}", ts, channel_id, e);
                Ok(false)
            }
        }
    }

    #[instrument(skip(self))]
    async fn edit_message(&self, channel_id: &str, ts: &str, text: &str) -> Res<bool> {
        let content = SlackMessageContent::new().with_text(text.to_string());
        let request = SlackApiChatUpdateRequest::new(SlackChannelId(channel_id.to_string()), content, SlackTs(ts.to_string()));

        let session = self.client.open_session(&self.bot_token);

        match session.chat_update(&request).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("Failed to edit message `{}` in `{}`: {}", ts, channel_id, e);
                Ok(false)
            }
        }
    }
}

// Helpers.

/// Extract the fields rule processing needs from a message event.
///
/// Events without a sender, channel, or text (joins, edits, deletions) yield
/// `None` and are skipped.
fn incoming_message(event: &SlackMessageEvent) -> Option<IncomingMessage> {
    let channel = event.origin.channel.as_ref()?.0.clone();
    let user = event.sender.user.as_ref()?.0.clone();
    let text = event.content.as_ref()?.text.as_ref()?.clone();

    Some(IncomingMessage {
        channel,
        ts: event.origin.ts.0.clone(),
        user,
        text,
        thread_ts: event.origin.thread_ts.as_ref().map(|t| t.0.clone()),
    })
}

// Socket mode listener callbacks for Slack.

/// Handles command events from Slack.
async fn handle_command_event(
    event: SlackCommandEvent,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> Result<SlackCommandEventResponse, Box<dyn std::error::Error + Send + Sync>> {
    info!("Received command event ...");

    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    let text = event.text.clone().unwrap_or_default();

    let reply = interaction::admin::handle_admin_command(&event.user_id.0, &text, &user_state.db)
        .await
        .unwrap_or_else(|e| format!("Failed to run `{}`: {}", event.command.0, e));

    Ok(SlackCommandEventResponse::new(SlackMessageContent::new().with_text(reply)))
}

/// Handles interaction events from Slack.
async fn handle_interaction_event(event: SlackInteractionEvent, _client: Arc<SlackHyperClient>, _states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    warn!("[INTERACTION] {:#?}", event);
    Ok(())
}

/// Handles push events from Slack.
#[instrument(skip_all)]
async fn handle_push_event(event_callback: SlackPushEventCallback, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let event = event_callback.event;
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    match event {
        SlackEventCallbackBody::Message(slack_message_event) => {
            // The bot's own posts come back through this event stream.
            if slack_message_event.sender.bot_id.is_some() {
                return Ok(());
            }

            let Some(message) = incoming_message(&slack_message_event) else {
                info!("Skipping message event without a user, channel, or text.");
                return Ok(());
            };

            if message.user == user_state.bot_user_id {
                return Ok(());
            }

            // Mentions arrive a second time as app mention events; those win.
            if message.text.contains(&format!("<@{}>", user_state.bot_user_id)) {
                warn!("Skipping message event because it mentions the bot.");
                return Ok(());
            }

            let is_direct = slack_message_event.origin.channel_type.as_ref().is_some_and(|t| t.0 == "im");

            if is_direct {
                info!("Received authoring message ...");
                interaction::authoring::handle_authoring(message, user_state.db.clone(), user_state.llm.clone(), user_state.chat.clone());
            } else {
                info!("Received channel message ...");
                interaction::dispatch::handle_dispatch(message, user_state.db.clone(), user_state.llm.clone(), user_state.chat.clone());
            }
        }
        SlackEventCallbackBody::AppMention(slack_app_mention_event) => {
            info!("Received app mention event ...");

            let mention = format!("<@{}>", user_state.bot_user_id);
            let text = slack_app_mention_event.content.text.clone().unwrap_or_default().replace(&mention, " ").trim().to_string();

            let message = IncomingMessage {
                channel: slack_app_mention_event.channel.0.clone(),
                ts: slack_app_mention_event.origin.ts.0.clone(),
                user: slack_app_mention_event.user.0.clone(),
                text,
                thread_ts: slack_app_mention_event.origin.thread_ts.clone().map(|t| t.0),
            };

            interaction::authoring::handle_authoring(message, user_state.db.clone(), user_state.llm.clone(), user_state.chat.clone());
        }
        _ => {
            warn!("Received unhandled push event.")
        }
    }

    Ok(())
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn message_event_json(channel_type: &str) -> serde_json::Value {
        serde_json::json!({
            "ts": "1700000000.000100",
            "channel": "C123",
            "channel_type": channel_type,
            "user": "U123",
            "text": "hello there",
        })
    }

    #[test]
    fn message_extraction_keeps_the_routing_fields() {
        let event: SlackMessageEvent = serde_json::from_value(message_event_json("channel")).unwrap();

        let message = incoming_message(&event).unwrap();

        assert_eq!(message.channel, "C123");
        assert_eq!(message.ts, "1700000000.000100");
        assert_eq!(message.user, "U123");
        assert_eq!(message.text, "hello there");
        assert!(message.thread_ts.is_none());
    }

    #[test]
    fn message_extraction_skips_events_without_a_sender() {
        let mut value = message_event_json("channel");
        value.as_object_mut().unwrap().remove("user");

        let event: SlackMessageEvent = serde_json::from_value(value).unwrap();

        assert!(incoming_message(&event).is_none());
    }
}
