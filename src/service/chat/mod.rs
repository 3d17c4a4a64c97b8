pub mod slack;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{MessageRef, Res, Void};

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the core functionality for interacting with chat platforms
/// like Slack. Implementing this trait allows different chat services to be used
/// with the automation-bot.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Get the bot user ID.
    ///
    /// Returns the unique identifier for the bot in the chat platform,
    /// which is used to ignore the bot's own messages and detect mentions.
    fn bot_user_id(&self) -> &str;

    /// Start the chat client listener.
    ///
    /// This sets up event listeners for the chat platform and begins processing
    /// incoming messages and events.
    async fn start(&self) -> Void;

    /// Send a direct message to a user.
    ///
    /// Returns where the message landed so follow-ups can thread under it.
    async fn send_direct(&self, user_id: &str, text: &str) -> Res<MessageRef>;

    /// Post a message to a channel.
    async fn send_in_channel(&self, channel_id: &str, text: &str) -> Res<MessageRef>;

    /// Post a reply into an existing thread.
    async fn send_in_thread(&self, channel_id: &str, thread_ts: &str, text: &str) -> Res<MessageRef>;

    /// Delete a message.
    ///
    /// Returns whether the platform accepted the call.  A rejected call is
    /// `Ok(false)`, not an error, since rule processing continues either way.
    async fn delete_message(&self, channel_id: &str, ts: &str) -> Res<bool>;

    /// Replace the text of an existing message.
    ///
    /// Same result contract as [`GenericChatClient::delete_message`].
    async fn edit_message(&self, channel_id: &str, ts: &str, text: &str) -> Res<bool>;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
