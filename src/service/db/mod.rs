pub mod surreal;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{AutomationRule, ConversationState, Res, RulePatch, Void};

// Traits.

/// Generic database client trait that clients must implement.
///
/// This trait defines the core functionality for storing and retrieving
/// automation rules and per-user conversation state.  Implementing this
/// trait allows different database backends to be used with the
/// automation-bot.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Persist a freshly created rule.  Fails if a rule with the same id
    /// already exists.
    async fn create_rule(&self, rule: &AutomationRule) -> Void;

    /// Get a rule by id.
    async fn get_rule(&self, id: &str) -> Res<Option<AutomationRule>>;

    /// Get every stored rule, active or not.
    async fn get_all_rules(&self) -> Res<Vec<AutomationRule>>;

    /// Apply a partial update to a rule, refreshing `updated_at`.  Returns
    /// the updated rule, or `None` if no rule with that id exists.
    async fn update_rule(&self, id: &str, patch: RulePatch) -> Res<Option<AutomationRule>>;

    /// Delete a rule, returning the deleted rule, or `None` if absent.
    async fn delete_rule(&self, id: &str) -> Res<Option<AutomationRule>>;

    /// Get the pending clarification state for a user, if any.
    async fn get_conversation_state(&self, user_id: &str) -> Res<Option<ConversationState>>;

    /// Set or replace the pending clarification state for a user.  One slot
    /// per user: a newer authoring request overwrites the older state.
    async fn set_conversation_state(&self, user_id: &str, state: &ConversationState) -> Void;

    /// Clear the pending clarification state for a user.  Clearing an absent
    /// state is a no-op.
    async fn clear_conversation_state(&self, user_id: &str) -> Void;
}

// Structs.

/// Database client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DbClient {
    pub inner: Arc<dyn GenericDbClient>,
}

impl Deref for DbClient {
    type Target = dyn GenericDbClient;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

// Query helpers layered over the raw contract.

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self { inner }
    }

    /// Rules a given user created, oldest first, split further by the
    /// management command.
    pub async fn get_rules_created_by(&self, user_id: &str) -> Res<Vec<AutomationRule>> {
        let mut rules: Vec<_> = self.get_all_rules().await?.into_iter().filter(|rule| rule.created_by == user_id).collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(rules)
    }
}
