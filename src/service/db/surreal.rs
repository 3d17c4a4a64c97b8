//! SurrealDB implementation for automation-bot data storage.

use std::sync::Arc;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::{Connection, Surreal, engine::local::Mem, engine::remote::ws::Ws, opt::auth::Root};
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{AutomationRule, ConversationState, Res, ResponseSpec, RulePatch, Trigger, Void},
};

use super::{DbClient, GenericDbClient};

// Constructors on the cloneable wrapper.

impl DbClient {
    /// Connect to a SurrealDB server over websockets.
    #[instrument(name = "DbClient::surreal", skip_all)]
    pub async fn surreal(config: &Config) -> Res<Self> {
        let db = Surreal::new::<Ws>(&config.db_endpoint).await?;

        // Authenticate with the database using the provided username and password.
        db.signin(Root {
            username: &config.db_username,
            password: &config.db_password,
        })
        .await?;

        let client = SurrealDbClient::init(db).await?;

        Ok(Self::new(Arc::new(client)))
    }

    /// Create an in-memory database instance, primarily for tests.
    pub async fn surreal_memory() -> Res<Self> {
        let db = Surreal::new::<Mem>(()).await?;

        let client = SurrealDbClient::init(db).await?;

        Ok(Self::new(Arc::new(client)))
    }
}

// Structs.

/// SurrealDB-backed [`GenericDbClient`], generic over the connection so the
/// websocket and in-memory engines run the same code path.
pub struct SurrealDbClient<C: Connection> {
    db: Surreal<C>,
}

/// A rule record in the database.
///
/// The record id lives in the `rule` table keyed by the rule's public id, so
/// the struct carries `Option<Thing>` and the public id is recovered on read.
#[derive(Debug, Serialize, Deserialize)]
struct RuleRecord {
    id: Option<surrealdb::sql::Thing>,
    command: String,
    created_by: String,
    used_llm: bool,
    to_notify: bool,
    is_active: bool,
    trigger: Trigger,
    response: ResponseSpec,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// A pending clarification record in the database, keyed by user id.
#[derive(Debug, Serialize, Deserialize)]
struct ConversationRecord {
    id: Option<surrealdb::sql::Thing>,
    pending_command: String,
    pending_questions: Vec<String>,
    thread_ts: String,
}

/// Merge document for partial rule updates.  Absent toggles are not written,
/// and `updated_at` always advances.
#[derive(Debug, Serialize)]
struct RuleMerge {
    #[serde(skip_serializing_if = "Option::is_none")]
    is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_notify: Option<bool>,
    updated_at: DateTime<Utc>,
}

impl RuleRecord {
    fn from_rule(rule: &AutomationRule) -> Self {
        Self {
            id: None,
            command: rule.command.clone(),
            created_by: rule.created_by.clone(),
            used_llm: rule.used_llm,
            to_notify: rule.to_notify,
            is_active: rule.is_active,
            trigger: rule.trigger.clone(),
            response: rule.response.clone(),
            created_at: rule.created_at,
            updated_at: rule.updated_at,
        }
    }

    fn into_rule(self) -> Res<AutomationRule> {
        let id = self.id.map(|thing| thing.id.to_raw()).ok_or_else(|| anyhow!("rule record is missing its id"))?;

        Ok(AutomationRule {
            id,
            command: self.command,
            created_by: self.created_by,
            used_llm: self.used_llm,
            to_notify: self.to_notify,
            is_active: self.is_active,
            trigger: self.trigger,
            response: self.response,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ConversationRecord {
    fn from_state(state: &ConversationState) -> Self {
        Self {
            id: None,
            pending_command: state.pending_command.clone(),
            pending_questions: state.pending_questions.clone(),
            thread_ts: state.thread_ts.clone(),
        }
    }

    fn into_state(self) -> ConversationState {
        ConversationState {
            pending_command: self.pending_command,
            pending_questions: self.pending_questions,
            thread_ts: self.thread_ts,
        }
    }
}

impl<C: Connection> SurrealDbClient<C> {
    /// Select the namespace and define the tables on a signed-in connection.
    async fn init(db: Surreal<C>) -> Res<Self> {
        // Use a specific namespace and database.
        db.use_ns("automation").use_db("bot").await?;

        // Define schemas.

        // Rules carry nested trigger and response objects, so the tables stay
        // schemaless.
        db.query("DEFINE TABLE IF NOT EXISTS rule SCHEMALESS").await?;
        db.query("DEFINE TABLE IF NOT EXISTS conversation SCHEMALESS").await?;

        info!("Database initialized successfully.");

        Ok(Self { db })
    }
}

// Specific implementations.

#[async_trait]
impl<C: Connection> GenericDbClient for SurrealDbClient<C> {
    #[instrument(name = "SurrealDbClient::create_rule", skip_all)]
    async fn create_rule(&self, rule: &AutomationRule) -> Void {
        // CREATE errors out if the record already exists, which keeps ids unique.
        let created: Option<RuleRecord> = self.db.create(("rule", rule.id.as_str())).content(RuleRecord::from_rule(rule)).await?;

        if created.is_none() {
            bail!("rule `{}` was not persisted", rule.id);
        }

        info!("Rule `{}` created.", rule.id);

        Ok(())
    }

    #[instrument(name = "SurrealDbClient::get_rule", skip(self))]
    async fn get_rule(&self, id: &str) -> Res<Option<AutomationRule>> {
        let record: Option<RuleRecord> = self.db.select(("rule", id)).await?;

        record.map(RuleRecord::into_rule).transpose()
    }

    #[instrument(name = "SurrealDbClient::get_all_rules", skip(self))]
    async fn get_all_rules(&self) -> Res<Vec<AutomationRule>> {
        let records: Vec<RuleRecord> = self.db.select("rule").await?;

        records.into_iter().map(RuleRecord::into_rule).collect()
    }

    #[instrument(name = "SurrealDbClient::update_rule", skip(self))]
    async fn update_rule(&self, id: &str, patch: RulePatch) -> Res<Option<AutomationRule>> {
        // UPDATE leaves absent records absent, so a bad id surfaces as `None`.
        let updated: Option<RuleRecord> = self
            .db
            .update(("rule", id))
            .merge(RuleMerge {
                is_active: patch.is_active,
                to_notify: patch.to_notify,
                updated_at: Utc::now(),
            })
            .await?;

        updated.map(RuleRecord::into_rule).transpose()
    }

    #[instrument(name = "SurrealDbClient::delete_rule", skip(self))]
    async fn delete_rule(&self, id: &str) -> Res<Option<AutomationRule>> {
        let deleted: Option<RuleRecord> = self.db.delete(("rule", id)).await?;

        deleted.map(RuleRecord::into_rule).transpose()
    }

    #[instrument(name = "SurrealDbClient::get_conversation_state", skip(self))]
    async fn get_conversation_state(&self, user_id: &str) -> Res<Option<ConversationState>> {
        let record: Option<ConversationRecord> = self.db.select(("conversation", user_id)).await?;

        Ok(record.map(ConversationRecord::into_state))
    }

    #[instrument(name = "SurrealDbClient::set_conversation_state", skip_all)]
    async fn set_conversation_state(&self, user_id: &str, state: &ConversationState) -> Void {
        // One slot per user: a newer authoring request replaces the older state.
        let _: Option<ConversationRecord> = self.db.upsert(("conversation", user_id)).content(ConversationRecord::from_state(state)).await?;

        Ok(())
    }

    #[instrument(name = "SurrealDbClient::clear_conversation_state", skip(self))]
    async fn clear_conversation_state(&self, user_id: &str) -> Void {
        let _: Option<ConversationRecord> = self.db.delete(("conversation", user_id)).await?;

        Ok(())
    }
}

// Tests.
