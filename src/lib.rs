//! Library root for `automation-bot`.
//!
//! Automation-bot is an LLM-powered workflow assistant for Slack designed to:
//! - Turn natural-language requests into trigger/response automation rules
//! - Ask clarifying questions when a request is ambiguous
//! - Evaluate every channel message against the stored rules
//! - Send, edit, or delete messages when a rule fires
//!
//! The bot integrates with Slack for chat, SurrealDB for storage,
//! and OpenAI for language understanding. The architecture is built around
//! extensible traits that allow for different implementations of each service.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the automation-bot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with database, LLM, and chat clients
/// - Starts the main event loop for processing messages
pub async fn start(config: Config) -> Void {
    info!("Starting automation-bot ...");

    // Start the crypto provider.
    crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install the default crypto provider"))?;

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
