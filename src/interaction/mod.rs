//! Event handling and user interactions for automation-bot.
//!
//! This module provides functionality for handling chat and message events:
//! - Authoring automation rules from natural-language requests
//! - Evaluating channel messages against the stored rules
//! - Managing existing rules from the slash command surface

pub mod admin;
pub mod authoring;
pub mod dispatch;
