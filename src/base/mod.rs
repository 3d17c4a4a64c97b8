//! Core components, types, and utilities for the automation-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Prompt templates for the authoring pipeline and the dispatcher.
//! - Common types and result handling.

pub mod config;
pub mod prompts;
pub mod types;
