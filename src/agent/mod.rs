//! LLM agent modules for change review.
//!
//! This module provides the tool registry and the streaming agent loop.

pub mod agent_loop;
pub mod tools;

pub use agent_loop::{review_instruction, AgentConfig, FinishReason, ReviewAgent};
pub use tools::ToolRegistry;
