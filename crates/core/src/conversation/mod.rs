//! Conversation-stage engine: typed state, linear stage script, positional
//! slot-filling, completeness gates, and webhook dispatch planning.
//!
//! Everything here is pure and synchronous. The agent crate owns the
//! effectful edges (LLM calls, webhook transport, the per-conversation
//! store) and feeds them from these functions.

pub mod dispatch;
pub mod extract;
pub mod gate;
pub mod stage;
pub mod state;
