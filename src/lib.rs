//! chatpane: a terminal chat client with Turso-backed conversation history
//! and streaming assistant replies.

pub mod ai;
pub mod history;
pub mod services;
