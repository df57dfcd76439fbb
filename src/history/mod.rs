//! Conversation history: the Turso-backed remote store and the in-memory
//! synchronizer mirrored onto it.

mod error;
mod store;
mod sync;
mod title;
mod types;

pub use error::StoreError;
pub use store::RemoteStore;
pub use sync::{ConversationPatch, ConversationSync};
pub use title::{DEFAULT_TITLE, derive_title};
pub use types::{Conversation, Message, Role};
