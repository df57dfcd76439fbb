//! In-memory conversation list kept convergent with the remote store.
//!
//! The synchronizer is the only writer of the local list; views read it and
//! funnel every mutation through the operations here. Local application is
//! optimistic: a failed remote write is logged and the local change stands
//! (accepted divergence), except for `create`, which returns the error
//! before touching local state.

use super::error::StoreError;
use super::store::RemoteStore;
use super::title::DEFAULT_TITLE;
use super::types::{Conversation, Message, now_ms};

/// Fields to merge into a conversation; absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub title: Option<String>,
    pub messages: Option<Vec<Message>>,
}

impl ConversationPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Some(messages),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.messages.is_none()
    }
}

pub struct ConversationSync {
    store: RemoteStore,
    user_id: String,
    conversations: Vec<Conversation>,
    selected_id: Option<String>,
}

impl ConversationSync {
    pub fn new(store: RemoteStore, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            conversations: Vec::new(),
            selected_id: None,
        }
    }

    /// Seed local state from the remote table. Called once per sign-in;
    /// a load failure degrades to an empty list.
    pub async fn load(&mut self) {
        match self.store.list_conversations(&self.user_id).await {
            Ok(conversations) => self.conversations = conversations,
            Err(err) => {
                log::error!("Conversation list load failed: {}", err);
                self.conversations = Vec::new();
            }
        }

        if let Some(selected) = self.selected_id.as_deref() {
            if !self.conversations.iter().any(|c| c.id == selected) {
                self.selected_id = None;
            }
        }
    }

    /// Create a conversation, prepend it locally and select it. The remote
    /// insert is awaited first; on failure nothing changes locally.
    pub async fn create(&mut self, title: Option<&str>) -> Result<String, StoreError> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE);
        let conversation = Conversation::new(self.user_id.clone(), title);
        let id = conversation.id.clone();

        self.store.insert_conversation(&conversation).await?;

        self.conversations.insert(0, conversation);
        self.selected_id = Some(id.clone());
        Ok(id)
    }

    /// Merge the provided fields, stamp `updated_at_ms`, re-derive display
    /// order, then mirror the changed columns remotely. Unknown ids are a
    /// no-op. An empty patch refreshes `updated_at_ms` locally and performs
    /// no remote write.
    pub async fn update(&mut self, conversation_id: &str, patch: ConversationPatch) {
        let now = now_ms();
        let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        else {
            return;
        };

        if let Some(title) = &patch.title {
            conversation.title = title.clone();
        }
        if let Some(messages) = &patch.messages {
            conversation.messages = messages.clone();
        }
        conversation.updated_at_ms = now;
        self.resort();

        if patch.is_empty() {
            return;
        }

        let result = match (&patch.title, &patch.messages) {
            (Some(title), Some(messages)) => {
                self.store
                    .update_title_and_messages(conversation_id, title, messages, now)
                    .await
            }
            (Some(title), None) => self.store.update_title(conversation_id, title, now).await,
            (None, Some(messages)) => {
                self.store
                    .update_messages(conversation_id, messages, now)
                    .await
            }
            (None, None) => Ok(()),
        };

        if let Err(err) = result {
            log::warn!("Conversation update failed ({}): {}", conversation_id, err);
        }
    }

    /// Remote delete, then local removal; the selection is cleared when it
    /// pointed at the deleted conversation.
    pub async fn delete(&mut self, conversation_id: &str) {
        if let Err(err) = self.store.delete_conversation(conversation_id).await {
            log::warn!("Conversation delete failed ({}): {}", conversation_id, err);
        }

        self.conversations.retain(|c| c.id != conversation_id);
        if self.selected_id.as_deref() == Some(conversation_id) {
            self.selected_id = None;
        }
    }

    pub fn select(&mut self, conversation_id: &str) -> bool {
        if self.conversations.iter().any(|c| c.id == conversation_id) {
            self.selected_id = Some(conversation_id.to_string());
            return true;
        }
        false
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn selected(&self) -> Option<&Conversation> {
        let selected = self.selected_id.as_deref()?;
        self.get(selected)
    }

    // Stable sort: millisecond ties keep their current order.
    fn resort(&mut self) {
        self.conversations
            .sort_by(|a, b| b.updated_at_ms.cmp(&a.updated_at_ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn test_sync() -> ConversationSync {
        let path = std::env::temp_dir().join(format!(
            "chatpane-sync-{}.db",
            super::super::types::new_id("t")
        ));
        let store = RemoteStore::open_local(path.to_string_lossy().as_ref())
            .await
            .expect("open test store");
        ConversationSync::new(store, "user-1")
    }

    #[tokio::test]
    async fn test_create_prepends_and_selects() {
        let mut sync = test_sync().await;

        let first = sync.create(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = sync.create(Some("custom")).await.unwrap();

        assert_eq!(sync.conversations()[0].id, second);
        assert_eq!(sync.conversations()[0].title, "custom");
        assert_eq!(sync.conversations()[1].id, first);
        assert_eq!(sync.conversations()[1].title, DEFAULT_TITLE);
        assert_eq!(sync.selected_id(), Some(second.as_str()));
    }

    #[tokio::test]
    async fn test_update_moves_conversation_to_head_and_mirrors_remote() {
        let mut sync = test_sync().await;

        let older = sync.create(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let newer = sync.create(None).await.unwrap();
        assert_eq!(sync.conversations()[0].id, newer);

        tokio::time::sleep(Duration::from_millis(5)).await;
        sync.update(&older, ConversationPatch::messages(vec![Message::user("hi")]))
            .await;
        assert_eq!(sync.conversations()[0].id, older);

        // The remote table converges to the same order.
        let mut reloaded = ConversationSync::new(sync.store.clone(), "user-1");
        reloaded.load().await;
        assert_eq!(reloaded.conversations()[0].id, older);
        assert_eq!(reloaded.conversations()[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_patch_is_local_only() {
        let mut sync = test_sync().await;
        let id = sync.create(None).await.unwrap();
        let remote_before = sync.store.list_conversations("user-1").await.unwrap()[0].updated_at_ms;

        tokio::time::sleep(Duration::from_millis(5)).await;
        sync.update(&id, ConversationPatch::default()).await;

        let local = sync.get(&id).unwrap().updated_at_ms;
        assert!(local > remote_before);

        let remote_after = sync.store.list_conversations("user-1").await.unwrap()[0].updated_at_ms;
        assert_eq!(remote_after, remote_before);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_noop() {
        let mut sync = test_sync().await;
        sync.create(None).await.unwrap();
        let before = sync.conversations()[0].updated_at_ms;

        sync.update("conv_missing", ConversationPatch::title("ghost"))
            .await;

        assert_eq!(sync.conversations().len(), 1);
        assert_eq!(sync.conversations()[0].updated_at_ms, before);
        assert_ne!(sync.conversations()[0].title, "ghost");
    }

    #[tokio::test]
    async fn test_delete_clears_selection_only_when_selected() {
        let mut sync = test_sync().await;

        let first = sync.create(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = sync.create(None).await.unwrap();
        assert_eq!(sync.selected_id(), Some(second.as_str()));

        // Deleting a non-selected conversation leaves the pointer alone.
        sync.delete(&first).await;
        assert_eq!(sync.selected_id(), Some(second.as_str()));

        sync.delete(&second).await;
        assert_eq!(sync.selected_id(), None);
        assert!(sync.conversations().is_empty());
    }
}
