//! Top-level application state.
//!
//! Views hold no state of their own: the current user, the conversation
//! list and the in-flight exchange all live here, and every mutation goes
//! through the synchronizer's operations.

use crate::ai::{ExchangeDriver, SubmitOutcome};
use crate::history::{Conversation, ConversationPatch, ConversationSync, RemoteStore};
use crate::services::auth::AuthUser;
use crate::services::config::AiConfig;

pub struct AppState {
    store: RemoteStore,
    exchange: ExchangeDriver,
    user: Option<AuthUser>,
    sync: Option<ConversationSync>,
}

impl AppState {
    pub fn new(store: RemoteStore, config: AiConfig) -> Self {
        Self {
            store,
            exchange: ExchangeDriver::new(config),
            user: None,
            sync: None,
        }
    }

    /// Apply an auth state change. `Some(user)` builds a fresh synchronizer
    /// for that user and seeds it from the remote table; `None` drops both
    /// user and list.
    pub async fn set_user(&mut self, user: Option<AuthUser>) {
        match user {
            Some(user) => {
                if self.user.as_ref() == Some(&user) {
                    return;
                }
                let mut sync = ConversationSync::new(self.store.clone(), user.id.clone());
                sync.load().await;
                self.user = Some(user);
                self.sync = Some(sync);
            }
            None => {
                self.user = None;
                self.sync = None;
            }
        }
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_generating(&self) -> bool {
        self.exchange.is_generating()
    }

    pub fn conversations(&self) -> &[Conversation] {
        self.sync.as_ref().map(|s| s.conversations()).unwrap_or(&[])
    }

    pub fn selected(&self) -> Option<&Conversation> {
        self.sync.as_ref()?.selected()
    }

    pub async fn new_conversation(&mut self) -> Option<String> {
        let sync = self.sync.as_mut()?;
        match sync.create(None).await {
            Ok(id) => Some(id),
            Err(err) => {
                log::error!("Conversation create failed: {}", err);
                None
            }
        }
    }

    /// Select the nth conversation in display order.
    pub fn select_nth(&mut self, index: usize) -> bool {
        let Some(sync) = self.sync.as_mut() else {
            return false;
        };
        let Some(id) = sync.conversations().get(index).map(|c| c.id.clone()) else {
            return false;
        };
        sync.select(&id)
    }

    pub async fn delete_nth(&mut self, index: usize) -> bool {
        let Some(sync) = self.sync.as_mut() else {
            return false;
        };
        let Some(id) = sync.conversations().get(index).map(|c| c.id.clone()) else {
            return false;
        };
        sync.delete(&id).await;
        true
    }

    /// Manual title edit for the selected conversation. Empty titles are
    /// ignored.
    pub async fn rename_selected(&mut self, title: &str) {
        let title = title.trim();
        if title.is_empty() {
            return;
        }
        let Some(sync) = self.sync.as_mut() else {
            return;
        };
        let Some(id) = sync.selected_id().map(str::to_string) else {
            return;
        };
        sync.update(&id, ConversationPatch::title(title)).await;
    }

    pub async fn submit(&mut self, input: &str, render: impl FnMut(&str)) -> SubmitOutcome {
        let Some(sync) = self.sync.as_mut() else {
            return SubmitOutcome::Rejected;
        };
        self.exchange.submit(sync, input, render).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_app() -> AppState {
        let path = std::env::temp_dir().join(format!(
            "chatpane-app-{}.db",
            uuid::Uuid::new_v4().simple()
        ));
        let store = RemoteStore::open_local(path.to_string_lossy().as_ref())
            .await
            .expect("open test store");
        AppState::new(store, AiConfig::default())
    }

    fn user(id: &str) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            email: None,
        }
    }

    #[tokio::test]
    async fn test_signed_out_state_rejects_everything() {
        let mut app = test_app().await;

        assert!(!app.is_signed_in());
        assert!(app.conversations().is_empty());
        assert!(app.new_conversation().await.is_none());
        assert_eq!(app.submit("hello", |_| {}).await, SubmitOutcome::Rejected);
    }

    #[tokio::test]
    async fn test_sign_in_seeds_list_and_sign_out_drops_it() {
        let mut app = test_app().await;

        app.set_user(Some(user("user-1"))).await;
        assert!(app.is_signed_in());

        app.new_conversation().await.unwrap();
        assert_eq!(app.conversations().len(), 1);

        app.set_user(None).await;
        assert!(app.conversations().is_empty());

        // Signing back in re-seeds from the remote table.
        app.set_user(Some(user("user-1"))).await;
        assert_eq!(app.conversations().len(), 1);

        // A different user sees their own (empty) list.
        app.set_user(Some(user("user-2"))).await;
        assert!(app.conversations().is_empty());
    }

    #[tokio::test]
    async fn test_select_and_delete_by_index() {
        let mut app = test_app().await;
        app.set_user(Some(user("user-1"))).await;

        app.new_conversation().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        app.new_conversation().await.unwrap();
        assert_eq!(app.conversations().len(), 2);

        assert!(app.select_nth(1));
        let selected = app.selected().unwrap().id.clone();

        assert!(app.delete_nth(0).await);
        assert_eq!(app.selected().unwrap().id, selected);
        assert!(!app.delete_nth(5).await);
    }

    #[tokio::test]
    async fn test_rename_selected() {
        let mut app = test_app().await;
        app.set_user(Some(user("user-1"))).await;
        app.new_conversation().await.unwrap();

        app.rename_selected("  Renamed  ").await;
        assert_eq!(app.selected().unwrap().title, "Renamed");

        app.rename_selected("   ").await;
        assert_eq!(app.selected().unwrap().title, "Renamed");
    }
}
