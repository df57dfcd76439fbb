//! Authentication provider contract.
//!
//! The provider itself is external; this crate only observes a
//! current-user-or-null state. `None` renders the signed-out/loading state,
//! any `Some(user)` (re)initializes the synchronizer for that user id.

use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

pub struct AuthProvider {
    tx: watch::Sender<Option<AuthUser>>,
}

impl AuthProvider {
    pub fn new() -> (Self, watch::Receiver<Option<AuthUser>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    pub fn sign_in(&self, user: AuthUser) {
        let _ = self.tx.send(Some(user));
    }

    pub fn sign_out(&self) {
        let _ = self.tx.send(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.tx.subscribe()
    }
}

/// Credentials for the terminal front: `CHAT_USER_ID` plus an optional
/// `CHAT_USER_EMAIL`.
pub fn user_from_env() -> Option<AuthUser> {
    let id = std::env::var("CHAT_USER_ID")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())?;
    let email = std::env::var("CHAT_USER_EMAIL")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    Some(AuthUser { id, email })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_and_out_are_observed() {
        let (auth, mut rx) = AuthProvider::new();
        assert!(rx.borrow().is_none());

        auth.sign_in(AuthUser {
            id: "user-1".to_string(),
            email: None,
        });
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().id, "user-1");

        auth.sign_out();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }
}
