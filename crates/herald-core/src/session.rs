//! Per-initiator conversation sessions.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::{GroupKey, UserId};

/// Progress of one initiator's private-chat setup conversation.
///
/// The pending group lives inside `AwaitingMessage`, so "awaiting a message
/// without a resolved group" is unrepresentable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    /// `/start` received; waiting for a forwarded message or `@handle`.
    AwaitingGroup,
    /// Group resolved and claimed; waiting for the broadcast text.
    AwaitingMessage { group: GroupKey },
}

impl SessionState {
    /// True while a setup conversation is underway.
    pub fn in_progress(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }
}

/// Session storage, keyed by initiator.
///
/// Sessions are created lazily on first `/start` and removed when they fall
/// back to `Idle`. Only the dispatch task mutates this store, which also
/// serializes concurrent events from the same initiator.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for an initiator; `Idle` when no session exists.
    pub async fn state(&self, initiator: UserId) -> SessionState {
        self.sessions
            .lock()
            .await
            .get(&initiator)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn set(&self, initiator: UserId, state: SessionState) {
        let mut sessions = self.sessions.lock().await;
        if state == SessionState::Idle {
            sessions.remove(&initiator);
        } else {
            sessions.insert(initiator, state);
        }
    }

    /// Reset an initiator's session to `Idle`.
    pub async fn reset(&self, initiator: UserId) {
        self.sessions.lock().await.remove(&initiator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn unknown_initiator_is_idle() {
        let store = SessionStore::new();
        assert_eq!(store.state(UserId(1)).await, SessionState::Idle);
    }

    #[tokio::test]
    async fn set_then_reset_round_trip() {
        let store = SessionStore::new();
        let alice = UserId(1);

        store.set(alice, SessionState::AwaitingGroup).await;
        assert_eq!(store.state(alice).await, SessionState::AwaitingGroup);
        assert!(store.state(alice).await.in_progress());

        store
            .set(
                alice,
                SessionState::AwaitingMessage {
                    group: GroupKey(-10),
                },
            )
            .await;
        assert_eq!(
            store.state(alice).await,
            SessionState::AwaitingMessage {
                group: GroupKey(-10)
            }
        );

        store.reset(alice).await;
        assert_eq!(store.state(alice).await, SessionState::Idle);
    }

    #[tokio::test]
    async fn setting_idle_drops_the_entry() {
        let store = SessionStore::new();
        let alice = UserId(1);

        store.set(alice, SessionState::AwaitingGroup).await;
        store.set(alice, SessionState::Idle).await;
        assert!(store.sessions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn sessions_are_independent_per_initiator() {
        let store = SessionStore::new();
        store.set(UserId(1), SessionState::AwaitingGroup).await;

        assert_eq!(store.state(UserId(2)).await, SessionState::Idle);
        assert_eq!(store.state(UserId(1)).await, SessionState::AwaitingGroup);
    }
}
