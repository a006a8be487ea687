//! Session store and selection stream.
//!
//! The store is the single shared mutable resource of the engine. All
//! access goes through the copy-on-write update operations of
//! [`SessionState`]; the store applies them atomically in call order on a
//! watch channel, which doubles as the replay-one state stream.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::domain::records::{Client, ClientId};
use crate::domain::session::SessionState;

/// Handle to the shared session state.
///
/// Cheap to clone; every clone applies to the same underlying state.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<watch::Sender<SessionState>>,
    selection: Arc<watch::Sender<Option<ClientId>>>,
}

impl SessionStore {
    /// Create a store holding the empty initial session.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let (selection, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
            selection: Arc::new(selection),
        }
    }

    /// Apply one pure update to the current state.
    pub fn apply<F>(&self, update: F)
    where
        F: FnOnce(&SessionState) -> SessionState,
    {
        self.state.send_if_modified(|state| {
            *state = update(state);
            true
        });
        self.publish_selection();
    }

    /// Apply one pure update only while the given client is still selected.
    ///
    /// This is the revocation check for client-scoped fetch results: a
    /// response that completes after the selection moved on is dropped at
    /// commit time. Returns whether the update was applied.
    pub fn apply_for_client<F>(&self, client_id: &ClientId, update: F) -> bool
    where
        F: FnOnce(&SessionState) -> SessionState,
    {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if state.client_id() == Some(client_id) {
                *state = update(state);
                applied = true;
                true
            } else {
                false
            }
        });

        if applied {
            self.publish_selection();
        } else {
            debug!(client_id = %client_id.0, "dropping update for deselected client");
        }
        applied
    }

    /// Record a new selection.
    ///
    /// Commits a stub client record carrying only the id; detail
    /// hydration replaces it once `fetch_client` resolves. Reselecting
    /// the current id is a no-op. Returns whether the selection changed.
    pub fn select_client(&self, client_id: ClientId) -> bool {
        let mut changed = false;
        self.state.send_if_modified(|state| {
            if state.client_id() == Some(&client_id) {
                return false;
            }
            *state = state.set_client(Client::from_id(client_id.clone()));
            changed = true;
            true
        });

        if changed {
            self.publish_selection();
        }
        changed
    }

    /// Read a projection of the current state.
    pub fn with<T>(&self, read: impl FnOnce(&SessionState) -> T) -> T {
        read(&self.state.borrow())
    }

    /// Clone the current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Replay-one stream of session states.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The selection stream.
    ///
    /// Emits the current client id only on genuine change; the value
    /// current at subscription time is already marked as seen, so a new
    /// receiver wakes only for the next switch. Every per-client task
    /// holds one receiver and terminates when it fires.
    pub fn subscribe_selection(&self) -> watch::Receiver<Option<ClientId>> {
        self.selection.subscribe()
    }

    /// The id of the currently selected client.
    pub fn selected_client_id(&self) -> Option<ClientId> {
        self.state.borrow().client_id().cloned()
    }

    fn publish_selection(&self) {
        let current = self.state.borrow().client_id().cloned();
        self.selection.send_if_modified(|selection| {
            if *selection == current {
                false
            } else {
                *selection = current;
                true
            }
        });
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
