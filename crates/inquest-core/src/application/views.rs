//! Derived view streams.
//!
//! Read-only projections of the session state for the UI layer. Each
//! view is a watch channel: it replays its latest value to new
//! subscribers and emits an explicit "nothing" value from the moment the
//! engine exists, independent of any remote data having arrived. A
//! single projector task recomputes every projection synchronously on
//! each state change and publishes only genuine changes.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::error;

use super::store::SessionStore;
use crate::config::EngineConfig;
use crate::domain::records::{Approval, Client, ConfiguredFlow, ScheduledFlow};
use crate::domain::session::{FlowEntry, SessionState, StartFlowState};

/// Cloneable bundle of the engine's outward streams.
#[derive(Clone)]
pub struct SessionViews {
    selected_client: watch::Receiver<Option<Client>>,
    latest_approval: watch::Receiver<Option<Approval>>,
    flow_entries: watch::Receiver<Vec<FlowEntry>>,
    scheduled_flows: watch::Receiver<Vec<ScheduledFlow>>,
    start_flow_state: watch::Receiver<StartFlowState>,
    configured_flow: watch::Receiver<Option<ConfiguredFlow>>,
}

impl SessionViews {
    /// The currently selected client, `None` when nothing is selected.
    pub fn selected_client(&self) -> watch::Receiver<Option<Client>> {
        self.selected_client.clone()
    }

    /// The first non-expired approval, newest first.
    pub fn latest_approval(&self) -> watch::Receiver<Option<Approval>> {
        self.latest_approval.clone()
    }

    /// Flow entries of the latest fetch in reverse-chronological order.
    pub fn flow_entries(&self) -> watch::Receiver<Vec<FlowEntry>> {
        self.flow_entries.clone()
    }

    /// Scheduled flows as of the latest fetch.
    pub fn scheduled_flows(&self) -> watch::Receiver<Vec<ScheduledFlow>> {
        self.scheduled_flows.clone()
    }

    /// Progress of the most recent start or schedule request.
    pub fn start_flow_state(&self) -> watch::Receiver<StartFlowState> {
        self.start_flow_state.clone()
    }

    /// The in-progress configuration merged with its catalog descriptor.
    pub fn configured_flow(&self) -> watch::Receiver<Option<ConfiguredFlow>> {
        self.configured_flow.clone()
    }
}

/// Merge the active configuration with its descriptor and defaults.
///
/// `begin_configuration` validates the name against the catalog, so a
/// missing descriptor here means the catalog changed underneath a live
/// configuration; the projection falls back to "nothing selected" and
/// logs the inconsistency.
fn project_configured_flow(
    state: &SessionState,
    config: &EngineConfig,
) -> Option<ConfiguredFlow> {
    let configuration = state.flow_in_configuration.as_ref()?;
    match config.descriptor(&configuration.name) {
        Some(descriptor) => {
            let args = match &configuration.initial_args {
                Some(initial) => initial.merged_over(&descriptor.default_args),
                None => descriptor.default_args.clone(),
            };
            Some(ConfiguredFlow {
                name: configuration.name.clone(),
                descriptor: descriptor.clone(),
                args,
            })
        }
        None => {
            error!(flow = %configuration.name, "configured flow missing from descriptor catalog");
            None
        }
    }
}

fn publish<T: PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}

/// Spawn the projector task and return the view bundle.
pub(crate) fn spawn_projector(store: &SessionStore, config: Arc<EngineConfig>) -> SessionViews {
    let (client_tx, client_rx) = watch::channel(None);
    let (approval_tx, approval_rx) = watch::channel(None);
    let (entries_tx, entries_rx) = watch::channel(Vec::new());
    let (scheduled_tx, scheduled_rx) = watch::channel(Vec::new());
    let (start_tx, start_rx) = watch::channel(StartFlowState::RequestNotSent);
    let (configured_tx, configured_rx) = watch::channel(None);

    let mut states = store.subscribe();
    tokio::spawn(async move {
        loop {
            {
                let state = states.borrow_and_update().clone();
                publish(&client_tx, state.client.clone());
                publish(&approval_tx, state.latest_approval().cloned());
                publish(&entries_tx, state.ordered_flow_entries());
                publish(&scheduled_tx, state.scheduled_flows.clone());
                publish(&start_tx, state.start_flow_state.clone());
                publish(&configured_tx, project_configured_flow(&state, &config));
            }
            if states.changed().await.is_err() {
                break;
            }
        }
    });

    SessionViews {
        selected_client: client_rx,
        latest_approval: approval_rx,
        flow_entries: entries_rx,
        scheduled_flows: scheduled_rx,
        start_flow_state: start_rx,
        configured_flow: configured_rx,
    }
}
