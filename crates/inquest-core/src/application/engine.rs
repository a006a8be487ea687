//! Engine facade.
//!
//! Ties the store, the polling drivers, the command worker, and the view
//! projector together behind the surface the UI layer consumes. The
//! engine must be created inside a tokio runtime; its background tasks
//! stop on their own once the engine is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use super::commands::{spawn_command_worker, FlowCommand};
use super::polling::{run_client_hydration, run_flow_list_poller, run_scheduled_flow_poller};
use super::results::run_result_poller;
use super::store::SessionStore;
use super::views::{spawn_projector, SessionViews};
use crate::config::EngineConfig;
use crate::domain::records::{
    Approval, ApprovalRequest, ClientId, Flow, FlowId, FlowResultsQuery,
};
use crate::domain::remote::InvestigationApi;
use crate::domain::session::SessionState;
use crate::error::EngineError;
use crate::types::FlowArgs;

/// Construct the operator identity stream.
///
/// The sender side is fed by the authentication layer; the receiver is
/// handed to [`SessionEngine::new`].
pub fn operator_identity(
    initial: Option<String>,
) -> (
    watch::Sender<Option<String>>,
    watch::Receiver<Option<String>>,
) {
    watch::channel(initial)
}

/// The client-inspection session controller.
pub struct SessionEngine {
    api: Arc<dyn InvestigationApi>,
    config: Arc<EngineConfig>,
    store: SessionStore,
    identity: watch::Receiver<Option<String>>,
    commands: mpsc::UnboundedSender<FlowCommand>,
    views: SessionViews,
    client_tasks: Mutex<Vec<JoinHandle<()>>>,
    result_pollers: Mutex<HashMap<FlowId, JoinHandle<()>>>,
}

impl SessionEngine {
    /// Create an engine over the given remote API and configuration.
    pub fn new(
        api: Arc<dyn InvestigationApi>,
        config: EngineConfig,
        identity: watch::Receiver<Option<String>>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let config = Arc::new(config);
        let store = SessionStore::new();
        let commands = spawn_command_worker(api.clone(), store.clone());
        let views = spawn_projector(&store, config.clone());

        Ok(Self {
            api,
            config,
            store,
            identity,
            commands,
            views,
            client_tasks: Mutex::new(Vec::new()),
            result_pollers: Mutex::new(HashMap::new()),
        })
    }

    /// Select a client, starting its per-client polling.
    ///
    /// The selection is recorded synchronously: by the time this returns,
    /// every driver bound to the previous client is revoked and no fetch
    /// for it can commit anymore. Reselecting the current client is a
    /// no-op. Client details and the approval list are resolved in the
    /// background.
    pub fn select_client(&self, client_id: ClientId) {
        if !self.store.select_client(client_id.clone()) {
            return;
        }
        info!(client_id = %client_id.0, "client selected");

        // Pollers for the previous client stop via the selection stream;
        // their handles are no longer of interest.
        self.result_pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let hydration = tokio::spawn(run_client_hydration(
            self.api.clone(),
            self.store.clone(),
            client_id.clone(),
            self.store.subscribe_selection(),
        ));
        let flow_list = tokio::spawn(run_flow_list_poller(
            self.api.clone(),
            self.store.clone(),
            client_id.clone(),
            self.config.flow_list_poll_interval(),
            self.store.subscribe_selection(),
        ));
        let scheduled = tokio::spawn(run_scheduled_flow_poller(
            self.api.clone(),
            self.store.clone(),
            client_id,
            self.config.flow_list_poll_interval(),
            self.identity.clone(),
            self.store.subscribe_selection(),
        ));

        // Only the latest handles are retained, for teardown on drop.
        let mut tasks = self
            .client_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.clear();
        tasks.extend([hydration, flow_list, scheduled]);
    }

    /// Enter a flow configuration workflow.
    ///
    /// The name must exist in the descriptor catalog; an unknown name is
    /// a local misconfiguration and fails synchronously.
    pub fn begin_configuration(
        &self,
        name: &str,
        initial_args: Option<FlowArgs>,
    ) -> Result<(), EngineError> {
        if self.config.descriptor(name).is_none() {
            return Err(EngineError::UnknownFlow(name.to_string()));
        }
        let name = name.to_string();
        self.store
            .apply(move |state| state.begin_configuration(name, initial_args));
        Ok(())
    }

    /// Leave the flow configuration workflow.
    pub fn end_configuration(&self) {
        self.store.apply(|state| state.end_configuration());
    }

    /// Start the configured flow with the given arguments.
    ///
    /// Captures the selection and configuration now and enqueues the
    /// request; outcomes surface through the start-flow-state view, never
    /// through this call.
    pub fn start_flow(&self, args: FlowArgs) -> Result<(), EngineError> {
        let (client_id, flow_name) = self.trigger_context()?;
        self.commands
            .send(FlowCommand::Start {
                client_id,
                flow_name,
                args,
            })
            .map_err(|_| EngineError::EngineClosed)
    }

    /// Schedule the configured flow for a deferred start.
    pub fn schedule_flow(&self, args: FlowArgs) -> Result<(), EngineError> {
        let (client_id, flow_name) = self.trigger_context()?;
        self.commands
            .send(FlowCommand::Schedule {
                client_id,
                flow_name,
                args,
            })
            .map_err(|_| EngineError::EngineClosed)
    }

    /// Cancel a flow on the selected client.
    pub async fn cancel_flow(&self, flow_id: &FlowId) -> Result<Flow, EngineError> {
        let client_id = self
            .store
            .selected_client_id()
            .ok_or(EngineError::NoClientSelected)?;
        let flow = self.api.cancel_flow(&client_id, flow_id).await?;
        info!(client_id = %client_id.0, flow_id = %flow.id.0, "flow cancelled");

        let committed = flow.clone();
        self.store.apply(move |state| state.refresh_flow(committed));
        Ok(flow)
    }

    /// Request access to the selected client.
    pub async fn request_approval(
        &self,
        request: ApprovalRequest,
    ) -> Result<Approval, EngineError> {
        let client_id = self
            .store
            .selected_client_id()
            .ok_or(EngineError::NoClientSelected)?;
        let approval = self.api.request_approval(&client_id, &request).await?;
        info!(client_id = %client_id.0, approval_id = %approval.id.0, "approval requested");

        let committed = approval.clone();
        self.store
            .apply_for_client(&client_id, move |state| state.insert_approval(committed));
        Ok(approval)
    }

    /// Start polling results for one query.
    ///
    /// Polling runs until the flow finishes (one final fetch after the
    /// terminal state is observed) or the selection changes. A second
    /// query for the same flow replaces the previous polling activity.
    pub fn query_flow_results(&self, query: FlowResultsQuery) -> Result<(), EngineError> {
        let client_id = self
            .store
            .selected_client_id()
            .ok_or(EngineError::NoClientSelected)?;

        let mut pollers = self
            .result_pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pollers.remove(&query.flow_id) {
            previous.abort();
        }

        let handle = tokio::spawn(run_result_poller(
            self.api.clone(),
            self.store.clone(),
            client_id,
            query.clone(),
            self.config.flow_results_poll_interval(),
            self.store.subscribe_selection(),
        ));
        pollers.insert(query.flow_id, handle);
        Ok(())
    }

    /// The outward view streams.
    pub fn views(&self) -> SessionViews {
        self.views.clone()
    }

    /// Clone the current session state.
    pub fn snapshot(&self) -> SessionState {
        self.store.snapshot()
    }

    fn trigger_context(&self) -> Result<(ClientId, String), EngineError> {
        self.store.with(|state| {
            let client_id = state
                .client_id()
                .cloned()
                .ok_or(EngineError::NoClientSelected)?;
            let configuration = state
                .flow_in_configuration
                .as_ref()
                .ok_or(EngineError::NoConfigurationActive)?;
            Ok((client_id, configuration.name.clone()))
        })
    }
}

impl Drop for SessionEngine {
    fn drop(&mut self) {
        // Polling tasks hold their own store handles, so the selection
        // stream never closes while they run; they must be aborted. The
        // command worker and the projector exit once the engine's channel
        // ends are gone.
        let tasks = self
            .client_tasks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }

        let pollers = self
            .result_pollers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, poller) in pollers.drain() {
            poller.abort();
        }
    }
}
