//! Start/schedule command worker.
//!
//! Start and schedule requests are serialized in trigger order: the
//! facade captures the selection and configuration at trigger time and
//! enqueues the fully-resolved command; one worker task issues the
//! remote calls one at a time, committing each outcome before the next
//! call goes out. Failures are committed into the session state rather
//! than propagated, so the worker survives any number of rejected
//! requests.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::store::SessionStore;
use crate::domain::records::ClientId;
use crate::domain::remote::InvestigationApi;
use crate::types::FlowArgs;

/// A fully-resolved start or schedule request.
#[derive(Debug)]
pub(crate) enum FlowCommand {
    /// Start a flow immediately
    Start {
        /// Client selected at trigger time
        client_id: ClientId,
        /// Flow name from the configuration active at trigger time
        flow_name: String,
        /// Final argument payload
        args: FlowArgs,
    },

    /// Schedule a flow for a deferred start
    Schedule {
        /// Client selected at trigger time
        client_id: ClientId,
        /// Flow name from the configuration active at trigger time
        flow_name: String,
        /// Final argument payload
        args: FlowArgs,
    },
}

/// Spawn the worker and return its submission handle.
pub(crate) fn spawn_command_worker(
    api: Arc<dyn InvestigationApi>,
    store: SessionStore,
) -> mpsc::UnboundedSender<FlowCommand> {
    let (tx, mut rx) = mpsc::unbounded_channel::<FlowCommand>();

    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                FlowCommand::Start {
                    client_id,
                    flow_name,
                    args,
                } => match api.start_flow(&client_id, &flow_name, &args).await {
                    Ok(flow) => {
                        info!(client_id = %client_id.0, flow_id = %flow.id.0, "flow started");
                        store.apply(move |state| state.commit_started_flow(flow));
                    }
                    Err(err) => {
                        warn!(client_id = %client_id.0, flow = %flow_name, "flow start failed: {}", err);
                        store.apply(move |state| state.commit_start_failure(err.to_string()));
                    }
                },
                FlowCommand::Schedule {
                    client_id,
                    flow_name,
                    args,
                } => match api.schedule_flow(&client_id, &flow_name, &args).await {
                    Ok(scheduled) => {
                        info!(client_id = %client_id.0, scheduled_id = %scheduled.id.0, "flow scheduled");
                        store.apply(move |state| state.commit_scheduled_flow(scheduled));
                    }
                    Err(err) => {
                        warn!(client_id = %client_id.0, flow = %flow_name, "flow schedule failed: {}", err);
                        store.apply(move |state| state.commit_start_failure(err.to_string()));
                    }
                },
            }
        }
        debug!("command worker stopped");
    });

    tx
}
