//! Result polling for one flow query.
//!
//! Unlike the list drivers, result polling is gated by the flow's
//! lifecycle rather than running unconditionally: the driver ticks while
//! the flow entry exists and is not finished, issues exactly one more
//! fetch after a terminal state is first observed (results produced at
//! the completion boundary would otherwise be missed), then stops for
//! good. Each permitted tick uses the same exhaust discipline as the
//! list drivers, tagging the attached set in progress while its fetch
//! is outstanding, and the whole activity tears down when the selection
//! stream emits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use super::store::SessionStore;
use crate::domain::records::{ClientId, FlowId, FlowResultSet, FlowResultsQuery, ResultSetState};
use crate::domain::remote::InvestigationApi;
use crate::domain::session::SessionState;

/// Liveness of one result-polling activity, read at each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Liveness {
    /// Entry exists and the flow is still running
    Active,

    /// A terminal flow state was just observed: one more fetch is due
    FinalTick,

    /// Entry absent; nothing left to poll
    Stopped,
}

fn flow_liveness(state: &SessionState, flow_id: &FlowId) -> Liveness {
    match state.flow_entry(flow_id) {
        None => Liveness::Stopped,
        Some(entry) if entry.flow.state.is_terminal() => Liveness::FinalTick,
        Some(_) => Liveness::Active,
    }
}

/// Poll results for one query until the flow finishes or the selection
/// changes.
pub(crate) async fn run_result_poller(
    api: Arc<dyn InvestigationApi>,
    store: SessionStore,
    client_id: ClientId,
    query: FlowResultsQuery,
    period: Duration,
    mut selection: watch::Receiver<Option<ClientId>>,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(flow_id = %query.flow_id.0, "result poller started");

    loop {
        tokio::select! {
            biased;
            _ = selection.changed() => break,
            _ = ticker.tick() => {}
        }

        let liveness = store.with(|state| flow_liveness(state, &query.flow_id));
        if liveness == Liveness::Stopped {
            debug!(flow_id = %query.flow_id.0, "flow entry gone, result poller stopping");
            break;
        }

        // Mark the attached set in progress for the duration of the
        // fetch; items from the previous fetch stay visible meanwhile.
        let pending = query.clone();
        if !store.apply_for_client(&client_id, move |state| {
            let items = state
                .flow_entry(&pending.flow_id)
                .and_then(|entry| entry.result_set.as_ref())
                .map(|set| set.items.clone())
                .unwrap_or_default();
            state.attach_result_set(FlowResultSet {
                query: pending,
                state: ResultSetState::InProgress,
                items,
            })
        }) {
            break;
        }

        let fetched = tokio::select! {
            biased;
            _ = selection.changed() => break,
            result = api.list_results_for_flow(&client_id, &query) => result,
        };

        match fetched {
            Ok(items) => {
                let result_set = FlowResultSet {
                    query: query.clone(),
                    state: ResultSetState::Fetched,
                    items,
                };
                if !store.apply_for_client(&client_id, move |state| {
                    state.attach_result_set(result_set)
                }) {
                    break;
                }
            }
            Err(err) => {
                warn!(flow_id = %query.flow_id.0, "result fetch failed: {}", err);
            }
        }

        if liveness == Liveness::FinalTick {
            debug!(flow_id = %query.flow_id.0, "final results fetched, result poller stopping");
            break;
        }
    }
}
