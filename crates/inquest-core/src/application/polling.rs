//! Periodic list refresh drivers.
//!
//! Each driver is one task owning its interval timer; the fetch is
//! awaited inline, so a tick can never overlap an outstanding request.
//! Ticks that would have fired while a fetch was in flight are skipped,
//! never queued (`MissedTickBehavior::Skip`). Every await races the
//! selection stream first, so a recorded client switch both stops the
//! timer and discards the response of any fetch still in the air; the
//! commit itself re-checks the selection as a second guard.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use super::store::SessionStore;
use crate::domain::records::ClientId;
use crate::domain::remote::InvestigationApi;

/// Poll the executed/executing flow list for one client.
pub(crate) async fn run_flow_list_poller(
    api: Arc<dyn InvestigationApi>,
    store: SessionStore,
    client_id: ClientId,
    period: Duration,
    mut selection: watch::Receiver<Option<ClientId>>,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(client_id = %client_id.0, "flow list poller started");

    loop {
        tokio::select! {
            biased;
            _ = selection.changed() => break,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            biased;
            _ = selection.changed() => break,
            result = api.list_flows_for_client(&client_id) => result,
        };

        match fetched {
            Ok(flows) => {
                if !store.apply_for_client(&client_id, move |state| state.merge_flows(flows)) {
                    break;
                }
            }
            Err(err) => {
                // Transient: the next tick retries.
                warn!(client_id = %client_id.0, "flow list refresh failed: {}", err);
            }
        }
    }

    debug!(client_id = %client_id.0, "flow list poller stopped");
}

/// Poll the scheduled-flow list for one client.
///
/// The operator username is read from the identity stream at each tick;
/// ticks fired before the identity is known are skipped.
pub(crate) async fn run_scheduled_flow_poller(
    api: Arc<dyn InvestigationApi>,
    store: SessionStore,
    client_id: ClientId,
    period: Duration,
    identity: watch::Receiver<Option<String>>,
    mut selection: watch::Receiver<Option<ClientId>>,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(client_id = %client_id.0, "scheduled flow poller started");

    loop {
        tokio::select! {
            biased;
            _ = selection.changed() => break,
            _ = ticker.tick() => {}
        }

        let Some(username) = identity.borrow().clone() else {
            debug!(client_id = %client_id.0, "operator identity unknown, skipping tick");
            continue;
        };

        let fetched = tokio::select! {
            biased;
            _ = selection.changed() => break,
            result = api.list_scheduled_flows(&client_id, &username) => result,
        };

        match fetched {
            Ok(scheduled) => {
                if !store.apply_for_client(&client_id, move |state| {
                    state.set_scheduled_flows(scheduled)
                }) {
                    break;
                }
            }
            Err(err) => {
                warn!(client_id = %client_id.0, "scheduled flow refresh failed: {}", err);
            }
        }
    }

    debug!(client_id = %client_id.0, "scheduled flow poller stopped");
}

/// Resolve client details and the approval list once after a selection.
///
/// Failures leave the stub client record and an empty approval list in
/// place; the session stays usable and the failure is logged.
pub(crate) async fn run_client_hydration(
    api: Arc<dyn InvestigationApi>,
    store: SessionStore,
    client_id: ClientId,
    mut selection: watch::Receiver<Option<ClientId>>,
) {
    let fetched = tokio::select! {
        biased;
        _ = selection.changed() => return,
        result = api.fetch_client(&client_id) => result,
    };
    match fetched {
        Ok(client) => {
            if !store.apply_for_client(&client_id, move |state| state.set_client(client)) {
                return;
            }
        }
        Err(err) => warn!(client_id = %client_id.0, "client detail fetch failed: {}", err),
    }

    let fetched = tokio::select! {
        biased;
        _ = selection.changed() => return,
        result = api.list_approvals(&client_id) => result,
    };
    match fetched {
        Ok(approvals) => {
            store.apply_for_client(&client_id, move |state| state.set_approvals(approvals));
        }
        Err(err) => warn!(client_id = %client_id.0, "approval list fetch failed: {}", err),
    }
}
