//! Remote API boundary.
//!
//! The engine never talks to a transport directly; it is handed an
//! implementation of [`InvestigationApi`] and treats every operation as
//! one opaque asynchronous call that either resolves with typed records
//! or fails with an error carrying a human-readable message.

use async_trait::async_trait;
use thiserror::Error;

use super::records::{
    Approval, ApprovalRequest, Client, ClientId, Flow, FlowId, FlowResultsQuery, ResultItem,
    ScheduledFlow,
};
use crate::types::FlowArgs;

/// Error returned by any remote operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The call never reached the endpoint or the reply was lost
    #[error("transport failure: {0}")]
    Transport(String),

    /// The endpoint rejected the call; the message is operator-facing
    #[error("{0}")]
    Endpoint(String),

    /// The referenced record does not exist on the endpoint
    #[error("not found: {0}")]
    NotFound(String),
}

/// Asynchronous query and command surface of the investigation endpoint.
#[async_trait]
pub trait InvestigationApi: Send + Sync {
    /// Fetch the full record of one managed client.
    async fn fetch_client(&self, client_id: &ClientId) -> Result<Client, ApiError>;

    /// List approvals for a client, newest first.
    async fn list_approvals(&self, client_id: &ClientId) -> Result<Vec<Approval>, ApiError>;

    /// Request access to a client.
    async fn request_approval(
        &self,
        client_id: &ClientId,
        request: &ApprovalRequest,
    ) -> Result<Approval, ApiError>;

    /// List executed and executing flows for a client.
    async fn list_flows_for_client(&self, client_id: &ClientId) -> Result<Vec<Flow>, ApiError>;

    /// List result items matching a query against one flow.
    async fn list_results_for_flow(
        &self,
        client_id: &ClientId,
        query: &FlowResultsQuery,
    ) -> Result<Vec<ResultItem>, ApiError>;

    /// List flows scheduled by the given operator for a client.
    async fn list_scheduled_flows(
        &self,
        client_id: &ClientId,
        username: &str,
    ) -> Result<Vec<ScheduledFlow>, ApiError>;

    /// Start a flow immediately.
    async fn start_flow(
        &self,
        client_id: &ClientId,
        flow_name: &str,
        args: &FlowArgs,
    ) -> Result<Flow, ApiError>;

    /// Schedule a flow for a deferred start.
    async fn schedule_flow(
        &self,
        client_id: &ClientId,
        flow_name: &str,
        args: &FlowArgs,
    ) -> Result<ScheduledFlow, ApiError>;

    /// Cancel a running flow.
    async fn cancel_flow(&self, client_id: &ClientId, flow_id: &FlowId) -> Result<Flow, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_error_display_is_bare_message() {
        // Start/schedule failures surface this message verbatim in the
        // session state, so the display must not add a prefix.
        let err = ApiError::Endpoint("quota exceeded".to_string());
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn test_transport_error_display() {
        let err = ApiError::Transport("connection reset".to_string());
        assert_eq!(err.to_string(), "transport failure: connection reset");
    }
}
