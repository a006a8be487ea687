//! Domain records exchanged with the remote investigation endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::FlowArgs;

/// Value object: managed client ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

/// Value object: flow ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(pub String);

/// Value object: approval ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

/// Value object: scheduled flow ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduledFlowId(pub String);

/// A managed host known to the investigation console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Unique identifier
    pub id: ClientId,

    /// Reported hostname, when details have been fetched
    pub hostname: Option<String>,

    /// Reported operating system description
    pub os_description: Option<String>,

    /// Labels attached by operators
    pub labels: Vec<String>,

    /// Last time the endpoint checked in
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Client {
    /// Create a client record carrying only its id.
    ///
    /// Used when a client is selected before its details have been
    /// fetched; the hydrated record replaces this one once the remote
    /// call resolves.
    pub fn from_id(id: ClientId) -> Self {
        Self {
            id,
            hostname: None,
            os_description: None,
            labels: Vec::new(),
            last_seen_at: None,
        }
    }
}

/// Flow lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    /// Flow is executing on the endpoint
    Running,

    /// Flow finished and produced its final results
    Finished,

    /// Flow ended with an error
    Error,

    /// Flow was cancelled by an operator
    Cancelled,
}

impl FlowState {
    /// Whether the flow has reached a terminal state.
    ///
    /// Cancelled and errored flows produce no further results, so result
    /// polling treats every non-running state as finished.
    pub fn is_terminal(self) -> bool {
        !matches!(self, FlowState::Running)
    }
}

/// A unit of executable work dispatched to a managed endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Unique identifier
    pub id: FlowId,

    /// Client the flow runs against
    pub client_id: ClientId,

    /// Flow name, resolvable in the descriptor catalog
    pub name: String,

    /// Operator who started the flow
    pub creator: String,

    /// Current lifecycle state
    pub state: FlowState,

    /// Start timestamp, orders the flow list
    pub started_at: DateTime<Utc>,

    /// Arguments the flow was started with
    pub args: FlowArgs,
}

/// Approval lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    /// Waiting for a grant
    Pending,

    /// Access granted
    Granted,

    /// Grant has lapsed
    Expired,
}

/// A grant record permitting interaction with a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    /// Unique identifier
    pub id: ApprovalId,

    /// Client the approval covers
    pub client_id: ClientId,

    /// Current status
    pub status: ApprovalStatus,

    /// Reason given when access was requested
    pub reason: String,

    /// Operator who requested access
    pub requestor: String,

    /// Expiry timestamp, when known
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input to the request-approval effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Reason presented to the approvers
    pub reason: String,

    /// Users notified of the request
    pub notified_users: Vec<String>,
}

/// A flow whose start has been deferred pending approval or conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledFlow {
    /// Unique identifier
    pub id: ScheduledFlowId,

    /// Client the flow is scheduled against
    pub client_id: ClientId,

    /// Flow name, resolvable in the descriptor catalog
    pub flow_name: String,

    /// Operator who scheduled the flow
    pub creator: String,

    /// Arguments the flow will be started with
    pub args: FlowArgs,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// One materialized output item of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    /// Opaque result payload
    pub payload: serde_json::Value,

    /// Result tag assigned by the flow, used for filtering
    pub tag: Option<String>,

    /// Time the item was produced
    pub timestamp: DateTime<Utc>,
}

/// Query describing one result-polling activity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowResultsQuery {
    /// Flow whose results are polled
    pub flow_id: FlowId,

    /// Offset into the result collection
    pub offset: u64,

    /// Maximum number of items to fetch
    pub count: u64,

    /// Only fetch items carrying this tag
    pub with_tag: Option<String>,

    /// Only fetch items of this payload type
    pub with_type: Option<String>,
}

impl FlowResultsQuery {
    /// Query for the first `count` results of a flow, unfiltered.
    pub fn first(flow_id: FlowId, count: u64) -> Self {
        Self {
            flow_id,
            offset: 0,
            count,
            with_tag: None,
            with_type: None,
        }
    }
}

/// Completeness of a fetched result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultSetState {
    /// A fetch for this query is underway
    InProgress,

    /// The items reflect the latest completed fetch
    Fetched,
}

/// The materialized output of a result query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResultSet {
    /// Query that produced this set
    pub query: FlowResultsQuery,

    /// Completeness of the set
    pub state: ResultSetState,

    /// Ordered result items
    pub items: Vec<ResultItem>,
}

/// Statically known description of a flow type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDescriptor {
    /// Canonical flow name
    pub name: String,

    /// Human-readable name shown to operators
    pub friendly_name: String,

    /// Catalog category
    pub category: String,

    /// Default arguments offered when configuring the flow
    pub default_args: FlowArgs,
}

/// A flow configuration in progress, merged with its descriptor.
///
/// This is the value the configuration view emits: the declared name, the
/// catalog descriptor, and the argument payload the form starts from
/// (descriptor defaults overlaid with the initial arguments, when given).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredFlow {
    /// Flow name being configured
    pub name: String,

    /// Catalog descriptor for the flow
    pub descriptor: FlowDescriptor,

    /// Arguments the configuration form starts from
    pub args: FlowArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_state_terminality() {
        assert!(!FlowState::Running.is_terminal());
        assert!(FlowState::Finished.is_terminal());
        assert!(FlowState::Error.is_terminal());
        assert!(FlowState::Cancelled.is_terminal());
    }

    #[test]
    fn test_client_from_id_carries_no_details() {
        let client = Client::from_id(ClientId("C.1234".to_string()));
        assert_eq!(client.id.0, "C.1234");
        assert!(client.hostname.is_none());
        assert!(client.labels.is_empty());
    }

    #[test]
    fn test_results_query_first() {
        let query = FlowResultsQuery::first(FlowId("F.1".to_string()), 50);
        assert_eq!(query.offset, 0);
        assert_eq!(query.count, 50);
        assert!(query.with_tag.is_none());
        assert!(query.with_type.is_none());
    }

    #[test]
    fn test_record_serialization_round_trip() {
        let flow = Flow {
            id: FlowId("F.1".to_string()),
            client_id: ClientId("C.1".to_string()),
            name: "Interrogate".to_string(),
            creator: "analyst".to_string(),
            state: FlowState::Running,
            started_at: Utc::now(),
            args: FlowArgs::default(),
        };

        let serialized = serde_json::to_string(&flow).unwrap();
        let deserialized: Flow = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, flow);
    }
}
