//!
//! Inquest Core - session synchronization engine for the Inquest
//! investigation console.
//!
//! Given a selected managed client and an asynchronous remote query API,
//! this crate maintains a consistent, continuously refreshed local view
//! of the client's approvals, flows, scheduled flows, and per-flow
//! results, and drives the flow lifecycle commands. At most one request
//! is in flight per polling source, all per-client activity is revoked
//! when the selection changes, and result polling terminates inclusively
//! (one fetch after the flow is first seen finished).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - records, session state, and the remote boundary
pub mod domain;

/// Application services - store, drivers, effects, views, facade
pub mod application;

/// Engine configuration
pub mod config;

/// Error types
pub mod error;

/// Shared value types
pub mod types;

// Re-export the facade surface
pub use application::engine::{operator_identity, SessionEngine};
pub use application::store::SessionStore;
pub use application::views::SessionViews;
pub use config::EngineConfig;
pub use error::EngineError;
pub use types::FlowArgs;

// Re-export the domain vocabulary
pub use domain::records::{
    Approval, ApprovalId, ApprovalRequest, ApprovalStatus, Client, ClientId, ConfiguredFlow,
    Flow, FlowDescriptor, FlowId, FlowResultSet, FlowResultsQuery, FlowState, ResultItem,
    ResultSetState, ScheduledFlow, ScheduledFlowId,
};
pub use domain::remote::{ApiError, InvestigationApi};
pub use domain::session::{FlowConfiguration, FlowEntry, SessionState, StartFlowState};
