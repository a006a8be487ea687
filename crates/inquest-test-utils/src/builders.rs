//! Builders for test data records.

use chrono::{Duration, Utc};
use serde_json::{json, Value};

use inquest_core::{
    Approval, ApprovalId, ApprovalStatus, Client, ClientId, Flow, FlowArgs, FlowDescriptor,
    FlowId, FlowState, ResultItem, ScheduledFlow, ScheduledFlowId,
};

/// A fully hydrated client record.
pub fn client(id: &str) -> Client {
    Client {
        id: ClientId(id.to_string()),
        hostname: Some(format!("host-{}", id)),
        os_description: Some("Linux 6.1".to_string()),
        labels: vec!["fleet".to_string()],
        last_seen_at: Some(Utc::now()),
    }
}

/// A flow record started now.
pub fn flow(id: &str, client_id: &str, state: FlowState) -> Flow {
    FlowBuilder::new(id, client_id).state(state).build()
}

/// Fluent builder for flow records.
pub struct FlowBuilder {
    flow: Flow,
}

impl FlowBuilder {
    /// A running `Interrogate` flow started now.
    pub fn new(id: &str, client_id: &str) -> Self {
        Self {
            flow: Flow {
                id: FlowId(id.to_string()),
                client_id: ClientId(client_id.to_string()),
                name: "Interrogate".to_string(),
                creator: "analyst".to_string(),
                state: FlowState::Running,
                started_at: Utc::now(),
                args: FlowArgs::default(),
            },
        }
    }

    /// Set the lifecycle state.
    pub fn state(mut self, state: FlowState) -> Self {
        self.flow.state = state;
        self
    }

    /// Set the flow name.
    pub fn name(mut self, name: &str) -> Self {
        self.flow.name = name.to_string();
        self
    }

    /// Backdate the start time.
    pub fn started_secs_ago(mut self, secs: i64) -> Self {
        self.flow.started_at = Utc::now() - Duration::seconds(secs);
        self
    }

    /// Set the argument payload.
    pub fn args(mut self, args: Value) -> Self {
        self.flow.args = FlowArgs::new(args);
        self
    }

    /// Finish the record.
    pub fn build(self) -> Flow {
        self.flow
    }
}

/// An approval record for a client.
pub fn approval(id: &str, client_id: &str, status: ApprovalStatus) -> Approval {
    Approval {
        id: ApprovalId(id.to_string()),
        client_id: ClientId(client_id.to_string()),
        status,
        reason: "case 42".to_string(),
        requestor: "analyst".to_string(),
        expires_at: match status {
            ApprovalStatus::Expired => Some(Utc::now() - Duration::hours(1)),
            _ => Some(Utc::now() + Duration::hours(24)),
        },
    }
}

/// A scheduled flow record created now.
pub fn scheduled_flow(id: &str, client_id: &str, flow_name: &str) -> ScheduledFlow {
    ScheduledFlow {
        id: ScheduledFlowId(id.to_string()),
        client_id: ClientId(client_id.to_string()),
        flow_name: flow_name.to_string(),
        creator: "analyst".to_string(),
        args: FlowArgs::default(),
        created_at: Utc::now(),
    }
}

/// `count` result items with numbered payloads.
pub fn result_items(count: usize) -> Vec<ResultItem> {
    (0..count)
        .map(|n| ResultItem {
            payload: json!({ "n": n }),
            tag: None,
            timestamp: Utc::now(),
        })
        .collect()
}

/// A flow descriptor with the given default arguments.
pub fn descriptor(name: &str, default_args: Value) -> FlowDescriptor {
    FlowDescriptor {
        name: name.to_string(),
        friendly_name: name.to_string(),
        category: "Collectors".to_string(),
        default_args: FlowArgs::new(default_args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_builder_defaults() {
        let flow = FlowBuilder::new("F.1", "C.1").build();
        assert_eq!(flow.id.0, "F.1");
        assert_eq!(flow.client_id.0, "C.1");
        assert_eq!(flow.state, FlowState::Running);
    }

    #[test]
    fn test_flow_builder_backdating() {
        let older = FlowBuilder::new("F.1", "C.1").started_secs_ago(60).build();
        let newer = FlowBuilder::new("F.2", "C.1").build();
        assert!(older.started_at < newer.started_at);
    }

    #[test]
    fn test_expired_approval_carries_past_expiry() {
        let expired = approval("A.1", "C.1", ApprovalStatus::Expired);
        assert!(expired.expires_at.unwrap() < Utc::now());
    }
}
