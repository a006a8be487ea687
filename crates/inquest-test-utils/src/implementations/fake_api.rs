//! Scripted in-memory fake of the remote investigation API.
//!
//! Each operation can be scripted with a queue of responses; the last
//! queued response repeats once the queue drains, so a script like
//! `[Running-list, Finished-list]` models a flow finishing between two
//! polls. Unscripted operations return sensible defaults (empty lists,
//! synthesized records). Per-method latency turns any call into a timed
//! await, which composes with tokio's paused test clock to exercise the
//! exhaust discipline. Every call is recorded as an entered/completed
//! event pair for ordering assertions.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use inquest_core::{
    ApiError, Approval, ApprovalId, ApprovalRequest, ApprovalStatus, Client, ClientId, Flow,
    FlowArgs, FlowId, FlowResultsQuery, FlowState, InvestigationApi, ResultItem, ScheduledFlow,
    ScheduledFlowId,
};

use crate::builders;

/// Identifies one remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMethod {
    FetchClient,
    ListApprovals,
    RequestApproval,
    ListFlows,
    ListResults,
    ListScheduledFlows,
    StartFlow,
    ScheduleFlow,
    CancelFlow,
}

/// One recorded call boundary.
///
/// `subject` is the client id for client-scoped lists, the flow id for
/// result fetches and cancels, and the flow name for start/schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiEvent {
    Entered { method: ApiMethod, subject: String },
    Completed { method: ApiMethod, subject: String },
}

/// Response queue with last-value-repeats semantics.
struct Script<T> {
    queue: VecDeque<Result<T, ApiError>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }
}

impl<T: Clone> Script<T> {
    fn push(&mut self, response: Result<T, ApiError>) {
        self.queue.push_back(response);
    }

    fn next_or(&mut self, default: T) -> Result<T, ApiError> {
        if self.queue.len() > 1 {
            self.queue.pop_front().unwrap()
        } else if let Some(last) = self.queue.front() {
            last.clone()
        } else {
            Ok(default)
        }
    }
}

#[derive(Default)]
struct FakeState {
    clients: HashMap<ClientId, Client>,
    approvals: HashMap<ClientId, Script<Vec<Approval>>>,
    flows: HashMap<ClientId, Script<Vec<Flow>>>,
    scheduled: HashMap<ClientId, Script<Vec<ScheduledFlow>>>,
    results: HashMap<FlowId, Script<Vec<ResultItem>>>,
    approval_requests: Script<Approval>,
    starts: Script<Flow>,
    schedules: Script<ScheduledFlow>,
    cancels: Script<Flow>,
    latencies: HashMap<ApiMethod, Duration>,
    events: Vec<ApiEvent>,
}

/// Scripted fake implementation of [`InvestigationApi`].
#[derive(Default)]
pub struct FakeInvestigationApi {
    state: Mutex<FakeState>,
}

impl FakeInvestigationApi {
    /// A fake with no scripts: every call succeeds with a default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client record returned by `fetch_client`.
    pub fn insert_client(&self, client: Client) {
        self.state.lock().clients.insert(client.id.clone(), client);
    }

    /// Queue an approval list response for a client.
    pub fn script_approvals(&self, client_id: &ClientId, response: Result<Vec<Approval>, ApiError>) {
        self.state
            .lock()
            .approvals
            .entry(client_id.clone())
            .or_default()
            .push(response);
    }

    /// Queue a flow list response for a client.
    pub fn script_flows(&self, client_id: &ClientId, response: Result<Vec<Flow>, ApiError>) {
        self.state
            .lock()
            .flows
            .entry(client_id.clone())
            .or_default()
            .push(response);
    }

    /// Queue a scheduled-flow list response for a client.
    pub fn script_scheduled_flows(
        &self,
        client_id: &ClientId,
        response: Result<Vec<ScheduledFlow>, ApiError>,
    ) {
        self.state
            .lock()
            .scheduled
            .entry(client_id.clone())
            .or_default()
            .push(response);
    }

    /// Queue a result list response for a flow.
    pub fn script_results(&self, flow_id: &FlowId, response: Result<Vec<ResultItem>, ApiError>) {
        self.state
            .lock()
            .results
            .entry(flow_id.clone())
            .or_default()
            .push(response);
    }

    /// Queue a response for the next approval request.
    pub fn script_approval_request(&self, response: Result<Approval, ApiError>) {
        self.state.lock().approval_requests.push(response);
    }

    /// Queue a response for the next flow start.
    pub fn script_start_flow(&self, response: Result<Flow, ApiError>) {
        self.state.lock().starts.push(response);
    }

    /// Queue a response for the next flow schedule.
    pub fn script_schedule_flow(&self, response: Result<ScheduledFlow, ApiError>) {
        self.state.lock().schedules.push(response);
    }

    /// Queue a response for the next flow cancel.
    pub fn script_cancel_flow(&self, response: Result<Flow, ApiError>) {
        self.state.lock().cancels.push(response);
    }

    /// Delay every call of a method by the given duration.
    pub fn set_latency(&self, method: ApiMethod, latency: Duration) {
        self.state.lock().latencies.insert(method, latency);
    }

    /// All recorded call events, in order.
    pub fn events(&self) -> Vec<ApiEvent> {
        self.state.lock().events.clone()
    }

    /// Recorded events of one method, in order.
    pub fn events_for(&self, method: ApiMethod) -> Vec<ApiEvent> {
        self.events()
            .into_iter()
            .filter(|event| match event {
                ApiEvent::Entered { method: m, .. } | ApiEvent::Completed { method: m, .. } => {
                    *m == method
                }
            })
            .collect()
    }

    /// How many calls of a method were issued.
    pub fn call_count(&self, method: ApiMethod) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, ApiEvent::Entered { method: m, .. } if *m == method))
            .count()
    }

    /// Subjects of all issued calls of a method, in order.
    pub fn call_subjects(&self, method: ApiMethod) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ApiEvent::Entered { method: m, subject } if m == method => Some(subject),
                _ => None,
            })
            .collect()
    }

    fn enter(&self, method: ApiMethod, subject: &str) {
        self.state.lock().events.push(ApiEvent::Entered {
            method,
            subject: subject.to_string(),
        });
    }

    fn complete(&self, method: ApiMethod, subject: &str) {
        self.state.lock().events.push(ApiEvent::Completed {
            method,
            subject: subject.to_string(),
        });
    }

    async fn pause(&self, method: ApiMethod) {
        let latency = self.state.lock().latencies.get(&method).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl InvestigationApi for FakeInvestigationApi {
    async fn fetch_client(&self, client_id: &ClientId) -> Result<Client, ApiError> {
        self.enter(ApiMethod::FetchClient, &client_id.0);
        self.pause(ApiMethod::FetchClient).await;
        let client = self
            .state
            .lock()
            .clients
            .get(client_id)
            .cloned()
            .unwrap_or_else(|| builders::client(&client_id.0));
        self.complete(ApiMethod::FetchClient, &client_id.0);
        Ok(client)
    }

    async fn list_approvals(&self, client_id: &ClientId) -> Result<Vec<Approval>, ApiError> {
        self.enter(ApiMethod::ListApprovals, &client_id.0);
        self.pause(ApiMethod::ListApprovals).await;
        let result = self
            .state
            .lock()
            .approvals
            .entry(client_id.clone())
            .or_default()
            .next_or(Vec::new());
        self.complete(ApiMethod::ListApprovals, &client_id.0);
        result
    }

    async fn request_approval(
        &self,
        client_id: &ClientId,
        request: &ApprovalRequest,
    ) -> Result<Approval, ApiError> {
        self.enter(ApiMethod::RequestApproval, &client_id.0);
        self.pause(ApiMethod::RequestApproval).await;
        let default = Approval {
            id: ApprovalId(format!("A.{}", Uuid::new_v4())),
            client_id: client_id.clone(),
            status: ApprovalStatus::Pending,
            reason: request.reason.clone(),
            requestor: "analyst".to_string(),
            expires_at: None,
        };
        let result = self.state.lock().approval_requests.next_or(default);
        self.complete(ApiMethod::RequestApproval, &client_id.0);
        result
    }

    async fn list_flows_for_client(&self, client_id: &ClientId) -> Result<Vec<Flow>, ApiError> {
        self.enter(ApiMethod::ListFlows, &client_id.0);
        self.pause(ApiMethod::ListFlows).await;
        let result = self
            .state
            .lock()
            .flows
            .entry(client_id.clone())
            .or_default()
            .next_or(Vec::new());
        self.complete(ApiMethod::ListFlows, &client_id.0);
        result
    }

    async fn list_results_for_flow(
        &self,
        _client_id: &ClientId,
        query: &FlowResultsQuery,
    ) -> Result<Vec<ResultItem>, ApiError> {
        self.enter(ApiMethod::ListResults, &query.flow_id.0);
        self.pause(ApiMethod::ListResults).await;
        let result = self
            .state
            .lock()
            .results
            .entry(query.flow_id.clone())
            .or_default()
            .next_or(Vec::new());
        self.complete(ApiMethod::ListResults, &query.flow_id.0);
        result
    }

    async fn list_scheduled_flows(
        &self,
        client_id: &ClientId,
        username: &str,
    ) -> Result<Vec<ScheduledFlow>, ApiError> {
        self.enter(
            ApiMethod::ListScheduledFlows,
            &format!("{}:{}", client_id.0, username),
        );
        self.pause(ApiMethod::ListScheduledFlows).await;
        let result = self
            .state
            .lock()
            .scheduled
            .entry(client_id.clone())
            .or_default()
            .next_or(Vec::new());
        self.complete(
            ApiMethod::ListScheduledFlows,
            &format!("{}:{}", client_id.0, username),
        );
        result
    }

    async fn start_flow(
        &self,
        client_id: &ClientId,
        flow_name: &str,
        args: &FlowArgs,
    ) -> Result<Flow, ApiError> {
        self.enter(ApiMethod::StartFlow, flow_name);
        self.pause(ApiMethod::StartFlow).await;
        let default = Flow {
            id: FlowId(format!("F.{}", Uuid::new_v4())),
            client_id: client_id.clone(),
            name: flow_name.to_string(),
            creator: "analyst".to_string(),
            state: FlowState::Running,
            started_at: Utc::now(),
            args: args.clone(),
        };
        let result = self.state.lock().starts.next_or(default);
        self.complete(ApiMethod::StartFlow, flow_name);
        result
    }

    async fn schedule_flow(
        &self,
        client_id: &ClientId,
        flow_name: &str,
        args: &FlowArgs,
    ) -> Result<ScheduledFlow, ApiError> {
        self.enter(ApiMethod::ScheduleFlow, flow_name);
        self.pause(ApiMethod::ScheduleFlow).await;
        let default = ScheduledFlow {
            id: ScheduledFlowId(format!("SF.{}", Uuid::new_v4())),
            client_id: client_id.clone(),
            flow_name: flow_name.to_string(),
            creator: "analyst".to_string(),
            args: args.clone(),
            created_at: Utc::now(),
        };
        let result = self.state.lock().schedules.next_or(default);
        self.complete(ApiMethod::ScheduleFlow, flow_name);
        result
    }

    async fn cancel_flow(&self, client_id: &ClientId, flow_id: &FlowId) -> Result<Flow, ApiError> {
        self.enter(ApiMethod::CancelFlow, &flow_id.0);
        self.pause(ApiMethod::CancelFlow).await;
        let default = Flow {
            id: flow_id.clone(),
            client_id: client_id.clone(),
            name: "Interrogate".to_string(),
            creator: "analyst".to_string(),
            state: FlowState::Cancelled,
            started_at: Utc::now(),
            args: FlowArgs::default(),
        };
        let result = self.state.lock().cancels.next_or(default);
        self.complete(ApiMethod::CancelFlow, &flow_id.0);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::flow;

    #[tokio::test]
    async fn test_unscripted_calls_return_defaults() {
        let api = FakeInvestigationApi::new();
        let client_id = ClientId("C.1".to_string());

        assert!(api.list_approvals(&client_id).await.unwrap().is_empty());
        assert!(api.list_flows_for_client(&client_id).await.unwrap().is_empty());

        let started = api
            .start_flow(&client_id, "Interrogate", &FlowArgs::default())
            .await
            .unwrap();
        assert_eq!(started.name, "Interrogate");
        assert_eq!(started.state, FlowState::Running);
    }

    #[tokio::test]
    async fn test_last_scripted_response_repeats() {
        let api = FakeInvestigationApi::new();
        let client_id = ClientId("C.1".to_string());
        api.script_flows(&client_id, Ok(vec![flow("F.1", "C.1", FlowState::Running)]));
        api.script_flows(&client_id, Ok(vec![flow("F.1", "C.1", FlowState::Finished)]));

        let first = api.list_flows_for_client(&client_id).await.unwrap();
        assert_eq!(first[0].state, FlowState::Running);

        for _ in 0..3 {
            let later = api.list_flows_for_client(&client_id).await.unwrap();
            assert_eq!(later[0].state, FlowState::Finished);
        }
    }

    #[tokio::test]
    async fn test_events_record_call_boundaries() {
        let api = FakeInvestigationApi::new();
        let client_id = ClientId("C.1".to_string());
        api.list_flows_for_client(&client_id).await.unwrap();

        assert_eq!(
            api.events_for(ApiMethod::ListFlows),
            vec![
                ApiEvent::Entered {
                    method: ApiMethod::ListFlows,
                    subject: "C.1".to_string()
                },
                ApiEvent::Completed {
                    method: ApiMethod::ListFlows,
                    subject: "C.1".to_string()
                },
            ]
        );
        assert_eq!(api.call_count(ApiMethod::ListFlows), 1);
    }

    #[tokio::test]
    async fn test_scripted_error_then_recovery() {
        let api = FakeInvestigationApi::new();
        let client_id = ClientId("C.1".to_string());
        api.script_flows(&client_id, Err(ApiError::Transport("reset".to_string())));
        api.script_flows(&client_id, Ok(Vec::new()));

        assert!(api.list_flows_for_client(&client_id).await.is_err());
        assert!(api.list_flows_for_client(&client_id).await.is_ok());
    }
}
