//! Mock implementation of the InvestigationApi trait.

use async_trait::async_trait;
use mockall::mock;

use inquest_core::{
    ApiError, Approval, ApprovalRequest, Client, ClientId, Flow, FlowArgs, FlowId,
    FlowResultsQuery, InvestigationApi, ResultItem, ScheduledFlow,
};

mock! {
    pub InvestigationApi {}

    #[async_trait]
    impl InvestigationApi for InvestigationApi {
        async fn fetch_client(&self, client_id: &ClientId) -> Result<Client, ApiError>;
        async fn list_approvals(&self, client_id: &ClientId) -> Result<Vec<Approval>, ApiError>;
        async fn request_approval(
            &self,
            client_id: &ClientId,
            request: &ApprovalRequest,
        ) -> Result<Approval, ApiError>;
        async fn list_flows_for_client(&self, client_id: &ClientId) -> Result<Vec<Flow>, ApiError>;
        async fn list_results_for_flow(
            &self,
            client_id: &ClientId,
            query: &FlowResultsQuery,
        ) -> Result<Vec<ResultItem>, ApiError>;
        async fn list_scheduled_flows(
            &self,
            client_id: &ClientId,
            username: &str,
        ) -> Result<Vec<ScheduledFlow>, ApiError>;
        async fn start_flow(
            &self,
            client_id: &ClientId,
            flow_name: &str,
            args: &FlowArgs,
        ) -> Result<Flow, ApiError>;
        async fn schedule_flow(
            &self,
            client_id: &ClientId,
            flow_name: &str,
            args: &FlowArgs,
        ) -> Result<ScheduledFlow, ApiError>;
        async fn cancel_flow(&self, client_id: &ClientId, flow_id: &FlowId) -> Result<Flow, ApiError>;
    }
}

/// A mock that answers every list with an empty collection.
pub fn create_quiet_mock_api() -> MockInvestigationApi {
    let mut mock = MockInvestigationApi::new();

    mock.expect_list_approvals().returning(|_| Ok(Vec::new()));
    mock.expect_list_flows_for_client()
        .returning(|_| Ok(Vec::new()));
    mock.expect_list_scheduled_flows()
        .returning(|_, _| Ok(Vec::new()));
    mock.expect_list_results_for_flow()
        .returning(|_, _| Ok(Vec::new()));

    mock
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_quiet_mock_default_behavior() {
        let mock = create_quiet_mock_api();
        let client_id = ClientId("C.1".to_string());

        assert!(mock.list_approvals(&client_id).await.unwrap().is_empty());
        assert!(mock
            .list_flows_for_client(&client_id)
            .await
            .unwrap()
            .is_empty());
    }
}
