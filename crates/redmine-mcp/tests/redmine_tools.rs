//! End-to-end tool calls against a mocked Redmine over real HTTP.

use std::sync::Arc;

use httpmock::prelude::*;
use redmine_client::{RedmineClient, API_KEY_HEADER};
use redmine_core::{Error, RedmineConfig, SharedApi};
use redmine_mcp::protocol::{JsonRpcRequest, RequestId, ToolCallResult, JSONRPC_VERSION};
use redmine_mcp::tools::redmine_tools;
use redmine_mcp::{McpServer, ToolRegistry};
use serde_json::{json, Value};

const API_KEY: &str = "integration-key";

fn registry(server: &MockServer) -> ToolRegistry {
    let client = RedmineClient::with_base_url(format!("{}/", server.base_url()), API_KEY).unwrap();
    let api: SharedApi = Arc::new(client);
    redmine_tools(api).unwrap()
}

#[tokio::test]
async fn list_issues_sends_only_given_filters() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/issues.json")
                .header(API_KEY_HEADER, API_KEY)
                .query_param("project_id", "web")
                .query_param("status_id", "open")
                .query_param("limit", "25")
                .query_param("offset", "0")
                .query_param_missing("assigned_to_id")
                .query_param_missing("sort");
            then.status(200)
                .json_body(json!({"issues": [{"id": 1}], "total_count": 1}));
        })
        .await;

    let result = registry(&server)
        .call(
            "list_issues",
            Some(json!({"project_id": "web", "status_id": "open"})),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result["total_count"], 1);
}

#[tokio::test]
async fn create_issue_posts_minimal_envelope() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/issues.json")
                .header("content-type", "application/json")
                .json_body(json!({"issue": {"project_id": "P", "subject": "S"}}));
            then.status(201)
                .json_body(json!({"issue": {"id": 77, "subject": "S"}}));
        })
        .await;

    let result = registry(&server)
        .call("create_issue", Some(json!({"project_id": "P", "subject": "S"})))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result["issue"]["id"], 77);
}

#[tokio::test]
async fn update_issue_returns_empty_object() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/issues/7.json")
                .json_body(json!({"issue": {"notes": "hi", "private_notes": true}}));
            then.status(204);
        })
        .await;

    let result = registry(&server)
        .call(
            "update_issue",
            Some(json!({"issue_id": 7, "notes": "hi", "private_notes": true})),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result, json!({}));
}

#[tokio::test]
async fn bulk_update_reports_each_issue() {
    let server = MockServer::start_async().await;
    let ok_one = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/issues/1.json")
                .json_body(json!({"issue": {"status_id": 5}}));
            then.status(204);
        })
        .await;
    let failing = server
        .mock_async(|when, then| {
            when.method(PUT).path("/issues/2.json");
            then.status(422)
                .json_body(json!({"errors": ["Status is invalid"]}));
        })
        .await;
    let ok_three = server
        .mock_async(|when, then| {
            when.method(PUT).path("/issues/3.json");
            then.status(204);
        })
        .await;

    let result = registry(&server)
        .call(
            "bulk_update_issues",
            Some(json!({"issue_ids": [1, 2, 3], "status_id": 5})),
        )
        .await
        .unwrap();

    ok_one.assert_async().await;
    failing.assert_async().await;
    ok_three.assert_async().await;

    let results = result["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0], json!({"id": 1, "status": "ok"}));
    assert_eq!(results[1]["id"], 2);
    assert_eq!(results[1]["status"], "error");
    assert!(results[1]["message"]
        .as_str()
        .unwrap()
        .contains("Status is invalid"));
    assert_eq!(results[2], json!({"id": 3, "status": "ok"}));
}

#[tokio::test]
async fn missing_ticket_rules_is_not_found() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/projects/P/wiki/TicketRules.json");
            then.status(404);
        })
        .await;

    let registry = registry(&server);
    let err = registry
        .call("get_ticket_rules", Some(json!({"project_id": "P"})))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let rendered = registry
        .execute("get_ticket_rules", Some(json!({"project_id": "P"})))
        .await;
    assert_eq!(rendered.is_error, Some(true));

    mock.assert_hits_async(2).await;
}

#[tokio::test]
async fn search_restricts_to_issues() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/search.json")
                .query_param("q", "timeout")
                .query_param("issues", "1")
                .query_param("limit", "10")
                .query_param("offset", "0");
            then.status(200).json_body(json!({"results": []}));
        })
        .await;

    registry(&server)
        .call("search_issues", Some(json!({"query": "timeout", "limit": 10})))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn tools_call_through_server() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/issue_statuses.json");
            then.status(200)
                .json_body(json!({"issue_statuses": [{"id": 1, "name": "New"}]}));
        })
        .await;

    let config = RedmineConfig {
        url: server.base_url(),
        api_key: API_KEY.to_string(),
    };
    let mcp = McpServer::from_config(&config).unwrap();
    let response = mcp
        .session()
        .handle_request(JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RequestId::Number(1),
            method: "tools/call".to_string(),
            params: Some(json!({"name": "list_statuses"})),
        })
        .await;

    let result: ToolCallResult = serde_json::from_value(response.result.unwrap()).unwrap();
    let body: Value = serde_json::from_str(result.first_text().unwrap()).unwrap();
    assert_eq!(body["issue_statuses"][0]["name"], "New");
}

#[tokio::test]
async fn invalid_arguments_make_no_request() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200).json_body(json!({}));
        })
        .await;

    let err = registry(&server)
        .call("get_wiki_page", Some(json!({"project_id": "P"})))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidArguments(_)));
    mock.assert_hits_async(0).await;
}
