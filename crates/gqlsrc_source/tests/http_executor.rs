use gqlsrc_source::{
    ExecuteRequest, ExecutorError, HttpExecutor, MemorySink, RemoteExecutor, Sourcer,
    SourcingConfig,
};
use serde_json::{json, Map};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor(server: &MockServer) -> HttpExecutor {
    HttpExecutor::builder(format!("{}/graphql", server.uri()))
        .header("Authorization", "Bearer token")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_posts_query_operation_and_variables() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer token"))
        .and(body_json(json!({
            "query": "query LIST_User_EN($limit: Int) { userQuery(limit: $limit) { entities { entityId } } }",
            "operationName": "LIST_User_EN",
            "variables": {"limit": 100},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"userQuery": {"entities": [{"entityId": "1"}]}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut variables = Map::new();
    variables.insert("limit".into(), json!(100));
    let request = ExecuteRequest::new(
        "query LIST_User_EN($limit: Int) { userQuery(limit: $limit) { entities { entityId } } }",
        "LIST_User_EN",
    )
    .with_variables(variables);

    let response = executor(&server).execute(request).await.unwrap();
    assert!(response.errors.is_empty());
    assert_eq!(response.data.unwrap()["userQuery"]["entities"][0]["entityId"], "1");
}

#[tokio::test]
async fn test_graphql_errors_are_returned_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "Field \"nope\" does not exist", "path": ["nope"]}]
        })))
        .mount(&server)
        .await;

    let response = executor(&server)
        .execute(ExecuteRequest::new("{ nope }", ""))
        .await
        .unwrap();
    assert!(response.data.is_none());
    assert_eq!(response.errors[0].path, vec![json!("nope")]);
}

#[tokio::test]
async fn test_http_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = executor(&server)
        .execute(ExecuteRequest::new("{ a }", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::HttpStatus { status: 503, ref body } if body == "maintenance"));
}

#[tokio::test]
async fn test_malformed_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let empty = HttpExecutor::builder(format!("{}/empty", server.uri())).build().unwrap();
    let err = empty.execute(ExecuteRequest::new("{ a }", "")).await.unwrap_err();
    assert!(matches!(err, ExecutorError::Protocol(_)));

    let html = HttpExecutor::builder(format!("{}/html", server.uri())).build().unwrap();
    let err = html.execute(ExecuteRequest::new("{ a }", "")).await.unwrap_err();
    assert!(matches!(err, ExecutorError::Json(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_schema_load() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = SourcingConfig::new(server.uri());
    let executor = HttpExecutor::builder(config.endpoint().unwrap()).build().unwrap();
    let err = Sourcer::new(config, Arc::new(executor))
        .unwrap()
        .run(&MemorySink::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "SCHEMA_LOAD_ERROR");
    assert!(err.to_string().contains("HTTP status 500"));
}
