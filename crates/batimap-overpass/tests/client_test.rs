use async_trait::async_trait;
use batimap_core::ports::BuildingQuery;
use batimap_core::BatimapError;
use batimap_overpass::{GeoQueryClient, QueryError, QueryTransport, RetryPolicy};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

const BODY: &str = r#"{"elements": [{"type": "way", "id": 7, "tags": {"building": "yes", "source": "cadastre 2016"}}]}"#;

/// Replays scripted outcomes and records which endpoint each attempt hit
#[derive(Default)]
struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<String, u16>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new(outcomes: Vec<Result<&str, u16>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().map(|o| o.map(str::to_string)).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryTransport for ScriptedTransport {
    async fn execute(&self, endpoint: &str, _query: &str) -> Result<String, QueryError> {
        self.calls.lock().unwrap().push(endpoint.to_string());
        match self.outcomes.lock().unwrap().pop_front() {
            Some(Ok(body)) => Ok(body),
            Some(Err(status)) => Err(QueryError::from_status(endpoint, status, String::new())),
            None => Ok(BODY.to_string()),
        }
    }
}

fn client(transport: ScriptedTransport, max_attempts: u32) -> GeoQueryClient<ScriptedTransport> {
    GeoQueryClient::new(
        vec!["http://a".to_string(), "http://b".to_string(), "http://c".to_string()],
        transport,
        RetryPolicy::new(max_attempts, Duration::ZERO),
    )
    .unwrap()
}

#[tokio::test]
async fn test_round_robin_across_calls() {
    let client = client(ScriptedTransport::new(vec![]), 9);
    for _ in 0..4 {
        client.query_with_retries("[out:json];").await.unwrap();
    }
    let calls = client_calls(&client);
    assert_eq!(calls, vec!["http://a", "http://b", "http://c", "http://a"]);
}

#[tokio::test]
async fn test_retries_stay_on_the_same_endpoint() {
    let client = client(ScriptedTransport::new(vec![Err(429), Err(503), Ok(BODY)]), 9);
    let buildings = client.city_buildings("26400", &[]).await.unwrap();

    assert_eq!(buildings.len(), 1);
    assert_eq!(buildings[0].id, 7);
    assert_eq!(client_calls(&client), vec!["http://a"; 3]);
}

#[tokio::test]
async fn test_exhausted_retries_return_last_error() {
    let client = client(ScriptedTransport::new(vec![Err(429), Err(429), Err(504)]), 3);
    let err = client.query_with_retries("[out:json];").await.unwrap_err();

    assert!(matches!(err, QueryError::ServerLoad { status: 504, .. }));
    assert_eq!(client_calls(&client).len(), 3);
}

#[tokio::test]
async fn test_permanent_errors_are_not_retried() {
    let client = client(ScriptedTransport::new(vec![Err(400)]), 9);
    let err = client.city_buildings("26400", &[]).await.unwrap_err();

    assert!(matches!(err, BatimapError::Query { transient: false, .. }));
    assert_eq!(client_calls(&client).len(), 1);
}

#[tokio::test]
async fn test_server_side_abort_is_retried() {
    let aborted = r#"{"elements": [], "remark": "runtime error: Query timed out"}"#;
    let client = client(ScriptedTransport::new(vec![Ok(aborted), Ok(BODY)]), 9);
    let response = client.query_with_retries("[out:json];").await.unwrap();
    assert_eq!(response.elements.len(), 1);
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let client = client(ScriptedTransport::new(vec![Ok("<html>busy</html>")]), 9);
    let err = client.query_with_retries("[out:json];").await.unwrap_err();
    assert!(matches!(err, QueryError::Decode { .. }));
}

#[test]
fn test_empty_endpoint_list_rejected() {
    let result = GeoQueryClient::new(Vec::new(), ScriptedTransport::default(), RetryPolicy::default());
    assert!(result.is_err());
}

fn client_calls(client: &GeoQueryClient<ScriptedTransport>) -> Vec<String> {
    client.transport().calls()
}
