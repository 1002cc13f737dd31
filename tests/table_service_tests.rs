//! Table service adapter against a mock HTTP server

use futures::TryStreamExt;
use puppetconfig::core::{Entity, FactError, Partition};
use puppetconfig::storage::{EntityStore, Filter, TableServiceConfig, TableServiceStore, query_stream};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TABLE: &str = "facts";
const WEB01_PATH: &str = "/facts(PartitionKey='PuppetCfg',RowKey='web01')";

fn store_for(server: &MockServer) -> TableServiceStore {
    let config = TableServiceConfig::new(&server.uri(), TABLE, "?sv=2019-02-02&sig=secret");
    TableServiceStore::new(config).unwrap()
}

#[tokio::test]
async fn test_query_follows_continuation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/facts()"))
        .and(query_param("NextPartitionKey", "PuppetCfg"))
        .and(query_param("NextRowKey", "web02"))
        .and(query_param("sig", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"PartitionKey": "PuppetCfg", "RowKey": "web02", "role": "web"}]
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/facts()"))
        .and(query_param("$filter", "PartitionKey eq 'PuppetCfg'"))
        .and(header("Accept", "application/json;odata=nometadata"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ms-continuation-NextPartitionKey", "PuppetCfg")
                .insert_header("x-ms-continuation-NextRowKey", "web02")
                .set_body_json(json!({
                    "value": [{
                        "PartitionKey": "PuppetCfg",
                        "RowKey": "web01",
                        "Timestamp": "2024-01-01T00:00:00Z",
                        "role": "db"
                    }]
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let entities: Vec<Entity> = query_stream(&store, Filter::partition(Partition::MachineFacts))
        .try_collect()
        .await
        .unwrap();

    let names: Vec<&str> = entities.iter().map(|e| e.row_key.as_str()).collect();
    assert_eq!(names, vec!["web01", "web02"]);
    assert_eq!(entities[0].property("role"), Some("db"));
}

#[tokio::test]
async fn test_get_missing_entity_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WEB01_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store_for(&server);
    assert!(store.get("PuppetCfg", "web01").await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_entity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WEB01_PATH))
        .and(header("x-ms-version", "2019-02-02"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "PartitionKey": "PuppetCfg",
            "RowKey": "web01",
            "role": "web",
            "cores": 8
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let entity = store.get("PuppetCfg", "web01").await.unwrap().unwrap();
    assert_eq!(entity.property("role"), Some("web"));
    assert_eq!(entity.property("cores"), Some("8"));
}

#[tokio::test]
async fn test_create_conflict_is_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/facts"))
        .and(header("Prefer", "return-no-content"))
        .and(body_partial_json(json!({"PartitionKey": "PuppetCfg", "RowKey": "web01"})))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store
        .create(Entity::new(Partition::MachineFacts, "web01"))
        .await
        .unwrap_err();
    assert!(matches!(err, FactError::AlreadyExists(_)));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_update_replaces_unconditionally() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(WEB01_PATH))
        .and(header("If-Match", "*"))
        .and(body_partial_json(json!({"role": "web"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    store
        .update(Entity::new(Partition::MachineFacts, "web01").with_property("role", "web"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_missing_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(WEB01_PATH))
        .and(header("If-Match", "*"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.delete("PuppetCfg", "web01").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_server_error_is_infrastructure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/facts()"))
        .respond_with(ResponseTemplate::new(403).set_body_string("AuthenticationFailed"))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store
        .query_page(&Filter::partition(Partition::ValidFacts), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FactError::Infrastructure(_)));
    assert!(err.to_string().contains("403"));
    assert_eq!(err.exit_code(), 2);
}
