//! Table service entity store
//!
//! Talks to the managed table service REST surface with a shared access
//! signature. Entities are exchanged as flat JSON objects without OData
//! metadata; non-string properties are stringified on read.

use super::engine::{Continuation, EntityStore, Page};
use super::filter::Filter;
use crate::core::{Entity, FactError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::time::Duration;
use tracing::debug;

const API_VERSION: &str = "2019-02-02";
const ACCEPT_NO_METADATA: &str = "application/json;odata=nometadata";
const NEXT_PARTITION_HEADER: &str = "x-ms-continuation-NextPartitionKey";
const NEXT_ROW_HEADER: &str = "x-ms-continuation-NextRowKey";

/// Table service connection configuration
#[derive(Debug, Clone)]
pub struct TableServiceConfig {
    /// Service endpoint, e.g. `https://account.table.core.windows.net`
    pub endpoint: String,

    /// Table holding every partition
    pub table_name: String,

    /// Shared access signature query string
    pub sas_token: String,

    /// Optional HTTP proxy for all requests
    pub proxy: Option<String>,

    /// Socket-level request timeout
    pub timeout: Duration,
}

impl TableServiceConfig {
    pub fn new(endpoint: &str, table_name: &str, sas_token: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            table_name: table_name.to_string(),
            sas_token: sas_token.trim_start_matches('?').to_string(),
            proxy: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the HTTP proxy
    pub fn proxy(mut self, proxy: &str) -> Self {
        self.proxy = Some(proxy.to_string());
        self
    }

    /// Set request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("endpoint cannot be empty".to_string());
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(format!("endpoint '{}' must be an http(s) URL", self.endpoint));
        }
        if self.table_name.is_empty() {
            return Err("table_name cannot be empty".to_string());
        }
        if self.sas_token.is_empty() {
            return Err("sas_token cannot be empty".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be > 0".to_string());
        }
        Ok(())
    }

    /// Table URL without credentials, safe for logs.
    pub fn redacted_url(&self) -> String {
        format!("{}/{}?***", self.endpoint, self.table_name)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    value: Vec<Map<String, JsonValue>>,
}

pub struct TableServiceStore {
    client: Client,
    config: TableServiceConfig,
}

impl TableServiceStore {
    pub fn new(config: TableServiceConfig) -> Result<Self> {
        config.validate().map_err(FactError::Config)?;

        let mut builder = Client::builder().timeout(config.timeout);
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| FactError::Config(format!("Invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build()?;

        debug!(table = %config.redacted_url(), "table service client ready");
        Ok(Self { client, config })
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.config.endpoint, self.config.table_name)
    }

    fn entity_url(&self, partition: &str, row_key: &str) -> String {
        format!(
            "{}(PartitionKey={},RowKey={})?{}",
            self.table_url(),
            key_literal(partition),
            key_literal(row_key),
            self.config.sas_token
        )
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Accept", ACCEPT_NO_METADATA)
            .header("x-ms-version", API_VERSION)
            .header("DataServiceVersion", "3.0;NetFx")
    }
}

// Key values are OData string literals inside the resource path.
fn key_literal(value: &str) -> String {
    format!("'{}'", urlencoding::encode(&value.replace('\'', "''")))
}

fn entity_to_json(entity: &Entity) -> JsonValue {
    let mut object = Map::new();
    for (name, value) in &entity.properties {
        object.insert(name.clone(), JsonValue::String(value.clone()));
    }
    // Keys go last so a stray property can never replace them.
    object.insert("PartitionKey".into(), JsonValue::String(entity.partition_key.clone()));
    object.insert("RowKey".into(), JsonValue::String(entity.row_key.clone()));
    JsonValue::Object(object)
}

fn entity_from_json(object: Map<String, JsonValue>) -> Result<Entity> {
    let mut partition_key = None;
    let mut row_key = None;
    let mut entity_properties = std::collections::BTreeMap::new();

    for (name, value) in object {
        if name.starts_with("odata.") || name.contains("@odata.") {
            continue;
        }
        let text = match value {
            JsonValue::Null => continue,
            JsonValue::String(s) => s,
            other => other.to_string(),
        };
        match name.as_str() {
            "PartitionKey" => partition_key = Some(text),
            "RowKey" => row_key = Some(text),
            _ => {
                entity_properties.insert(name, text);
            }
        }
    }

    match (partition_key, row_key) {
        (Some(partition_key), Some(row_key)) => Ok(Entity {
            partition_key,
            row_key,
            properties: entity_properties,
        }),
        _ => Err(FactError::Infrastructure(
            "Table service returned an entity without PartitionKey/RowKey".to_string(),
        )),
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn failure(response: Response, action: &str) -> FactError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    FactError::Infrastructure(format!("{} failed with HTTP {}: {}", action, status, body.trim()))
}

#[async_trait]
impl EntityStore for TableServiceStore {
    async fn query_page(&self, filter: &Filter, continuation: Option<Continuation>) -> Result<Page> {
        let mut url = format!(
            "{}()?$filter={}",
            self.table_url(),
            urlencoding::encode(&filter.to_odata())
        );
        if let Some(c) = &continuation {
            url.push_str(&format!("&NextPartitionKey={}", urlencoding::encode(&c.next_partition_key)));
            if let Some(row) = &c.next_row_key {
                url.push_str(&format!("&NextRowKey={}", urlencoding::encode(row)));
            }
        }
        url.push('&');
        url.push_str(&self.config.sas_token);

        debug!(filter = %filter, "query entities");
        let response = self.request(Method::GET, url).send().await?;
        if !response.status().is_success() {
            return Err(failure(response, "Query").await);
        }

        let continuation = header_value(&response, NEXT_PARTITION_HEADER).map(|pk| Continuation {
            next_partition_key: pk,
            next_row_key: header_value(&response, NEXT_ROW_HEADER),
        });

        let body: QueryResponse = response.json().await?;
        let entities = body
            .value
            .into_iter()
            .map(entity_from_json)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page { entities, continuation })
    }

    async fn get(&self, partition: &str, row_key: &str) -> Result<Option<Entity>> {
        debug!(partition, row_key, "get entity");
        let response = self
            .request(Method::GET, self.entity_url(partition, row_key))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let object: Map<String, JsonValue> = response.json().await?;
                entity_from_json(object).map(Some)
            }
            _ => Err(failure(response, "Get entity").await),
        }
    }

    async fn create(&self, entity: Entity) -> Result<()> {
        debug!(partition = %entity.partition_key, row_key = %entity.row_key, "create entity");
        let url = format!("{}?{}", self.table_url(), self.config.sas_token);
        let response = self
            .request(Method::POST, url)
            .header("Prefer", "return-no-content")
            .json(&entity_to_json(&entity))
            .send()
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Err(FactError::AlreadyExists(format!(
                "Entity {}/{}",
                entity.partition_key, entity.row_key
            ))),
            status if status.is_success() => Ok(()),
            _ => Err(failure(response, "Create entity").await),
        }
    }

    async fn update(&self, entity: Entity) -> Result<()> {
        debug!(partition = %entity.partition_key, row_key = %entity.row_key, "replace entity");
        let url = self.entity_url(&entity.partition_key, &entity.row_key);
        let response = self
            .request(Method::PUT, url)
            .header("If-Match", "*")
            .json(&entity_to_json(&entity))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(FactError::NotFound(format!(
                "Entity {}/{}",
                entity.partition_key, entity.row_key
            ))),
            status if status.is_success() => Ok(()),
            _ => Err(failure(response, "Update entity").await),
        }
    }

    async fn delete(&self, partition: &str, row_key: &str) -> Result<()> {
        debug!(partition, row_key, "delete entity");
        let response = self
            .request(Method::DELETE, self.entity_url(partition, row_key))
            .header("If-Match", "*")
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(FactError::NotFound(format!("Entity {}/{}", partition, row_key))),
            status if status.is_success() => Ok(()),
            _ => Err(failure(response, "Delete entity").await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_normalises_endpoint_and_token() {
        let config = TableServiceConfig::new("https://acct.table.example.net/", "facts", "?sv=1&sig=x");
        assert_eq!(config.endpoint, "https://acct.table.example.net");
        assert_eq!(config.sas_token, "sv=1&sig=x");
        assert!(config.validate().is_ok());
        assert!(!config.redacted_url().contains("sig"));
    }

    #[test]
    fn test_config_validate() {
        assert!(TableServiceConfig::new("", "facts", "sig").validate().is_err());
        assert!(TableServiceConfig::new("ftp://x", "facts", "sig").validate().is_err());
        assert!(TableServiceConfig::new("https://x", "", "sig").validate().is_err());
        assert!(TableServiceConfig::new("https://x", "facts", "").validate().is_err());
        assert!(TableServiceConfig::new("https://x", "facts", "sig")
            .timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_entity_from_json_stringifies_and_strips_metadata() {
        let object = json!({
            "odata.etag": "W/\"1\"",
            "PartitionKey": "PuppetCfg",
            "RowKey": "web01",
            "Timestamp": "2024-01-01T00:00:00Z",
            "cores": 4,
            "cores@odata.type": "Edm.Int32",
            "legacy": null
        });
        let JsonValue::Object(object) = object else { unreachable!() };

        let entity = entity_from_json(object).unwrap();
        assert_eq!(entity.row_key, "web01");
        assert_eq!(entity.property("cores"), Some("4"));
        assert_eq!(entity.property("Timestamp"), Some("2024-01-01T00:00:00Z"));
        assert!(entity.property("legacy").is_none());
        assert!(entity.properties.keys().all(|k| !k.contains("odata")));
    }

    #[test]
    fn test_entity_from_json_requires_keys() {
        let JsonValue::Object(object) = json!({"RowKey": "web01"}) else { unreachable!() };
        assert!(entity_from_json(object).is_err());
    }

    #[test]
    fn test_entity_to_json_keeps_keys() {
        let entity = Entity::new(crate::core::Partition::MachineFacts, "web01").with_property("RowKey", "other");
        let json = entity_to_json(&entity);
        assert_eq!(json["RowKey"], "web01");
        assert_eq!(json["PartitionKey"], "PuppetCfg");
    }

    #[test]
    fn test_key_literal_escapes() {
        assert_eq!(key_literal("web01"), "'web01'");
        assert_eq!(key_literal("o'brien"), "'o%27%27brien'");
    }
}
