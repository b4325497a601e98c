use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::store::store_trait::{KeyValueStore, StoreError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// etcd v3 client speaking the gRPC-gateway JSON API.
///
/// Keys and values travel base64 encoded; int64 fields come back as strings.
pub struct EtcdStore {
    client: Client,
    endpoint: String,
}

impl EtcdStore {
    pub fn new(endpoint: &str) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, StoreError>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.endpoint, path);
        let resp = self.client.post(&url).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!("{url} returned {status}: {text}")));
        }
        Ok(resp.json::<R>().await?)
    }
}

#[derive(Serialize)]
struct PutRequest {
    key: String,
    value: String,
}

#[derive(Serialize)]
struct RangeRequest {
    key: String,
    range_end: String,
}

#[derive(Serialize)]
struct DeleteRangeRequest {
    key: String,
}

#[derive(Deserialize)]
struct EmptyResponse {}

#[derive(Deserialize, Default)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValueDto>,
}

#[derive(Deserialize)]
struct KeyValueDto {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Deserialize, Default)]
struct DeleteRangeResponse {
    #[serde(default)]
    deleted: Option<String>,
}

#[derive(Deserialize)]
struct HealthResponse {
    health: String,
}

/// End of the key range covering every key that starts with `prefix`.
///
/// Increments the last byte below 0xff and drops everything after it.
/// A prefix made only of 0xff bytes (or empty) maps to `\0`, which etcd reads
/// as "to the end of the keyspace".
pub fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    vec![0]
}

fn decode_range(resp: RangeResponse) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
    resp.kvs
        .into_iter()
        .map(|kv| {
            let key = String::from_utf8(BASE64.decode(kv.key)?)
                .map_err(|e| StoreError::Protocol(format!("non utf-8 key: {e}")))?;
            let value = BASE64.decode(kv.value)?;
            Ok((key, value))
        })
        .collect()
}

#[async_trait]
impl KeyValueStore for EtcdStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let req = PutRequest {
            key: BASE64.encode(key),
            value: BASE64.encode(value),
        };
        let _: EmptyResponse = self.post("/v3/kv/put", &req).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let req = DeleteRangeRequest {
            key: BASE64.encode(key),
        };
        let resp: DeleteRangeResponse = self.post("/v3/kv/deleterange", &req).await?;
        let deleted = resp
            .deleted
            .as_deref()
            .map(str::parse::<u64>)
            .transpose()
            .map_err(|e| StoreError::Protocol(format!("bad deleted count: {e}")))?
            .unwrap_or(0);
        Ok(deleted > 0)
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let req = RangeRequest {
            key: BASE64.encode(prefix),
            range_end: BASE64.encode(prefix_range_end(prefix.as_bytes())),
        };
        let resp: RangeResponse = self.post("/v3/kv/range", &req).await?;
        let items = decode_range(resp)?;

        debug!(prefix, count = items.len(), "listed etcd keys");
        Ok(items)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let url = format!("{}/health", self.endpoint);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(StoreError::Unavailable(format!("{url} returned {}", resp.status())));
        }
        let body: HealthResponse = resp.json().await?;
        if body.health == "true" {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("etcd reports health={}", body.health)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_end_increments_last_byte() {
        assert_eq!(prefix_range_end(b"/ksr/k8s/pod/"), b"/ksr/k8s/pod0".to_vec());
        assert_eq!(prefix_range_end(b"a\xff"), b"b".to_vec());
        assert_eq!(prefix_range_end(b"\xff\xff"), vec![0]);
        assert_eq!(prefix_range_end(b""), vec![0]);
    }

    #[test]
    fn range_response_is_decoded_from_base64() {
        let raw = serde_json::json!({
            "header": {"revision": "7"},
            "kvs": [
                {"key": BASE64.encode("/ksr/k8s/node/n1"), "value": BASE64.encode("{}"), "mod_revision": "3"}
            ],
            "count": "1"
        });
        let resp: RangeResponse = serde_json::from_value(raw).unwrap();
        let items = decode_range(resp).unwrap();
        assert_eq!(items, vec![("/ksr/k8s/node/n1".to_string(), b"{}".to_vec())]);
    }

    #[test]
    fn empty_range_response_has_no_items() {
        let resp: RangeResponse = serde_json::from_value(serde_json::json!({"header": {}})).unwrap();
        assert!(decode_range(resp).unwrap().is_empty());
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let store = EtcdStore::with_client(Client::new(), "http://etcd:2379/");
        assert_eq!(store.endpoint, "http://etcd:2379");
    }
}
