//! PostgREST-backed store handle (Supabase-compatible).
//!
//! - SQL: `POST {base}/rest/v1/rpc/{sql_function}` with `{"query": ...}`
//! - Insert: `POST {base}/rest/v1/{table}` with a JSON array of records
//!
//! Both requests carry the service-role key as `apikey` and as a bearer token.

use std::time::Duration;

use reqwest::blocking::{Client, Request, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::config::{StoreConfig, StoreCredentials};
use crate::error::StoreError;
use crate::store::{Record, Store};

/// Longest response body kept in an error.
const MAX_ERROR_BODY: usize = 512;

/// Blocking HTTP store handle. One request in flight at a time.
pub struct RestStore {
    client: Client,
    base_url: Url,
    api_key: SecretString,
    sql_function: String,
}

impl std::fmt::Debug for RestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStore")
            .field("base_url", &self.base_url.as_str())
            .field("sql_function", &self.sql_function)
            .finish_non_exhaustive()
    }
}

impl RestStore {
    /// Build an authenticated handle. No network traffic happens here.
    pub fn connect(credentials: StoreCredentials, config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.request_timeout_secs.map(Duration::from_secs))
            .build()?;
        let (base_url, api_key) = credentials.into_parts();
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl {
                url: base_url.to_string(),
                message: "url cannot carry a path".into(),
            });
        }
        tracing::debug!(url = %base_url, "Store handle created");
        Ok(Self {
            client,
            base_url,
            api_key,
            sql_function: config.sql_function.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl {
                url: self.base_url.to_string(),
                message: "url cannot carry a path".into(),
            })?
            .pop_if_empty()
            .extend(["rest", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let key = self.api_key.expose_secret();
        builder.header("apikey", key).bearer_auth(key)
    }

    fn json_body<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value).map_err(|e| StoreError::Encode {
            message: e.to_string(),
        })
    }

    /// The request [`Store::execute_sql`] sends.
    pub fn sql_request(&self, query: &str) -> Result<Request, StoreError> {
        let url = self.endpoint(&["rpc", &self.sql_function])?;
        let body = Self::json_body(&serde_json::json!({ "query": query }))?;
        Ok(self
            .authorized(self.client.post(url))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .build()?)
    }

    /// The request [`Store::insert`] sends.
    pub fn insert_request(&self, table: &str, records: &[Record]) -> Result<Request, StoreError> {
        let url = self.endpoint(&[table])?;
        let body = Self::json_body(records)?;
        Ok(self
            .authorized(self.client.post(url))
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return=minimal")
            .body(body)
            .build()?)
    }

    fn send(&self, request: Request) -> Result<(), StoreError> {
        let response = self.client.execute(request)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let mut body = response.text().unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl Store for RestStore {
    fn execute_sql(&self, query: &str) -> Result<(), StoreError> {
        self.send(self.sql_request(query)?)
    }

    fn insert(&self, table: &str, records: &[Record]) -> Result<(), StoreError> {
        self.send(self.insert_request(table, records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> RestStore {
        let creds = StoreCredentials::new(url, "service-key").unwrap();
        RestStore::connect(creds, &StoreConfig::default()).unwrap()
    }

    fn body_json(request: &Request) -> serde_json::Value {
        let bytes = request.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_sql_request_shape() {
        let store = store("https://abc.supabase.co");
        let request = store.sql_request("SELECT 1").unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://abc.supabase.co/rest/v1/rpc/exec_sql"
        );
        assert_eq!(request.headers()["apikey"], "service-key");
        assert_eq!(request.headers()["authorization"], "Bearer service-key");
        assert_eq!(body_json(&request), serde_json::json!({ "query": "SELECT 1" }));
    }

    #[test]
    fn test_insert_request_shape() {
        let store = store("http://localhost:54321/");
        let mut record = Record::new();
        record.insert("species".into(), serde_json::json!("setosa"));
        record.insert("sepal_ratio".into(), serde_json::Value::Null);

        let request = store.insert_request("iris_data", &[record]).unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://localhost:54321/rest/v1/iris_data"
        );
        assert_eq!(request.headers()["prefer"], "return=minimal");
        assert_eq!(request.headers()["content-type"], "application/json");
        assert_eq!(
            body_json(&request),
            serde_json::json!([{ "species": "setosa", "sepal_ratio": null }])
        );
    }

    #[test]
    fn test_base_path_is_preserved() {
        let store = store("https://gateway.example.com/supabase");
        let request = store.sql_request("SELECT 1").unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://gateway.example.com/supabase/rest/v1/rpc/exec_sql"
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let store = store("https://abc.supabase.co");
        assert!(!format!("{store:?}").contains("service-key"));
    }
}
