//! Airtable REST client.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::TableError;
use crate::query::{Formula, ListQuery};
use crate::record::{Fields, Record};
use crate::TableBackend;

/// Connection details for one Airtable table.
#[derive(Clone)]
pub struct AirtableConfig {
    /// API root, e.g. `https://api.airtable.com/v0`.
    pub api_url: String,
    pub base_id: String,
    pub table_id: String,
    /// Personal access token sent as a bearer credential.
    pub token: String,
    pub timeout_ms: u64,
}

/// A single table reached over the Airtable REST API.
#[derive(Clone)]
pub struct AirtableTable {
    http: reqwest::Client,
    table_url: String,
    token: String,
}

impl std::fmt::Debug for AirtableTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirtableTable")
            .field("table_url", &self.table_url)
            .finish_non_exhaustive()
    }
}

/// One page of a list response.
#[derive(Debug, Deserialize)]
struct ListPage {
    records: Vec<Record>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Serialize)]
struct FieldsBody<'a> {
    fields: &'a Fields,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

/// Airtable reports errors either as an object or as a bare code string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Object {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        message: String,
    },
    Code(String),
}

impl AirtableTable {
    pub fn new(config: &AirtableConfig) -> Result<Self, TableError> {
        if config.token.trim().is_empty() {
            return Err(TableError::Config("access token is empty".to_string()));
        }
        if config.base_id.is_empty() || config.table_id.is_empty() {
            return Err(TableError::Config(
                "base id and table id are required".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            http,
            table_url: table_url(&config.api_url, &config.base_id, &config.table_id),
            token: config.token.clone(),
        })
    }

    pub fn table_url(&self) -> &str {
        &self.table_url
    }

    async fn fetch_page(
        &self,
        query: &ListQuery,
        offset: Option<&str>,
    ) -> Result<ListPage, TableError> {
        let response = self
            .http
            .get(&self.table_url)
            .bearer_auth(&self.token)
            .query(&list_params(query, offset))
            .send()
            .await?;

        decode(response).await
    }
}

#[async_trait]
impl TableBackend for AirtableTable {
    #[instrument(skip(self))]
    async fn list(&self, query: &ListQuery) -> Result<Vec<Record>, TableError> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page = self.fetch_page(query, offset.as_deref()).await?;
            debug!(page_len = page.records.len(), "fetched page");
            records.extend(page.records);

            if let Some(max) = query.max_records {
                if records.len() >= max as usize {
                    records.truncate(max as usize);
                    break;
                }
            }

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(records)
    }

    #[instrument(skip(self, fields))]
    async fn create(&self, fields: Fields) -> Result<Record, TableError> {
        let response = self
            .http
            .post(&self.table_url)
            .bearer_auth(&self.token)
            .json(&FieldsBody { fields: &fields })
            .send()
            .await?;

        let record: Record = decode(response).await?;
        debug!(record_id = %record.id, "record created");
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn first(&self, formula: &Formula) -> Result<Option<Record>, TableError> {
        let query = ListQuery::new().max_records(1).formula(formula.clone());
        let page = self.fetch_page(&query, None).await?;
        Ok(page.records.into_iter().next())
    }

    #[instrument(skip(self, fields))]
    async fn update(&self, record_id: &str, fields: Fields) -> Result<Record, TableError> {
        let response = self
            .http
            .patch(format!("{}/{}", self.table_url, record_id))
            .bearer_auth(&self.token)
            .json(&FieldsBody { fields: &fields })
            .send()
            .await?;

        match decode(response).await {
            Err(TableError::Api { status: 404, .. }) => {
                Err(TableError::NotFound(record_id.to_string()))
            }
            other => other,
        }
    }
}

fn table_url(api_url: &str, base_id: &str, table_id: &str) -> String {
    format!("{}/{}/{}", api_url.trim_end_matches('/'), base_id, table_id)
}

/// Query-string pairs for a list request.
fn list_params(query: &ListQuery, offset: Option<&str>) -> Vec<(String, String)> {
    let mut params = Vec::new();

    if let Some(max) = query.max_records {
        params.push(("maxRecords".to_string(), max.to_string()));
    }
    for (i, sort) in query.sort.iter().enumerate() {
        params.push((format!("sort[{i}][field]"), sort.field.clone()));
        params.push((
            format!("sort[{i}][direction]"),
            sort.direction.as_str().to_string(),
        ));
    }
    if let Some(formula) = &query.formula {
        params.push(("filterByFormula".to_string(), formula.to_string()));
    }
    if let Some(offset) = offset {
        params.push(("offset".to_string(), offset.to_string()));
    }

    params
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TableError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body));
    }

    Ok(serde_json::from_slice(&body)?)
}

fn api_error(status: u16, body: &[u8]) -> TableError {
    let (kind, message) = match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: ErrorDetail::Object { kind, message },
        }) => (kind, message),
        Ok(ErrorEnvelope {
            error: ErrorDetail::Code(code),
        }) => (code, String::new()),
        Err(_) => (
            "UNKNOWN".to_string(),
            String::from_utf8_lossy(body).into_owned(),
        ),
    };

    TableError::Api {
        status,
        kind,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Sort;

    fn config() -> AirtableConfig {
        AirtableConfig {
            api_url: "https://api.airtable.com/v0/".to_string(),
            base_id: "appBase".to_string(),
            table_id: "tblBooks".to_string(),
            token: "pat-test".to_string(),
            timeout_ms: 1000,
        }
    }

    #[test]
    fn builds_table_url_without_double_slash() {
        let table = AirtableTable::new(&config()).unwrap();
        assert_eq!(
            table.table_url(),
            "https://api.airtable.com/v0/appBase/tblBooks"
        );
    }

    #[test]
    fn rejects_empty_token() {
        let mut config = config();
        config.token = "  ".to_string();
        assert!(matches!(
            AirtableTable::new(&config),
            Err(TableError::Config(_))
        ));
    }

    #[test]
    fn default_query_sends_no_params() {
        assert!(list_params(&ListQuery::new(), None).is_empty());
    }

    #[test]
    fn list_params_cover_every_option() {
        let query = ListQuery::new()
            .max_records(3)
            .sort(Sort::desc("Rating"))
            .formula(Formula::field_equals("Book", "Dune"));

        let params = list_params(&query, Some("itrNext"));
        let expected = vec![
            ("maxRecords", "3"),
            ("sort[0][field]", "Rating"),
            ("sort[0][direction]", "desc"),
            ("filterByFormula", "{Book}='Dune'"),
            ("offset", "itrNext"),
        ];

        let params: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(params, expected);
    }

    #[test]
    fn parses_object_error_body() {
        let body = br#"{"error":{"type":"INVALID_PERMISSIONS","message":"no access"}}"#;
        match api_error(403, body) {
            TableError::Api {
                status,
                kind,
                message,
            } => {
                assert_eq!(status, 403);
                assert_eq!(kind, "INVALID_PERMISSIONS");
                assert_eq!(message, "no access");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parses_code_error_body() {
        match api_error(404, br#"{"error":"NOT_FOUND"}"#) {
            TableError::Api { kind, message, .. } => {
                assert_eq!(kind, "NOT_FOUND");
                assert!(message.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn keeps_raw_body_when_unparseable() {
        match api_error(502, b"Bad Gateway") {
            TableError::Api { kind, message, .. } => {
                assert_eq!(kind, "UNKNOWN");
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn list_page_offset_is_optional() {
        let page: ListPage = serde_json::from_str(
            r#"{"records":[{"id":"rec1","createdTime":"2024-01-01T00:00:00.000Z","fields":{"Book":"Dune","Rating":5}}]}"#,
        )
        .unwrap();
        assert_eq!(page.records.len(), 1);
        assert!(page.offset.is_none());
    }

    mod over_http {
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        use axum::extract::{Path, Query, State};
        use axum::http::{header, HeaderMap, StatusCode};
        use axum::routing::{get, patch};
        use axum::{Json, Router};
        use serde_json::{json, Value};

        use super::*;

        type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

        fn row(id: &str) -> Value {
            json!({
                "id": id,
                "createdTime": "2024-01-01T00:00:00.000Z",
                "fields": { "Book": id, "Rating": 1 }
            })
        }

        fn authorized(headers: &HeaderMap) -> bool {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                == Some("Bearer pat-test")
        }

        async fn list_rows(
            State(seen): State<Seen>,
            headers: HeaderMap,
            Query(params): Query<HashMap<String, String>>,
        ) -> (StatusCode, Json<Value>) {
            if !authorized(&headers) {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": {"type": "AUTHENTICATION_REQUIRED", "message": "bad token"}})),
                );
            }

            let second_page = params.get("offset").map(String::as_str) == Some("p2");
            seen.lock().unwrap().push(params);

            if second_page {
                (StatusCode::OK, Json(json!({ "records": [row("c")] })))
            } else {
                (
                    StatusCode::OK,
                    Json(json!({ "records": [row("a"), row("b")], "offset": "p2" })),
                )
            }
        }

        async fn patch_row(Path(_id): Path<String>) -> (StatusCode, Json<Value>) {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "NOT_FOUND" })))
        }

        async fn spawn_table() -> (AirtableConfig, Seen) {
            let seen = Seen::default();
            let app = Router::new()
                .route("/v0/appBase/tblBooks", get(list_rows))
                .route("/v0/appBase/tblBooks/{id}", patch(patch_row))
                .with_state(seen.clone());

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            let config = AirtableConfig {
                api_url: format!("http://{addr}/v0"),
                ..config()
            };
            (config, seen)
        }

        fn ids(records: &[Record]) -> Vec<&str> {
            records.iter().map(|r| r.id.as_str()).collect()
        }

        #[tokio::test]
        async fn list_follows_offset_across_pages() {
            let (config, seen) = spawn_table().await;
            let table = AirtableTable::new(&config).unwrap();

            let records = table.list(&ListQuery::new()).await.unwrap();
            assert_eq!(ids(&records), ["a", "b", "c"]);

            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 2);
            assert!(seen[0].get("offset").is_none());
            assert_eq!(seen[1].get("offset").map(String::as_str), Some("p2"));
        }

        #[tokio::test]
        async fn list_stops_at_max_records() {
            let (config, seen) = spawn_table().await;
            let table = AirtableTable::new(&config).unwrap();

            let query = ListQuery::new().max_records(1).sort(Sort::desc("Rating"));
            let records = table.list(&query).await.unwrap();
            assert_eq!(ids(&records), ["a"]);

            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0]["maxRecords"], "1");
            assert_eq!(seen[0]["sort[0][field]"], "Rating");
            assert_eq!(seen[0]["sort[0][direction]"], "desc");
        }

        #[tokio::test]
        async fn update_of_missing_record_is_not_found() {
            let (config, _) = spawn_table().await;
            let table = AirtableTable::new(&config).unwrap();

            let err = table.update("recX", Fields::new()).await.unwrap_err();
            assert!(matches!(err, TableError::NotFound(id) if id == "recX"));
        }

        #[tokio::test]
        async fn wrong_token_surfaces_api_error() {
            let (config, _) = spawn_table().await;
            let table = AirtableTable::new(&AirtableConfig {
                token: "pat-other".to_string(),
                ..config
            })
            .unwrap();

            match table.list(&ListQuery::new()).await.unwrap_err() {
                TableError::Api { status, kind, .. } => {
                    assert_eq!(status, 401);
                    assert_eq!(kind, "AUTHENTICATION_REQUIRED");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}
