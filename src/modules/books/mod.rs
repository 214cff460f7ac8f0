pub mod models;
pub mod store;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bookshelf_http::error::AppError;
use bookshelf_kernel::{InitCtx, Module};
use serde_json::{json, Value};

use models::{BooksResponse, MessageResponse, RecordsQuery};
use store::{BookReviews, ReviewError, SortOrder, BOOK_FIELD, RATING_FIELD};

const MISSING_FIELDS_MESSAGE: &str =
    "Bad request, missing 'Book' or 'Rating' in the request body";

/// Book review endpoints, served from the root path
pub struct BooksModule {
    reviews: BookReviews,
}

impl BooksModule {
    pub fn new(reviews: BookReviews) -> Self {
        Self { reviews }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    fn mount_path(&self) -> String {
        String::new()
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            base = %ctx.settings.airtable.base_id,
            table = %ctx.settings.airtable.table_id,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/records", get(list_records))
            .route("/add-record", post(add_record))
            .with_state(self.reviews.clone())
    }

    fn openapi(&self) -> Option<Value> {
        Some(json!({
            "paths": {
                "/records": {
                    "get": {
                        "summary": "List book reviews",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "count",
                                "in": "query",
                                "required": false,
                                "description": "Maximum number of records to return",
                                "schema": { "type": "integer", "minimum": 1 }
                            },
                            {
                                "name": "sort",
                                "in": "query",
                                "required": false,
                                "description": "Order by rating; anything else leaves storage order",
                                "schema": { "type": "string", "enum": ["ASC", "DESC"] }
                            }
                        ],
                        "responses": {
                            "200": {
                                "description": "Book reviews",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/BooksResponse" }
                                    }
                                }
                            },
                            "400": {
                                "description": "Invalid count",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            },
                            "500": {
                                "description": "Backend failure",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                },
                "/add-record": {
                    "post": {
                        "summary": "Add a book review",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/NewReview" }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "Record added",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/MessageResponse" }
                                    }
                                }
                            },
                            "400": {
                                "description": "Missing 'Book' or 'Rating'",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/MessageResponse" }
                                    }
                                }
                            },
                            "500": {
                                "description": "Backend failed to add the record",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/MessageResponse" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Review": {
                        "type": "object",
                        "properties": {
                            "id": {
                                "type": "string",
                                "description": "Record identifier assigned by Airtable"
                            },
                            "createdTime": {
                                "type": "string",
                                "format": "date-time"
                            },
                            "fields": { "$ref": "#/components/schemas/NewReview" }
                        },
                        "required": ["id", "createdTime", "fields"]
                    },
                    "NewReview": {
                        "type": "object",
                        "properties": {
                            "Book": { "type": "string", "description": "Title of the book" },
                            "Rating": { "type": "number", "description": "Reviewer's rating" }
                        },
                        "required": ["Book", "Rating"],
                        "additionalProperties": true
                    },
                    "BooksResponse": {
                        "type": "object",
                        "properties": {
                            "books": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/Review" }
                            }
                        },
                        "required": ["books"]
                    },
                    "MessageResponse": {
                        "type": "object",
                        "properties": { "message": { "type": "string" } },
                        "required": ["message"]
                    }
                }
            }
        }))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// `GET /records`
async fn list_records(
    State(reviews): State<BookReviews>,
    params: Result<Query<RecordsQuery>, QueryRejection>,
) -> Result<Json<BooksResponse>, AppError> {
    let Query(params) = params.map_err(|rejection| {
        tracing::warn!(error = %rejection, "rejected records query");
        AppError::invalid_param("query", rejection.body_text())
    })?;
    let count = params.count.as_deref().map(parse_count).transpose()?;
    let sort = params.sort.as_deref().and_then(SortOrder::parse);

    let books = reviews
        .list(count, sort)
        .await
        .context("failed to list book reviews")?;

    Ok(Json(BooksResponse { books }))
}

/// `POST /add-record`
async fn add_record(
    State(reviews): State<BookReviews>,
    payload: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<MessageResponse>) {
    let fields = match payload {
        Ok(Json(Value::Object(fields))) => fields,
        Ok(Json(_)) => {
            return message(
                StatusCode::BAD_REQUEST,
                "Bad request, the request body must be a JSON object",
            )
        }
        Err(rejection) => {
            tracing::warn!(error = %rejection, "rejected add-record body");
            return message(
                StatusCode::BAD_REQUEST,
                format!("Bad request, {}", rejection.body_text()),
            );
        }
    };

    if !fields.contains_key(BOOK_FIELD) || !fields.contains_key(RATING_FIELD) {
        return message(StatusCode::BAD_REQUEST, MISSING_FIELDS_MESSAGE);
    }

    match reviews.create(fields).await {
        Ok(record) => {
            tracing::info!(record_id = %record.id, "record added");
            message(StatusCode::OK, "Record added successfully")
        }
        Err(ReviewError::MissingField(_)) => {
            message(StatusCode::BAD_REQUEST, MISSING_FIELDS_MESSAGE)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to add record");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to add record")
        }
    }
}

fn parse_count(raw: &str) -> Result<u32, AppError> {
    match raw.trim().parse::<u32>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(AppError::invalid_param(
            "count",
            format!("count must be a positive integer, got '{}'", raw),
        )),
    }
}

fn message(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<MessageResponse>) {
    (
        status,
        Json(MessageResponse {
            message: message.into(),
        }),
    )
}

/// Create the books module over the given reviews store
pub fn create_module(reviews: BookReviews) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new(reviews))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use bookshelf_db::InMemoryTable;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn seeded() -> InMemoryTable {
        let rows = [("Dune", 5), ("Emma", 2), ("Ubik", 4), ("Solaris", 3)]
            .into_iter()
            .map(|(book, rating)| match json!({"Book": book, "Rating": rating}) {
                Value::Object(map) => map,
                _ => unreachable!(),
            });
        InMemoryTable::with_rows(rows)
    }

    fn app(table: &InMemoryTable) -> Router {
        BooksModule::new(BookReviews::new(Arc::new(table.clone()))).routes()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/add-record")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn ratings(body: &Value) -> Vec<f64> {
        body["books"]
            .as_array()
            .unwrap()
            .iter()
            .map(|book| book["fields"]["Rating"].as_f64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn records_desc_is_non_increasing() {
        let (status, body) = send(app(&seeded()), get("/records?sort=DESC")).await;
        assert_eq!(status, StatusCode::OK);

        let ratings = ratings(&body);
        assert_eq!(ratings.len(), 4);
        assert!(ratings.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn records_asc_is_non_decreasing_in_any_case() {
        let (status, body) = send(app(&seeded()), get("/records?sort=asc")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(ratings(&body).windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn records_without_sort_keep_backend_order() {
        let table = seeded();
        let (_, body) = send(app(&table), get("/records")).await;
        assert_eq!(ratings(&body), [5.0, 2.0, 4.0, 3.0]);

        let (_, body) = send(app(&table), get("/records?sort=rating")).await;
        assert_eq!(ratings(&body), [5.0, 2.0, 4.0, 3.0]);
    }

    #[tokio::test]
    async fn records_count_caps_results() {
        let (status, body) = send(app(&seeded()), get("/records?count=3")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["books"].as_array().unwrap().len(), 3);

        let (_, body) = send(app(&seeded()), get("/records?count=10&sort=DESC")).await;
        assert_eq!(ratings(&body), [5.0, 4.0, 3.0, 2.0]);
    }

    #[tokio::test]
    async fn records_reject_non_positive_count() {
        for uri in ["/records?count=abc", "/records?count=0", "/records?count=-2"] {
            let (status, body) = send(app(&seeded()), get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"]["code"], "invalid_parameter");
            assert_eq!(body["error"]["details"][0]["param"], "count");
        }
    }

    #[tokio::test]
    async fn records_reject_malformed_query_with_error_envelope() {
        let (status, body) = send(app(&seeded()), get("/records?count=1&count=2")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "invalid_parameter");
        assert_eq!(body["error"]["details"][0]["param"], "query");
    }

    #[tokio::test]
    async fn records_backend_failure_is_500() {
        let table = seeded();
        table.set_failing(true);

        let (status, body) = send(app(&table), get("/records")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "internal_error");
    }

    #[tokio::test]
    async fn add_record_then_list_contains_it() {
        let table = InMemoryTable::new();

        let (status, body) = send(app(&table), post_json(r#"{"Book":"Dune","Rating":5}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Record added successfully");

        let (_, body) = send(app(&table), get("/records")).await;
        let books = body["books"].as_array().unwrap();
        assert!(books
            .iter()
            .any(|b| b["fields"]["Book"] == "Dune" && b["fields"]["Rating"] == 5));
        assert!(books[0]["id"].as_str().unwrap().starts_with("rec"));
    }

    #[tokio::test]
    async fn add_record_missing_rating_is_400_without_backend_call() {
        let table = InMemoryTable::new();

        let (status, body) = send(app(&table), post_json(r#"{"Book":"Dune"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], MISSING_FIELDS_MESSAGE);
        assert_eq!(table.create_calls(), 0);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn add_record_rejects_non_object_and_malformed_bodies() {
        let table = InMemoryTable::new();

        let (status, _) = send(app(&table), post_json("[1, 2]")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(app(&table), post_json("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().starts_with("Bad request"));

        assert_eq!(table.create_calls(), 0);
    }

    #[tokio::test]
    async fn add_record_backend_failure_is_500() {
        let table = InMemoryTable::new();
        table.set_failing(true);

        let (status, body) = send(app(&table), post_json(r#"{"Book":"Dune","Rating":5}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to add record");
        assert_eq!(table.create_calls(), 1);
    }

    #[test]
    fn openapi_documents_both_routes() {
        let module = BooksModule::new(BookReviews::new(Arc::new(InMemoryTable::new())));
        let spec = module.openapi().unwrap();
        assert!(spec["paths"]["/records"]["get"].is_object());
        assert!(spec["paths"]["/add-record"]["post"].is_object());
        assert_eq!(module.mount_path(), "");
    }
}
