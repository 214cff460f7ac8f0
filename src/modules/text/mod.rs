use async_trait::async_trait;
use axum::{extract::Query, routing::get, Json, Router};
use bookshelf_http::error::AppError;
use bookshelf_kernel::Module;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Stateless text utilities, served from the root path
pub struct TextModule;

impl TextModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for TextModule {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
pub struct TextQuery {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: String,
}

#[async_trait]
impl Module for TextModule {
    fn name(&self) -> &'static str {
        "text"
    }

    fn mount_path(&self) -> String {
        String::new()
    }

    fn routes(&self) -> Router {
        Router::new().route("/uppercase", get(uppercase))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/uppercase": {
                    "get": {
                        "summary": "Uppercase a string",
                        "tags": ["Text"],
                        "parameters": [
                            {
                                "name": "text",
                                "in": "query",
                                "required": true,
                                "schema": { "type": "string" }
                            }
                        ],
                        "responses": {
                            "200": {
                                "description": "Uppercased text",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/TextResponse" }
                                    }
                                }
                            },
                            "400": {
                                "description": "Missing text parameter",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "TextResponse": {
                        "type": "object",
                        "properties": { "text": { "type": "string" } },
                        "required": ["text"]
                    }
                }
            }
        }))
    }
}

/// `GET /uppercase`
async fn uppercase(Query(query): Query<TextQuery>) -> Result<Json<TextResponse>, AppError> {
    let text = query
        .text
        .ok_or_else(|| AppError::invalid_param("text", "missing 'text' query parameter"))?;

    Ok(Json(TextResponse {
        text: text.to_uppercase(),
    }))
}

/// Create a new instance of the text module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(TextModule::new())
}
