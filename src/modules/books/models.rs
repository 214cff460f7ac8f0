use bookshelf_db::Record;
use serde::{Deserialize, Serialize};

/// Query parameters accepted by `GET /records`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordsQuery {
    /// Maximum number of records, as a positive integer string
    pub count: Option<String>,
    /// `ASC` or `DESC` by rating, any case
    pub sort: Option<String>,
}

/// Response body of `GET /records`.
#[derive(Debug, Clone, Serialize)]
pub struct BooksResponse {
    pub books: Vec<Record>,
}

/// Response body of `POST /add-record`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
