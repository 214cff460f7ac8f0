//! Book review access on top of a [`TableBackend`].

use std::sync::Arc;

use bookshelf_db::{Fields, Formula, ListQuery, Record, Sort, TableBackend, TableError};
use thiserror::Error;

pub const BOOK_FIELD: &str = "Book";
pub const RATING_FIELD: &str = "Rating";

/// Requested ordering of reviews by rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// `ASC`/`DESC` in any case; anything else means unsorted.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("desc") {
            Some(SortOrder::Desc)
        } else if value.eq_ignore_ascii_case("asc") {
            Some(SortOrder::Asc)
        } else {
            None
        }
    }

    fn by_rating(self) -> Sort {
        match self {
            SortOrder::Asc => Sort::asc(RATING_FIELD),
            SortOrder::Desc => Sort::desc(RATING_FIELD),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("no review found for book '{0}'")]
    UnknownBook(String),

    #[error(transparent)]
    Backend(#[from] TableError),
}

/// Book reviews stored in a remote table. Cheap to clone.
#[derive(Clone)]
pub struct BookReviews {
    table: Arc<dyn TableBackend>,
}

impl BookReviews {
    pub fn new(table: Arc<dyn TableBackend>) -> Self {
        Self { table }
    }

    /// Reviews in backend order, or by rating when `sort` is given, capped at `count`.
    pub async fn list(
        &self,
        count: Option<u32>,
        sort: Option<SortOrder>,
    ) -> Result<Vec<Record>, ReviewError> {
        let mut query = ListQuery::new();
        if let Some(count) = count {
            query = query.max_records(count);
        }
        if let Some(order) = sort {
            query = query.sort(order.by_rating());
        }

        let records = self.table.list(&query).await?;
        tracing::debug!(?count, ?sort, returned = records.len(), "listed reviews");
        Ok(records)
    }

    /// Store a new review. Rows without `Book` and `Rating` never reach the backend.
    pub async fn create(&self, fields: Fields) -> Result<Record, ReviewError> {
        check_required(&fields)?;
        Ok(self.table.create(fields).await?)
    }

    /// Id of the first review whose `Book` matches `name` exactly.
    pub async fn find_id_by_name(&self, name: &str) -> Result<Option<String>, ReviewError> {
        let formula = Formula::field_equals(BOOK_FIELD, name);
        Ok(self.table.first(&formula).await?.map(|record| record.id))
    }

    /// Partial update; fields not in `patch` are left untouched.
    pub async fn update(&self, record_id: &str, patch: Fields) -> Result<Record, ReviewError> {
        Ok(self.table.update(record_id, patch).await?)
    }

    /// Look a review up by book name and replace its rating.
    pub async fn set_rating(
        &self,
        name: &str,
        rating: serde_json::Number,
    ) -> Result<Record, ReviewError> {
        let record_id = self
            .find_id_by_name(name)
            .await?
            .ok_or_else(|| ReviewError::UnknownBook(name.to_string()))?;

        let mut patch = Fields::new();
        patch.insert(RATING_FIELD.to_string(), serde_json::Value::Number(rating));
        self.update(&record_id, patch).await
    }
}

/// First required field missing from `fields`, as an error.
pub fn check_required(fields: &Fields) -> Result<(), ReviewError> {
    for field in [BOOK_FIELD, RATING_FIELD] {
        if !fields.contains_key(field) {
            return Err(ReviewError::MissingField(field));
        }
    }
    Ok(())
}
