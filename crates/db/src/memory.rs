//! In-memory table backend.
//!
//! Keeps rows in insertion order and evaluates sorts and formulas locally.
//! Used as the injected backend in tests, and handy for running the server
//! without credentials.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::TableError;
use crate::query::{Direction, Formula, ListQuery};
use crate::record::{Fields, Record};
use crate::TableBackend;

#[derive(Debug, Clone, Default)]
pub struct InMemoryTable {
    rows: Arc<Mutex<Vec<Record>>>,
    failing: Arc<AtomicBool>,
    create_calls: Arc<AtomicUsize>,
}

impl InMemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table with rows, in order.
    pub fn with_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Fields>,
    {
        let table = Self::new();
        {
            let mut guard = table.lock();
            for fields in rows {
                guard.push(new_record(fields));
            }
        }
        table
    }

    /// Make every subsequent call fail with [`TableError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    /// Snapshot of all rows in storage order.
    pub fn rows(&self) -> Vec<Record> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of create calls that reached the backend, failed or not.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(AtomicOrdering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), TableError> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(TableError::Unavailable(
                "in-memory table set to fail".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TableBackend for InMemoryTable {
    async fn list(&self, query: &ListQuery) -> Result<Vec<Record>, TableError> {
        self.check_available()?;

        let mut rows: Vec<Record> = self
            .lock()
            .iter()
            .filter(|record| query.formula.as_ref().map_or(true, |f| matches(f, record)))
            .cloned()
            .collect();

        // Stable sort, so ties keep storage order.
        if !query.sort.is_empty() {
            rows.sort_by(|a, b| {
                query
                    .sort
                    .iter()
                    .map(|sort| {
                        let ordering = compare_values(a.field(&sort.field), b.field(&sort.field));
                        match sort.direction {
                            Direction::Asc => ordering,
                            Direction::Desc => ordering.reverse(),
                        }
                    })
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        if let Some(max) = query.max_records {
            rows.truncate(max as usize);
        }

        Ok(rows)
    }

    async fn create(&self, fields: Fields) -> Result<Record, TableError> {
        self.create_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_available()?;

        let record = new_record(fields);
        self.lock().push(record.clone());
        Ok(record)
    }

    async fn first(&self, formula: &Formula) -> Result<Option<Record>, TableError> {
        self.check_available()?;
        Ok(self.lock().iter().find(|r| matches(formula, r)).cloned())
    }

    async fn update(&self, record_id: &str, fields: Fields) -> Result<Record, TableError> {
        self.check_available()?;

        let mut rows = self.lock();
        let record = rows
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| TableError::NotFound(record_id.to_string()))?;

        record.fields.extend(fields);
        Ok(record.clone())
    }
}

fn new_record(fields: Fields) -> Record {
    let id = Uuid::new_v4().simple().to_string();
    Record {
        id: format!("rec{}", &id[..14]),
        created_time: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        fields,
    }
}

fn matches(formula: &Formula, record: &Record) -> bool {
    match formula {
        Formula::FieldEquals { field, value } => {
            record.field(field).and_then(Value::as_str) == Some(value.as_str())
        }
    }
}

/// Empty cells sort first, numbers numerically, text lexically.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
