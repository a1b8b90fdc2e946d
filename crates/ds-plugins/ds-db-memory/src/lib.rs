//! # ds-db-memory
//!
//! In-process implementation of `RecordStore`. Tables are vectors of raw JSON
//! records; reads apply the id, filter, ordering and limit of the request the
//! same way the hosted store does. Nothing is persisted across restarts.

use std::cmp::Ordering;

use anyhow::bail;
use async_trait::async_trait;
use dashmap::DashMap;
use ds_core::query::{Order, ReadRequest};
use ds_core::{Record, RecordStore, Table};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: DashMap<Table, Vec<Record>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held in `table`.
    pub fn len(&self, table: Table) -> usize {
        self.tables.get(&table).map_or(0, |rows| rows.len())
    }

    pub fn is_empty(&self, table: Table) -> bool {
        self.len(table) == 0
    }
}

fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Numbers compare numerically, strings lexically; missing values sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn read(&self, request: &ReadRequest) -> anyhow::Result<Vec<Record>> {
        let mut rows: Vec<Record> = match self.tables.get(&request.table) {
            Some(rows) => rows
                .iter()
                .filter(|r| request.id.as_deref().map_or(true, |id| record_id(r) == Some(id)))
                .filter(|r| request.conditions.iter().all(|c| c.matches(r)))
                .cloned()
                .collect(),
            None => return Ok(Vec::new()),
        };

        if let Some(field) = &request.order_by {
            rows.sort_by(|a, b| compare_values(a.get(field), b.get(field)));
            if request.order == Order::Desc {
                rows.reverse();
            }
        }
        if let Some(limit) = request.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn create(&self, table: Table, mut record: Record) -> anyhow::Result<String> {
        let id = match record_id(&record) {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                record.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };

        let mut rows = self.tables.entry(table).or_default();
        if rows.iter().any(|r| record_id(r) == Some(id.as_str())) {
            bail!("record {id} already exists in {table}");
        }
        rows.push(record);
        log::debug!("{table}: created {id}");
        Ok(id)
    }

    async fn update(&self, table: Table, id: &str, mut record: Record) -> anyhow::Result<()> {
        let Some(mut rows) = self.tables.get_mut(&table) else {
            bail!("record {id} not found in {table}");
        };
        let Some(slot) = rows.iter_mut().find(|r| record_id(r) == Some(id)) else {
            bail!("record {id} not found in {table}");
        };
        record.insert("id".to_string(), Value::String(id.to_string()));
        *slot = record;
        Ok(())
    }
}
