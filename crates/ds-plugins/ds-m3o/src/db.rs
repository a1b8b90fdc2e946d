//! The hosted record store.

use async_trait::async_trait;
use ds_core::query::ReadRequest;
use ds_core::{Record, RecordStore, Table};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use crate::M3oClient;

const SERVICE: &str = "db";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadBody<'a> {
    table: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_by: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<&'a str>,
}

impl<'a> ReadBody<'a> {
    fn from_request(request: &'a ReadRequest) -> Self {
        Self {
            table: request.table.as_str(),
            id: request.id.as_deref(),
            query: request.query(),
            limit: request.limit,
            order_by: request.order_by.as_deref(),
            order: request.order_by.as_ref().map(|_| request.order.as_str()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReadResponse {
    records: Vec<Record>,
}

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    table: &'a str,
    record: Record,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    table: &'a str,
    id: &'a str,
    record: Record,
}

pub struct M3oRecordStore {
    client: M3oClient,
}

impl M3oRecordStore {
    pub fn new(client: M3oClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordStore for M3oRecordStore {
    async fn read(&self, request: &ReadRequest) -> anyhow::Result<Vec<Record>> {
        let rsp: ReadResponse = self
            .client
            .call(SERVICE, "Read", &ReadBody::from_request(request))
            .await?;
        Ok(rsp.records)
    }

    async fn create(&self, table: Table, record: Record) -> anyhow::Result<String> {
        let fallback_id = record
            .get("id")
            .and_then(|id| id.as_str())
            .unwrap_or_default()
            .to_string();
        let rsp: CreateResponse = self
            .client
            .call(
                SERVICE,
                "Create",
                &CreateBody {
                    table: table.as_str(),
                    record,
                },
            )
            .await?;
        Ok(if rsp.id.is_empty() { fallback_id } else { rsp.id })
    }

    async fn update(&self, table: Table, id: &str, record: Record) -> anyhow::Result<()> {
        let _: IgnoredAny = self
            .client
            .call(
                SERVICE,
                "Update",
                &UpdateBody {
                    table: table.as_str(),
                    id,
                    record,
                },
            )
            .await?;
        Ok(())
    }
}
