use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::common::{bind_params, get_record_id};
use crate::{
    db::{
        error::DbResult,
        query::{Condition, Delete, TableNames},
        repos::{
            Page, RecordRepo, attributes_statement, first_per_record, guids_statement,
            ids_statement, page_statement,
        },
    },
    models::{AttributeValue, Record, RecordId, ScanFilter},
};

pub struct SqliteRecordRepo {
    pool: SqlitePool,
    names: TableNames,
}

impl SqliteRecordRepo {
    pub fn new(pool: SqlitePool, names: TableNames) -> Self {
        Self { pool, names }
    }
}

#[async_trait]
impl RecordRepo for SqliteRecordRepo {
    fn table_names(&self) -> &TableNames {
        &self.names
    }

    async fn fetch_page(&self, filter: &ScanFilter, page: Page) -> DbResult<Vec<Record>> {
        let stmt = page_statement(&self.names, filter, page);
        let rows = bind_params(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> DbResult<Record> {
                Ok(Record {
                    id: get_record_id(row, "ID")?,
                    title: row.try_get("post_title")?,
                    name: row.try_get("post_name")?,
                    kind: row.try_get("post_type")?,
                    status: row.try_get("post_status")?,
                    guid: row.try_get("guid")?,
                    attributes: BTreeMap::new(),
                })
            })
            .collect()
    }

    async fn attributes(
        &self,
        ids: &[RecordId],
        key: &str,
    ) -> DbResult<Vec<(RecordId, AttributeValue)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let stmt = attributes_statement(&self.names, ids, key);
        let rows = bind_params(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_all(&self.pool)
            .await?;

        let decoded = rows
            .iter()
            .map(|row| -> DbResult<(RecordId, Option<String>)> {
                Ok((
                    get_record_id(row, "post_id")?,
                    row.try_get::<Option<String>, _>("meta_value")?,
                ))
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(first_per_record(decoded))
    }

    async fn select_ids(&self, conditions: Vec<Condition>) -> DbResult<Vec<RecordId>> {
        let stmt = ids_statement(&self.names, conditions);
        let rows = bind_params(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| get_record_id(row, "ID")).collect()
    }

    async fn guids(&self, ids: &[RecordId]) -> DbResult<Vec<(RecordId, String)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let stmt = guids_statement(&self.names, ids);
        let rows = bind_params(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> DbResult<(RecordId, String)> {
                Ok((get_record_id(row, "ID")?, row.try_get("guid")?))
            })
            .collect()
    }

    async fn execute_delete(&self, delete: &Delete) -> DbResult<u64> {
        let stmt = delete.build(&self.names);
        let result = bind_params(sqlx::query(&stmt.sql), &stmt.params)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn execute_deletes(&self, deletes: &[Delete]) -> DbResult<Vec<u64>> {
        let statements: Vec<_> = deletes
            .iter()
            .map(|delete| delete.build(&self.names))
            .collect();

        let mut tx = self.pool.begin().await?;
        let mut affected = Vec::with_capacity(statements.len());
        for stmt in &statements {
            let result = bind_params(sqlx::query(&stmt.sql), &stmt.params)
                .execute(&mut *tx)
                .await?;
            affected.push(result.rows_affected());
        }
        tx.commit().await?;

        Ok(affected)
    }
}
