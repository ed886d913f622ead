use async_trait::async_trait;

use crate::{
    db::{
        error::DbResult,
        query::{Column, Comparator, Condition, Delete, Select, Statement, Table, TableNames},
    },
    models::{AttributeValue, Record, RecordId, ScanFilter},
};

/// Columns read for every [`Record`], in decode order.
pub const RECORD_COLUMNS: [Column; 6] = [
    Column::Id,
    Column::Title,
    Column::Name,
    Column::Kind,
    Column::Status,
    Column::Guid,
];

/// Which slice of a filtered record set to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// `LIMIT limit OFFSET offset`, ordered by id.
    Offset { offset: u64, limit: u64 },
    /// Records with an id greater than `after`, ordered by id.
    After { after: Option<RecordId>, limit: u64 },
    /// Everything matching the filter in one read.
    Unbounded,
}

/// Record store gateway: parametrized reads and deletes over the primary,
/// translation-link and attribute tables. No business logic lives here.
#[async_trait]
pub trait RecordRepo: Send + Sync {
    /// Physical table names used by this repository.
    fn table_names(&self) -> &TableNames;

    /// Read one page of records matching `filter`, ordered by id.
    async fn fetch_page(&self, filter: &ScanFilter, page: Page) -> DbResult<Vec<Record>>;

    /// Attribute values stored under `key` for the given records.
    ///
    /// When a record has several rows for the key, the first one (lowest
    /// row id) wins. Records without the attribute are absent from the result.
    async fn attributes(
        &self,
        ids: &[RecordId],
        key: &str,
    ) -> DbResult<Vec<(RecordId, AttributeValue)>>;

    /// Ids of primary records matching all `conditions`, ordered by id.
    async fn select_ids(&self, conditions: Vec<Condition>) -> DbResult<Vec<RecordId>>;

    /// `(id, guid)` pairs for the given records.
    async fn guids(&self, ids: &[RecordId]) -> DbResult<Vec<(RecordId, String)>>;

    /// Every primary record id whose guid equals `guid`.
    async fn ids_with_guid(&self, guid: &str) -> DbResult<Vec<RecordId>> {
        self.select_ids(vec![Condition::equals(Column::Guid, guid)])
            .await
    }

    /// Execute a delete and return the number of affected rows.
    async fn execute_delete(&self, delete: &Delete) -> DbResult<u64>;

    /// Execute `deletes` in order inside one transaction.
    ///
    /// Returns the affected rows per delete. If any statement fails the
    /// transaction is rolled back and no row is removed.
    async fn execute_deletes(&self, deletes: &[Delete]) -> DbResult<Vec<u64>>;
}

/// Translate a typed scan filter into WHERE conditions.
pub fn filter_conditions(filter: &ScanFilter) -> Vec<Condition> {
    let mut conditions = Vec::new();
    if let Some(kind) = &filter.kind {
        conditions.push(Condition::equals(Column::Kind, kind.as_str()));
    }
    if let Some(status) = &filter.status {
        conditions.push(Condition::equals(Column::Status, status.as_str()));
    }
    if !filter.include.is_empty() {
        conditions.push(Condition::ids(
            Column::Id,
            Comparator::Equals,
            &filter.include,
        ));
    }
    if !filter.exclude.is_empty() {
        conditions.push(Condition::ids(
            Column::Id,
            Comparator::NotEquals,
            &filter.exclude,
        ));
    }
    if let Some(key) = &filter.has_attribute {
        conditions.push(Condition::HasAttribute(key.clone()));
    }
    conditions
}

/// Statement reading one page of records.
pub fn page_statement(names: &TableNames, filter: &ScanFilter, page: Page) -> Statement {
    let mut select = Select::new(Table::Records, &RECORD_COLUMNS);
    for condition in filter_conditions(filter) {
        select = select.filter(condition);
    }
    select = select.order_by(Column::Id);

    match page {
        Page::Offset { offset, limit } => select.limit(limit).offset(offset).build(names),
        Page::After { after, limit } => {
            if let Some(after) = after {
                select = select.filter(Condition::new(
                    Column::Id,
                    Comparator::GreaterThan,
                    vec![after.into()],
                ));
            }
            select.limit(limit).build(names)
        }
        Page::Unbounded => select.build(names),
    }
}

/// Statement reading attribute rows for a set of records.
pub fn attributes_statement(names: &TableNames, ids: &[RecordId], key: &str) -> Statement {
    Select::new(Table::Attributes, &[Column::PostId, Column::MetaValue])
        .filter(Condition::ids(Column::PostId, Comparator::Equals, ids))
        .filter(Condition::equals(Column::MetaKey, key))
        .order_by(Column::PostId)
        .order_by(Column::MetaId)
        .build(names)
}

/// Statement reading record ids under arbitrary conditions.
pub fn ids_statement(names: &TableNames, conditions: Vec<Condition>) -> Statement {
    conditions
        .into_iter()
        .fold(Select::new(Table::Records, &[Column::Id]), Select::filter)
        .order_by(Column::Id)
        .build(names)
}

/// Statement reading guids for a set of records.
pub fn guids_statement(names: &TableNames, ids: &[RecordId]) -> Statement {
    Select::new(Table::Records, &[Column::Id, Column::Guid])
        .filter(Condition::ids(Column::Id, Comparator::Equals, ids))
        .order_by(Column::Id)
        .build(names)
}

/// Keep the first attribute row per record from rows ordered by record id.
pub fn first_per_record(
    rows: impl IntoIterator<Item = (RecordId, Option<String>)>,
) -> Vec<(RecordId, AttributeValue)> {
    let mut out = Vec::new();
    let mut last_seen = None;
    for (id, raw) in rows {
        if last_seen == Some(id) {
            continue;
        }
        last_seen = Some(id);
        if let Some(raw) = raw {
            out.push((id, AttributeValue::from_raw(&raw)));
        }
    }
    out
}

/// Convert a signed id column into a [`RecordId`].
pub fn record_id_from_i64(value: i64) -> DbResult<RecordId> {
    u64::try_from(value)
        .map(RecordId::new)
        .map_err(|_| crate::db::DbError::Internal(format!("negative record id in database: {value}")))
}
