use sqlx::{
    MySql,
    mysql::{MySqlArguments, MySqlRow},
    query::Query,
};

use crate::{
    db::{error::DbResult, query::SqlValue},
    models::RecordId,
};

/// Bind every statement parameter in order.
pub fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Int(value) => query.bind(*value),
            SqlValue::Text(value) => query.bind(value.as_str()),
        };
    }
    query
}

/// Read a `BIGINT UNSIGNED` id column as a record id.
pub fn get_record_id(row: &MySqlRow, column: &str) -> DbResult<RecordId> {
    use sqlx::Row;

    Ok(RecordId::new(row.try_get::<u64, _>(column)?))
}
