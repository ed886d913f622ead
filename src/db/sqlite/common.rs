use sqlx::{
    Sqlite,
    query::Query,
    sqlite::{SqliteArguments, SqliteRow},
};

use crate::db::{error::DbResult, query::SqlValue};

/// Bind every statement parameter in order.
pub fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Int(value) => query.bind(*value),
            SqlValue::Text(value) => query.bind(value.as_str()),
        };
    }
    query
}

/// Read an integer id column as a record id.
pub fn get_record_id(row: &SqliteRow, column: &str) -> DbResult<crate::models::RecordId> {
    use sqlx::Row;

    crate::db::repos::record_id_from_i64(row.try_get::<i64, _>(column)?)
}
